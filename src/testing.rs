// src/testing.rs
// =============================================================================
// Test-only helpers: a scripted in-memory web site implementing Transport.
//
// Every request is counted per URL, so tests can assert how many times a link
// was actually fetched. Unknown URLs answer 404.
// =============================================================================

use crate::checker::{HttpResponse, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub enum Route {
    Page { status: u16, body: String },
    Redirect { status: u16, location: Option<String> },
    /// Never answers; only a timeout gets the caller out
    Hang,
    Fail(TransportError),
    /// Panics inside the transport, taking the calling worker down
    Panic,
    /// Fails with a connection reset for the first n attempts
    FailThen(usize, Box<Route>),
}

enum Reply {
    Ready(Result<HttpResponse, TransportError>),
    Hang,
}

#[derive(Debug, Default)]
pub struct FakeSite {
    routes: HashMap<String, Route>,
    attempts: Mutex<HashMap<String, usize>>,
    latency: Duration,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(key(url), route);
        self
    }

    pub fn page(self, url: &str, status: u16, body: &str) -> Self {
        self.route(url, Route::Page { status, body: body.to_string() })
    }

    pub fn status(self, url: &str, status: u16) -> Self {
        self.page(url, status, "")
    }

    pub fn redirect(self, url: &str, status: u16, location: &str) -> Self {
        self.route(
            url,
            Route::Redirect {
                status,
                location: Some(location.to_string()),
            },
        )
    }

    /// Delay added to every request, to keep several workers busy at once
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn attempts(&self, url: &str) -> usize {
        let attempts = self.attempts.lock().unwrap();
        attempts.get(&key(url)).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn max_attempts_per_url(&self) -> usize {
        self.attempts.lock().unwrap().values().copied().max().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for FakeSite {
    async fn get(&self, url: &Url, read_body: bool) -> Result<HttpResponse, TransportError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let route = self.routes.get(url.as_str());
        match reply(route, attempt, read_body) {
            Reply::Ready(result) => result,
            Reply::Hang => std::future::pending().await,
        }
    }
}

fn reply(route: Option<&Route>, attempt: usize, read_body: bool) -> Reply {
    match route {
        None => Reply::Ready(Ok(HttpResponse {
            status: 404,
            location: None,
            content_type: Some("text/html".to_string()),
            body: None,
        })),
        Some(Route::Page { status, body }) => {
            let success = (200..300).contains(status);
            Reply::Ready(Ok(HttpResponse {
                status: *status,
                location: None,
                content_type: Some("text/html".to_string()),
                body: (read_body && success).then(|| body.clone()),
            }))
        }
        Some(Route::Redirect { status, location }) => Reply::Ready(Ok(HttpResponse {
            status: *status,
            location: location.clone(),
            content_type: None,
            body: None,
        })),
        Some(Route::Hang) => Reply::Hang,
        Some(Route::Fail(error)) => Reply::Ready(Err(error.clone())),
        Some(Route::Panic) => panic!("transport blew up on purpose"),
        Some(Route::FailThen(failures, next)) => {
            if attempt <= *failures {
                Reply::Ready(Err(TransportError::Connect("connection reset".to_string())))
            } else {
                reply(Some(next), attempt, read_body)
            }
        }
    }
}

fn key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}
