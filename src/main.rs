// src/main.rs
// =============================================================================
// This is the entry point of the link-warden CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Start a crawl with the core library (serving a local directory first,
//    if that is what we were given)
// 3. Poll the crawl's snapshot to draw a progress line on stderr
// 4. Print the report (text or JSON) and exit with a meaningful code
//    (0 = no dead links, 1 = dead links found, 2 = error)
//
// The core never prints anything; this file only reads snapshot() and the
// final results.
// =============================================================================

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Show};
use link_warden::{logging, CrawlResults, CrawlSettings, CrawlSnapshot, Crawler, Link, LocalServer, Status};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    // kept alive until the report is printed
    let local = match cli.directory() {
        Some(dir) => Some(
            LocalServer::start(&dir, cli.path.as_deref())
                .await
                .context("could not serve the directory")?,
        ),
        None if cli.path.is_some() => bail!("--path only applies when crawling a local directory"),
        None => None,
    };
    let base = local.as_ref().map_or_else(|| cli.url.clone(), LocalServer::url);

    let settings = cli.settings(&base).context("invalid crawl settings")?;
    let crawler = Crawler::start(settings).context("could not start the crawl")?;

    // Ctrl-C stops the crawl but still prints what was found so far
    let interrupted = {
        let stop = tokio::signal::ctrl_c();
        async move {
            let _ = stop.await;
        }
    };

    let progress = !cli.no_progress && !cli.json;
    let results = tokio::select! {
        results = crawl_with_progress(&crawler, progress) => results?,
        _ = interrupted => {
            crawler.stop();
            crawler.wait().await?
        }
    };
    if progress {
        clear_progress();
    }

    let snapshot = crawler.snapshot();
    if cli.json {
        print_json(crawler.settings(), &snapshot, &results)?;
    } else {
        print_report(crawler.settings(), &snapshot, &results, &cli.show);
    }

    if snapshot.stats.not_found > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Waits for the crawl, redrawing the progress line every 100ms
async fn crawl_with_progress(crawler: &Crawler, progress: bool) -> Result<CrawlResults> {
    if !progress {
        return Ok(crawler.wait().await?);
    }

    let wait = crawler.wait();
    tokio::pin!(wait);
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);

    loop {
        tokio::select! {
            results = &mut wait => return Ok(results?),
            _ = ticker.tick() => draw_progress(&crawler.snapshot()),
        }
    }
}

fn draw_progress(snapshot: &CrawlSnapshot) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\r\x1b[2K{}", progress_line(snapshot));
    let _ = stderr.flush();
}

fn clear_progress() {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\r\x1b[2K");
    let _ = stderr.flush();
}

// "Ready: 42% (21/50); Found: 18; Not Found: 2; Ignored: 1; Redirects: 0"
fn progress_line(snapshot: &CrawlSnapshot) -> String {
    let done = snapshot.stats.total();
    let total = snapshot.total_discovered.max(1);

    let head = if snapshot.crawled {
        format!("Links Total: {};", snapshot.total_discovered)
    } else {
        format!(
            "Ready: {:>3}% ({}/{});",
            done * 100 / total,
            done,
            snapshot.total_discovered
        )
    };

    format!(
        "{} Found: {}; Not Found: {}; Ignored: {}; Redirects: {}",
        head,
        snapshot.stats.found,
        snapshot.stats.not_found,
        snapshot.stats.ignored,
        snapshot.stats.redirection
    )
}

fn settings_line(settings: &CrawlSettings) -> String {
    format!(
        "URL=<{}>; External Checks={}; Threads={}; Retry={}",
        settings.base().link(),
        if settings.external() { "On" } else { "Off" },
        settings.threads(),
        settings.retry()
    )
}

// Prints the human-readable report
fn print_report(settings: &CrawlSettings, snapshot: &CrawlSnapshot, results: &CrawlResults, show: &[Show]) {
    let info = settings_line(settings);
    let stats = progress_line(snapshot);
    let width = info.len().max(stats.len());

    println!("{}", "=".repeat(width));
    println!("{}", info);
    println!("{}", "=".repeat(width));
    println!("{}", stats);
    if snapshot.aborted {
        println!("(crawl stopped early, {} link(s) not checked)", snapshot.pending());
    }
    println!("{}", "-".repeat(width));

    for status in statuses_to_show(show) {
        for link in results.bucket(status) {
            print_link(status, link);
        }
        if status == Status::Ignored {
            for raw in &results.unchecked {
                println!("[ {:<10} ] {}", Status::Ignored.label(), raw);
            }
        }
    }
}

fn print_link(status: Status, link: &Link) {
    println!("[ {:<10} ] {}", status.label(), link);
}

fn statuses_to_show(show: &[Show]) -> Vec<Status> {
    if show.contains(&Show::None) {
        return Vec::new();
    }
    if show.contains(&Show::All) {
        return Status::ALL.to_vec();
    }

    Status::ALL
        .into_iter()
        .filter(|status| {
            show.iter().any(|s| match s {
                Show::Found => *status == Status::Found,
                Show::NotFound => *status == Status::NotFound,
                Show::Ignored => *status == Status::Ignored,
                Show::Redirected => *status == Status::Redirection,
                Show::All | Show::None => false,
            })
        })
        .collect()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    base: &'a Link,
    external: bool,
    threads: usize,
    retry: u32,
    #[serde(flatten)]
    snapshot: &'a CrawlSnapshot,
    results: &'a CrawlResults,
}

fn print_json(settings: &CrawlSettings, snapshot: &CrawlSnapshot, results: &CrawlResults) -> Result<()> {
    let report = JsonReport {
        base: settings.base().link(),
        external: settings.external(),
        threads: settings.threads(),
        retry: settings.retry(),
        snapshot,
        results,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_warden::{CrawlPhase, Stats};

    fn snapshot(phase: CrawlPhase, stats: Stats, total: usize) -> CrawlSnapshot {
        CrawlSnapshot {
            phase,
            crawling: phase == CrawlPhase::Crawling,
            crawled: phase.is_finished(),
            aborted: phase == CrawlPhase::Aborted,
            stats,
            total_discovered: total,
        }
    }

    #[test]
    fn test_progress_line_while_crawling() {
        let stats = Stats { found: 18, not_found: 2, ignored: 1, redirection: 0 };
        let line = progress_line(&snapshot(CrawlPhase::Crawling, stats, 42));
        assert_eq!(line, "Ready:  50% (21/42); Found: 18; Not Found: 2; Ignored: 1; Redirects: 0");
    }

    #[test]
    fn test_progress_line_when_done() {
        let stats = Stats { found: 3, not_found: 0, ignored: 0, redirection: 1 };
        let line = progress_line(&snapshot(CrawlPhase::Crawled, stats, 4));
        assert!(line.starts_with("Links Total: 4;"));
    }

    #[test]
    fn test_show_selection() {
        assert_eq!(statuses_to_show(&[Show::NotFound]), vec![Status::NotFound]);
        assert_eq!(statuses_to_show(&[Show::All]).len(), 4);
        assert!(statuses_to_show(&[Show::All, Show::None]).is_empty());
        assert_eq!(
            statuses_to_show(&[Show::Redirected, Show::Found]),
            vec![Status::Found, Status::Redirection]
        );
    }
}
