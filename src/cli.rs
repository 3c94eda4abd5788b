// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// The flags map one-to-one onto CrawlSettingsBuilder; everything else
// (--show, --json, --no-progress, -v) only affects how the report is printed.
//
// The target is either a URL or a local directory. A directory is served on
// localhost (under --path) and that server's URL is crawled instead.
//
// Rust concepts:
// - Derive macros: clap generates the parser from the struct definition
// - ValueEnum: lets clap parse a fixed set of words into an enum
// =============================================================================

use clap::{ArgAction, Parser, ValueEnum};
use link_warden::{CrawlError, CrawlSettings};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "link-warden",
    version,
    about = "Crawl a website and report dead, redirected and ignored links",
    long_about = "link-warden starts at a URL, follows every link inside it and checks each one. \
                  Links outside the starting URL are reported as ignored unless --external is given."
)]
pub struct Cli {
    /// URL to start crawling from (e.g., https://example.com/docs/), or a
    /// local directory to serve and crawl
    pub url: String,

    /// URL path the local directory is served under (e.g., /docs/)
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Also check links that leave the site's origin
    #[arg(short, long)]
    pub external: bool,

    /// Number of concurrent workers
    #[arg(short = 'n', long, default_value_t = 1)]
    pub threads: usize,

    /// Extra attempts after a timeout or connection failure
    #[arg(short, long, default_value_t = 0)]
    pub retry: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Ignore links whose URL matches this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub ignore: Vec<String>,

    /// Only check links whose URL matches one of these regexes (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub allow: Vec<String>,

    /// Check links to this host even without --external (repeatable)
    #[arg(long = "domain", value_name = "HOST")]
    pub domains: Vec<String>,

    /// Which link lists to print after the summary
    #[arg(long, value_enum, default_value = "not-found")]
    pub show: Vec<Show>,

    /// Output results in JSON format instead of text
    #[arg(long)]
    pub json: bool,

    /// Do not draw the progress line
    #[arg(long)]
    pub no_progress: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Show {
    Found,
    NotFound,
    Ignored,
    Redirected,
    All,
    None,
}

impl Cli {
    /// The local directory to serve, when the target is one rather than a URL
    pub fn directory(&self) -> Option<PathBuf> {
        if self.url.contains("://") {
            return None;
        }
        let path = Path::new(&self.url);
        path.is_dir().then(|| path.to_path_buf())
    }

    /// Crawl settings starting at `base`: the target URL itself, or the
    /// address a local directory is being served at
    pub fn settings(&self, base: &str) -> Result<CrawlSettings, CrawlError> {
        let mut builder = CrawlSettings::builder(base)
            .external(self.external)
            .threads(self.threads)
            .retry(self.retry)
            .timeout(Duration::from_secs(self.timeout));

        for pattern in &self.ignore {
            builder = builder.ignore(pattern.clone());
        }
        for pattern in &self.allow {
            builder = builder.allow(pattern.clone());
        }
        for host in &self.domains {
            builder = builder.domain(host.clone());
        }

        builder.build()
    }
}
