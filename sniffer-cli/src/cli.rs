use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "manisniff",
    version,
    about = "Sniff streaming-video manifests (HLS/DASH) from a request feed and track pipeline sessions"
)]
pub struct Args {
    /// API base host; repeat to configure ordered fallbacks.
    #[arg(long = "host", global = true, env = "MANISNIFF_HOSTS", value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Path of the persisted state file (captures and session survive restarts).
    #[arg(long, global = true, default_value = "manisniff-state.json")]
    pub state_file: PathBuf,

    /// Debounce window for repeated captures of the same page, in seconds.
    #[arg(long, global = true, default_value_t = 30)]
    pub debounce_secs: u64,

    /// Session status poll interval, in seconds.
    #[arg(long, global = true, default_value_t = 2)]
    pub poll_interval_secs: u64,

    /// Increase log verbosity (-v: debug, -vv: trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch an NDJSON request-event feed and capture manifests.
    ///
    /// Each line is either a tab event
    /// `{"kind":"tab","tabId":3,"pageUrl":"https://…"}` or a request event
    /// `{"kind":"request","tabId":3,"url":"https://…"}`.
    Watch {
        /// Feed file; reads stdin when omitted.
        #[arg(long)]
        feed: Option<PathBuf>,

        /// Start remote processing (and session tracking) for every
        /// delivered capture.
        #[arg(long)]
        auto_process: bool,

        /// Extra watch patterns on top of the built-in set
        /// (extension-style globs, e.g. '*://*.example.com/*').
        #[arg(long = "watch-pattern")]
        watch_patterns: Vec<String>,
    },

    /// Trigger remote processing for a page URL and track it to completion.
    Process {
        page_url: String,

        #[arg(long)]
        manifest_url: Option<String>,

        #[arg(long)]
        prompt_template: Option<String>,

        #[arg(long)]
        video_title: Option<String>,

        /// Fire the trigger and exit without following progress.
        #[arg(long)]
        no_follow: bool,
    },

    /// Print the pipeline's current processing status.
    Status,

    /// List generated reports.
    Reports,

    /// Print the most recent stored capture.
    Last,

    /// Clear the stored capture.
    Clear,
}
