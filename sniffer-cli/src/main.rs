mod cli;
mod commands;
mod error;
mod events;

use crate::cli::{Args, Commands};
use crate::commands::AppContext;
use crate::error::Result;
use clap::Parser;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let ctx = AppContext::build(&args).await?;
    match args.command {
        Commands::Watch {
            feed,
            auto_process,
            watch_patterns,
        } => commands::watch(ctx, feed, auto_process, watch_patterns).await,
        Commands::Process {
            page_url,
            manifest_url,
            prompt_template,
            video_title,
            no_follow,
        } => {
            commands::process(
                ctx,
                page_url,
                manifest_url,
                prompt_template,
                video_title,
                no_follow,
            )
            .await
        }
        Commands::Status => commands::status(ctx).await,
        Commands::Reports => commands::reports(ctx).await,
        Commands::Last => commands::last(ctx).await,
        Commands::Clear => commands::clear(ctx).await,
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
