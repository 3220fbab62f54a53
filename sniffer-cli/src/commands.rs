use crate::cli::Args;
use crate::error::Result;
use crate::events::{FeedEvent, TabRegistry};
use capture_core::{
    CaptureCoordinator, CaptureOutcome, CaptureStore, CoordinatorConfig, JsonFileStore,
    SessionStatus, SessionTracker,
};
use ingest_client::{ApiClient, DEFAULT_HOSTS, MultiHostClient, ProcessOutcome, ProcessRequest};
use manifest_detect::{WatchList, patterns::DEFAULT_PATTERNS};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

/// Shared wiring built once from the global flags.
pub struct AppContext {
    pub api: ApiClient,
    pub captures: CaptureStore,
    pub tracker: SessionTracker,
    pub debounce_window: Duration,
}

impl AppContext {
    pub async fn build(args: &Args) -> Result<Self> {
        let hosts: Vec<String> = if args.hosts.is_empty() {
            DEFAULT_HOSTS.iter().map(|h| h.to_string()).collect()
        } else {
            args.hosts.clone()
        };
        let api = ApiClient::new(MultiHostClient::new(hosts));

        let store = Arc::new(JsonFileStore::open(&args.state_file).await?);
        let captures = CaptureStore::new(store.clone());
        let tracker = SessionTracker::with_interval(
            store,
            Arc::new(api.clone()),
            Duration::from_secs(args.poll_interval_secs.max(1)),
        );

        Ok(Self {
            api,
            captures,
            tracker,
            debounce_window: Duration::from_secs(args.debounce_secs),
        })
    }
}

pub async fn watch(
    ctx: AppContext,
    feed: Option<PathBuf>,
    auto_process: bool,
    extra_patterns: Vec<String>,
) -> Result<()> {
    let mut globs: Vec<String> = DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect();
    globs.extend(extra_patterns);

    let registry = Arc::new(TabRegistry::default());
    let coordinator = CaptureCoordinator::new(
        CoordinatorConfig {
            watch: WatchList::new(&globs),
            debounce_window: ctx.debounce_window,
            auto_process,
        },
        ctx.captures.clone(),
        registry.clone(),
        Arc::new(ctx.api.clone()),
        ctx.tracker.clone(),
    );

    // Pick polling back up if a session was in flight when we last exited.
    if coordinator.tracker().resume().await? {
        info!("resumed tracking of a persisted processing session");
    }

    let reader: Box<dyn AsyncRead + Unpin> = match feed {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<FeedEvent>(line) {
            Ok(FeedEvent::Tab { tab_id, page_url }) => registry.update(tab_id, page_url),
            Ok(event) => {
                if let Some(request) = event.into_observed() {
                    match coordinator.observe(&request).await? {
                        CaptureOutcome::Captured(c) => {
                            println!("captured [{}] {} -> {}", c.source, c.page_url, c.manifest_url);
                        }
                        CaptureOutcome::RecordedUndeliverable(c) => {
                            println!("recorded (missing token) [{}] {}", c.source, c.page_url);
                        }
                        CaptureOutcome::Debounced | CaptureOutcome::Ignored => {}
                    }
                }
            }
            Err(e) => warn!(error = %e, "skipping malformed feed line"),
        }
    }

    if coordinator.tracker().is_polling() {
        info!("feed ended; following the active session (ctrl-c to stop)");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => coordinator.tracker().stop(),
            _ = wait_for_session(coordinator.tracker()) => {}
        }
    }
    Ok(())
}

pub async fn process(
    ctx: AppContext,
    page_url: String,
    manifest_url: Option<String>,
    prompt_template: Option<String>,
    video_title: Option<String>,
    no_follow: bool,
) -> Result<()> {
    // Fall back to the stored capture's manifest when it belongs to this page.
    let manifest_url = match manifest_url {
        Some(m) => Some(m),
        None => ctx
            .captures
            .get()
            .await?
            .filter(|c| c.page_url == page_url)
            .map(|c| c.manifest_url),
    };

    let outcome = ctx
        .api
        .start_process(&ProcessRequest {
            urls: vec![page_url.clone()],
            manifest_url: manifest_url.clone(),
            prompt_template,
            video_title,
            support_materials: vec![],
        })
        .await?;

    match outcome {
        ProcessOutcome::Started { total } => {
            println!("processing started ({total} video(s))");
        }
        ProcessOutcome::AlreadyInProgress => {
            println!("a job is already running; observing it");
        }
        ProcessOutcome::Queued { position } => {
            match position {
                Some(p) => println!("added to queue at position {p}"),
                None => println!("added to queue"),
            }
            return Ok(());
        }
    }

    ctx.tracker
        .start(page_url, manifest_url.unwrap_or_default())
        .await?;
    if !no_follow {
        wait_for_session(&ctx.tracker).await;
    }
    Ok(())
}

async fn wait_for_session(tracker: &SessionTracker) {
    let mut last_progress = None;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let Some(session) = tracker.current() else {
            return;
        };
        if last_progress != Some(session.progress) {
            println!(
                "[{:>3}%] {} ({}s elapsed)",
                session.progress, session.current_step, session.elapsed_sec
            );
            last_progress = Some(session.progress);
        }
        if session.status == SessionStatus::Completed {
            println!("completed after {}s", session.elapsed_sec);
            return;
        }
        if !tracker.is_polling() {
            return;
        }
    }
}

pub async fn status(ctx: AppContext) -> Result<()> {
    let st = ctx.api.status().await?;
    if st.processing {
        println!(
            "processing: {}% — {}",
            st.progress,
            st.current_step.as_deref().unwrap_or("processing")
        );
    } else {
        println!("idle");
    }
    Ok(())
}

pub async fn reports(ctx: AppContext) -> Result<()> {
    let reports = ctx.api.reports().await?;
    if reports.is_empty() {
        println!("no reports yet");
        return Ok(());
    }
    for r in reports {
        println!("{}  {}  ({})", r.created_at, r.title, r.domain);
    }
    Ok(())
}

pub async fn last(ctx: AppContext) -> Result<()> {
    match ctx.captures.get().await? {
        Some(capture) => println!("{}", serde_json::to_string_pretty(&capture)?),
        None => println!("no capture stored"),
    }
    Ok(())
}

pub async fn clear(ctx: AppContext) -> Result<()> {
    ctx.captures.clear().await?;
    println!("capture slot cleared");
    Ok(())
}
