use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, oneshot};

use roster_core::{ExternalId, IdentityKind, Settings};
use roster_remote::HttpDirectoryClient;
use roster_source::{SnapshotStore, SourceRecordProvider};
use roster_sync::{pipeline, BatchReport, JsonArchive, SyncContext};

use crate::error::{io_err, DaemonError};
use crate::feed::{is_message_file, ChangeFeed, InboxFeed};

/// Reconciles one identity of a given kind; runs on a blocking thread.
pub type Reconciler =
    Arc<dyn Fn(IdentityKind, &ExternalId) -> Result<BatchReport, DaemonError> + Send + Sync>;

type Feeds = Vec<Box<dyn ChangeFeed>>;

struct ReconcileJob {
    kind: IdentityKind,
    external_id: ExternalId,
    respond_to: oneshot::Sender<Result<BatchReport, String>>,
}

/// What one poll of every feed produced.
#[derive(Debug, Default)]
struct Polled {
    changes: Vec<(IdentityKind, ExternalId)>,
    failures: usize,
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(settings: Settings) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(settings))
}

/// Run the daemon against the configured master stores and remote directory
/// until ctrl-c.
pub async fn run(settings: Settings) -> Result<(), DaemonError> {
    let settings = Arc::new(settings);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    run_until(settings.clone(), remote_reconciler(settings), shutdown_tx).await
}

/// Run the daemon with an explicit reconciler until `shutdown` fires (or
/// ctrl-c, or any task fails).
pub async fn run_until(
    settings: Arc<Settings>,
    reconciler: Reconciler,
    shutdown: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let root = settings.inbox_root();
    let feeds: Feeds = vec![
        Box::new(InboxFeed::open(&root, IdentityKind::Student)?),
        Box::new(InboxFeed::open(&root, IdentityKind::Teacher)?),
    ];
    tracing::info!(inbox = %root.display(), "change-feed daemon starting");

    let (job_tx, job_rx) = mpsc::channel::<ReconcileJob>(64);
    let (wake_tx, wake_rx) = mpsc::channel::<()>(1);

    let watcher_handle = {
        let shutdown = shutdown.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let result = watcher_task(root, wake_tx, shutdown.subscribe()).await;
            if result.is_err() {
                let _ = shutdown.send(());
            }
            result
        })
    };

    let poller_handle = {
        let shutdown = shutdown.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            let result = poller_task(settings, feeds, job_tx, wake_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = processor_task(reconciler, job_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, shutting down daemon");
                        let _ = shutdown.send(());
                        Ok(())
                    }
                    Err(err) => Err(io_err("ctrl-c handler", err)),
                },
            }
        })
    };

    let (watcher_result, poller_result, processor_result, signal_result) =
        tokio::join!(watcher_handle, poller_handle, processor_handle, signal_handle);

    handle_join("watcher", watcher_result)?;
    handle_join("poller", poller_result)?;
    handle_join("processor", processor_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("change-feed daemon stopped");
    Ok(())
}

/// The production reconciler: fresh master-store snapshot, HTTP client and
/// on-disk archive per job.
pub fn remote_reconciler(settings: Arc<Settings>) -> Reconciler {
    Arc::new(move |kind: IdentityKind, id: &ExternalId| {
        reconcile_from_stores(&settings, kind, id)
    })
}

fn reconcile_from_stores(
    settings: &Settings,
    kind: IdentityKind,
    id: &ExternalId,
) -> Result<BatchReport, DaemonError> {
    let loaded = SnapshotStore::load_configured(kind, settings)?;
    let other = match kind {
        IdentityKind::Student => IdentityKind::Teacher,
        IdentityKind::Teacher => IdentityKind::Student,
    };
    let empty = SnapshotStore::from_parts(other, Vec::new(), Vec::new());
    let (students, staff) = match kind {
        IdentityKind::Student => (&loaded, &empty),
        IdentityKind::Teacher => (&empty, &loaded),
    };

    let provider = SourceRecordProvider::new(settings, students.into(), staff.into());
    let client = HttpDirectoryClient::new(&settings.remote);
    let mut archive = JsonArchive::open(&settings.archive)?;
    let ctx = SyncContext {
        settings,
        provider: &provider,
        client: &client,
    };
    Ok(pipeline::reconcile_single(&ctx, &mut archive, Some(kind), id)?)
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn watcher_task(
    root: PathBuf,
    wake_tx: mpsc::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let _watcher = match start_watcher(&root, event_tx) {
        Ok(watcher) => watcher,
        Err(err) => {
            tracing::warn!(inbox = %root.display(), error = %err, "inbox watcher unavailable; polling only");
            let _ = shutdown_rx.recv().await;
            return Ok(());
        }
    };

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if is_new_message(&event) {
                    // Full channel means a wake is already pending.
                    let _ = wake_tx.try_send(());
                }
            }
        }
    }
    Ok(())
}

fn start_watcher(
    root: &Path,
    event_tx: mpsc::UnboundedSender<notify::Result<Event>>,
) -> Result<RecommendedWatcher, DaemonError> {
    let mut watcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

async fn poller_task(
    settings: Arc<Settings>,
    mut feeds: Feeds,
    job_tx: mpsc::Sender<ReconcileJob>,
    mut wake_rx: mpsc::Receiver<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let idle = Duration::from_millis(settings.daemon.idle_interval_ms);
    let backoff = Duration::from_secs(settings.daemon.backoff_secs);

    'poll: loop {
        let (returned, polled) = tokio::task::spawn_blocking(move || {
            let polled = poll_feeds(&mut feeds);
            (feeds, polled)
        })
        .await
        .map_err(|err| DaemonError::Join(format!("feed poll: {err}")))?;
        feeds = returned;

        let received = polled.changes.len();
        for (kind, external_id) in polled.changes {
            let answer = match enqueue(&job_tx, kind, external_id.clone()).await {
                Ok(answer) => answer,
                Err(err) => {
                    tracing::debug!(error = %err, "reconcile queue closed; stopping poller");
                    break 'poll;
                }
            };
            match answer {
                Ok(report) => tracing::info!(
                    kind = %kind,
                    external_id = %external_id,
                    created = report.created,
                    updated = report.updated,
                    recreated = report.recreated,
                    deleted = report.deleted,
                    failed = report.failures.total(),
                    "change processed",
                ),
                Err(err) => {
                    tracing::error!(kind = %kind, external_id = %external_id, error = %err, "change failed")
                }
            }
        }

        let delay = if polled.failures > 0 {
            tracing::warn!(backoff_secs = backoff.as_secs(), "change feed poll failed; backing off");
            backoff
        } else if received > 0 {
            Duration::ZERO
        } else {
            idle
        };

        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break 'poll,
            _ = wake_rx.recv(), if delay == idle => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
    Ok(())
}

async fn processor_task(
    reconciler: Reconciler,
    mut job_rx: mpsc::Receiver<ReconcileJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let reconcile = reconciler.clone();
                let kind = job.kind;
                let external_id = job.external_id;
                let result = tokio::task::spawn_blocking(move || reconcile(kind, &external_id))
                    .await
                    .map_err(|err| DaemonError::Join(format!("reconcile: {err}")))?;
                let _ = job.respond_to.send(result.map_err(|err| err.to_string()));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Receive from every feed in order. One failing feed does not hide the
/// changes another one produced. Repeats within a kind are dropped.
fn poll_feeds(feeds: &mut Feeds) -> Polled {
    let mut polled = Polled::default();
    for feed in feeds.iter_mut() {
        let kind = feed.kind();
        match feed.receive() {
            Ok(ids) => {
                for id in ids {
                    let change = (kind, id);
                    if !polled.changes.contains(&change) {
                        polled.changes.push(change);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "could not receive changes");
                polled.failures += 1;
            }
        }
    }
    polled
}

async fn enqueue(
    job_tx: &mpsc::Sender<ReconcileJob>,
    kind: IdentityKind,
    external_id: ExternalId,
) -> Result<Result<BatchReport, String>, DaemonError> {
    let (respond_to, response) = oneshot::channel();
    job_tx
        .send(ReconcileJob {
            kind,
            external_id,
            respond_to,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("reconcile queue"))?;
    response
        .await
        .map_err(|_| DaemonError::ChannelClosed("reconcile response"))
}

fn is_new_message(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| is_message_file(p))
}

fn handle_join(
    name: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join(format!("{name}: {err}"))),
    }
}

/// Install the `tracing` subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
