//! Tracker refresh loop
//!
//! A single task owns the [`NotebookRunTracker`] and is the only place it is
//! mutated. The task refreshes on a fixed interval and on request, and after
//! every change publishes an immutable [`RunView`] that any number of readers
//! can hold without blocking the next refresh.

use nbrun_core::domain::run::JobHandle;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, RunError};
use crate::scheduler::tracker::{NotebookRunTracker, RunView, UpdateReport};

enum Command {
    Refresh(oneshot::Sender<UpdateReport>),
    Register(JobHandle, oneshot::Sender<Result<()>>),
    Shutdown,
}

/// Starts the refresh task
pub struct TrackerService;

impl TrackerService {
    /// Moves `tracker` onto its own task and refreshes it every `interval`
    ///
    /// The first refresh happens immediately. The task ends on
    /// [`TrackerHandle::shutdown`] or once every handle is dropped.
    pub fn spawn(tracker: NotebookRunTracker, interval: Duration) -> TrackerHandle {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (view_tx, view_rx) = watch::channel(Arc::new(tracker.snapshot()));

        tokio::spawn(run(tracker, interval, commands_rx, view_tx));

        TrackerHandle {
            commands: commands_tx,
            view: view_rx,
        }
    }
}

/// Cloneable access to a running tracker
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<Arc<RunView>>,
}

impl TrackerHandle {
    /// Latest published view
    pub fn view(&self) -> Arc<RunView> {
        self.view.borrow().clone()
    }

    /// Waits for the next published view
    pub async fn changed(&mut self) -> Result<Arc<RunView>> {
        self.view
            .changed()
            .await
            .map_err(|_| RunError::TrackerStopped)?;
        Ok(self.view.borrow_and_update().clone())
    }

    /// Runs an update now and waits for it
    pub async fn refresh(&self) -> Result<UpdateReport> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Refresh(reply)).await?;
        response.await.map_err(|_| RunError::TrackerStopped)
    }

    /// Starts tracking a run that was just submitted
    pub async fn register(&self, job: JobHandle) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Register(job, reply)).await?;
        response.await.map_err(|_| RunError::TrackerStopped)?
    }

    /// Stops the refresh task and waits for it to exit
    pub async fn shutdown(self) {
        if self.commands.send(Command::Shutdown).await.is_ok() {
            self.commands.closed().await;
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RunError::TrackerStopped)
    }
}

async fn run(
    mut tracker: NotebookRunTracker,
    interval: Duration,
    mut commands: mpsc::Receiver<Command>,
    view: watch::Sender<Arc<RunView>>,
) {
    info!(
        "Starting tracker refresh loop (interval: {:?}, window: {} runs)",
        interval,
        tracker.max_entries()
    );

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = tracker.update().await;
                log_report(&report);
                publish(&tracker, &view);
            }
            command = commands.recv() => match command {
                Some(Command::Refresh(reply)) => {
                    let report = tracker.update().await;
                    log_report(&report);
                    publish(&tracker, &view);
                    let _ = reply.send(report);
                }
                Some(Command::Register(job, reply)) => {
                    let result = tracker.register(&job).await;
                    match &result {
                        Ok(()) => publish(&tracker, &view),
                        Err(e) => warn!("Failed to register job {}: {}", job, e),
                    }
                    let _ = reply.send(result);
                }
                Some(Command::Shutdown) | None => break,
            },
        }
    }

    info!("Tracker refresh loop stopped");
}

fn publish(tracker: &NotebookRunTracker, view: &watch::Sender<Arc<RunView>>) {
    view.send_replace(Arc::new(tracker.snapshot()));
}

fn log_report(report: &UpdateReport) {
    if report.discovered > 0 || report.settled > 0 {
        info!(
            "Discovered {} new run(s), {} run(s) finished",
            report.discovered, report.settled
        );
    } else {
        debug!("No run changes this cycle");
    }
}
