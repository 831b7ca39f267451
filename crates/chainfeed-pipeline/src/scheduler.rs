//! Interval scheduling of collection cycles with cooperative
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::collector::Pipeline;

/// Handle to a running schedule.
///
/// Cancellation takes effect immediately between cycles; a cycle
/// already in flight finishes first so no partial run is recorded.
pub struct ScheduleHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Waits for the schedule loop to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Runs a collection cycle every `every`, starting immediately.
///
/// A cycle failure (storage included) is logged and the schedule keeps
/// going; one bad cycle never kills the loop.
pub fn start_automated_collection(pipeline: Arc<Pipeline>, every: Duration) -> ScheduleHandle {
    let (cancel, mut cancelled) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(every_secs = every.as_secs(), "automated collection started");

        loop {
            tokio::select! {
                // A cycle longer than the period leaves the next tick
                // already due; cancellation must still win that race.
                biased;

                changed = cancelled.changed() => {
                    if changed.is_err() || *cancelled.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    match pipeline.run_data_collection().await {
                        Ok(run) => info!(
                            run_id = %run.run_id,
                            successes = run.success_count,
                            failures = run.failure_count,
                            "scheduled cycle closed"
                        ),
                        Err(err) => error!("scheduled cycle failed: {err}"),
                    }
                }
            }
        }
        info!("automated collection stopped");
    });

    ScheduleHandle { cancel, task }
}
