//! One-second countdown task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// Tick period of the assessment countdown.
pub const TICK: Duration = Duration::from_secs(1);

/// Handle to a spawned task that emits a tick every `period`.
///
/// The first tick arrives one full period after [`start`](Self::start).
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct Countdown {
    task: JoinHandle<()>,
    ticks: mpsc::Receiver<()>,
}

impl Countdown {
    /// Spawn the ticking task. Requires a tokio runtime.
    pub fn start(period: Duration) -> Self {
        let (tx, ticks) = mpsc::channel(8);
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break; // receiver dropped
                }
            }
        });
        Self { task, ticks }
    }

    /// Wait for the next tick. `None` once cancelled.
    pub async fn tick(&mut self) -> Option<()> {
        self.ticks.recv().await
    }

    /// Stop ticking. Idempotent.
    pub fn cancel(&mut self) {
        self.task.abort();
        self.ticks.close();
        while self.ticks.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_finished() || self.ticks.is_closed()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}
