use super::holds::HoldManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Background task releasing expired holds on a fixed cadence.
///
/// Every operation re-checks expiry itself; the sweep only returns lapsed
/// seats to sale sooner.
pub struct ExpirySweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    pub fn spawn(holds: Arc<HoldManager>, every: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match holds.sweep_expired().await {
                        Ok(0) => {}
                        Ok(released) => info!(released, "expired holds released"),
                        Err(e) => warn!(error = %e, "expiry sweep failed"),
                    },
                    _ = stop.changed() => break,
                }
            }
            debug!("expiry sweeper stopped");
        });

        Self { shutdown, handle }
    }

    /// Stops the task and waits for an in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "expiry sweeper task failed");
        }
    }
}
