//! Periodic re-issue of a query.
//!
//! Runs as a `tokio::spawn` task that calls `execute` on every tick until
//! stopped through a `watch` channel.

use crate::client::executor::RequestExecutor;
use crate::models::RequestDescriptor;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A running refresh trigger. Stops on [`RefreshHandle::stop`] or drop;
/// stopping also resets the executor so a request still in flight cannot
/// land afterwards.
pub struct RefreshHandle {
    cancel_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    reset: Box<dyn Fn() + Send + Sync>,
}

impl RefreshHandle {
    /// Issue `descriptor` immediately and then once per `period`.
    pub fn start<T>(executor: RequestExecutor<T>, descriptor: RequestDescriptor, period: Duration) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let owner = executor.clone();
        let reset: Box<dyn Fn() + Send + Sync> = Box::new(move || owner.reset());
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        debug!("Refresh tick for {}", descriptor.endpoint());
                        if let Err(e) = executor.execute(descriptor.clone()) {
                            warn!("Refresh stopped, request rejected: {}", e);
                            break;
                        }
                    }
                    _ = cancel_rx.changed() => {
                        debug!("Refresh loop cancelled");
                        break;
                    }
                }
            }
        });

        info!("Refreshing every {}s", period.as_secs());
        Self {
            cancel_tx,
            handle: Some(handle),
            reset,
        }
    }

    /// Stop issuing requests and wait for the trigger task to end.
    pub async fn stop(mut self) {
        let _ = self.cancel_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        (self.reset)();
        info!("Refresh stopped");
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
        (self.reset)();
    }
}
