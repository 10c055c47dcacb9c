use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::time::{interval, MissedTickBehavior};

use crate::blockchain::engine::{IndexingEngine, TickOutcome};
use crate::blockchain::rpc_client::NodeClient;
use crate::error::WatcherError;
use crate::logging::MetricsLogger;

#[derive(Debug, Clone)]
pub struct BlockMonitorConfig {
    pub poll_interval: Duration,
}

impl Default for BlockMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Drives [`IndexingEngine::tick`] on a fixed interval until shut down.
pub struct BlockMonitor<C: NodeClient> {
    engine: Arc<IndexingEngine<C>>,
    pub config: BlockMonitorConfig,
    pub shutdown_signal: Arc<AtomicBool>,
}

impl<C: NodeClient> BlockMonitor<C> {
    pub fn new(engine: Arc<IndexingEngine<C>>, config: Option<BlockMonitorConfig>) -> Self {
        Self {
            engine,
            config: config.unwrap_or_default(),
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the poll loop.
    ///
    /// Each tick is awaited to completion before the next one starts, and a
    /// tick that overruns the interval delays the schedule instead of firing a
    /// burst of catch-up ticks. Tick errors are logged and swallowed.
    pub async fn run(&self) {
        info!(
            "Starting block monitor at block {} with {}ms polling interval",
            self.engine.cursor(),
            self.config.poll_interval.as_millis()
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if self.is_shutdown() {
                info!("Shutdown signal received, stopping block monitor at block {}", self.engine.cursor());
                return;
            }

            match self.engine.tick().await {
                Ok(TickOutcome::Idle { cursor }) => {
                    debug!("No new block past {}", cursor);
                }
                Ok(TickOutcome::Advanced { .. }) => {}
                Err(e) => {
                    MetricsLogger::log_tick_failure(self.engine.cursor(), &WatcherError::from(e));
                }
            }
        }
    }

    /// Request graceful shutdown; takes effect at the next tick boundary
    pub fn shutdown(&self) {
        info!("Requesting block monitor shutdown");
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_signal.load(Ordering::Relaxed)
    }
}
