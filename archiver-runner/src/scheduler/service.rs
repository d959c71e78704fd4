//! Service loop
//!
//! Runs a fleet pass immediately and then once per interval. A pass always
//! runs to completion; shutdown is only observed between passes.

use chrono::Local;
use std::future::Future;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{info, warn};

use super::FleetRunner;

/// Fixed-interval archiving service
pub struct ArchiveService {
    runner: FleetRunner,
    interval: Duration,
}

impl ArchiveService {
    pub fn new(runner: FleetRunner, interval: Duration) -> Self {
        Self { runner, interval }
    }

    /// Runs until Ctrl-C
    pub async fn run(&self) -> usize {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await
    }

    /// Runs until `shutdown` completes, returning the number of passes
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting archive service (interval: {} minute(s))",
            self.interval.as_secs() / 60
        );

        tokio::pin!(shutdown);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut passes = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let report = self.runner.fetch_all().await;
            passes += 1;
            if !report.is_success() {
                warn!(
                    "Pass {} finished with {} failed container(s)",
                    passes,
                    report.failures().count()
                );
            }

            if let Ok(delta) = chrono::Duration::from_std(self.interval) {
                let next = Local::now() + delta;
                info!("Next run at {}", next.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        info!("Archive service stopped after {} pass(es)", passes);
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::MockBackend;
    use crate::backend::{BackendKind, BackendRegistry};
    use crate::service::ContainerDispatcher;
    use crate::service::testing::MockFetcher;
    use archiver_core::Config;
    use archiver_core::domain::container::Container;
    use std::sync::Arc;

    fn service(interval: Duration) -> (ArchiveService, Arc<MockFetcher>) {
        let mut config = Config {
            fetch_sleep: 0,
            ..Default::default()
        };
        config.containers.insert(
            "box".to_string(),
            Container {
                client: Some("qbit".to_string()),
                ..Default::default()
            },
        );

        let mut registry = BackendRegistry::new();
        registry.insert("qbit", Arc::new(MockBackend::new(BackendKind::QBittorrent)));
        let fetcher = Arc::new(MockFetcher::new());
        let dispatcher =
            ContainerDispatcher::new(Arc::new(config), Arc::new(registry), fetcher.clone());

        (ArchiveService::new(FleetRunner::new(dispatcher), interval), fetcher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_pass_runs_immediately() {
        let (service, fetcher) = service(Duration::from_secs(3600));

        let passes = service
            .run_until(time::sleep(Duration::from_secs(60)))
            .await;

        assert_eq!(passes, 1);
        assert_eq!(fetcher.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_per_interval() {
        let (service, fetcher) = service(Duration::from_secs(3600));

        // Ticks at 0h, 1h and 2h; shutdown wins the race at 2.5h
        let passes = service
            .run_until(time::sleep(Duration::from_secs(9000)))
            .await;

        assert_eq!(passes, 3);
        assert_eq!(fetcher.fetches(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_pass() {
        let (service, fetcher) = service(Duration::from_secs(3600));

        let passes = service.run_until(async {}).await;

        assert_eq!(passes, 0);
        assert_eq!(fetcher.fetches(), 0);
    }
}
