//! Fleet runner
//!
//! One pass over every configured container, in name order. A failing
//! container is recorded and the pass moves on; the archive service asks for a
//! pause between consecutive requests, so containers are never fetched
//! concurrently.

use tokio::time;
use tracing::{error, info};

use crate::error::{ArchiveError, ContainerFailure, FleetError};
use crate::service::{ContainerDispatcher, DispatchOutcome};

/// Outcome of one container within a pass
#[derive(Debug)]
pub struct ContainerReport {
    pub container: String,
    pub result: Result<DispatchOutcome, ArchiveError>,
}

/// Outcomes of a full pass, in processing order
#[derive(Debug, Default)]
pub struct FleetReport {
    pub reports: Vec<ContainerReport>,
}

impl FleetReport {
    /// Number of containers that received a torrent
    pub fn added(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.result, Ok(DispatchOutcome::Added { .. })))
            .count()
    }

    /// Number of containers stopped by a gate
    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.result, Ok(DispatchOutcome::Skipped(_))))
            .count()
    }

    /// Failed containers with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ArchiveError)> {
        self.reports.iter().filter_map(|r| match &r.result {
            Err(e) => Some((r.container.as_str(), e)),
            Ok(_) => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Converts the report into an error listing every failed container
    pub fn into_result(self) -> Result<Vec<(String, DispatchOutcome)>, FleetError> {
        let mut outcomes = Vec::new();
        let mut failures = Vec::new();

        for report in self.reports {
            match report.result {
                Ok(outcome) => outcomes.push((report.container, outcome)),
                Err(error) => failures.push(ContainerFailure {
                    container: report.container,
                    error,
                }),
            }
        }

        if failures.is_empty() {
            Ok(outcomes)
        } else {
            Err(FleetError { failures })
        }
    }
}

/// Runs the dispatcher over the whole fleet
pub struct FleetRunner {
    dispatcher: ContainerDispatcher,
}

impl FleetRunner {
    pub fn new(dispatcher: ContainerDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Configured container names, in processing order
    pub fn containers(&self) -> Vec<String> {
        self.dispatcher.config().containers.keys().cloned().collect()
    }

    /// Fetches for a single container
    pub async fn fetch_one(&self, name: &str) -> Result<DispatchOutcome, ArchiveError> {
        self.dispatcher.dispatch(name).await
    }

    /// Fetches for every container, sleeping `fetchSleep` between them
    pub async fn fetch_all(&self) -> FleetReport {
        let names = self.containers();
        let pause = self.dispatcher.config().fetch_sleep_duration();
        let mut report = FleetReport::default();

        info!("Processing {} container(s)", names.len());

        for (i, name) in names.into_iter().enumerate() {
            if i > 0 && !pause.is_zero() {
                time::sleep(pause).await;
            }

            let result = self.dispatcher.dispatch(&name).await;
            match &result {
                Ok(outcome) => info!("Container {}: {}", name, outcome),
                Err(e) => error!("Container {} failed: {}", name, e),
            }

            report.reports.push(ContainerReport {
                container: name,
                result,
            });
        }

        info!(
            "Pass complete: {} added, {} skipped, {} failed",
            report.added(),
            report.skipped(),
            report.failures().count()
        );

        report
    }
}
