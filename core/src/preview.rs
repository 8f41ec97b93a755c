/*!
# Preview Module

Runs a job request against a whole catalog and aggregates the outcome.

A preview evaluates every candidate configuration, scales each fit to its
repetition count, ranks configurations by how many jobs they take at once,
optionally keeps only the best `max_nodes`, and totals the pool-wide
capacity. When a duration is known it also estimates how long the batch
takes if every fitting configuration works on it in parallel.

A preview in which nothing fits is a valid result, reported as
[`Outlook::NoFit`] rather than as an error or a zero estimate.
*/

use crate::catalog::Catalog;
use crate::error::Result;
use crate::estimate::{expand, rounds_needed};
use crate::fit::{evaluate, FitResult};
use crate::request::JobRequest;
use crate::slot::{SlotConfiguration, SlotType};
use crate::units::TimeSpan;
use serde::Serialize;
use tracing::{debug, info};

/// Completion estimate for the whole batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEstimate {
    /// Rounds needed with every fitting configuration in use
    pub rounds: u64,

    /// Wall time in minutes
    pub wall_time_minutes: f64,

    /// Wall time promoted to hours or days for display
    pub wall_time: TimeSpan,

    /// Core-hours consumed by the batch
    pub core_hours: u64,
}

impl BatchEstimate {
    fn new(total_concurrent_jobs: u64, request: &JobRequest) -> Self {
        let rounds = rounds_needed(request.jobs, total_concurrent_jobs).max(1);
        let wall_time_minutes = rounds as f64 * request.duration_minutes;
        let core_hours =
            (f64::from(request.jobs) * request.duration_minutes * f64::from(request.cores) / 60.0)
                .floor() as u64;

        Self {
            rounds,
            wall_time_minutes,
            wall_time: TimeSpan::from_minutes(wall_time_minutes),
            core_hours,
        }
    }
}

/// Whether the request fits anywhere in the pool
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outlook {
    /// No configuration can run a single job of this size
    NoFit,
    /// At least one job fits; the estimate is present when a duration was given
    Fits { estimate: Option<BatchEstimate> },
}

/// Ranked and aggregated outcome of a preview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResult {
    pub request: JobRequest,

    /// Evaluated configurations, most concurrent jobs first
    pub entries: Vec<FitResult>,

    /// Jobs that run at once across all listed configurations
    pub total_concurrent_jobs: u64,

    pub outlook: Outlook,
}

impl PreviewResult {
    pub fn fits_anywhere(&self) -> bool {
        matches!(self.outlook, Outlook::Fits { .. })
    }

    pub fn estimate(&self) -> Option<&BatchEstimate> {
        match &self.outlook {
            Outlook::Fits { estimate } => estimate.as_ref(),
            Outlook::NoFit => None,
        }
    }

    /// Nodes of the configurations that take at least one job
    pub fn suggested_nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.fits) {
            if !nodes.contains(&entry.node.as_str()) {
                nodes.push(entry.node.as_str());
            }
        }
        nodes
    }
}

/// Order fits by pool-wide concurrency, cap their number and total them.
///
/// The sort is stable, so equally capable configurations keep the order
/// they were evaluated in.
pub fn rank(mut results: Vec<FitResult>, request: &JobRequest) -> PreviewResult {
    results.sort_by(|a, b| b.concurrent_pool_wide.cmp(&a.concurrent_pool_wide));

    if request.max_nodes != 0 && results.len() > request.max_nodes {
        info!(
            "Keeping the {} best of {} node configurations",
            request.max_nodes,
            results.len()
        );
        results.truncate(request.max_nodes);
    }

    let total_concurrent_jobs: u64 = results.iter().map(|r| r.concurrent_pool_wide).sum();

    let outlook = if total_concurrent_jobs == 0 {
        Outlook::NoFit
    } else {
        let estimate = request
            .wants_estimate()
            .then(|| BatchEstimate::new(total_concurrent_jobs, request));
        Outlook::Fits { estimate }
    };

    PreviewResult {
        request: request.clone(),
        entries: results,
        total_concurrent_jobs,
        outlook,
    }
}

/// Whether a configuration is considered for the request at all.
///
/// GPU jobs only go to GPU slots; other jobs may use any slot.
pub fn is_candidate(config: &SlotConfiguration, request: &JobRequest) -> bool {
    request.gpus == 0 || config.slot_type == SlotType::Gpu
}

/// Preview a request against every candidate configuration of a catalog
pub fn preview(catalog: &Catalog, request: &JobRequest) -> Result<PreviewResult> {
    request.validate()?;

    let results: Vec<FitResult> = catalog
        .iter()
        .filter(|(_, config)| is_candidate(config, request))
        .map(|(node, config)| expand(evaluate(node, config, request), config, request))
        .collect();

    debug!(
        "Evaluated {} of {} configurations",
        results.len(),
        catalog.configuration_count()
    );

    let result = rank(results, request);
    info!(
        "{} jobs of {} cores / {:.2} GiB can run at once",
        result.total_concurrent_jobs, request.cores, request.memory_gib
    );
    Ok(result)
}
