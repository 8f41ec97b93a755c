/*!
# Estimate Module

Multiplicity and wall-time estimation.

Turns the per-instance concurrency of a fit into pool-wide capacity and
estimates how long a batch takes on an otherwise idle pool: jobs run in
rounds, every instance of the configuration taking one round's worth at
a time.
*/

use crate::fit::FitResult;
use crate::request::JobRequest;
use crate::slot::{SlotConfiguration, SlotType};

/// Jobs one instance takes per round.
///
/// Static slots are provisioned as whole units, so a static configuration
/// always dispatches its declared slot count per round.
pub fn round_size(config: &SlotConfiguration, concurrent_per_instance: u64) -> u64 {
    match (config.slot_type, config.declared_slots) {
        (SlotType::Static, Some(slots)) if u64::from(slots) != concurrent_per_instance => {
            u64::from(slots)
        }
        _ => concurrent_per_instance,
    }
}

/// Rounds needed to run `jobs` jobs when `parallel` run at once
pub fn rounds_needed(jobs: u32, parallel: u64) -> u64 {
    if parallel == 0 {
        return 0;
    }
    u64::from(jobs).div_ceil(parallel)
}

/// Minutes to finish the requested batch on one configuration.
///
/// Returns 0 when no duration was requested or nothing runs per round.
pub fn estimate_wall_time(round_size: u64, repetition: u32, request: &JobRequest) -> f64 {
    if !request.wants_estimate() || round_size == 0 {
        return 0.0;
    }

    let parallel = round_size * u64::from(repetition);
    rounds_needed(request.jobs, parallel) as f64 * request.duration_minutes
}

/// Scale a fit to every instance of its configuration and attach the
/// wall-time estimate
pub fn expand(mut fit: FitResult, config: &SlotConfiguration, request: &JobRequest) -> FitResult {
    fit.repetition = config.repetition;
    fit.concurrent_pool_wide = fit.concurrent_per_instance * u64::from(config.repetition);

    fit.wall_time_on_idle = if fit.concurrent_per_instance == 0 {
        0.0
    } else {
        let size = round_size(config, fit.concurrent_per_instance);
        estimate_wall_time(size, config.repetition, request)
    };

    fit
}
