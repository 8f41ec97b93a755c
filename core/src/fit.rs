/*!
# Fit Module

Decides whether a job request fits a slot configuration and how many
identically-sized jobs one physical instance of it can run at once.

Each configuration is treated as an independent multi-dimensional bin:

- A request fits when every requested dimension is within the slot's
  capacity. GPUs only take part for GPU slots.
- The concurrency of a fitting request is the smallest floor ratio of
  capacity to request over the dimensions actually requested.
- A static slot is a fixed set of `declared_slots` whole allocations. The
  ratios are taken against one slot and scaled by `declared_slots`, and the
  concurrency never exceeds `declared_slots`.

Usage figures are reported for display: the whole instance load when the
request fits, the single-job share when it does not.
*/

use crate::request::JobRequest;
use crate::slot::{SlotConfiguration, SlotType};
use serde::Serialize;
use tracing::debug;

/// Share of one capacity dimension taken by the request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Usage {
    pub used: f64,
    pub total: f64,
}

impl Usage {
    pub fn new(used: f64, total: f64) -> Self {
        Self { used, total }
    }

    /// Usage as a whole percentage, `None` when there is no capacity
    pub fn percent(&self) -> Option<u32> {
        if self.total > 0.0 {
            Some((self.used / self.total * 100.0).round() as u32)
        } else {
            None
        }
    }
}

/// GPU share of a configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GpuUsage {
    /// The configuration is not a GPU slot
    NotApplicable,
    /// A GPU slot that reports no GPUs
    NoGpuResource,
    Used(Usage),
}

/// Per-dimension usage of a configuration for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub cores: Usage,
    pub memory: Usage,
    pub disk: Usage,
    pub gpus: GpuUsage,
}

/// Outcome of evaluating one configuration against one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub node: String,
    pub slot_type: SlotType,
    pub fits: bool,

    /// Jobs that run at once in a single physical instance
    pub concurrent_per_instance: u64,

    /// Physical instances sharing this configuration
    pub repetition: u32,

    /// Jobs that run at once across every instance
    pub concurrent_pool_wide: u64,

    pub usage: ResourceUsage,

    /// Minutes to finish the batch on this configuration alone, 0 when not estimated
    pub wall_time_on_idle: f64,
}

/// Capacity of one physical instance of a configuration
#[derive(Debug, Clone, Copy, PartialEq)]
struct Capacity {
    cores: f64,
    memory: f64,
    disk: f64,
    gpus: f64,
}

impl Capacity {
    fn of_slot(config: &SlotConfiguration) -> Self {
        Self {
            cores: config.cores as f64,
            memory: config.memory_gib,
            disk: config.disk_gib,
            gpus: config.gpus as f64,
        }
    }

    /// A static allocation spans all of its declared slots
    fn of_instance(config: &SlotConfiguration) -> Self {
        let slot = Self::of_slot(config);
        match (config.slot_type, config.declared_slots) {
            (SlotType::Static, Some(slots)) => {
                let slots = slots as f64;
                Self {
                    cores: slot.cores * slots,
                    memory: slot.memory * slots,
                    disk: slot.disk * slots,
                    gpus: slot.gpus * slots,
                }
            }
            _ => slot,
        }
    }
}

/// Floor of `total / requested`, `None` when the dimension is not requested
pub fn ratio(total: f64, requested: f64) -> Option<u64> {
    if requested > 0.0 {
        Some((total / requested).floor().max(0.0) as u64)
    } else {
        None
    }
}

/// Whether a single job of the request fits one slot of the configuration
pub fn fits(config: &SlotConfiguration, request: &JobRequest) -> bool {
    request.cores <= config.cores
        && request.memory_gib <= config.memory_gib
        && request.disk_gib <= config.disk_gib
        && (config.slot_type != SlotType::Gpu || request.gpus <= config.gpus)
}

/// Jobs of the request that run at once in one instance, assuming it fits
fn concurrency(config: &SlotConfiguration, request: &JobRequest) -> u64 {
    // Ratios against a single slot; scaled capacities lose whole jobs to rounding
    let capacity = Capacity::of_slot(config);
    let gpu_ratio = match config.slot_type {
        SlotType::Gpu => ratio(capacity.gpus, request.gpus as f64),
        _ => None,
    };

    let per_slot = [
        ratio(capacity.cores, request.cores as f64),
        ratio(capacity.memory, request.memory_gib),
        ratio(capacity.disk, request.disk_gib),
        gpu_ratio,
    ]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(0);

    match (config.slot_type, config.declared_slots) {
        (SlotType::Static, Some(slots)) => {
            let slots = u64::from(slots);
            per_slot.saturating_mul(slots).min(slots)
        }
        _ => per_slot,
    }
}

fn usage(config: &SlotConfiguration, request: &JobRequest, jobs: u64) -> ResourceUsage {
    // A request that does not fit is compared against a single slot
    let capacity = if jobs > 0 {
        Capacity::of_instance(config)
    } else {
        Capacity::of_slot(config)
    };
    let jobs = jobs.max(1) as f64;

    let gpus = match config.slot_type {
        SlotType::Gpu if config.gpus == 0 => GpuUsage::NoGpuResource,
        SlotType::Gpu => GpuUsage::Used(Usage::new(request.gpus as f64 * jobs, capacity.gpus)),
        _ => GpuUsage::NotApplicable,
    };

    ResourceUsage {
        cores: Usage::new(request.cores as f64 * jobs, capacity.cores),
        memory: Usage::new(request.memory_gib * jobs, capacity.memory),
        disk: Usage::new(request.disk_gib * jobs, capacity.disk),
        gpus,
    }
}

/// Evaluate a request against one configuration of a node.
///
/// The pool-wide figure covers a single instance here; multiplying it by
/// the repetition count is left to [`crate::estimate::expand`].
pub fn evaluate(node: &str, config: &SlotConfiguration, request: &JobRequest) -> FitResult {
    let fits = fits(config, request);
    let concurrent_per_instance = if fits { concurrency(config, request) } else { 0 };

    debug!(
        "{} slot on {}: fits={} concurrent_per_instance={}",
        config.slot_type, node, fits, concurrent_per_instance
    );

    FitResult {
        node: node.to_string(),
        slot_type: config.slot_type,
        fits,
        concurrent_per_instance,
        repetition: config.repetition,
        concurrent_pool_wide: concurrent_per_instance,
        usage: usage(config, request, concurrent_per_instance),
        wall_time_on_idle: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::round_size;
    use crate::slot::{SlotRecord, ATTR_CPUS, ATTR_DISK, ATTR_MEMORY, ATTR_SLOTS, ATTR_SLOT_TYPE};

    fn static_slot() -> SlotConfiguration {
        SlotConfiguration::new(SlotType::Static, 1, 5.0, 274.21).with_declared_slots(12)
    }

    fn partitionable_slot() -> SlotConfiguration {
        SlotConfiguration::new(SlotType::Partitionable, 1, 5.0, 274.36)
    }

    fn gpu_slot() -> SlotConfiguration {
        SlotConfiguration::new(SlotType::Partitionable, 1, 5.0, 274.36).with_gpus(4)
    }

    #[test]
    fn ratio_ignores_unrequested_dimensions() {
        assert_eq!(ratio(10.0, 3.0), Some(3));
        assert_eq!(ratio(10.0, 0.0), None);
        assert_eq!(ratio(2.0, 2.5), Some(0));
    }

    #[test]
    fn static_slot_is_capped_by_declared_slots() {
        let result = evaluate("cpu2", &static_slot(), &JobRequest::new(1, 5.0));
        assert!(result.fits);
        assert_eq!(result.concurrent_per_instance, 12);
        assert_eq!(result.wall_time_on_idle, 0.0);
    }

    #[test]
    fn static_slot_filled_exactly_runs_every_declared_slot() {
        let record = SlotRecord::new()
            .with(ATTR_SLOT_TYPE, "Static")
            .with(ATTR_CPUS, "1")
            .with(ATTR_MEMORY, "3891")
            .with(ATTR_DISK, "1048576")
            .with(ATTR_SLOTS, "12");
        let config = SlotConfiguration::try_from(&record).unwrap();
        assert_eq!(config.memory_gib, 3.8);

        let request = JobRequest::new(1, 3.8);
        let result = evaluate("cpu2", &config, &request);
        assert!(result.fits);
        assert_eq!(result.concurrent_per_instance, 12);
        assert_eq!(
            round_size(&config, result.concurrent_per_instance),
            result.concurrent_per_instance
        );
    }

    #[test]
    fn static_slot_with_room_for_several_jobs_is_still_capped() {
        let config = SlotConfiguration::new(SlotType::Static, 4, 16.0, 100.0).with_declared_slots(3);
        let result = evaluate("cpu2", &config, &JobRequest::new(1, 1.0));
        assert_eq!(result.concurrent_per_instance, 3);
    }

    #[test]
    fn static_slot_without_declared_count_uses_ratio() {
        let config = SlotConfiguration::new(SlotType::Static, 8, 32.0, 100.0);
        let result = evaluate("cpu2", &config, &JobRequest::new(2, 4.0));
        assert_eq!(result.concurrent_per_instance, 4);
    }

    #[test]
    fn partitionable_slot_takes_smallest_ratio() {
        let result = evaluate("cpu3", &partitionable_slot(), &JobRequest::new(1, 2.5));
        assert!(result.fits);
        assert_eq!(result.concurrent_per_instance, 1);
    }

    #[test]
    fn gpu_slot_requires_enough_gpus() {
        let too_many = evaluate("gpu1", &gpu_slot(), &JobRequest::new(1, 5.0).with_gpus(5));
        assert!(!too_many.fits);
        assert_eq!(too_many.concurrent_per_instance, 0);

        let none = evaluate("gpu1", &gpu_slot(), &JobRequest::new(1, 5.0));
        assert!(none.fits);
        assert_eq!(none.concurrent_per_instance, 1);
    }

    #[test]
    fn gpu_dimension_constrains_gpu_slots() {
        let config = SlotConfiguration::new(SlotType::Partitionable, 32, 256.0, 1000.0).with_gpus(4);
        let result = evaluate("gpu1", &config, &JobRequest::new(2, 8.0).with_gpus(2));
        assert_eq!(result.concurrent_per_instance, 2);
        assert_eq!(result.usage.gpus, GpuUsage::Used(Usage::new(4.0, 4.0)));
    }

    #[test]
    fn gpu_slot_without_gpus_is_flagged() {
        let config = SlotConfiguration::new(SlotType::Gpu, 4, 16.0, 100.0);
        let result = evaluate("gpu9", &config, &JobRequest::new(1, 1.0));
        assert_eq!(result.usage.gpus, GpuUsage::NoGpuResource);

        let result = evaluate("gpu9", &config, &JobRequest::new(1, 1.0).with_gpus(1));
        assert!(!result.fits);
        assert_eq!(result.usage.gpus, GpuUsage::NoGpuResource);
    }

    #[test]
    fn non_gpu_slots_report_no_gpu_usage() {
        let result = evaluate("cpu3", &partitionable_slot(), &JobRequest::new(1, 1.0));
        assert_eq!(result.usage.gpus, GpuUsage::NotApplicable);
    }

    #[test]
    fn oversized_request_does_not_fit() {
        let result = evaluate("cpu3", &partitionable_slot(), &JobRequest::new(8, 10.0));
        assert!(!result.fits);
        assert_eq!(result.concurrent_per_instance, 0);
        assert_eq!(result.concurrent_pool_wide, 0);
    }

    #[test]
    fn disk_request_is_checked() {
        let request = JobRequest::new(1, 1.0).with_disk_gib(500.0);
        assert!(!evaluate("cpu3", &partitionable_slot(), &request).fits);
    }

    #[test]
    fn usage_reports_single_job_share_when_not_fitting() {
        let result = evaluate("cpu3", &partitionable_slot(), &JobRequest::new(2, 10.0));
        assert_eq!(result.usage.cores, Usage::new(2.0, 1.0));
        assert_eq!(result.usage.cores.percent(), Some(200));
        assert_eq!(result.usage.memory.percent(), Some(200));
    }

    #[test]
    fn usage_reports_aggregate_share_when_fitting() {
        let config = SlotConfiguration::new(SlotType::Partitionable, 8, 32.0, 100.0);
        let result = evaluate("cpu3", &config, &JobRequest::new(2, 4.0));
        assert_eq!(result.concurrent_per_instance, 4);
        assert_eq!(result.usage.cores, Usage::new(8.0, 8.0));
        assert_eq!(result.usage.memory.percent(), Some(50));
        assert_eq!(result.usage.disk.percent(), Some(0));
    }

    #[test]
    fn usage_percent_without_capacity_is_none() {
        assert_eq!(Usage::new(1.0, 0.0).percent(), None);
    }

    #[test]
    fn smaller_requests_keep_fitting() {
        let configs = [static_slot(), partitionable_slot(), gpu_slot()];
        let request = JobRequest::new(1, 5.0).with_disk_gib(200.0);
        let smaller = JobRequest::new(1, 2.0).with_disk_gib(10.0);

        for config in &configs {
            assert!(fits(config, &request));
            assert!(fits(config, &smaller));
        }
    }

    #[test]
    fn concurrency_is_bounded_by_every_requested_dimension() {
        let config = SlotConfiguration::new(SlotType::Partitionable, 16, 64.0, 500.0);
        let request = JobRequest::new(3, 10.0).with_disk_gib(120.0);
        let result = evaluate("cpu3", &config, &request);

        let cores = ratio(16.0, 3.0).unwrap();
        let memory = ratio(64.0, 10.0).unwrap();
        let disk = ratio(500.0, 120.0).unwrap();
        assert_eq!(result.concurrent_per_instance, cores.min(memory).min(disk));
        assert!(result.concurrent_per_instance <= cores);
        assert!(result.concurrent_per_instance <= memory);
        assert!(result.concurrent_per_instance <= disk);
    }
}
