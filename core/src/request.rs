/*!
# Request Module

The job shape a preview is computed for.

A `JobRequest` carries the per-job resource request in canonical units
(cores, GiB of memory and disk, GPUs), the number of identical jobs in the
batch, the expected duration of one job in minutes, and an optional cap on
how many distinct node configurations may be used.
*/

use crate::error::{CrystalBallError, Result};
use crate::units::{duration_to_minutes, storage_to_gib};
use serde::{Deserialize, Serialize};

/// A request for a batch of identically-sized jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// CPU cores per job
    pub cores: u32,

    /// Memory per job in GiB
    pub memory_gib: f64,

    /// Disk per job in GiB
    pub disk_gib: f64,

    /// GPUs per job
    pub gpus: u32,

    /// Number of jobs in the batch
    pub jobs: u32,

    /// Duration of one job in minutes, 0 when no estimate is wanted
    pub duration_minutes: f64,

    /// Maximum number of node configurations to use, 0 for no limit
    pub max_nodes: usize,
}

impl JobRequest {
    /// Create a request for a single job with no duration estimate
    pub fn new(cores: u32, memory_gib: f64) -> Self {
        Self {
            cores,
            memory_gib,
            disk_gib: 0.0,
            gpus: 0,
            jobs: 1,
            duration_minutes: 0.0,
            max_nodes: 0,
        }
    }

    /// Create a request from unit-suffixed memory and disk strings
    pub fn parse(cores: u32, memory: &str, disk: Option<&str>) -> Result<Self> {
        let mut request = Self::new(cores, storage_to_gib(memory)?);
        if let Some(disk) = disk {
            request.disk_gib = storage_to_gib(disk)?;
        }
        Ok(request)
    }

    pub fn with_disk_gib(mut self, disk_gib: f64) -> Self {
        self.disk_gib = disk_gib;
        self
    }

    pub fn with_gpus(mut self, gpus: u32) -> Self {
        self.gpus = gpus;
        self
    }

    pub fn with_jobs(mut self, jobs: u32) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_duration_minutes(mut self, minutes: f64) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Set the per-job duration from a string such as `15m` or `2h`
    pub fn with_duration(mut self, duration: &str) -> Result<Self> {
        self.duration_minutes = duration_to_minutes(duration)?;
        Ok(self)
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Whether a completion-time estimate was asked for
    pub fn wants_estimate(&self) -> bool {
        self.duration_minutes > 0.0
    }

    /// Reject requests that cannot be evaluated
    pub fn validate(&self) -> Result<()> {
        if self.cores == 0 {
            return Err(CrystalBallError::IncompleteRequest(
                "no number of CPU cores given".into(),
            ));
        }

        for (name, value) in [
            ("memory", self.memory_gib),
            ("disk", self.disk_gib),
            ("duration", self.duration_minutes),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CrystalBallError::IncompleteRequest(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.memory_gib == 0.0 && self.disk_gib == 0.0 {
            return Err(CrystalBallError::IncompleteRequest(
                "neither a memory nor a disk amount given".into(),
            ));
        }

        if self.memory_gib == 0.0 {
            return Err(CrystalBallError::IncompleteRequest(
                "no amount of memory given".into(),
            ));
        }

        if self.jobs == 0 {
            return Err(CrystalBallError::IncompleteRequest(
                "the number of jobs must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_defaults() {
        let request = JobRequest::new(2, 4.0);
        assert_eq!(request.jobs, 1);
        assert_eq!(request.gpus, 0);
        assert_eq!(request.max_nodes, 0);
        assert!(!request.wants_estimate());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn parse_normalizes_units() {
        let request = JobRequest::parse(1, "2048MiB", Some("10GiB"))
            .unwrap()
            .with_duration("2h")
            .unwrap();
        assert_eq!(request.memory_gib, 2.0);
        assert_eq!(request.disk_gib, 10.0);
        assert_eq!(request.duration_minutes, 120.0);
        assert!(request.wants_estimate());
    }

    #[test]
    fn parse_rejects_malformed_units() {
        assert!(matches!(
            JobRequest::parse(1, "10XB", None),
            Err(CrystalBallError::InvalidStorage(_))
        ));
        assert!(matches!(
            JobRequest::new(1, 1.0).with_duration("10min"),
            Err(CrystalBallError::InvalidDuration(_))
        ));
    }

    #[test]
    fn zero_cores_is_incomplete() {
        assert!(matches!(
            JobRequest::new(0, 10.0).validate(),
            Err(CrystalBallError::IncompleteRequest(_))
        ));
    }

    #[test]
    fn memory_is_required_even_with_disk() {
        assert!(matches!(
            JobRequest::new(1, 0.0).validate(),
            Err(CrystalBallError::IncompleteRequest(_))
        ));
        assert!(matches!(
            JobRequest::new(1, 0.0).with_disk_gib(5.0).validate(),
            Err(CrystalBallError::IncompleteRequest(_))
        ));
        assert!(JobRequest::new(1, 0.5).validate().is_ok());
    }

    #[test]
    fn zero_jobs_is_incomplete() {
        assert!(JobRequest::new(1, 1.0).with_jobs(0).validate().is_err());
    }

    #[test]
    fn negative_or_nan_magnitudes_are_rejected() {
        assert!(JobRequest::new(1, -1.0).validate().is_err());
        assert!(JobRequest::new(1, f64::NAN).validate().is_err());
        assert!(JobRequest::new(1, 1.0)
            .with_duration_minutes(-5.0)
            .validate()
            .is_err());
    }

    #[test]
    fn gpu_request_without_gpu_slots_is_still_valid() {
        assert!(JobRequest::new(1, 1.0).with_gpus(5).validate().is_ok());
    }
}
