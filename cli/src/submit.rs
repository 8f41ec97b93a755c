/*!
# Submit Module

Job shape extraction from HTCondor submit files.

Only the resource requests and the `queue` count are read. Bare
`request_memory` values are MiB and bare `request_disk` values are KiB,
as HTCondor reads them; unit letters are binary (`2G` is 2 GiB).
*/

use anyhow::{bail, Context, Result};
use crystalball_core::units::{parse_storage, StorageUnit};
use std::path::Path;
use tracing::debug;

/// Resource requests found in a submit file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitRequest {
    pub cpus: Option<u32>,
    pub memory_gib: Option<f64>,
    pub disk_gib: Option<f64>,
    pub gpus: Option<u32>,
    pub jobs: Option<u32>,
}

pub fn read_submit(path: &Path) -> Result<SubmitRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read submit file {}", path.display()))?;
    parse_submit(&text).with_context(|| format!("in submit file {}", path.display()))
}

pub fn parse_submit(text: &str) -> Result<SubmitRequest> {
    let mut request = SubmitRequest::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let lower = line.to_ascii_lowercase();
        if lower == "queue" || lower.starts_with("queue ") {
            request.jobs = Some(queue_count(line[5..].trim())?);
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "request_cpus" => request.cpus = Some(count(value, "request_cpus")?),
            "request_gpus" => request.gpus = Some(count(value, "request_gpus")?),
            "request_memory" => request.memory_gib = Some(size_to_gib(value, StorageUnit::Mebi)?),
            "request_disk" => request.disk_gib = Some(size_to_gib(value, StorageUnit::Kibi)?),
            other => debug!("Ignoring submit command {}", other),
        }
    }

    Ok(request)
}

fn count(value: &str, key: &str) -> Result<u32> {
    value
        .parse()
        .with_context(|| format!("{} must be a whole number, got {}", key, value))
}

/// `queue` alone submits one job; `queue N ...` submits N
fn queue_count(args: &str) -> Result<u32> {
    match args.split_whitespace().next() {
        None => Ok(1),
        Some(first) => match first.parse::<u32>() {
            Ok(n) => Ok(n),
            Err(_) => bail!("cannot count the jobs of `queue {}`", args),
        },
    }
}

/// Convert a submit-file size to GiB, reading bare numbers in `bare_unit`
fn size_to_gib(value: &str, bare_unit: StorageUnit) -> Result<f64> {
    if let Ok(magnitude) = value.parse::<f64>() {
        return Ok(bare_unit.to_gib(magnitude));
    }

    let quantity =
        parse_storage(value).with_context(|| format!("cannot evaluate size {}", value))?;
    let unit = match quantity.unit {
        StorageUnit::Kilo => StorageUnit::Kibi,
        StorageUnit::Mega => StorageUnit::Mebi,
        StorageUnit::Giga => StorageUnit::Gibi,
        StorageUnit::Tera => StorageUnit::Tebi,
        StorageUnit::Peta => StorageUnit::Pebi,
        binary => binary,
    };
    Ok(unit.to_gib(quantity.magnitude))
}
