/*!
# Source Module

Where raw slot records come from.

The preview engine only ever sees a finished list of [`SlotRecord`]s. This
module defines the `SlotSource` trait that produces such a list, plus the
implementations crystalball ships with:
- `CondorStatusSource` queries the live pool through `condor_status`
- `StatusDumpSource` reads a saved `condor_status -long` listing
- `StaticSource` hands out a fixed list

Dynamic slots are filtered out by every source.
*/

use crate::error::{CrystalBallError, Result};
use crate::slot::{SlotRecord, PROJECTION};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

/// Trait for anything that can list the pool's slot records
#[async_trait]
pub trait SlotSource: Send + Sync {
    /// Fetch a snapshot of the pool's (non-dynamic) slot records
    async fn fetch(&self) -> Result<Vec<SlotRecord>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Parse `condor_status -long` output.
///
/// Each slot is a block of `Key = Value` lines; blocks are separated by
/// blank lines. Attributes outside the projection are dropped.
pub fn parse_status_dump(text: &str) -> Vec<SlotRecord> {
    let mut records = Vec::new();
    let mut current = SlotRecord::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().trim_matches('\'');
        if PROJECTION.contains(&key) {
            current.insert(key, value.trim().trim_matches('\''));
        }
    }

    if !current.is_empty() {
        records.push(current);
    }

    records.retain(|record| !record.is_dynamic());
    records
}

/// Slot records read from a saved `condor_status -long` listing
#[derive(Debug, Clone)]
pub struct StatusDumpSource {
    path: PathBuf,
}

impl StatusDumpSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SlotSource for StatusDumpSource {
    async fn fetch(&self) -> Result<Vec<SlotRecord>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let records = parse_status_dump(&text);
        info!(
            "Read {} slot records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("status dump {}", self.path.display())
    }
}

/// Slot records from a live `condor_status` query
#[derive(Debug, Clone)]
pub struct CondorStatusSource {
    program: String,
}

impl CondorStatusSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-long")
            .arg("-constraint")
            .arg("SlotType != \"Dynamic\"")
            .arg("-attributes")
            .arg(PROJECTION.join(","));
        command
    }
}

impl Default for CondorStatusSource {
    fn default() -> Self {
        Self::new("condor_status")
    }
}

#[async_trait]
impl SlotSource for CondorStatusSource {
    async fn fetch(&self) -> Result<Vec<SlotRecord>> {
        debug!("Running {}", self.program);
        let output = self.command().output().await.map_err(|e| {
            CrystalBallError::Collector(format!("failed to run {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CrystalBallError::Collector(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = parse_status_dump(&stdout);
        info!("Collected {} slot records from the pool", records.len());
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("live query via {}", self.program)
    }
}

/// A fixed list of slot records
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<SlotRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<SlotRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl SlotSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<SlotRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| !record.is_dynamic())
            .cloned()
            .collect())
    }

    fn describe(&self) -> String {
        format!("{} in-memory records", self.records.len())
    }
}
