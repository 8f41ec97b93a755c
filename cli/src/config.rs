/*!
# Config Module

Settings for the crystalball binary.

Sources, lowest precedence first:
1. Built-in defaults
2. A TOML file: `--config`, else `$CRYSTALBALL_CONFIG`, else
   `<config dir>/crystalball/config.toml` when it exists
3. `CRYSTALBALL_*` environment variables
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

const ENV_PREFIX: &str = "CRYSTALBALL";
const CONFIG_ENV: &str = "CRYSTALBALL_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where `collect` writes and `peek --snapshot` reads the slot catalog
    pub snapshot_path: PathBuf,

    /// Program used to query the pool
    pub condor_status: String,

    /// error, warn, info, debug or trace
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            snapshot_path: data_dir.join("crystalball").join("slots.json"),
            condor_status: "condor_status".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, reading `explicit` instead of the usual file when given
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                if !path.exists() {
                    bail!("configuration file {} does not exist", path.display());
                }
                builder = builder.add_source(config::File::from(path));
            }
            None => {
                if let Some(path) = default_config_file() {
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let settings: Self = builder
            .build()
            .and_then(|config| config.try_deserialize::<Self>())
            .context("failed to read configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.condor_status.trim().is_empty() {
            bail!("condor_status must name a program");
        }
        if self.snapshot_path.as_os_str().is_empty() {
            bail!("snapshot_path must not be empty");
        }
        self.level()?;
        Ok(())
    }

    /// Configured log level
    pub fn level(&self) -> Result<Level> {
        Level::from_str(self.log_level.trim())
            .map_err(|_| anyhow::anyhow!("unknown log level: {}", self.log_level))
    }
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("crystalball").join("config.toml"))
}
