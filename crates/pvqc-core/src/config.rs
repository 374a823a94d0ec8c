// crates/pvqc-core/src/config.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::corroboration::CorroborationPolicy;
use crate::error::{ConfigError, Result};
use crate::thresholds::{ThresholdOverride, ThresholdTable};
use crate::types::{ChannelKind, SystemParameters};

/// Raw shape of `pvqc.toml`. Sections owned by other consumers are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub corroboration: CorroborationPolicy,
    #[serde(default)]
    pub thresholds: BTreeMap<ChannelKind, ThresholdOverride>,
    #[serde(default)]
    pub systems: Vec<SystemParameters>,
}

/// Validated configuration shared by every pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub corroboration: CorroborationPolicy,
    pub thresholds: ThresholdTable,
    pub systems: Vec<SystemParameters>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corroboration: CorroborationPolicy::default(),
            thresholds: ThresholdTable::canonical(),
            systems: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        Self::try_from(file)
    }

    pub fn system(&self, sys: &str) -> Result<&SystemParameters> {
        self.systems
            .iter()
            .find(|s| s.sys == sys)
            .ok_or_else(|| ConfigError::UnknownSystem(sys.to_string()))
    }
}

impl TryFrom<ConfigFile> for PipelineConfig {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self> {
        file.corroboration.validate()?;
        let thresholds = ThresholdTable::with_overrides(&file.thresholds)?;
        for system in &file.systems {
            validate_system(system)?;
        }

        Ok(Self {
            corroboration: file.corroboration,
            thresholds,
            systems: file.systems,
        })
    }
}

pub fn validate_system(system: &SystemParameters) -> Result<()> {
    for (field, value) in [("p_m", system.p_m), ("area", system.area)] {
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigError::InvalidSystem {
                sys: system.sys.clone(),
                field,
                value,
            });
        }
    }
    Ok(())
}
