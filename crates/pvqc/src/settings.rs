use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pvqc_core::config::PipelineConfig;
use pvqc_core::types::SystemParameters;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "pvqc.toml";

/// How logger CSV files are laid out. Read from the `[input]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub delimiter: char,
    pub timestamp_column: String,
    pub timestamp_format: String,
    /// Fallback irradiance column when the location has no entry below.
    pub irradiance_column: String,
    /// Irradiance column per location (`loc`).
    pub irradiance_columns: BTreeMap<String, String>,
    /// Column names for DAQ files without a header row.
    pub daq_columns: Option<Vec<String>>,
    /// Column names for inverter files without a header row.
    pub sfcr_columns: Option<Vec<String>>,
    pub dc_power_column: String,
    pub ac_power_column: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            delimiter: ',',
            timestamp_column: "dt".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            irradiance_column: "irr".to_string(),
            irradiance_columns: BTreeMap::new(),
            daq_columns: None,
            sfcr_columns: None,
            dc_power_column: "p_dc".to_string(),
            ac_power_column: "p_ac".to_string(),
        }
    }
}

impl InputSettings {
    pub fn delimiter_byte(&self) -> Result<u8> {
        if !self.delimiter.is_ascii() {
            bail!("CSV delimiter must be a single ASCII character, got '{}'", self.delimiter);
        }
        Ok(self.delimiter as u8)
    }

    pub fn irradiance_column_for(&self, loc: &str) -> &str {
        self.irradiance_columns
            .get(loc)
            .map(String::as_str)
            .unwrap_or(&self.irradiance_column)
    }

    /// Column names of every DAQ and inverter channel the system needs.
    pub fn columns_for(&self, system: &SystemParameters) -> ChannelColumns {
        ChannelColumns {
            irradiance: self.irradiance_column_for(&system.loc).to_string(),
            module_temperature_center: format!("t_mod_c_{}", system.module),
            module_temperature_side: format!("t_mod_s_{}", system.module),
            dc_power: self.dc_power_column.clone(),
            ac_power: self.ac_power_column.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelColumns {
    pub irradiance: String,
    pub module_temperature_center: String,
    pub module_temperature_side: String,
    pub dc_power: String,
    pub ac_power: String,
}

#[derive(Debug, Default, Deserialize)]
struct InputSection {
    #[serde(default)]
    input: InputSettings,
}

pub struct Settings {
    pub pipeline: PipelineConfig,
    pub input: InputSettings,
    pub source: Option<PathBuf>,
}

/// `--config`, then `PVQC_CONFIG`, then `./pvqc.toml` if present.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = env::var("PVQC_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
    fallback.exists().then_some(fallback)
}

pub fn parse(raw: &str) -> Result<(PipelineConfig, InputSettings)> {
    let pipeline = PipelineConfig::from_toml_str(raw)?;
    let section: InputSection = toml::from_str(raw).context("invalid [input] section")?;
    Ok((pipeline, section.input))
}

pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let Some(path) = config_path(explicit) else {
        return Ok(Settings {
            pipeline: PipelineConfig::default(),
            input: InputSettings::default(),
            source: None,
        });
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let (pipeline, input) =
        parse(&raw).with_context(|| format!("invalid config file {}", path.display()))?;

    Ok(Settings {
        pipeline,
        input,
        source: Some(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_section_overrides_defaults() {
        let raw = r#"
[input]
delimiter = ";"
irradiance_columns = { pucp = "g_pucp" }

[[systems]]
sys = "pucp-cigs"
loc = "pucp"
mod = "cigs"
p_m = 1675.0
area = 10.2
"#;
        let (pipeline, input) = parse(raw).unwrap();
        let system = pipeline.system("pucp-cigs").unwrap();

        assert_eq!(input.delimiter_byte().unwrap(), b';');
        assert_eq!(input.timestamp_column, "dt");

        let columns = input.columns_for(system);
        assert_eq!(columns.irradiance, "g_pucp");
        assert_eq!(columns.module_temperature_center, "t_mod_c_cigs");
        assert_eq!(columns.module_temperature_side, "t_mod_s_cigs");
        assert_eq!(columns.ac_power, "p_ac");
    }

    #[test]
    fn loads_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        fs::write(&path, "[corroboration]\nenabled = false\n").unwrap();

        let settings = load(Some(&path)).unwrap();

        assert!(!settings.pipeline.corroboration.enabled);
        assert_eq!(settings.source.as_deref(), Some(path.as_path()));
        assert!(load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn unknown_location_falls_back_to_default_column() {
        let input = InputSettings::default();
        assert_eq!(input.irradiance_column_for("uni"), "irr");
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let input = InputSettings {
            delimiter: '§',
            ..InputSettings::default()
        };
        assert!(input.delimiter_byte().is_err());
    }
}
