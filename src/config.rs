use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::analysis::peak::BinConvention;
use crate::recorder::RowSchema;
use crate::stream::parser::ProtocolConfig;

/// Which FFT line encoding the acquisition firmware emits.
///
/// The two forms are incompatible and cannot be told apart reliably from the
/// line shape, so the deployment picks one here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FftEncoding {
    /// `FFT,t_ms,addr,Fs,mag0,...`
    #[default]
    Addressed,
    /// `FFT,cycle_id,Fs,mag1,...`
    CycleIndexed,
}

/// Shape of untagged data lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSchema {
    /// `t_ms,value`
    Minimal,
    /// `t_ms,addr,heater_C,gas_ohm`
    Sweep,
    /// `t_ms,addr,gas_ohm,temp_C,hum_pct,press_Pa,status`
    #[default]
    Environmental,
}

fn default_channels() -> Vec<String> {
    vec!["0x76".into(), "0x77".into()]
}

fn default_capacity() -> usize {
    1500
}

fn default_label() -> String {
    "unknown".into()
}

fn default_redraw_ms() -> u64 {
    100
}

/// Deployment configuration, loaded from a JSON file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Acquisition command; the first element is the program.
    pub command: Vec<String>,
    /// Sensor addresses contributing to the synchronized series.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    #[serde(default = "default_capacity")]
    pub buffer_capacity: usize,
    #[serde(default)]
    pub sample_schema: SampleSchema,
    #[serde(default)]
    pub fft_encoding: FftEncoding,
    #[serde(default)]
    pub bin_convention: BinConvention,
    /// CSV output; rows are not persisted when unset.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
    #[serde(default)]
    pub csv_schema: RowSchema,
    #[serde(default)]
    pub csv_append: bool,
    #[serde(default = "default_label")]
    pub initial_label: String,
    /// Minimum interval between renderer snapshots.
    #[serde(default = "default_redraw_ms")]
    pub redraw_min_ms: u64,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig {
            fft_encoding: self.fft_encoding,
            sample_schema: self.sample_schema,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            channels: default_channels(),
            buffer_capacity: default_capacity(),
            sample_schema: SampleSchema::default(),
            fft_encoding: FftEncoding::default(),
            bin_convention: BinConvention::default(),
            csv_path: None,
            csv_schema: RowSchema::default(),
            csv_append: false,
            initial_label: default_label(),
            redraw_min_ms: default_redraw_ms(),
        }
    }
}
