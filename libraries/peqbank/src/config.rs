//! Bank configuration
//!
//! Settings can come from a TOML/JSON file, `PEQBANK_*` environment variables
//! (e.g. `PEQBANK_SAMPLE_RATE=44100`, `PEQBANK_MODE=fast`) or JSON text.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::bank::ProcessingMode;
use crate::error::{PeqError, Result};
use crate::filters::{FilterList, GainPolicy};
use crate::MAX_STAGES;

/// Environment variable prefix for [`BankConfig::load`]
pub const ENV_PREFIX: &str = "PEQBANK";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BankConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: usize,

    /// Maximum frames per render call
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default)]
    pub mode: ProcessingMode,

    #[serde(default = "default_max_stages")]
    pub max_stages: usize,

    #[serde(default)]
    pub gain_policy: GainPolicy,

    #[serde(default)]
    pub filters: FilterList,
}

impl BankConfig {
    /// Load configuration from an optional file, overridden by `PEQBANK_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(config::Environment::with_prefix(prefix).try_parsing(true));

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            buffer_size = config.buffer_size,
            mode = ?config.mode,
            filters = config.filters.len(),
            "Loaded bank configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PeqError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 {
            return Err(PeqError::InvalidChannelCount(self.channels));
        }
        if self.buffer_size == 0 {
            return Err(PeqError::InvalidBufferSize(self.buffer_size));
        }
        if self.max_stages == 0 {
            return Err(PeqError::InvalidStageCapacity(self.max_stages));
        }

        let requested = self.filters.stage_count();
        if requested > self.max_stages {
            return Err(PeqError::CapacityExceeded {
                requested,
                capacity: self.max_stages,
            });
        }

        self.filter_list().map(|_| ())
    }

    /// The configured filters with the gain policy applied
    pub fn filter_list(&self) -> Result<FilterList> {
        self.filters.with_policy(self.gain_policy)
    }
}

// Default values
fn default_sample_rate() -> u32 {
    48000
}

fn default_channels() -> usize {
    2
}

fn default_buffer_size() -> usize {
    512
}

fn default_max_stages() -> usize {
    MAX_STAGES
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            buffer_size: default_buffer_size(),
            mode: ProcessingMode::default(),
            max_stages: default_max_stages(),
            gain_policy: GainPolicy::default(),
            filters: FilterList::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterSpec;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = BankConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channels, 2);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.mode, ProcessingMode::Smooth);
        assert_eq!(config.max_stages, 16);
        assert_eq!(config.gain_policy, GainPolicy::Correct);
        assert!(config.filters.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_uses_defaults() {
        assert_eq!(BankConfig::from_json("{}").unwrap(), BankConfig::default());
    }

    #[test]
    fn json_with_filters() {
        let json = r#"{
            "sample_rate": 44100,
            "mode": "fast",
            "filters": [
                {"type": "shelf", "gain_low": 3.0, "gain_middle": 0.0, "gain_high": -2.0,
                 "freq_low": 120.0, "freq_high": 8000.0},
                {"type": "high_pass", "freq": 40.0, "ripple": 0.5, "order": 4}
            ]
        }"#;
        let config = BankConfig::from_json(json).unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.mode, ProcessingMode::Fast);
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters.stage_count(), 3);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = BankConfig {
            sample_rate: 0,
            ..BankConfig::default()
        };
        assert!(matches!(config.validate(), Err(PeqError::InvalidSampleRate(0))));

        let config = BankConfig {
            channels: 0,
            ..BankConfig::default()
        };
        assert!(matches!(config.validate(), Err(PeqError::InvalidChannelCount(0))));

        let config = BankConfig {
            max_stages: 2,
            filters: FilterList::new()
                .with(FilterSpec::lowpass(1000.0, 0.0, 6).unwrap())
                .unwrap(),
            ..BankConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PeqError::CapacityExceeded {
                requested: 3,
                capacity: 2
            })
        ));
    }

    #[test]
    fn reject_policy_validates_gains() {
        let json = r#"{
            "gain_policy": "reject",
            "filters": [
                {"type": "peq", "freq_peak": 1000.0, "bandwidth": 1.0,
                 "gain_dc": 0.0, "gain_peak": 6.0, "gain_bandwidth": 9.0}
            ]
        }"#;
        assert!(matches!(
            BankConfig::from_json(json),
            Err(PeqError::GainOrdering { .. })
        ));
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
sample_rate = 96000
channels = 1
mode = "fast"

[[filters]]
type = "peq"
freq_peak = 1000.0
bandwidth = 1.0
gain_dc = 0.0
gain_peak = 6.0
gain_bandwidth = 3.0

[[filters]]
type = "low_pass"
freq = 12000.0
ripple = 0.0
order = 4
"#
        )
        .unwrap();

        let config = BankConfig::load_with_prefix(Some(file.path()), "PEQBANK_TEST_FILE").unwrap();
        assert_eq!(config.sample_rate, 96000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.mode, ProcessingMode::Fast);
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters.stage_count(), 3);
    }

    #[test]
    fn environment_overrides() {
        std::env::set_var("PEQBANK_TEST_ENV_SAMPLE_RATE", "44100");
        std::env::set_var("PEQBANK_TEST_ENV_BUFFER_SIZE", "128");

        let config = BankConfig::load_with_prefix(None, "PEQBANK_TEST_ENV").unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_size, 128);
        assert_eq!(config.channels, 2);

        std::env::remove_var("PEQBANK_TEST_ENV_SAMPLE_RATE");
        std::env::remove_var("PEQBANK_TEST_ENV_BUFFER_SIZE");
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = BankConfig::load_with_prefix(
            Some(Path::new("/nonexistent/peqbank.toml")),
            "PEQBANK_TEST_MISSING",
        );
        assert!(matches!(result, Err(PeqError::Config(_))));
    }
}
