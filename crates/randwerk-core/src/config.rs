// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RandwerkError, Result};

/// Smallest accepted margin-band threshold, in percent of page height.
pub const MIN_THRESHOLD_PERCENT: f64 = 0.1;
/// Largest accepted margin-band threshold, in percent of page height.
pub const MAX_THRESHOLD_PERCENT: f64 = 10.0;
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 1.0;

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Height of the header and footer bands, in percent of page height.
    pub threshold_percent: f64,
    /// Parallel workers. `None` uses every available core.
    pub worker_count: Option<usize>,
    pub sampling: SamplingPolicy,
    pub output_format: OutputFormat,
    /// Results dataset path. Without an extension the format's own is
    /// appended; reports are written next to it.
    pub output_destination: PathBuf,
    pub detector: DetectorSettings,
    pub retry: RetrySettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            worker_count: None,
            sampling: SamplingPolicy::Full,
            output_format: OutputFormat::Tabular,
            output_destination: PathBuf::from("margin_analysis"),
            detector: DetectorSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RandwerkError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RandwerkError::Config(format!("invalid TOML: {e}")))
    }

    /// Reject every setting that would make the run meaningless. Called
    /// before any file is opened.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold_percent)?;

        if self.worker_count == Some(0) {
            return Err(RandwerkError::Config(
                "worker_count must be at least 1".into(),
            ));
        }

        self.sampling.validate()?;
        self.detector.validate()?;

        if self.output_destination.as_os_str().is_empty() {
            return Err(RandwerkError::Config(
                "output_destination must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Worker count clamped to `1..=available cores`.
    pub fn resolved_workers(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.worker_count.unwrap_or(available).clamp(1, available.max(1))
    }
}

/// Check a margin-band threshold against the accepted range.
pub fn validate_threshold(threshold_percent: f64) -> Result<()> {
    if !(MIN_THRESHOLD_PERCENT..=MAX_THRESHOLD_PERCENT).contains(&threshold_percent) {
        return Err(RandwerkError::Config(format!(
            "threshold must be between {MIN_THRESHOLD_PERCENT} and {MAX_THRESHOLD_PERCENT} percent, got {threshold_percent}"
        )));
    }
    Ok(())
}

/// How documents are selected from the discovered population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Every document, every page.
    #[default]
    Full,
    /// Sample size from the finite-population proportion formula.
    Statistical {
        /// Confidence level in percent, e.g. 95.
        confidence: f64,
        /// Margin of error in percent, e.g. 5.
        margin_of_error: f64,
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Exactly `n` documents (or all of them when `n` exceeds the population).
    RandomN {
        n: usize,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl SamplingPolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Full => Ok(()),
            Self::Statistical {
                confidence,
                margin_of_error,
                ..
            } => {
                if !(*confidence > 0.0 && *confidence < 100.0) {
                    return Err(RandwerkError::Config(format!(
                        "confidence must be strictly between 0 and 100 percent, got {confidence}"
                    )));
                }
                if !(*margin_of_error > 0.0 && *margin_of_error < 100.0) {
                    return Err(RandwerkError::Config(format!(
                        "margin of error must be strictly between 0 and 100 percent, got {margin_of_error}"
                    )));
                }
                Ok(())
            }
            Self::RandomN { n, .. } => {
                if *n == 0 {
                    return Err(RandwerkError::Config(
                        "random sample size must be at least 1".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Name recorded in reports and metadata.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Full => "none",
            Self::Statistical { .. } => "statistical",
            Self::RandomN { .. } => "random_n",
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Statistical { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }

    pub fn margin_of_error(&self) -> Option<f64> {
        match self {
            Self::Statistical {
                margin_of_error, ..
            } => Some(*margin_of_error),
            _ => None,
        }
    }

    pub fn seed(&self) -> Option<u64> {
        match self {
            Self::Full => None,
            Self::Statistical { seed, .. } | Self::RandomN { seed, .. } => *seed,
        }
    }
}

/// Results dataset encodings. All three share one logical schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Delimited text (CSV).
    #[default]
    Tabular,
    /// Columnar binary (Parquet).
    Columnar,
    /// Embedded relational database (SQLite).
    EmbeddedDb,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Tabular => "csv",
            Self::Columnar => "parquet",
            Self::EmbeddedDb => "db",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Tabular => "csv",
            Self::Columnar => "parquet",
            Self::EmbeddedDb => "sqlite",
        }
    }

    /// Parse the short names accepted on the command line.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "csv" | "tabular" => Some(Self::Tabular),
            "parquet" | "columnar" => Some(Self::Columnar),
            "sqlite" | "db" | "embedded_db" => Some(Self::EmbeddedDb),
            _ => None,
        }
    }
}

/// Detector constants that control what counts as content.
///
/// These are deliberately independent of the threshold: the threshold sets
/// the band size, these decide whether a band holds anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// A band is flagged when its content density exceeds this fraction.
    pub noise_floor: f64,
    /// Luma values below this are non-background.
    pub background_luma: u8,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            noise_floor: 0.001,
            background_luma: 250,
        }
    }
}

impl DetectorSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.noise_floor) {
            return Err(RandwerkError::Config(format!(
                "noise floor must be in [0, 1), got {}",
                self.noise_floor
            )));
        }
        Ok(())
    }
}

/// Backoff for transient read failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 250,
            max_delay_ms: 2_000,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}
