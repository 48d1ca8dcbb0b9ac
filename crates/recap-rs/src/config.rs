//! Configuration for the [`Condenser`](crate::condense::Condenser).
//!
//! Construction is the only place configuration can fail. Validation runs
//! once, up front, and a bad combination refuses to build a condenser at
//! all; a running cycle never revisits these checks.
//!
//! # Examples
//!
//! Defaults match a mid-sized agent session:
//!
//! ```
//! use recap_rs::config::CondenserConfig;
//!
//! let config = CondenserConfig::default();
//! assert_eq!(config.max_size, 100);
//! assert!(config.validate().is_ok());
//! ```
//!
//! Customized via builder methods:
//!
//! ```
//! use recap_rs::config::CondenserConfig;
//!
//! let config = CondenserConfig::default()
//!     .with_max_size(200)
//!     .with_keep_first(2)
//!     .with_max_compression_ratio(0.25);
//! ```

use crate::condense::compressor::CompressorConfig;

/// Configuration for a condenser instance.
///
/// The keyword tables and everything in here are immutable once the
/// condenser is built; cycles share them read-only.
#[derive(Debug, Clone)]
pub struct CondenserConfig {
    /// Event count above which condensation triggers.
    pub max_size: usize,
    /// Head events always kept verbatim (system prompt, original task).
    pub keep_first: usize,
    /// Fraction of `max_size` the view is reduced toward.
    pub max_compression_ratio: f64,
    /// Per-event content budget in characters, applied before scoring and
    /// before prompt inclusion.
    pub max_event_length: usize,
    /// When false, importance scoring is skipped entirely and removal
    /// order is pure recency (oldest middle events first).
    pub enable_semantic_analysis: bool,
    /// LLM compression settings (model, token budget, timeouts).
    pub compressor: CompressorConfig,
}

impl Default for CondenserConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            keep_first: 1,
            max_compression_ratio: 0.3,
            max_event_length: 8000,
            enable_semantic_analysis: true,
            compressor: CompressorConfig::default(),
        }
    }
}

impl CondenserConfig {
    // ── Builder methods ───────────────────────────────────────────

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_keep_first(mut self, keep_first: usize) -> Self {
        self.keep_first = keep_first;
        self
    }

    pub fn with_max_compression_ratio(mut self, ratio: f64) -> Self {
        self.max_compression_ratio = ratio;
        self
    }

    pub fn with_max_event_length(mut self, chars: usize) -> Self {
        self.max_event_length = chars;
        self
    }

    pub fn with_semantic_analysis(mut self, enabled: bool) -> Self {
        self.enable_semantic_analysis = enabled;
        self
    }

    pub fn with_compressor(mut self, compressor: CompressorConfig) -> Self {
        self.compressor = compressor;
        self
    }

    // ── Derived values ────────────────────────────────────────────

    /// The size a triggered cycle reduces the view toward.
    ///
    /// The `keep_first + 2` floor guarantees room for at least one kept
    /// head event, one summary, and one tail event.
    pub fn target_size(&self) -> usize {
        let scaled = (self.max_size as f64 * self.max_compression_ratio).floor() as usize;
        scaled.max(self.keep_first + 2)
    }

    /// Validate the configuration. Called by condenser construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::ZeroMaxSize);
        }
        if self.keep_first >= self.max_size / 2 {
            return Err(ConfigError::KeepFirstTooLarge {
                keep_first: self.keep_first,
                max_size: self.max_size,
            });
        }
        if !(self.max_compression_ratio > 0.0 && self.max_compression_ratio <= 1.0) {
            return Err(ConfigError::InvalidRatio {
                ratio: self.max_compression_ratio,
            });
        }
        if self.max_event_length == 0 {
            return Err(ConfigError::ZeroEventLength);
        }
        Ok(())
    }
}

/// A configuration combination the condenser refuses to run with.
///
/// The only externally visible failure mode of the crate: raised at
/// construction, never during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `max_size` of zero would trigger on every view.
    ZeroMaxSize,
    /// `keep_first` must stay under half of `max_size`, or head plus
    /// summary slots would swallow the whole target.
    KeepFirstTooLarge { keep_first: usize, max_size: usize },
    /// The compression ratio must be in `(0, 1]`.
    InvalidRatio { ratio: f64 },
    /// A zero event-length budget would elide all content.
    ZeroEventLength,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ZeroMaxSize => write!(f, "max_size must be positive"),
            ConfigError::KeepFirstTooLarge {
                keep_first,
                max_size,
            } => write!(
                f,
                "keep_first ({keep_first}) must be less than half of max_size ({max_size})"
            ),
            ConfigError::InvalidRatio { ratio } => {
                write!(f, "max_compression_ratio ({ratio}) must be in (0, 1]")
            }
            ConfigError::ZeroEventLength => write!(f, "max_event_length must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CondenserConfig::default().validate().is_ok());
    }

    #[test]
    fn target_size_scales_with_ratio() {
        let config = CondenserConfig::default()
            .with_max_size(100)
            .with_keep_first(1)
            .with_max_compression_ratio(0.3);
        assert_eq!(config.target_size(), 30);
    }

    #[test]
    fn target_size_floor_wins_for_tiny_ratios() {
        let config = CondenserConfig::default()
            .with_max_size(20)
            .with_keep_first(4)
            .with_max_compression_ratio(0.05);
        // floor(20 * 0.05) = 1 < keep_first + 2.
        assert_eq!(config.target_size(), 6);
    }

    #[test]
    fn keep_first_at_half_max_size_rejected() {
        let config = CondenserConfig::default()
            .with_max_size(10)
            .with_keep_first(5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::KeepFirstTooLarge { .. })
        ));
    }

    #[test]
    fn keep_first_just_under_half_accepted() {
        let config = CondenserConfig::default()
            .with_max_size(10)
            .with_keep_first(4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ratio_bounds_enforced() {
        for bad in [0.0, -0.5, 1.5] {
            let config = CondenserConfig::default().with_max_compression_ratio(bad);
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidRatio { .. })),
                "ratio {bad} should be rejected"
            );
        }
        let edge = CondenserConfig::default().with_max_compression_ratio(1.0);
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn zero_sizes_rejected() {
        assert_eq!(
            CondenserConfig::default().with_max_size(0).validate(),
            Err(ConfigError::ZeroMaxSize)
        );
        assert_eq!(
            CondenserConfig::default()
                .with_max_event_length(0)
                .validate(),
            Err(ConfigError::ZeroEventLength)
        );
    }

    #[test]
    fn config_errors_display() {
        let err = ConfigError::KeepFirstTooLarge {
            keep_first: 60,
            max_size: 100,
        };
        assert!(err.to_string().contains("keep_first (60)"));
    }
}
