//! Underflow rescaling shared by CLV producers and the edge kernels.
//!
//! Conditional likelihoods shrink geometrically towards the root. When every
//! entry of a site's CLV span falls below the threshold, the producer
//! multiplies the span by [`ScaleConfig::factor`] and bumps that site's
//! scale counter. At evaluation time each counted event is undone by adding
//! `ln(threshold)` to the site log-likelihood.

use crate::{EdgelikError, Result};

/// Power of two used for rescaling: values are scaled by `2^SCALE_EXPONENT`.
pub const SCALE_EXPONENT: i32 = 256;

/// Default rescale threshold, `2^-256`.
pub const SCALE_THRESHOLD: f64 = f64::from_bits(((1023 - SCALE_EXPONENT) as u64) << 52);

/// Default rescale factor, `2^256`, the exact inverse of [`SCALE_THRESHOLD`].
pub const SCALE_FACTOR: f64 = f64::from_bits(((1023 + SCALE_EXPONENT) as u64) << 52);

/// Rescaling configuration handed to both sides of the contract.
///
/// A producer that rescales with one `ScaleConfig` must be evaluated with the
/// same one, otherwise the log-space correction no longer cancels.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "f64", into = "f64")
)]
pub struct ScaleConfig {
    threshold: f64,
}

impl ScaleConfig {
    /// Create a configuration with a custom threshold in `(0, 1)`.
    ///
    /// # Errors
    ///
    /// Returns an error if `threshold` is not finite or not in `(0, 1)`.
    pub fn new(threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || threshold <= 0.0 || threshold >= 1.0 {
            return Err(EdgelikError::InvalidInput(format!(
                "scale threshold must be in (0, 1), got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    /// The threshold below which a CLV span is rescaled.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The multiplier applied on each rescale event, `1 / threshold`.
    pub fn factor(&self) -> f64 {
        if self.threshold == SCALE_THRESHOLD {
            SCALE_FACTOR
        } else {
            1.0 / self.threshold
        }
    }

    /// `ln(threshold)`, the per-event log-space correction.
    pub fn ln_threshold(&self) -> f64 {
        self.threshold.ln()
    }

    /// Total log-space correction for `count` rescale events.
    pub fn correction(&self, count: u32) -> f64 {
        if count == 0 {
            0.0
        } else {
            count as f64 * self.ln_threshold()
        }
    }

    /// Rescale `span` in place if every entry is below the threshold.
    ///
    /// Returns `true` when a rescale event happened; the caller is expected to
    /// increment the site's scale counter. An empty span is never rescaled.
    pub fn rescale_block(&self, span: &mut [f64]) -> bool {
        if span.is_empty() || span.iter().any(|&v| v >= self.threshold) {
            return false;
        }
        let factor = self.factor();
        for v in span.iter_mut() {
            *v *= factor;
        }
        true
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            threshold: SCALE_THRESHOLD,
        }
    }
}

impl TryFrom<f64> for ScaleConfig {
    type Error = EdgelikError;

    fn try_from(threshold: f64) -> Result<Self> {
        Self::new(threshold)
    }
}

impl From<ScaleConfig> for f64 {
    fn from(config: ScaleConfig) -> f64 {
        config.threshold
    }
}
