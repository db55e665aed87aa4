//! The four edge log-likelihood strategies.
//!
//! | child | width | function |
//! |-------|-------|----------|
//! | tip   | 4     | [`fixed4::tip_range`] |
//! | inner | 4     | [`fixed4::inner_range`] |
//! | tip   | any   | [`generic::edge_loglikelihood_range`] with [`TipSource`](crate::contribution::TipSource) |
//! | inner | any   | [`generic::edge_loglikelihood_range`] with [`ClvSource`](crate::contribution::ClvSource) |
//!
//! All of them evaluate a half-open site range, write per-site values into an
//! optional buffer indexed from the start of the range, and return the sum.
//! Inputs are assumed validated; see [`EdgeEvaluator`](crate::EdgeEvaluator).

pub mod fixed4;
pub mod generic;

use crate::evaluate::EdgeInputs;
use crate::model::NO_INVARIANT_STATE;

/// Weighted contribution of one rate category to a site's likelihood.
///
/// Mixes in the invariant-sites component when the category carries a
/// positive invariant proportion.
#[inline(always)]
pub(crate) fn category_term(
    inputs: &EdgeInputs<'_>,
    site: usize,
    category: usize,
    freqs: &[f64],
    terma_r: f64,
) -> f64 {
    let weight = inputs.categories.weights[category];
    if let Some(inv) = inputs.invariant {
        let prop = inv.proportions[category];
        if prop > 0.0 {
            let inv_site_lk = match inv.indices[site] {
                NO_INVARIANT_STATE => 0.0,
                state => freqs[state as usize],
            };
            return weight * (terma_r * (1.0 - prop) + inv_site_lk * prop);
        }
    }
    terma_r * weight
}

/// Log-likelihood of one site from its summed likelihood `terma`.
///
/// `ln(0)` gives `-inf` and is returned as is.
#[inline(always)]
pub(crate) fn site_loglikelihood(
    inputs: &EdgeInputs<'_>,
    site: usize,
    terma: f64,
    child_scale: u32,
    ln_threshold: f64,
) -> f64 {
    let parent_scale = inputs.parent_scaler.map_or(0, |s| s[site]);
    let scale_factors = parent_scale as u64 + child_scale as u64;

    let mut site_lk = terma.ln() * inputs.pattern_weights[site] as f64;
    if scale_factors > 0 {
        site_lk += scale_factors as f64 * ln_threshold;
    }
    site_lk
}
