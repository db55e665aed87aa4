//! Unrolled kernels for exactly four states (nucleotides).
//!
//! These perform the same floating-point operations, in the same order, as
//! [`generic`](super::generic) does at four states, so results match it bit
//! for bit.

use std::ops::Range;

use super::{category_term, site_loglikelihood};
use crate::contribution::hsum;
use crate::evaluate::EdgeInputs;
use crate::model::ClvView;
use crate::tipmap::TipCharacterMap;

#[inline(always)]
fn select(mask: u64, bit: u32, p: f64) -> f64 {
    if (mask >> bit) & 1 == 1 {
        p
    } else {
        0.0
    }
}

#[inline(always)]
fn weigh(row_sums: [f64; 4], freqs: &[f64], clvp: &[f64]) -> f64 {
    hsum([
        row_sums[0] * freqs[0] * clvp[0],
        row_sums[1] * freqs[1] * clvp[1],
        row_sums[2] * freqs[2] * clvp[2],
        row_sums[3] * freqs[3] * clvp[3],
    ])
}

/// Tip child, four states.
pub fn tip_range(
    inputs: &EdgeInputs<'_>,
    codes: &[u8],
    map: &TipCharacterMap,
    ln_threshold: f64,
    sites: Range<usize>,
    mut persite: Option<&mut [f64]>,
) -> f64 {
    let rate_cats = inputs.categories.len();
    let mut logl = 0.0;

    for n in sites.clone() {
        let mask = map.mask(codes[n]);
        let mut terma = 0.0;

        for i in 0..rate_cats {
            let freqs = inputs.frequencies.vector(inputs.categories.freq_indices[i]);
            let pmat = inputs.pmatrix.matrix(i);
            let clvp = inputs.parent_clv.block(n, i);

            let mut row_sums = [0.0; 4];
            for (t, rs) in row_sums.iter_mut().enumerate() {
                let r = &pmat[t * 4..t * 4 + 4];
                *rs = hsum([
                    select(mask, 0, r[0]),
                    select(mask, 1, r[1]),
                    select(mask, 2, r[2]),
                    select(mask, 3, r[3]),
                ]);
            }

            let terma_r = weigh(row_sums, freqs, clvp);
            terma += category_term(inputs, n, i, freqs, terma_r);
        }

        let site_lk = site_loglikelihood(inputs, n, terma, 0, ln_threshold);
        if let Some(out) = persite.as_deref_mut() {
            out[n - sites.start] = site_lk;
        }
        logl += site_lk;
    }

    logl
}

/// Inner child, four states.
pub fn inner_range(
    inputs: &EdgeInputs<'_>,
    child_clv: &ClvView<'_>,
    child_scaler: Option<&[u32]>,
    ln_threshold: f64,
    sites: Range<usize>,
    mut persite: Option<&mut [f64]>,
) -> f64 {
    let rate_cats = inputs.categories.len();
    let mut logl = 0.0;

    for n in sites.clone() {
        let mut terma = 0.0;

        for i in 0..rate_cats {
            let freqs = inputs.frequencies.vector(inputs.categories.freq_indices[i]);
            let pmat = inputs.pmatrix.matrix(i);
            let clvp = inputs.parent_clv.block(n, i);
            let clvc = child_clv.block(n, i);

            let mut row_sums = [0.0; 4];
            for (t, rs) in row_sums.iter_mut().enumerate() {
                let r = &pmat[t * 4..t * 4 + 4];
                *rs = hsum([r[0] * clvc[0], r[1] * clvc[1], r[2] * clvc[2], r[3] * clvc[3]]);
            }

            let terma_r = weigh(row_sums, freqs, clvp);
            terma += category_term(inputs, n, i, freqs, terma_r);
        }

        let child_scale = child_scaler.map_or(0, |s| s[n]);
        let site_lk = site_loglikelihood(inputs, n, terma, child_scale, ln_threshold);
        if let Some(out) = persite.as_deref_mut() {
            out[n - sites.start] = site_lk;
        }
        logl += site_lk;
    }

    logl
}
