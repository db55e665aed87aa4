//! Blocked kernel for any padded state count.

use std::ops::Range;

use edgelik_core::BLOCK_WIDTH;

use super::{category_term, site_loglikelihood};
use crate::contribution::{hsum, ChildContribution};
use crate::evaluate::EdgeInputs;

/// Edge log-likelihood over `sites` for any child provider.
///
/// Rows are processed one block of [`BLOCK_WIDTH`] at a time: the block's row
/// sums are weighted by frequencies and the parent CLV, folded with
/// [`hsum`], and added to the category total in ascending block order.
pub fn edge_loglikelihood_range<C>(
    inputs: &EdgeInputs<'_>,
    child: &C,
    ln_threshold: f64,
    sites: Range<usize>,
    mut persite: Option<&mut [f64]>,
) -> f64
where
    C: ChildContribution + ?Sized,
{
    let states_padded = inputs.states_padded();
    let rate_cats = inputs.categories.len();
    let mut logl = 0.0;

    for n in sites.clone() {
        let mut terma = 0.0;

        for i in 0..rate_cats {
            let freqs = inputs.frequencies.vector(inputs.categories.freq_indices[i]);
            let clvp = inputs.parent_clv.block(n, i);
            let mut terma_r = 0.0;

            for j in (0..states_padded).step_by(BLOCK_WIDTH) {
                let mut lanes = [0.0; BLOCK_WIDTH];
                for (l, lane) in lanes.iter_mut().enumerate() {
                    let t = j + l;
                    let row_sum = child.row_sum(n, i, inputs.pmatrix.row(i, t));
                    *lane = row_sum * freqs[t] * clvp[t];
                }
                terma_r += hsum(lanes);
            }

            terma += category_term(inputs, n, i, freqs, terma_r);
        }

        let site_lk = site_loglikelihood(inputs, n, terma, child.scale_count(n), ln_threshold);
        if let Some(out) = persite.as_deref_mut() {
            out[n - sites.start] = site_lk;
        }
        logl += site_lk;
    }

    logl
}
