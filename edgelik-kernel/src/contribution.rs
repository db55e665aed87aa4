//! Child contribution providers.
//!
//! For one transition-matrix row `P[t][..]` a provider returns
//! `Σ_s P[t][s] * child(s)`, where `child(s)` is the child's likelihood for
//! state `s` at the current site and rate category. Tips answer this by
//! selecting the row entries allowed by their ambiguity bitmask; inner nodes
//! take a dense dot product with their CLV block.
//!
//! Both providers reduce in the same blocked order: [`BLOCK_WIDTH`] lane
//! accumulators walk the column blocks in ascending order and are folded with
//! [`hsum`]. The 4-state kernels reproduce exactly this order.

use edgelik_core::BLOCK_WIDTH;

use crate::model::ClvView;
use crate::tipmap::TipCharacterMap;

/// Fold one block of lane accumulators: `(l0 + l1) + (l2 + l3)`.
#[inline(always)]
pub fn hsum(lanes: [f64; BLOCK_WIDTH]) -> f64 {
    (lanes[0] + lanes[1]) + (lanes[2] + lanes[3])
}

/// Source of the child-side factor in the edge likelihood.
pub trait ChildContribution: Sync {
    /// `Σ_s row[s] * child(site, category, s)` over the padded state range.
    fn row_sum(&self, site: usize, category: usize, row: &[f64]) -> f64;

    /// Per-site rescale count carried by the child, if any.
    fn scale_count(&self, site: usize) -> u32;
}

/// A tip: per-site compact codes resolved through a [`TipCharacterMap`].
#[derive(Debug, Clone, Copy)]
pub struct TipSource<'a> {
    codes: &'a [u8],
    map: &'a TipCharacterMap,
}

impl<'a> TipSource<'a> {
    pub fn new(codes: &'a [u8], map: &'a TipCharacterMap) -> Self {
        Self { codes, map }
    }

    /// The state bitmask observed at `site`.
    #[inline]
    pub fn site_mask(&self, site: usize) -> u64 {
        self.map.mask(self.codes[site])
    }
}

impl ChildContribution for TipSource<'_> {
    #[inline]
    fn row_sum(&self, site: usize, _category: usize, row: &[f64]) -> f64 {
        let mask = self.site_mask(site);
        let mut lanes = [0.0; BLOCK_WIDTH];
        for (b, block) in row.chunks_exact(BLOCK_WIDTH).enumerate() {
            let bits = mask >> (b * BLOCK_WIDTH);
            for (l, &p) in block.iter().enumerate() {
                if (bits >> l) & 1 == 1 {
                    lanes[l] += p;
                }
            }
        }
        hsum(lanes)
    }

    #[inline]
    fn scale_count(&self, _site: usize) -> u32 {
        0
    }
}

/// An inner node: dense conditional likelihoods plus an optional scaler.
#[derive(Debug, Clone, Copy)]
pub struct ClvSource<'a> {
    clv: ClvView<'a>,
    scaler: Option<&'a [u32]>,
}

impl<'a> ClvSource<'a> {
    pub fn new(clv: ClvView<'a>, scaler: Option<&'a [u32]>) -> Self {
        Self { clv, scaler }
    }
}

impl ChildContribution for ClvSource<'_> {
    #[inline]
    fn row_sum(&self, site: usize, category: usize, row: &[f64]) -> f64 {
        let child = self.clv.block(site, category);
        let mut lanes = [0.0; BLOCK_WIDTH];
        for (pb, cb) in row
            .chunks_exact(BLOCK_WIDTH)
            .zip(child.chunks_exact(BLOCK_WIDTH))
        {
            for l in 0..BLOCK_WIDTH {
                lanes[l] += pb[l] * cb[l];
            }
        }
        hsum(lanes)
    }

    #[inline]
    fn scale_count(&self, site: usize) -> u32 {
        self.scaler.map_or(0, |s| s[site])
    }
}
