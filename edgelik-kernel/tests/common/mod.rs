//! Randomized edge fixtures shared by the integration tests.

#![allow(dead_code)]

use edgelik_core::padded_states;
use edgelik_kernel::{
    ChildOperand, ClvView, EdgeInputs, FrequencyTable, InvariantSites, RateCategories,
    TipCharacterMap, TransitionMatrices,
};

/// Deterministic LCG in (0, 1].
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493))
    }

    pub fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.0 >> 11) as f64 + 1.0) / (1u64 << 53) as f64
    }

    pub fn below(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64) as usize).min(n - 1)
    }
}

/// Which end the child operand represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    /// Tip codes through the tip map.
    Tip,
    /// The same tip re-expressed as a dense 0/1 CLV.
    TipAsClv,
    /// A random inner-node CLV.
    Inner,
}

pub struct EdgeData {
    pub states: usize,
    pub sites: usize,
    pub cats: usize,
    pub parent: Vec<f64>,
    pub parent_scaler: Vec<u32>,
    pub child: Vec<f64>,
    pub child_scaler: Vec<u32>,
    pub indicator: Vec<f64>,
    pub pmatrix: Vec<f64>,
    pub freqs: FrequencyTable,
    pub weights: Vec<f64>,
    pub freq_idx: Vec<usize>,
    pub pattern: Vec<u32>,
    pub codes: Vec<u8>,
    pub map: TipCharacterMap,
    pub inv_props: Vec<f64>,
    pub inv_indices: Vec<i32>,
}

/// Tip map with every singleton, a two-state pair and full ambiguity.
pub fn test_map(states: usize) -> TipCharacterMap {
    let all = if states == 64 { u64::MAX } else { (1u64 << states) - 1 };
    let mut pairs: Vec<(u8, u64)> = (0..states).map(|s| (s as u8, 1u64 << s)).collect();
    pairs.push((200, all));
    if states >= 2 {
        pairs.push((201, 0b11));
    }
    TipCharacterMap::from_pairs(states, pairs).unwrap()
}

impl EdgeData {
    pub fn random(states: usize, sites: usize, cats: usize, seed: u64) -> Self {
        let mut rng = Lcg::new(seed);
        let sp = padded_states(states);
        let map = test_map(states);

        let clv = |rng: &mut Lcg| -> Vec<f64> {
            let mut v = vec![0.0; sites * cats * sp];
            for block in v.chunks_exact_mut(sp) {
                for x in block[..states].iter_mut() {
                    *x = rng.next_f64();
                }
            }
            v
        };
        let parent = clv(&mut rng);
        let child = clv(&mut rng);

        let mut pmatrix = vec![0.0; cats * sp * sp];
        for c in 0..cats {
            for t in 0..states {
                let row = &mut pmatrix[(c * sp + t) * sp..(c * sp + t) * sp + states];
                for x in row.iter_mut() {
                    *x = rng.next_f64();
                }
                let total: f64 = row.iter().sum();
                row.iter_mut().for_each(|x| *x /= total);
            }
        }

        let n_freq_sets = 2;
        let freq_sets: Vec<Vec<f64>> = (0..n_freq_sets)
            .map(|_| {
                let raw: Vec<f64> = (0..states).map(|_| rng.next_f64()).collect();
                let total: f64 = raw.iter().sum();
                raw.into_iter().map(|x| x / total).collect()
            })
            .collect();
        let refs: Vec<&[f64]> = freq_sets.iter().map(|v| v.as_slice()).collect();
        let freqs = FrequencyTable::new(states, &refs).unwrap();

        let raw_w: Vec<f64> = (0..cats).map(|_| rng.next_f64()).collect();
        let total_w: f64 = raw_w.iter().sum();
        let weights = raw_w.into_iter().map(|w| w / total_w).collect();
        let freq_idx = (0..cats).map(|c| c % n_freq_sets).collect();

        let pattern = (0..sites).map(|_| 1 + rng.below(4) as u32).collect();
        let codes: Vec<u8> = (0..sites).map(|_| rng.below(map.code_count()) as u8).collect();

        let mut indicator = vec![0.0; sites * cats * sp];
        for n in 0..sites {
            let mask = map.mask(codes[n]);
            for c in 0..cats {
                for s in 0..states {
                    if (mask >> s) & 1 == 1 {
                        indicator[(n * cats + c) * sp + s] = 1.0;
                    }
                }
            }
        }

        let parent_scaler = (0..sites).map(|_| rng.below(3) as u32).collect();
        let child_scaler = (0..sites).map(|_| rng.below(3) as u32).collect();
        let inv_props = (0..cats).map(|c| if c % 2 == 0 { 0.2 } else { 0.0 }).collect();
        let inv_indices = (0..sites)
            .map(|_| rng.below(states + 1) as i32 - 1)
            .collect();

        Self {
            states,
            sites,
            cats,
            parent,
            parent_scaler,
            child,
            child_scaler,
            indicator,
            pmatrix,
            freqs,
            weights,
            freq_idx,
            pattern,
            codes,
            map,
            inv_props,
            inv_indices,
        }
    }

    pub fn sp(&self) -> usize {
        padded_states(self.states)
    }

    /// Inputs without scalers or invariant sites.
    pub fn inputs(&self, child: Child) -> EdgeInputs<'_> {
        let sp = self.sp();
        let child = match child {
            Child::Tip => ChildOperand::Tip {
                codes: &self.codes,
                map: &self.map,
            },
            Child::TipAsClv => ChildOperand::Inner {
                clv: ClvView::new(&self.indicator, self.sites, self.cats, sp).unwrap(),
                scaler: None,
            },
            Child::Inner => ChildOperand::Inner {
                clv: ClvView::new(&self.child, self.sites, self.cats, sp).unwrap(),
                scaler: None,
            },
        };
        EdgeInputs {
            states: self.states,
            parent_clv: ClvView::new(&self.parent, self.sites, self.cats, sp).unwrap(),
            parent_scaler: None,
            child,
            pmatrix: TransitionMatrices::new(&self.pmatrix, self.cats, sp).unwrap(),
            frequencies: &self.freqs,
            categories: RateCategories::new(&self.weights, &self.freq_idx).unwrap(),
            invariant: None,
            pattern_weights: &self.pattern,
        }
    }

    pub fn invariant(&self) -> InvariantSites<'_> {
        InvariantSites::new(&self.inv_props, &self.inv_indices)
    }
}

/// `|a - b| <= tol * max(1, |a|, |b|)`, treating equal infinities as equal.
pub fn close(a: f64, b: f64, tol: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= tol * 1f64.max(a.abs()).max(b.abs())
}
