//! An owned partition: tip codes, CLV and scaler buffers, transition
//! matrices and model parameters for one alignment partition.
//!
//! The buffers are filled by the surrounding pruning, model and alignment
//! layers; the partition hands out borrowed views and evaluates edges by
//! buffer index.

use edgelik_core::{padded_states, site_span, EdgelikError, Result};
use tracing::trace;

use crate::evaluate::{ChildOperand, EdgeEvaluator, EdgeInputs, EvaluatorConfig};
use crate::model::{
    ClvView, FrequencyTable, InvariantSites, RateCategories, TransitionMatrices,
    NO_INVARIANT_STATE,
};
use crate::tipmap::TipCharacterMap;

/// Buffer counts and dimensions of a [`Partition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionSpec {
    pub tips: usize,
    pub clv_buffers: usize,
    pub states: usize,
    pub sites: usize,
    pub rate_categories: usize,
    pub scale_buffers: usize,
    pub prob_matrices: usize,
    pub frequency_sets: usize,
}

/// The child end of an edge, by buffer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeChild {
    Tip(usize),
    Clv {
        buffer: usize,
        scaler: Option<usize>,
    },
}

/// One edge evaluation request, by buffer index.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRequest<'a> {
    pub parent_clv: usize,
    pub parent_scaler: Option<usize>,
    pub child: EdgeChild,
    /// Transition matrix set (one matrix per rate category).
    pub matrix: usize,
    /// Frequency set used by each rate category.
    pub freq_indices: &'a [usize],
}

/// Owned storage for one partition.
#[derive(Debug, Clone)]
pub struct Partition {
    spec: PartitionSpec,
    states_padded: usize,
    map: TipCharacterMap,
    tip_codes: Vec<Vec<u8>>,
    clvs: Vec<Vec<f64>>,
    scalers: Vec<Vec<u32>>,
    pmatrices: Vec<Vec<f64>>,
    frequencies: FrequencyTable,
    rate_weights: Vec<f64>,
    invariant_proportions: Vec<f64>,
    invariant_indices: Vec<i32>,
    pattern_weights: Vec<u32>,
    evaluator: EdgeEvaluator,
}

impl Partition {
    /// Allocate a partition.
    ///
    /// CLVs, scalers and matrices start zeroed, frequencies uniform, rate
    /// weights equal, pattern weights one and invariant proportions zero.
    pub fn new(spec: PartitionSpec, map: TipCharacterMap) -> Result<Self> {
        Self::with_config(spec, map, EvaluatorConfig::default())
    }

    pub fn with_config(
        spec: PartitionSpec,
        map: TipCharacterMap,
        config: EvaluatorConfig,
    ) -> Result<Self> {
        if spec.sites == 0 || spec.rate_categories == 0 || spec.states == 0 {
            return Err(EdgelikError::InvalidInput(
                "partition needs positive sites, rate categories and states".into(),
            ));
        }
        if spec.frequency_sets == 0 {
            return Err(EdgelikError::InvalidInput(
                "partition needs at least one frequency set".into(),
            ));
        }
        EdgelikError::check_len("tip map states", spec.states, map.states())?;

        let sp = padded_states(spec.states);
        let clv_len = spec.sites * site_span(spec.rate_categories, spec.states);
        let uniform = vec![1.0 / spec.states as f64; spec.states];
        let sets: Vec<&[f64]> = (0..spec.frequency_sets).map(|_| uniform.as_slice()).collect();

        Ok(Self {
            spec,
            states_padded: sp,
            map,
            tip_codes: vec![Vec::new(); spec.tips],
            clvs: vec![vec![0.0; clv_len]; spec.clv_buffers],
            scalers: vec![vec![0; spec.sites]; spec.scale_buffers],
            pmatrices: vec![vec![0.0; spec.rate_categories * sp * sp]; spec.prob_matrices],
            frequencies: FrequencyTable::new(spec.states, &sets)?,
            rate_weights: vec![1.0 / spec.rate_categories as f64; spec.rate_categories],
            invariant_proportions: vec![0.0; spec.rate_categories],
            invariant_indices: vec![NO_INVARIANT_STATE; spec.sites],
            pattern_weights: vec![1; spec.sites],
            evaluator: EdgeEvaluator::new(config)?,
        })
    }

    pub fn spec(&self) -> &PartitionSpec {
        &self.spec
    }

    pub fn states_padded(&self) -> usize {
        self.states_padded
    }

    pub fn tip_map(&self) -> &TipCharacterMap {
        &self.map
    }

    fn oob(what: &'static str, index: usize, bound: usize) -> EdgelikError {
        EdgelikError::IndexOutOfRange {
            what,
            index: index as i64,
            bound,
        }
    }

    /// Encode and store an aligned sequence for `tip`.
    pub fn set_tip_states(&mut self, tip: usize, sequence: &[u8]) -> Result<()> {
        EdgelikError::check_len("tip sequence", self.spec.sites, sequence.len())?;
        let codes = self.map.encode(sequence)?;
        self.set_tip_codes(tip, codes)
    }

    /// Store already encoded tip codes.
    pub fn set_tip_codes(&mut self, tip: usize, codes: Vec<u8>) -> Result<()> {
        EdgelikError::check_len("tip codes", self.spec.sites, codes.len())?;
        if let Some(&bad) = codes.iter().find(|&&c| !self.map.contains_code(c)) {
            return Err(Self::oob("tip code", bad as usize, self.map.code_count()));
        }
        let bound = self.tip_codes.len();
        let slot = self
            .tip_codes
            .get_mut(tip)
            .ok_or_else(|| Self::oob("tip", tip, bound))?;
        *slot = codes;
        trace!(tip, "tip codes set");
        Ok(())
    }

    pub fn tip_codes(&self, tip: usize) -> Result<&[u8]> {
        self.tip_codes
            .get(tip)
            .map(|c| c.as_slice())
            .ok_or_else(|| Self::oob("tip", tip, self.spec.tips))
    }

    /// Read access to CLV `buffer`.
    pub fn clv(&self, buffer: usize) -> Result<ClvView<'_>> {
        let data = self
            .clvs
            .get(buffer)
            .ok_or_else(|| Self::oob("clv buffer", buffer, self.spec.clv_buffers))?;
        ClvView::new(
            data,
            self.spec.sites,
            self.spec.rate_categories,
            self.states_padded,
        )
    }

    /// Write access to CLV `buffer` for the pruning recursion.
    ///
    /// Layout is site × category × padded state; padding must stay zero.
    pub fn clv_mut(&mut self, buffer: usize) -> Result<&mut [f64]> {
        let bound = self.clvs.len();
        self.clvs
            .get_mut(buffer)
            .map(|v| v.as_mut_slice())
            .ok_or_else(|| Self::oob("clv buffer", buffer, bound))
    }

    pub fn scaler(&self, index: usize) -> Result<&[u32]> {
        self.scalers
            .get(index)
            .map(|v| v.as_slice())
            .ok_or_else(|| Self::oob("scale buffer", index, self.spec.scale_buffers))
    }

    pub fn scaler_mut(&mut self, index: usize) -> Result<&mut [u32]> {
        let bound = self.scalers.len();
        self.scalers
            .get_mut(index)
            .map(|v| v.as_mut_slice())
            .ok_or_else(|| Self::oob("scale buffer", index, bound))
    }

    /// Store the unpadded `states × states` matrix for `category` of matrix
    /// set `index`, row-major.
    pub fn set_pmatrix(&mut self, index: usize, category: usize, rows: &[f64]) -> Result<()> {
        let states = self.spec.states;
        let sp = self.states_padded;
        EdgelikError::check_len("transition matrix", states * states, rows.len())?;
        if category >= self.spec.rate_categories {
            return Err(Self::oob("rate category", category, self.spec.rate_categories));
        }
        let bound = self.pmatrices.len();
        let set = self
            .pmatrices
            .get_mut(index)
            .ok_or_else(|| Self::oob("transition matrix", index, bound))?;
        let matrix = &mut set[category * sp * sp..(category + 1) * sp * sp];
        matrix.fill(0.0);
        for (t, row) in rows.chunks_exact(states).enumerate() {
            matrix[t * sp..t * sp + states].copy_from_slice(row);
        }
        Ok(())
    }

    pub fn set_frequencies(&mut self, index: usize, freqs: &[f64]) -> Result<()> {
        self.frequencies.set(index, freqs)
    }

    pub fn set_category_weights(&mut self, weights: &[f64]) -> Result<()> {
        EdgelikError::check_len("rate weights", self.spec.rate_categories, weights.len())?;
        self.rate_weights.copy_from_slice(weights);
        Ok(())
    }

    /// Invariant proportion per rate category.
    pub fn set_invariant_proportions(&mut self, proportions: &[f64]) -> Result<()> {
        EdgelikError::check_len(
            "invariant proportions",
            self.spec.rate_categories,
            proportions.len(),
        )?;
        if let Some(p) = proportions.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(EdgelikError::InvalidInput(format!(
                "invariant proportion {} outside [0, 1]",
                p
            )));
        }
        self.invariant_proportions.copy_from_slice(proportions);
        Ok(())
    }

    pub fn set_pattern_weights(&mut self, weights: &[u32]) -> Result<()> {
        EdgelikError::check_len("pattern weights", self.spec.sites, weights.len())?;
        self.pattern_weights.copy_from_slice(weights);
        Ok(())
    }

    pub fn invariant_indices(&self) -> &[i32] {
        &self.invariant_indices
    }

    /// Recompute each site's invariant state from the tips.
    ///
    /// A site is invariant when the intersection of all tip bitmasks names
    /// exactly one state; otherwise its index is [`NO_INVARIANT_STATE`].
    /// Every tip must have codes set.
    pub fn update_invariant_indices(&mut self) -> Result<()> {
        if let Some(tip) = self.tip_codes.iter().position(|c| c.is_empty()) {
            return Err(EdgelikError::InvalidInput(format!(
                "tip {} has no states set",
                tip
            )));
        }
        for n in 0..self.spec.sites {
            let common = self
                .tip_codes
                .iter()
                .fold(u64::MAX, |acc, codes| acc & self.map.mask(codes[n]));
            let state = if !self.tip_codes.is_empty() && common.count_ones() == 1 {
                common.trailing_zeros() as i32
            } else {
                NO_INVARIANT_STATE
            };
            self.invariant_indices[n] = state;
        }
        trace!(
            invariant = self.invariant_indices.iter().filter(|&&i| i >= 0).count(),
            "invariant indices updated"
        );
        Ok(())
    }

    /// Borrowed evaluator inputs for `request`.
    pub fn edge_inputs<'a>(&'a self, request: &EdgeRequest<'a>) -> Result<EdgeInputs<'a>> {
        let scaler = |idx: Option<usize>| idx.map(|i| self.scaler(i)).transpose();

        let child = match request.child {
            EdgeChild::Tip(tip) => {
                let codes = self.tip_codes(tip)?;
                if codes.is_empty() {
                    return Err(EdgelikError::InvalidInput(format!(
                        "tip {} has no states set",
                        tip
                    )));
                }
                ChildOperand::Tip {
                    codes,
                    map: &self.map,
                }
            }
            EdgeChild::Clv { buffer, scaler: s } => ChildOperand::Inner {
                clv: self.clv(buffer)?,
                scaler: scaler(s)?,
            },
        };

        let pmatrix = self.pmatrices.get(request.matrix).ok_or_else(|| {
            Self::oob("transition matrix", request.matrix, self.spec.prob_matrices)
        })?;

        let invariant = Some(InvariantSites::new(
            &self.invariant_proportions,
            &self.invariant_indices,
        ))
        .filter(|inv| !inv.is_inactive());

        Ok(EdgeInputs {
            states: self.spec.states,
            parent_clv: self.clv(request.parent_clv)?,
            parent_scaler: scaler(request.parent_scaler)?,
            child,
            pmatrix: TransitionMatrices::new(
                pmatrix,
                self.spec.rate_categories,
                self.states_padded,
            )?,
            frequencies: &self.frequencies,
            categories: RateCategories::new(&self.rate_weights, request.freq_indices)?,
            invariant,
            pattern_weights: &self.pattern_weights,
        })
    }

    /// Log-likelihood of the edge described by `request`.
    pub fn edge_loglikelihood(
        &self,
        request: &EdgeRequest<'_>,
        persite: Option<&mut [f64]>,
    ) -> Result<f64> {
        let inputs = self.edge_inputs(request)?;
        self.evaluator.evaluate_into(&inputs, persite)
    }
}
