//! Edge log-likelihood evaluation: validation, strategy selection and
//! (optionally parallel) execution over sites.

use std::ops::Range;

use edgelik_core::{padded_states, EdgelikError, Result, ScaleConfig, MAX_STATES};
use tracing::{debug, trace};

use crate::contribution::{ClvSource, TipSource};
use crate::kernel::{fixed4, generic};
use crate::model::{
    ClvView, FrequencyTable, InvariantSites, RateCategories, TransitionMatrices,
    NO_INVARIANT_STATE,
};
use crate::tipmap::TipCharacterMap;

/// The child end of the edge.
#[derive(Debug, Clone, Copy)]
pub enum ChildOperand<'a> {
    /// A tip: one compact code per site, resolved through `map`.
    Tip {
        codes: &'a [u8],
        map: &'a TipCharacterMap,
    },
    /// An inner node with its CLV and optional per-site scale counts.
    Inner {
        clv: ClvView<'a>,
        scaler: Option<&'a [u32]>,
    },
}

impl ChildOperand<'_> {
    pub fn is_tip(&self) -> bool {
        matches!(self, ChildOperand::Tip { .. })
    }
}

/// Everything one edge evaluation reads.
#[derive(Debug, Clone, Copy)]
pub struct EdgeInputs<'a> {
    /// Unpadded model state count.
    pub states: usize,
    pub parent_clv: ClvView<'a>,
    pub parent_scaler: Option<&'a [u32]>,
    pub child: ChildOperand<'a>,
    pub pmatrix: TransitionMatrices<'a>,
    pub frequencies: &'a FrequencyTable,
    pub categories: RateCategories<'a>,
    pub invariant: Option<InvariantSites<'a>>,
    pub pattern_weights: &'a [u32],
}

impl EdgeInputs<'_> {
    pub fn sites(&self) -> usize {
        self.parent_clv.sites()
    }

    pub fn states_padded(&self) -> usize {
        self.parent_clv.states_padded()
    }
}

/// Which kernel evaluates an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    TipFixed4,
    TipGeneric,
    InnerFixed4,
    InnerGeneric,
}

impl Strategy {
    /// Pick the kernel for `inputs`: the unrolled 4-state path when the model
    /// has exactly four unpadded states and `allow_fixed4` is set.
    pub fn select(inputs: &EdgeInputs<'_>, allow_fixed4: bool) -> Self {
        let fixed4 = allow_fixed4 && inputs.states == 4 && inputs.states_padded() == 4;
        match (inputs.child.is_tip(), fixed4) {
            (true, true) => Strategy::TipFixed4,
            (true, false) => Strategy::TipGeneric,
            (false, true) => Strategy::InnerFixed4,
            (false, false) => Strategy::InnerGeneric,
        }
    }
}

/// How much input checking happens before a kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Validation {
    /// Shapes, lengths and every index into a table.
    #[default]
    Shapes,
    /// Shapes plus value ranges: finite non-negative weights and frequencies,
    /// proportions in `[0, 1]`, positive pattern weights, zero padding.
    Strict,
}

/// Evaluator configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvaluatorConfig {
    /// Rescaling threshold; must match the one the CLV producer used.
    pub scale: ScaleConfig,
    pub validation: Validation,
    /// Use the unrolled 4-state kernels when applicable.
    pub allow_fixed4: bool,
    /// Minimum site count before work is split across the rayon pool.
    /// Only consulted with the `parallel` feature.
    pub parallel_min_sites: usize,
    /// Sites per parallel work item.
    pub parallel_chunk_sites: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            scale: ScaleConfig::default(),
            validation: Validation::Shapes,
            allow_fixed4: true,
            parallel_min_sites: 4096,
            parallel_chunk_sites: 1024,
        }
    }
}

/// Result of [`EdgeEvaluator::evaluate_with_sites`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeLikelihood {
    pub total: f64,
    pub per_site: Option<Vec<f64>>,
    pub strategy: Strategy,
}

/// Evaluates edge log-likelihoods with a fixed configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeEvaluator {
    config: EvaluatorConfig,
}

impl EdgeEvaluator {
    /// Create an evaluator.
    ///
    /// # Errors
    ///
    /// Returns an error if `parallel_chunk_sites` is zero.
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        if config.parallel_chunk_sites == 0 {
            return Err(EdgelikError::InvalidInput(
                "parallel_chunk_sites must be positive".into(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Total log-likelihood of the edge.
    pub fn evaluate(&self, inputs: &EdgeInputs<'_>) -> Result<f64> {
        self.evaluate_into(inputs, None)
    }

    /// Total log-likelihood, writing per-site values into `persite`.
    ///
    /// `persite`, when given, must hold exactly one entry per site.
    pub fn evaluate_into(&self, inputs: &EdgeInputs<'_>, persite: Option<&mut [f64]>) -> Result<f64> {
        let sites = inputs.sites();
        if let Some(out) = persite.as_deref() {
            EdgelikError::check_len("per-site output", sites, out.len())?;
        }
        self.validate(inputs)?;

        let strategy = Strategy::select(inputs, self.config.allow_fixed4);
        trace!(?strategy, sites, rate_categories = inputs.categories.len(), "evaluating edge");

        let total = self.run(inputs, strategy, persite);
        if !total.is_finite() {
            debug!(?strategy, total, "edge log-likelihood is not finite");
        }
        Ok(total)
    }

    /// Total and, if `want_persite`, per-site log-likelihoods.
    pub fn evaluate_with_sites(
        &self,
        inputs: &EdgeInputs<'_>,
        want_persite: bool,
    ) -> Result<EdgeLikelihood> {
        let strategy = Strategy::select(inputs, self.config.allow_fixed4);
        if want_persite {
            let mut buf = vec![0.0; inputs.sites()];
            let total = self.evaluate_into(inputs, Some(&mut buf))?;
            Ok(EdgeLikelihood {
                total,
                per_site: Some(buf),
                strategy,
            })
        } else {
            Ok(EdgeLikelihood {
                total: self.evaluate(inputs)?,
                per_site: None,
                strategy,
            })
        }
    }

    /// Log-likelihood summed over `range` only, on the calling thread.
    ///
    /// Lets callers distribute sites over their own workers. `persite`, when
    /// given, must have `range.len()` entries; entry 0 is site `range.start`.
    pub fn evaluate_range(
        &self,
        inputs: &EdgeInputs<'_>,
        range: Range<usize>,
        persite: Option<&mut [f64]>,
    ) -> Result<f64> {
        if range.start > range.end || range.end > inputs.sites() {
            return Err(EdgelikError::InvalidInput(format!(
                "site range {}..{} outside 0..{}",
                range.start,
                range.end,
                inputs.sites()
            )));
        }
        if let Some(out) = persite.as_deref() {
            EdgelikError::check_len("per-site output", range.len(), out.len())?;
        }
        self.validate_model(inputs)?;
        self.validate_sites(inputs, range.clone())?;

        let strategy = Strategy::select(inputs, self.config.allow_fixed4);
        Ok(self.run_range(inputs, strategy, range, persite))
    }

    /// Check `inputs` against every precondition the kernels rely on.
    pub fn validate(&self, inputs: &EdgeInputs<'_>) -> Result<()> {
        self.validate_model(inputs)?;
        self.validate_sites(inputs, 0..inputs.sites())
    }

    /// Checks independent of the site count: shapes and table indices.
    fn validate_model(&self, inputs: &EdgeInputs<'_>) -> Result<()> {
        let sites = inputs.sites();
        let cats = inputs.categories.len();
        let sp = inputs.states_padded();

        if sites == 0 {
            return Err(EdgelikError::InvalidInput("edge has no sites".into()));
        }
        if inputs.states == 0 {
            return Err(EdgelikError::InvalidInput("state count must be positive".into()));
        }
        EdgelikError::check_len("padded states", padded_states(inputs.states), sp)?;
        EdgelikError::check_len("parent rate categories", cats, inputs.parent_clv.rate_categories())?;
        EdgelikError::check_len("transition matrix categories", cats, inputs.pmatrix.rate_categories())?;
        EdgelikError::check_len("transition matrix states", sp, inputs.pmatrix.states_padded())?;
        EdgelikError::check_len("frequency states", inputs.states, inputs.frequencies.states())?;
        EdgelikError::check_len("pattern weights", sites, inputs.pattern_weights.len())?;
        if let Some(scaler) = inputs.parent_scaler {
            EdgelikError::check_len("parent scaler", sites, scaler.len())?;
        }

        for &fi in inputs.categories.freq_indices {
            if fi >= inputs.frequencies.len() {
                return Err(EdgelikError::IndexOutOfRange {
                    what: "frequency set",
                    index: fi as i64,
                    bound: inputs.frequencies.len(),
                });
            }
        }

        match inputs.child {
            ChildOperand::Tip { codes, map } => {
                EdgelikError::check_len("tip codes", sites, codes.len())?;
                EdgelikError::check_len("tip map states", inputs.states, map.states())?;
                if sp > MAX_STATES {
                    return Err(EdgelikError::InvalidInput(format!(
                        "tip bitmasks cover at most {} states, got {}",
                        MAX_STATES, sp
                    )));
                }
            }
            ChildOperand::Inner { clv, scaler } => {
                EdgelikError::check_len("child sites", sites, clv.sites())?;
                EdgelikError::check_len("child rate categories", cats, clv.rate_categories())?;
                EdgelikError::check_len("child states", sp, clv.states_padded())?;
                if let Some(scaler) = scaler {
                    EdgelikError::check_len("child scaler", sites, scaler.len())?;
                }
            }
        }

        if let Some(inv) = inputs.invariant {
            EdgelikError::check_len("invariant proportions", cats, inv.proportions.len())?;
            EdgelikError::check_len("invariant indices", sites, inv.indices.len())?;
        }

        if self.config.validation == Validation::Strict {
            self.validate_values(inputs)?;
        }
        Ok(())
    }

    /// Per-site index checks over `range`.
    fn validate_sites(&self, inputs: &EdgeInputs<'_>, range: Range<usize>) -> Result<()> {
        let sp = inputs.states_padded();

        if let ChildOperand::Tip { codes, map } = inputs.child {
            for (n, &code) in codes[range.clone()].iter().enumerate() {
                if (code as usize) < map.code_count() && !map.contains_code(code) {
                    return Err(EdgelikError::InvalidInput(format!(
                        "tip code {} at site {} allows no state",
                        code,
                        range.start + n
                    )));
                }
                if !map.contains_code(code) {
                    return Err(EdgelikError::IndexOutOfRange {
                        what: "tip code",
                        index: code as i64,
                        bound: map.code_count(),
                    });
                }
            }
        }

        if let Some(inv) = inputs.invariant {
            for &idx in &inv.indices[range.clone()] {
                if idx != NO_INVARIANT_STATE && (idx < 0 || idx as usize >= sp) {
                    return Err(EdgelikError::IndexOutOfRange {
                        what: "invariant state",
                        index: idx as i64,
                        bound: sp,
                    });
                }
            }
        }

        if self.config.validation == Validation::Strict {
            if let Some(n) = inputs.pattern_weights[range.clone()]
                .iter()
                .position(|&w| w == 0)
            {
                return Err(EdgelikError::InvalidInput(format!(
                    "pattern weight of site {} is zero",
                    range.start + n
                )));
            }
        }
        Ok(())
    }

    fn validate_values(&self, inputs: &EdgeInputs<'_>) -> Result<()> {
        let states = inputs.states;
        let sp = inputs.states_padded();
        let bad = |what: &str, i: usize, v: f64| {
            EdgelikError::InvalidInput(format!("{} {} has invalid value {}", what, i, v))
        };

        for (i, &w) in inputs.categories.weights.iter().enumerate() {
            if !w.is_finite() || w < 0.0 {
                return Err(bad("rate weight", i, w));
            }
        }
        if let Some(inv) = inputs.invariant {
            for (i, &p) in inv.proportions.iter().enumerate() {
                if !(0.0..=1.0).contains(&p) {
                    return Err(bad("invariant proportion", i, p));
                }
            }
        }
        for &fi in inputs.categories.freq_indices {
            let freqs = inputs.frequencies.vector(fi);
            for (s, &f) in freqs.iter().enumerate() {
                let ok = if s < states { f.is_finite() && f >= 0.0 } else { f == 0.0 };
                if !ok {
                    return Err(bad("frequency entry", s, f));
                }
            }
        }
        for i in 0..inputs.categories.len() {
            let pmat = inputs.pmatrix.matrix(i);
            for (k, &p) in pmat.iter().enumerate() {
                let (row, col) = (k / sp, k % sp);
                let ok = if row < states && col < states {
                    p.is_finite() && p >= 0.0
                } else {
                    p == 0.0
                };
                if !ok {
                    return Err(bad("transition matrix entry", k, p));
                }
            }
        }
        Ok(())
    }

    fn run(&self, inputs: &EdgeInputs<'_>, strategy: Strategy, persite: Option<&mut [f64]>) -> f64 {
        #[cfg(feature = "parallel")]
        {
            if inputs.sites() >= self.config.parallel_min_sites {
                return self.run_parallel(inputs, strategy, persite);
            }
        }
        self.run_range(inputs, strategy, 0..inputs.sites(), persite)
    }

    /// Chunks are summed in site order, so results do not depend on
    /// scheduling.
    #[cfg(feature = "parallel")]
    fn run_parallel(
        &self,
        inputs: &EdgeInputs<'_>,
        strategy: Strategy,
        persite: Option<&mut [f64]>,
    ) -> f64 {
        use rayon::prelude::*;

        let sites = inputs.sites();
        let chunk = self.config.parallel_chunk_sites;
        let partials: Vec<f64> = match persite {
            Some(out) => out
                .par_chunks_mut(chunk)
                .enumerate()
                .map(|(c, buf)| {
                    let start = c * chunk;
                    self.run_range(inputs, strategy, start..start + buf.len(), Some(buf))
                })
                .collect(),
            None => (0..sites.div_ceil(chunk))
                .into_par_iter()
                .map(|c| {
                    let start = c * chunk;
                    let end = (start + chunk).min(sites);
                    self.run_range(inputs, strategy, start..end, None)
                })
                .collect(),
        };
        partials.iter().sum()
    }

    fn run_range(
        &self,
        inputs: &EdgeInputs<'_>,
        strategy: Strategy,
        range: Range<usize>,
        persite: Option<&mut [f64]>,
    ) -> f64 {
        let ln_threshold = self.config.scale.ln_threshold();
        match (strategy, inputs.child) {
            (Strategy::TipFixed4, ChildOperand::Tip { codes, map }) => {
                fixed4::tip_range(inputs, codes, map, ln_threshold, range, persite)
            }
            (Strategy::InnerFixed4, ChildOperand::Inner { clv, scaler }) => {
                fixed4::inner_range(inputs, &clv, scaler, ln_threshold, range, persite)
            }
            (_, ChildOperand::Tip { codes, map }) => generic::edge_loglikelihood_range(
                inputs,
                &TipSource::new(codes, map),
                ln_threshold,
                range,
                persite,
            ),
            (_, ChildOperand::Inner { clv, scaler }) => generic::edge_loglikelihood_range(
                inputs,
                &ClvSource::new(clv, scaler),
                ln_threshold,
                range,
                persite,
            ),
        }
    }
}

/// Evaluate an edge with the default configuration.
pub fn edge_loglikelihood(inputs: &EdgeInputs<'_>, persite: Option<&mut [f64]>) -> Result<f64> {
    EdgeEvaluator::default().evaluate_into(inputs, persite)
}
