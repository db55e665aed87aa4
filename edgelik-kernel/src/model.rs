//! Read-only views over the flat buffers the edge kernels consume.
//!
//! The pruning recursion, the model layer and the alignment layer own their
//! buffers; the kernels only borrow them. Each view pins down the logical
//! shape and stride so the kernels never do raw offset arithmetic.

use edgelik_core::{EdgelikError, Result, BLOCK_WIDTH};

/// Sentinel in [`InvariantSites::indices`] for a site with no invariant state.
pub const NO_INVARIANT_STATE: i32 = -1;

fn check_padding(states_padded: usize) -> Result<()> {
    if states_padded == 0 || states_padded % BLOCK_WIDTH != 0 {
        return Err(EdgelikError::InvalidInput(format!(
            "padded state count {} is not a positive multiple of {}",
            states_padded, BLOCK_WIDTH
        )));
    }
    Ok(())
}

/// A conditional likelihood vector, shaped site × category × state.
///
/// Site-major: the entry for site `n`, category `i`, state `s` lives at
/// `n * rate_categories * states_padded + i * states_padded + s`.
#[derive(Debug, Clone, Copy)]
pub struct ClvView<'a> {
    data: &'a [f64],
    sites: usize,
    rate_categories: usize,
    states_padded: usize,
}

impl<'a> ClvView<'a> {
    /// Wrap `data` as a CLV of the given shape.
    ///
    /// # Errors
    ///
    /// Returns an error if `states_padded` is not a multiple of the block
    /// width or `data` has the wrong length.
    pub fn new(
        data: &'a [f64],
        sites: usize,
        rate_categories: usize,
        states_padded: usize,
    ) -> Result<Self> {
        check_padding(states_padded)?;
        EdgelikError::check_len("clv", sites * rate_categories * states_padded, data.len())?;
        Ok(Self {
            data,
            sites,
            rate_categories,
            states_padded,
        })
    }

    pub fn sites(&self) -> usize {
        self.sites
    }

    pub fn rate_categories(&self) -> usize {
        self.rate_categories
    }

    pub fn states_padded(&self) -> usize {
        self.states_padded
    }

    /// The `states_padded` entries for site `site`, category `category`.
    #[inline]
    pub fn block(&self, site: usize, category: usize) -> &'a [f64] {
        let start = (site * self.rate_categories + category) * self.states_padded;
        &self.data[start..start + self.states_padded]
    }

    /// The whole span of one site (all categories).
    #[inline]
    pub fn site(&self, site: usize) -> &'a [f64] {
        let span = self.rate_categories * self.states_padded;
        &self.data[site * span..(site + 1) * span]
    }
}

/// One transition-probability matrix per rate category, row-major and padded.
///
/// Row `t` of category `i` starts at `i * sp * sp + t * sp` where
/// `sp = states_padded`.
#[derive(Debug, Clone, Copy)]
pub struct TransitionMatrices<'a> {
    data: &'a [f64],
    rate_categories: usize,
    states_padded: usize,
}

impl<'a> TransitionMatrices<'a> {
    /// Wrap `data` as `rate_categories` consecutive padded square matrices.
    pub fn new(data: &'a [f64], rate_categories: usize, states_padded: usize) -> Result<Self> {
        check_padding(states_padded)?;
        EdgelikError::check_len(
            "transition matrices",
            rate_categories * states_padded * states_padded,
            data.len(),
        )?;
        Ok(Self {
            data,
            rate_categories,
            states_padded,
        })
    }

    pub fn rate_categories(&self) -> usize {
        self.rate_categories
    }

    pub fn states_padded(&self) -> usize {
        self.states_padded
    }

    /// The full padded matrix for `category`.
    #[inline]
    pub fn matrix(&self, category: usize) -> &'a [f64] {
        let size = self.states_padded * self.states_padded;
        &self.data[category * size..(category + 1) * size]
    }

    /// Row `row` of the matrix for `category`.
    #[inline]
    pub fn row(&self, category: usize, row: usize) -> &'a [f64] {
        let start = (category * self.states_padded + row) * self.states_padded;
        &self.data[start..start + self.states_padded]
    }
}

/// Stationary frequency vectors, each zero-padded to `states_padded`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencyTable {
    states: usize,
    states_padded: usize,
    sets: Vec<Vec<f64>>,
}

impl FrequencyTable {
    /// Build a table from unpadded frequency vectors of `states` entries each.
    ///
    /// Vectors are copied and zero-padded to the block width.
    pub fn new(states: usize, sets: &[&[f64]]) -> Result<Self> {
        if states == 0 {
            return Err(EdgelikError::InvalidInput("state count must be positive".into()));
        }
        let states_padded = edgelik_core::padded_states(states);
        let mut padded = Vec::with_capacity(sets.len());
        for set in sets {
            EdgelikError::check_len("frequency vector", states, set.len())?;
            let mut v = vec![0.0; states_padded];
            v[..states].copy_from_slice(set);
            padded.push(v);
        }
        Ok(Self {
            states,
            states_padded,
            sets: padded,
        })
    }

    /// A single uniform frequency vector over `states`.
    pub fn uniform(states: usize) -> Result<Self> {
        let freqs = vec![1.0 / states.max(1) as f64; states];
        Self::new(states, &[&freqs])
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn states_padded(&self) -> usize {
        self.states_padded
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Frequency vector `index`, padded.
    pub fn get(&self, index: usize) -> Result<&[f64]> {
        self.sets
            .get(index)
            .map(|v| v.as_slice())
            .ok_or(EdgelikError::IndexOutOfRange {
                what: "frequency set",
                index: index as i64,
                bound: self.sets.len(),
            })
    }

    /// Replace vector `index` with unpadded `freqs`.
    pub fn set(&mut self, index: usize, freqs: &[f64]) -> Result<()> {
        EdgelikError::check_len("frequency vector", self.states, freqs.len())?;
        let bound = self.sets.len();
        let slot = self.sets.get_mut(index).ok_or(EdgelikError::IndexOutOfRange {
            what: "frequency set",
            index: index as i64,
            bound,
        })?;
        slot.fill(0.0);
        slot[..freqs.len()].copy_from_slice(freqs);
        Ok(())
    }

    /// Unchecked access for the kernels; indices are validated up front.
    #[inline]
    pub(crate) fn vector(&self, index: usize) -> &[f64] {
        &self.sets[index]
    }
}

/// Rate-category weights and the frequency set each category uses.
#[derive(Debug, Clone, Copy)]
pub struct RateCategories<'a> {
    pub weights: &'a [f64],
    pub freq_indices: &'a [usize],
}

impl<'a> RateCategories<'a> {
    pub fn new(weights: &'a [f64], freq_indices: &'a [usize]) -> Result<Self> {
        if weights.is_empty() {
            return Err(EdgelikError::InvalidInput(
                "at least one rate category is required".into(),
            ));
        }
        EdgelikError::check_len("frequency indices", weights.len(), freq_indices.len())?;
        Ok(Self {
            weights,
            freq_indices,
        })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Invariant-sites mixture parameters.
///
/// `proportions[i]` is the invariant proportion of rate category `i`;
/// `indices[n]` names the invariant state of site `n` or is
/// [`NO_INVARIANT_STATE`].
#[derive(Debug, Clone, Copy)]
pub struct InvariantSites<'a> {
    pub proportions: &'a [f64],
    pub indices: &'a [i32],
}

impl<'a> InvariantSites<'a> {
    pub fn new(proportions: &'a [f64], indices: &'a [i32]) -> Self {
        Self {
            proportions,
            indices,
        }
    }

    /// True when no category carries an invariant component.
    pub fn is_inactive(&self) -> bool {
        self.proportions.iter().all(|&p| p <= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clv_strides() {
        // 2 sites, 2 categories, 4 states
        let data: Vec<f64> = (0..16).map(|v| v as f64).collect();
        let clv = ClvView::new(&data, 2, 2, 4).unwrap();
        assert_eq!(clv.block(0, 0), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(clv.block(0, 1), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(clv.block(1, 1), &[12.0, 13.0, 14.0, 15.0]);
        assert_eq!(clv.site(1).len(), 8);
    }

    #[test]
    fn clv_wrong_length() {
        let data = vec![0.0; 15];
        assert!(matches!(
            ClvView::new(&data, 2, 2, 4),
            Err(EdgelikError::DimensionMismatch { expected: 16, actual: 15, .. })
        ));
    }

    #[test]
    fn clv_bad_padding() {
        let data = vec![0.0; 6];
        assert!(ClvView::new(&data, 1, 2, 3).is_err());
    }

    #[test]
    fn matrix_rows() {
        let data: Vec<f64> = (0..32).map(|v| v as f64).collect();
        let pm = TransitionMatrices::new(&data, 2, 4).unwrap();
        assert_eq!(pm.row(0, 1), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(pm.row(1, 0), &[16.0, 17.0, 18.0, 19.0]);
        assert_eq!(pm.matrix(1).len(), 16);
    }

    #[test]
    fn frequency_table_pads() {
        let f = [0.2, 0.3, 0.5];
        let table = FrequencyTable::new(3, &[&f]).unwrap();
        assert_eq!(table.states_padded(), 4);
        assert_eq!(table.get(0).unwrap(), &[0.2, 0.3, 0.5, 0.0]);
        assert!(matches!(
            table.get(1),
            Err(EdgelikError::IndexOutOfRange { index: 1, bound: 1, .. })
        ));
    }

    #[test]
    fn frequency_table_set_clears_padding() {
        let mut table = FrequencyTable::uniform(4).unwrap();
        table.set(0, &[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(table.get(0).unwrap(), &[0.1, 0.2, 0.3, 0.4]);
        assert!(table.set(0, &[0.1; 5]).is_err());
        assert!(table.set(0, &[0.5, 0.5]).is_err());
        assert!(table.set(2, &[0.25; 4]).is_err());
    }

    #[test]
    fn rate_categories_lengths() {
        let w = [0.5, 0.5];
        assert!(RateCategories::new(&w, &[0, 0]).is_ok());
        assert!(RateCategories::new(&w, &[0]).is_err());
        assert!(RateCategories::new(&[], &[]).is_err());
    }

    #[test]
    fn invariant_inactive() {
        let idx = [0, NO_INVARIANT_STATE];
        assert!(InvariantSites::new(&[0.0, 0.0], &idx).is_inactive());
        assert!(!InvariantSites::new(&[0.0, 0.2], &idx).is_inactive());
    }
}
