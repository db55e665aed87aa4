//! State-space layout shared by CLV producers and the edge kernels.
//!
//! Per-state arrays (CLV blocks, transition-matrix rows, frequency vectors)
//! are padded with zeros up to a multiple of [`BLOCK_WIDTH`] so reductions can
//! run over whole blocks. Padding lanes must be zero; the kernels do not mask
//! them out.

/// Number of lanes in one reduction block.
pub const BLOCK_WIDTH: usize = 4;

/// Largest padded state count a tip bitmask (`u64`) can describe.
pub const MAX_STATES: usize = 64;

/// Round `states` up to the next multiple of [`BLOCK_WIDTH`].
pub const fn padded_states(states: usize) -> usize {
    (states + BLOCK_WIDTH - 1) / BLOCK_WIDTH * BLOCK_WIDTH
}

/// Number of `f64` entries in one site's CLV span (all rate categories).
pub const fn site_span(rate_categories: usize, states: usize) -> usize {
    rate_categories * padded_states(states)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_up() {
        assert_eq!(padded_states(0), 0);
        assert_eq!(padded_states(1), 4);
        assert_eq!(padded_states(4), 4);
        assert_eq!(padded_states(5), 8);
        assert_eq!(padded_states(20), 20);
        assert_eq!(padded_states(61), 64);
    }

    #[test]
    fn site_span_uses_padding() {
        assert_eq!(site_span(4, 4), 16);
        assert_eq!(site_span(2, 5), 16);
    }
}
