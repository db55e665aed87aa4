//! Shared primitives for the edgelik phylogenetic likelihood crates.
//!
//! `edgelik-core` holds the pieces every producer and consumer of conditional
//! likelihood vectors has to agree on:
//!
//! - **Error types**: [`EdgelikError`] and [`Result`] for structured error handling
//! - **Layout**: state-count padding to the blocking width ([`layout`])
//! - **Scaling**: the underflow rescaling threshold and its log-space
//!   correction ([`scaling`])

pub mod error;
pub mod layout;
pub mod scaling;

pub use error::{EdgelikError, Result};
pub use layout::{padded_states, site_span, BLOCK_WIDTH, MAX_STATES};
pub use scaling::{ScaleConfig, SCALE_EXPONENT, SCALE_FACTOR, SCALE_THRESHOLD};
