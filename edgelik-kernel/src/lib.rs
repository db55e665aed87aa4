//! Edge log-likelihood kernels for phylogenetic pruning.
//!
//! The final reduction of Felsenstein's pruning algorithm: given the
//! conditional likelihood vector (CLV) of a parent node, the child operand
//! (a tip's observed characters or an inner node's CLV), one transition
//! matrix per rate category and the model's frequencies, compute the
//! log-likelihood of the edge.
//!
//! - **Views**: [`ClvView`], [`TransitionMatrices`], [`FrequencyTable`] and
//!   friends pin down the layout of the flat input buffers
//! - **Tips**: [`TipCharacterMap`] resolves compact per-site codes to
//!   ambiguity bitmasks
//! - **Kernels**: four strategies (tip/inner × 4-state/generic) sharing one
//!   per-site formula, selected by [`Strategy::select`]
//! - **Evaluator**: [`EdgeEvaluator`] validates inputs, dispatches, and with
//!   the `parallel` feature spreads sites over the rayon pool
//! - **Partition**: [`Partition`] owns the buffers of one alignment
//!   partition and evaluates edges by buffer index
//!
//! Zero site likelihoods are not errors: they yield `-inf` and evaluation
//! continues.

pub mod contribution;
pub mod evaluate;
pub mod kernel;
pub mod model;
pub mod partition;
pub mod tipmap;

pub use contribution::{ChildContribution, ClvSource, TipSource};
pub use edgelik_core::{EdgelikError, Result, ScaleConfig, SCALE_THRESHOLD};
pub use evaluate::{
    edge_loglikelihood, ChildOperand, EdgeEvaluator, EdgeInputs, EdgeLikelihood,
    EvaluatorConfig, Strategy, Validation,
};
pub use model::{
    ClvView, FrequencyTable, InvariantSites, RateCategories, TransitionMatrices,
    NO_INVARIANT_STATE,
};
pub use partition::{EdgeChild, EdgeRequest, Partition, PartitionSpec};
pub use tipmap::TipCharacterMap;
