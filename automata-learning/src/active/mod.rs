//! The active, classification-tree-based learner: [`Sul`]/[`Oracle`] collaborators, a memoizing
//! [`cache::CacheSul`], the [`classification_tree::ClassificationTree`] itself, and the
//! [`kv::Kv`] main loop tying them together.

pub mod cache;
pub mod classification_tree;
pub mod kv;
pub mod oracle;
pub mod sul;

use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

pub use cache::CacheSul;
pub use classification_tree::{ClassificationTree, CtNode, CtNodeId};
pub use kv::{CexProcessing, Kv};
pub use oracle::Oracle;
pub use sul::Sul;

/// Raised by [`CacheSul`] when the wrapped [`Sul`] answers the same query differently on two
/// separate occasions.
#[derive(Debug, Error)]
#[error(
    "non-deterministic SUL: prefix {prefix:?} previously produced {expected:?}, now produced {observed:?}"
)]
pub struct SulError<I: Debug, O: Debug> {
    pub prefix: Vec<I>,
    pub expected: O,
    pub observed: O,
}

/// Fatal or budget-exhaustion conditions raised by [`Kv::run`].
#[derive(Debug, Error)]
pub enum KvError<I: Debug + Eq + Hash, O: Debug> {
    /// The oracle claimed a counterexample that the hypothesis and a re-check against the SUL
    /// don't actually agree is a disagreement. Indicates a buggy oracle.
    #[error("oracle returned a counterexample {counterexample:?} that does not reproduce")]
    OracleMismatch { counterexample: Vec<I> },
    /// `max_learning_rounds` was reached. Not fatal: [`Kv::run`] returns the partial hypothesis
    /// alongside this as a diagnostic rather than unwinding.
    #[error("learning budget exhausted after {rounds} rounds, hypothesis has {hypothesis_size} states")]
    BudgetExhausted { rounds: usize, hypothesis_size: usize },
    #[error("invalid KV configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    Sul(#[from] SulError<I, O>),
}
