//! Prefix-tree acceptors, generalized state merging and automaton export.
//!
//! This crate owns the mutable, arena-based graph that the passive learner operates on (see
//! [`pta`]), the red/blue state-merging search over that graph (see [`gsm`]), and the code that
//! turns a merged graph into a plain named-state-machine (see [`automaton`]). The active
//! classification-tree learner lives one crate up, in `automata-learning`, and depends on the
//! automaton types defined here.

pub mod automaton;
pub mod gsm;
pub mod pta;

pub use automata_core::{Show, Void, alphabet, math, word};
