//! The passive side: turning a sample of observed traces into a merged automaton via
//! [`automata::gsm::Gsm`].

pub mod sample;

pub use sample::{alergia, Sample, Trace};
