//! Shared primitives used by `automata` and `automata-learning`: the input-alphabet
//! abstraction, finite words, a `Show` trait for compact pretty-printing, and a couple of
//! ordered-collection aliases so both downstream crates agree on iteration order.

pub mod alphabet;
pub mod math;
pub mod word;

mod show;
mod void;

pub use show::Show;
pub use void::Void;
