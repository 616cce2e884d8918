//! Active classification-tree (Kearns–Vazirani style) learning over the `automata` crate's
//! exported automaton types, plus an in-memory passive-sample model used to feed
//! [`automata::pta`] and [`automata::gsm`].
//!
//! The active side treats a [`automata::automaton::MooreMachine`] as its one hypothesis shape:
//! taking `Output = bool` learns a DFA (see [`active::oracle`]'s doc comment), any other output
//! type learns a general Moore machine.

pub mod active;
pub mod passive;
