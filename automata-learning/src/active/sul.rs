//! The system-under-learning capability trait plus a handful of concrete adapters.

use std::hash::Hash;
use std::marker::PhantomData;

use automata::automaton::{Dfa, MooreMachine};

/// A system under learning: something that can be reset and stepped one symbol at a time.
/// [`Sul::query`] and [`Sul::classify`] are convenience methods built from
/// [`Sul::reset`]/[`Sul::step`]/[`Sul::output`]; implementors only need to provide those three.
pub trait Sul {
    type Input: Clone + Eq + Hash;
    type Output: Clone + Eq;

    fn reset(&mut self);
    fn step(&mut self, input: &Self::Input) -> Self::Output;

    /// The output of the current state, without consuming any input. Together with `step` this
    /// gives a well-defined classification for the empty word: `reset` then `output` is the
    /// initial state's own output.
    fn output(&mut self) -> Self::Output;

    /// Resets, then steps through every symbol of `seq`. The length of the result equals the
    /// length of `seq`; for accepting/rejecting systems only the last element is meaningful.
    fn query(&mut self, seq: &[Self::Input]) -> Vec<Self::Output> {
        self.reset();
        seq.iter().map(|symbol| self.step(symbol)).collect()
    }

    /// Classifies a whole word, including the empty word, as a single output: the output of the
    /// state reached after reading `word` in full, starting from a reset. Prefer this over
    /// `query(..).pop()`, which is undefined for an empty word.
    fn classify(&mut self, word: &[Self::Input]) -> Self::Output {
        self.reset();
        let mut last = self.output();
        for symbol in word {
            last = self.step(symbol);
        }
        last
    }
}

/// A SUL backed by a plain closure over the accumulated prefix. Cheap to build for tests and
/// demos; `state` tracks the prefix read so far since reset.
pub struct FunctionSul<I, O, F> {
    state: Vec<I>,
    f: F,
    _marker: PhantomData<O>,
}

impl<I, O, F> FunctionSul<I, O, F>
where
    F: Fn(&[I]) -> O,
{
    pub fn new(f: F) -> Self {
        Self {
            state: Vec::new(),
            f,
            _marker: PhantomData,
        }
    }
}

impl<I, O, F> Sul for FunctionSul<I, O, F>
where
    I: Clone + Eq + Hash,
    O: Clone + Eq,
    F: Fn(&[I]) -> O,
{
    type Input = I;
    type Output = O;

    fn reset(&mut self) {
        self.state.clear();
    }

    fn step(&mut self, input: &I) -> O {
        self.state.push(input.clone());
        (self.f)(&self.state)
    }

    fn output(&mut self) -> O {
        (self.f)(&self.state)
    }
}

/// A SUL backed by an already-learned (or hand-built) [`MooreMachine`]. Used to build demos and
/// to cross-check a learner against a known-good target.
pub struct MooreSul<I, O> {
    machine: MooreMachine<I, O>,
    current: automata::automaton::StateId,
}

impl<I, O> MooreSul<I, O> {
    pub fn new(machine: MooreMachine<I, O>) -> Self {
        let current = machine.initial;
        Self { machine, current }
    }
}

impl<I, O> Sul for MooreSul<I, O>
where
    I: Clone + Eq + Hash,
    O: Clone + Eq,
{
    type Input = I;
    type Output = O;

    fn reset(&mut self) {
        self.current = self.machine.initial;
    }

    fn step(&mut self, input: &I) -> O {
        self.current = self
            .machine
            .transitions
            .get(&(self.current, input.clone()))
            .copied()
            .expect("MooreSul requires a complete machine");
        self.machine
            .output_of(self.current)
            .cloned()
            .expect("every state of a MooreMachine has an output")
    }

    fn output(&mut self) -> O {
        self.machine
            .output_of(self.current)
            .cloned()
            .expect("every state of a MooreMachine has an output")
    }
}

/// A SUL backed by a [`Dfa`]: `step` returns the accepting bit of the state reached so far.
pub struct DfaSul<I> {
    dfa: Dfa<I>,
    current: automata::automaton::StateId,
}

impl<I> DfaSul<I> {
    pub fn new(dfa: Dfa<I>) -> Self {
        let current = dfa.initial;
        Self { dfa, current }
    }
}

impl<I> Sul for DfaSul<I>
where
    I: Clone + Eq + Hash,
{
    type Input = I;
    type Output = bool;

    fn reset(&mut self) {
        self.current = self.dfa.initial;
    }

    fn step(&mut self, input: &I) -> bool {
        self.current = self
            .dfa
            .transitions
            .get(&(self.current, input.clone()))
            .copied()
            .expect("DfaSul requires a complete DFA");
        self.dfa.is_accepting(self.current)
    }

    fn output(&mut self) -> bool {
        self.dfa.is_accepting(self.current)
    }
}
