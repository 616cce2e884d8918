//! A minimally adequate teacher (MAT) answers equivalence queries: given a hypothesis, either
//! confirm it or hand back a counterexample the hypothesis gets wrong.
//!
//! This trait is deliberately generic over the hypothesis's output type so the same machinery
//! learns a DFA (`Output = bool`) or a general Moore machine (any other output).

use std::hash::Hash;

use automata::automaton::MooreMachine;
use rand::Rng;
use rand::seq::IteratorRandom;
use tracing::trace;

use super::sul::Sul;

pub trait Oracle {
    type Input: Clone + Eq + Hash;
    type Output: Clone + Eq;

    /// Returns `Some(counterexample)` when `hypothesis` disagrees with this oracle's notion of
    /// ground truth on that word, `None` if the oracle could not find one (for a bounded oracle
    /// this is not a soundness guarantee, only "none found within budget").
    fn find_cex(&mut self, hypothesis: &MooreMachine<Self::Input, Self::Output>) -> Option<Vec<Self::Input>>;
}

/// An oracle that checks a hypothesis against a fixed, finite sample of known `(word, output)`
/// pairs. Returns the first disagreement found, in sample order.
#[derive(Debug, Clone)]
pub struct SampleOracle<I, O> {
    words: Vec<(Vec<I>, O)>,
}

impl<I, O> SampleOracle<I, O> {
    pub fn new(words: impl IntoIterator<Item = (Vec<I>, O)>) -> Self {
        Self {
            words: words.into_iter().collect(),
        }
    }
}

impl<I, O> Oracle for SampleOracle<I, O>
where
    I: Clone + Eq + Hash,
    O: Clone + Eq,
{
    type Input = I;
    type Output = O;

    fn find_cex(&mut self, hypothesis: &MooreMachine<I, O>) -> Option<Vec<I>> {
        self.words.iter().find_map(|(word, expected)| {
            let state = hypothesis.run(word)?;
            let actual = hypothesis.output_of(state)?;
            (actual != expected).then(|| word.clone())
        })
    }
}

/// An oracle that performs bounded random walks against a [`Sul`], comparing its output to the
/// hypothesis after each step. Mirrors the teacher's seeded, bounded testing idiom rather than
/// doing unbounded exhaustive search.
pub struct RandomWalkOracle<S: Sul> {
    sul: S,
    alphabet: Vec<S::Input>,
    num_walks: usize,
    max_walk_len: usize,
    reset_probability: f64,
}

impl<S: Sul> RandomWalkOracle<S> {
    pub fn new(sul: S, alphabet: Vec<S::Input>, num_walks: usize, max_walk_len: usize) -> Self {
        Self {
            sul,
            alphabet,
            num_walks,
            max_walk_len,
            reset_probability: 0.05,
        }
    }

    pub fn reset_probability(mut self, p: f64) -> Self {
        self.reset_probability = p;
        self
    }
}

impl<S> Oracle for RandomWalkOracle<S>
where
    S: Sul,
    S::Input: Clone + Eq + Hash,
    S::Output: Clone + Eq,
{
    type Input = S::Input;
    type Output = S::Output;

    fn find_cex(&mut self, hypothesis: &MooreMachine<S::Input, S::Output>) -> Option<Vec<S::Input>> {
        let mut rng = rand::thread_rng();

        for walk in 0..self.num_walks {
            self.sul.reset();
            let mut prefix = Vec::new();
            let mut state = hypothesis.initial;

            for _ in 0..self.max_walk_len {
                let Some(symbol) = self.alphabet.iter().choose(&mut rng) else {
                    return None;
                };
                prefix.push(symbol.clone());
                let observed = self.sul.step(symbol);
                let Some(next) = hypothesis.transitions.get(&(state, symbol.clone())).copied() else {
                    trace!(walk, ?prefix, "hypothesis incomplete, treating as counterexample");
                    return Some(prefix);
                };
                state = next;
                let expected = hypothesis.output_of(state);
                if expected != Some(&observed) {
                    trace!(walk, ?prefix, "random walk found counterexample");
                    return Some(prefix);
                }
                if rng.gen_bool(self.reset_probability) {
                    break;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata::automaton::StateId;
    use automata_core::math::OrderedMap;
    use bimap::BiMap;

    fn two_state_moore() -> MooreMachine<char, bool> {
        let mut outputs = OrderedMap::new();
        outputs.insert(StateId(0), false);
        outputs.insert(StateId(1), true);
        let mut transitions = OrderedMap::new();
        transitions.insert((StateId(0), 'a'), StateId(1));
        transitions.insert((StateId(1), 'a'), StateId(0));
        MooreMachine {
            names: BiMap::new(),
            outputs,
            transitions,
            initial: StateId(0),
        }
    }

    #[test]
    fn sample_oracle_finds_disagreement() {
        let hyp = two_state_moore();
        let mut oracle = SampleOracle::new([(vec!['a'], true), (vec!['a', 'a'], true)]);
        let cex = oracle.find_cex(&hyp);
        assert_eq!(cex, Some(vec!['a', 'a']));
    }

    #[test]
    fn sample_oracle_confirms_agreement() {
        let hyp = two_state_moore();
        let mut oracle = SampleOracle::new([(vec!['a'], true), (vec!['a', 'a'], false)]);
        assert_eq!(oracle.find_cex(&hyp), None);
    }
}
