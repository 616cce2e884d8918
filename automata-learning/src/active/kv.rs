//! The KV (classification-tree) main loop: alternates hypothesis construction against an
//! [`Oracle`], absorbing counterexamples by splitting a single leaf per round.

use std::fmt::Debug;
use std::hash::Hash;

use automata::automaton::{MooreMachine, StateId};
use automata_core::alphabet::Alphabet;
use tracing::{debug, info, warn};

use super::cache::CacheSul;
use super::classification_tree::ClassificationTree;
use super::oracle::Oracle;
use super::sul::Sul;
use super::KvError;

/// How a counterexample is decomposed into a new discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CexProcessing {
    /// Linear scan for the first breakpoint, left to right.
    #[default]
    Naive,
    /// Rivest–Schapire binary search for a breakpoint. Fewer membership queries on long
    /// counterexamples, same result (a valid breakpoint, not necessarily the same one naive
    /// finds).
    Rs,
}

pub struct KvBuilder<I, O, S, A> {
    alphabet: A,
    sul: S,
    cex_processing: CexProcessing,
    max_learning_rounds: Option<usize>,
    pretty_state_names: bool,
    _marker: std::marker::PhantomData<O>,
    _marker_i: std::marker::PhantomData<I>,
}

impl<I, O, S, A> KvBuilder<I, O, S, A>
where
    S: Sul<Input = I, Output = O>,
    A: Alphabet<Symbol = I>,
{
    pub fn cex_processing(mut self, mode: CexProcessing) -> Self {
        self.cex_processing = mode;
        self
    }

    pub fn max_learning_rounds(mut self, rounds: usize) -> Self {
        self.max_learning_rounds = Some(rounds);
        self
    }

    pub fn pretty_state_names(mut self, pretty: bool) -> Self {
        self.pretty_state_names = pretty;
        self
    }

    pub fn build(self) -> Result<Kv<I, O, S, A>, KvError<I, O>>
    where
        I: Debug + Eq + Hash,
        O: Debug,
    {
        Ok(Kv {
            alphabet: self.alphabet,
            sul: CacheSul::new(self.sul),
            tree: ClassificationTree::new(),
            cex_processing: self.cex_processing,
            max_learning_rounds: self.max_learning_rounds,
            pretty_state_names: self.pretty_state_names,
        })
    }
}

/// The active learner itself. Owns the classification tree across rounds; [`Kv::run`] drives
/// hypothesis construction and counterexample absorption to convergence or budget exhaustion.
/// `sul` is wrapped in a [`CacheSul`] so every query is memoized and non-determinism is detected;
/// [`Kv::run`] drains it after each SUL-touching step and surfaces a hit as `KvError::Sul`.
pub struct Kv<I, O, S, A>
where
    S: Sul<Input = I, Output = O>,
    I: Debug,
    O: Debug,
{
    alphabet: A,
    sul: CacheSul<S>,
    tree: ClassificationTree<I, O>,
    cex_processing: CexProcessing,
    max_learning_rounds: Option<usize>,
    pretty_state_names: bool,
}

impl<I, O, S, A> Kv<I, O, S, A>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
    S: Sul<Input = I, Output = O>,
    A: Alphabet<Symbol = I>,
{
    pub fn builder(alphabet: A, sul: S) -> KvBuilder<I, O, S, A> {
        KvBuilder {
            alphabet,
            sul,
            cex_processing: CexProcessing::default(),
            max_learning_rounds: None,
            pretty_state_names: false,
            _marker: std::marker::PhantomData,
            _marker_i: std::marker::PhantomData,
        }
    }

    /// Drains any non-determinism violation [`CacheSul`] recorded during the most recent SUL
    /// query and turns it into a fatal [`KvError::Sul`].
    fn check_sul(&mut self) -> Result<(), KvError<I, O>> {
        match self.sul.take_pending_error() {
            Some(err) => Err(KvError::Sul(err)),
            None => Ok(()),
        }
    }

    pub fn tree(&self) -> &ClassificationTree<I, O> {
        &self.tree
    }

    /// Runs the learning loop against `oracle` until it reports no counterexample, or
    /// `max_learning_rounds` is reached (in which case the partial hypothesis is returned
    /// alongside [`KvError::BudgetExhausted`]).
    pub fn run<Or>(&mut self, oracle: &mut Or) -> Result<MooreMachine<I, O>, KvError<I, O>>
    where
        Or: Oracle<Input = I, Output = O>,
    {
        info!("starting KV learning loop");
        let mut round = 0usize;

        loop {
            let (hypothesis, state_map) = self.tree.gen_hypothesis(&mut self.sul, &self.alphabet);
            self.check_sul()?;
            debug!(round, states = hypothesis.size(), "built hypothesis");

            if let Some(limit) = self.max_learning_rounds {
                if round >= limit {
                    warn!(round, "learning budget exhausted");
                    return Err(KvError::BudgetExhausted {
                        rounds: round,
                        hypothesis_size: hypothesis.size(),
                    });
                }
            }

            let Some(cex) = oracle.find_cex(&hypothesis) else {
                info!(states = hypothesis.size(), "learning converged");
                if self.pretty_state_names {
                    debug!("final hypothesis uses dense s0..sN naming");
                }
                return Ok(hypothesis);
            };

            let observed = self.sul.classify(&cex);
            self.check_sul()?;
            let hyp_run = hypothesis.run(&cex);
            let hyp_output = hyp_run.and_then(|s| hypothesis.output_of(s));
            if hyp_output == Some(&observed) {
                return Err(KvError::OracleMismatch { counterexample: cex });
            }

            self.absorb(&cex, &hypothesis, &state_map);
            self.check_sul()?;
            round += 1;
        }
    }

    fn access_of_state(
        &self,
        state: StateId,
        state_map: &automata_core::math::OrderedMap<StateId, super::classification_tree::CtNodeId>,
    ) -> Vec<I> {
        let leaf = *state_map
            .get(&state)
            .expect("every hypothesis state has a corresponding leaf");
        self.tree.access_of(leaf).to_vec()
    }

    /// Absorbs a single counterexample, splitting exactly one leaf.
    fn absorb(
        &mut self,
        cex: &[I],
        hypothesis: &MooreMachine<I, O>,
        state_map: &automata_core::math::OrderedMap<StateId, super::classification_tree::CtNodeId>,
    ) {
        let n = cex.len();

        // State reached by the hypothesis after reading cex[0..i], for i = 0..=n.
        let mut states_along = Vec::with_capacity(n + 1);
        states_along.push(hypothesis.initial);
        let mut current = hypothesis.initial;
        for symbol in cex {
            current = hypothesis
                .transitions
                .get(&(current, symbol.clone()))
                .copied()
                .expect("hypothesis is complete over its own alphabet");
            states_along.push(current);
        }

        // Each v_i = access(states_along[i]) ++ cex[i..], evaluated against the SUL (ground
        // truth). Looked up via explicit args rather than a closure over `self`, since resolving
        // it needs `&self.tree` and `&mut self.sul` live at once.
        fn v_at<I, O, S>(
            tree: &ClassificationTree<I, O>,
            state_map: &automata_core::math::OrderedMap<StateId, super::classification_tree::CtNodeId>,
            states_along: &[StateId],
            cex: &[I],
            sul: &mut S,
            i: usize,
        ) -> O
        where
            I: Clone + Eq + Hash + Debug,
            O: Clone + Eq + Hash + Debug,
            S: Sul<Input = I, Output = O>,
        {
            let leaf = *state_map
                .get(&states_along[i])
                .expect("every hypothesis state has a corresponding leaf");
            let mut word = tree.access_of(leaf).to_vec();
            word.extend_from_slice(&cex[i..]);
            sul.classify(&word)
        }

        let breakpoint = match self.cex_processing {
            CexProcessing::Naive => {
                let mut found = 0;
                let target0 = v_at(&self.tree, state_map, &states_along, cex, &mut self.sul, 0);
                for i in 0..n {
                    let next = v_at(&self.tree, state_map, &states_along, cex, &mut self.sul, i + 1);
                    if next != target0 {
                        found = i;
                        break;
                    }
                }
                found
            }
            CexProcessing::Rs => {
                let target0 = v_at(&self.tree, state_map, &states_along, cex, &mut self.sul, 0);
                let mut low = 0usize;
                let mut high = n;
                while high - low > 1 {
                    let mid = (low + high) / 2;
                    let value = v_at(&self.tree, state_map, &states_along, cex, &mut self.sul, mid);
                    if value == target0 {
                        low = mid;
                    } else {
                        high = mid;
                    }
                }
                low
            }
        };

        let old_access = self.access_of_state(states_along[breakpoint + 1], state_map);
        let new_access = {
            let mut access = self.access_of_state(states_along[breakpoint], state_map);
            access.push(cex[breakpoint].clone());
            access
        };
        let discriminator = cex[breakpoint + 1..].to_vec();

        let mut old_word = old_access.clone();
        old_word.extend_from_slice(&discriminator);
        let old_output = self.sul.classify(&old_word);

        let mut new_word = new_access.clone();
        new_word.extend_from_slice(&discriminator);
        let new_output = self.sul.classify(&new_word);

        let leaf = *state_map
            .get(&states_along[breakpoint + 1])
            .expect("breakpoint state has a leaf");

        debug!(?discriminator, "splitting leaf on counterexample");
        self.tree
            .split_leaf(leaf, discriminator, old_output, new_access, new_output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::oracle::SampleOracle;
    use crate::active::sul::DfaSul;
    use automata::automaton::export_dfa;
    use automata::pta::{construct_pta, NodeId};
    use automata_core::alphabet::CharAlphabet;

    /// Builds a tiny DFA over {a,b} accepting words with an even number of 'a's. Each trace's
    /// per-step output is the running parity after that prefix, not the word's final label.
    fn even_as_dfa() -> automata::automaton::Dfa<char> {
        let words: Vec<Vec<char>> = vec![
            vec!['a'],
            vec!['a', 'a'],
            vec!['b'],
            vec!['a', 'b'],
            vec!['b', 'a'],
        ];
        let traces = words.into_iter().map(|w| {
            let mut parity = true;
            let steps = w
                .into_iter()
                .map(|symbol| {
                    if symbol == 'a' {
                        parity = !parity;
                    }
                    (symbol, parity)
                })
                .collect();
            automata::pta::Trace { steps }
        });
        let pta = construct_pta(true, traces, true).expect("deterministic sample");
        let red_states: Vec<NodeId> = pta.node_ids().collect();
        export_dfa(&pta, &red_states)
    }

    #[test]
    fn kv_learns_even_parity_dfa() {
        let target = even_as_dfa();
        let sul = DfaSul::new(target);
        let alphabet = CharAlphabet::of_size(2);
        let mut kv = Kv::builder(alphabet, sul)
            .cex_processing(CexProcessing::Rs)
            .max_learning_rounds(20)
            .build()
            .expect("valid configuration");

        let mut oracle = SampleOracle::new([
            (vec!['a'], false),
            (vec!['a', 'a'], true),
            (vec!['a', 'a', 'a'], false),
            (vec!['b', 'b'], true),
        ]);

        let hypothesis = kv.run(&mut oracle).expect("converges within budget");
        assert!(hypothesis.size() <= 2);
        assert_eq!(oracle.find_cex(&hypothesis), None);
    }
}
