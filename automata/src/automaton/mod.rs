//! Turns a (possibly merged) [`Pta`] into a plain named-state machine: [`Dfa`], [`MooreMachine`],
//! [`Mdp`] or [`Smm`], depending on which axis of `Gsm`'s configuration produced it.
//!
//! State naming is breadth-first from the root, `s0, s1, …`, via a [`bimap::BiMap`] so callers can
//! look a state up by either its export name or its originating arena [`NodeId`].

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;

use bimap::BiMap;
use itertools::Itertools;

use automata_core::math::OrderedMap;
use crate::pta::{NodeId, Pta};

/// A state in an exported automaton. Dense, zero-based, BFS order from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u32);

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Breadth-first traversal over the red states reachable from the root, naming each the first
/// time it's seen. After a GSM run every reachable node is a red state, so this is exactly the
/// automaton's state set.
fn name_states<I, O>(pta: &Pta<I, O>, red_states: &[NodeId]) -> BiMap<NodeId, StateId>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    let red_set: automata_core::math::OrderedSet<NodeId> = red_states.iter().copied().collect();
    let mut names = BiMap::new();
    let mut queue = VecDeque::new();
    queue.push_back(pta.root());

    while let Some(id) = queue.pop_front() {
        if names.contains_left(&id) {
            continue;
        }
        names.insert(id, StateId(names.len() as u32));
        for (_, _, info) in pta.node(id).transition_iter() {
            if red_set.contains(&info.target) && !names.contains_left(&info.target) {
                queue.push_back(info.target);
            }
        }
    }
    names
}

fn hoeffding_interval(p: f64, total: u64, eps: f64) -> (f64, f64) {
    let half = ((2.0_f64 / eps).ln() / (2.0 * total as f64)).sqrt();
    ((p - half).max(0.0), (p + half).min(1.0))
}

/// A deterministic acceptor: every state carries an accepting bit, every input leads to at most
/// one successor.
#[derive(Debug, Clone)]
pub struct Dfa<I> {
    pub names: BiMap<NodeId, StateId>,
    pub accepting: OrderedMap<StateId, bool>,
    pub transitions: OrderedMap<(StateId, I), StateId>,
    pub initial: StateId,
}

impl<I> Dfa<I>
where
    I: Clone + Eq + Hash + Debug,
{
    pub fn size(&self) -> usize {
        self.accepting.len()
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting.get(&state).copied().unwrap_or(false)
    }
}

/// Builds a [`Dfa`] from a deterministic, Moore-mode merged PTA whose node output is the
/// accepting bit directly.
pub fn export_dfa<I>(pta: &Pta<I, bool>, red_states: &[NodeId]) -> Dfa<I>
where
    I: Clone + Eq + Hash + Debug,
{
    let names = name_states(pta, red_states);
    let mut accepting = OrderedMap::new();
    let mut transitions = OrderedMap::new();

    for &id in red_states {
        let Some(&sid) = names.get_by_left(&id) else {
            continue;
        };
        accepting.insert(sid, pta.node(id).output);
        for (in_sym, out_sym, info) in pta.node(id).transition_iter() {
            let _ = out_sym;
            if let Some(&tsid) = names.get_by_left(&info.target) {
                transitions.insert((sid, in_sym.clone()), tsid);
            }
        }
    }

    Dfa {
        names,
        accepting,
        transitions,
        initial: StateId(0),
    }
}

/// A deterministic Moore machine: every state carries an output symbol, every input leads to at
/// most one successor.
#[derive(Debug, Clone)]
pub struct MooreMachine<I, O> {
    pub names: BiMap<NodeId, StateId>,
    pub outputs: OrderedMap<StateId, O>,
    pub transitions: OrderedMap<(StateId, I), StateId>,
    pub initial: StateId,
}

impl<I, O> MooreMachine<I, O> {
    pub fn size(&self) -> usize {
        self.outputs.len()
    }

    pub fn output_of(&self, state: StateId) -> Option<&O> {
        self.outputs.get(&state)
    }
}

impl<I, O> MooreMachine<I, O>
where
    I: Clone + Eq + Hash,
{
    /// Walks `word` from the initial state, assuming the machine is complete. Returns `None` at
    /// the first missing transition.
    pub fn run(&self, word: &[I]) -> Option<StateId> {
        let mut current = self.initial;
        for symbol in word {
            current = *self.transitions.get(&(current, symbol.clone()))?;
        }
        Some(current)
    }
}

pub fn export_moore<I, O>(pta: &Pta<I, O>, red_states: &[NodeId]) -> MooreMachine<I, O>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    let names = name_states(pta, red_states);
    let mut outputs = OrderedMap::new();
    let mut transitions = OrderedMap::new();

    for &id in red_states {
        let Some(&sid) = names.get_by_left(&id) else {
            continue;
        };
        outputs.insert(sid, pta.node(id).output.clone());
        for (in_sym, _, info) in pta.node(id).transition_iter() {
            if let Some(&tsid) = names.get_by_left(&info.target) {
                transitions.insert((sid, in_sym.clone()), tsid);
            }
        }
    }

    MooreMachine {
        names,
        outputs,
        transitions,
        initial: StateId(0),
    }
}

/// One stochastic successor: its probability, target, and (if requested) the Hoeffding interval
/// around that probability at the configured confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticEdge<O> {
    pub output: O,
    pub target: StateId,
    pub probability: f64,
    pub interval: Option<(f64, f64)>,
}

/// A Markov decision process: output is a Moore-style state label, and each input selects a
/// probability distribution over successor states (the AALpy `Mdp` shape — `runAlergia`'s
/// natural export target).
#[derive(Debug, Clone)]
pub struct Mdp<I, O> {
    pub names: BiMap<NodeId, StateId>,
    pub outputs: OrderedMap<StateId, O>,
    pub transitions: OrderedMap<(StateId, I), Vec<(StateId, f64, Option<(f64, f64)>)>>,
    pub initial: StateId,
}

impl<I, O> Mdp<I, O> {
    pub fn size(&self) -> usize {
        self.outputs.len()
    }
}

pub fn export_mdp<I, O>(
    pta: &Pta<I, O>,
    red_states: &[NodeId],
    hoeffding_eps: Option<f64>,
) -> Mdp<I, O>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    let names = name_states(pta, red_states);
    let mut outputs = OrderedMap::new();
    let mut transitions = OrderedMap::new();

    for &id in red_states {
        let Some(&sid) = names.get_by_left(&id) else {
            continue;
        };
        outputs.insert(sid, pta.node(id).output.clone());

        for (in_sym, by_output) in pta.node(id).transitions.iter() {
            let total: u64 = by_output.values().map(|info| info.count).sum();
            if total == 0 {
                continue;
            }
            let edges: Vec<_> = by_output
                .values()
                .filter_map(|info| {
                    let tsid = *names.get_by_left(&info.target)?;
                    let p = info.count as f64 / total as f64;
                    let interval = hoeffding_eps.map(|eps| hoeffding_interval(p, total, eps));
                    Some((tsid, p, interval))
                })
                .collect();
            transitions.insert((sid, in_sym.clone()), edges);
        }
    }

    Mdp {
        names,
        outputs,
        transitions,
        initial: StateId(0),
    }
}

/// A stochastic Mealy machine: states carry no output of their own, each input leads to a
/// probability distribution over `(output, successor)` pairs attached to the transition.
#[derive(Debug, Clone)]
pub struct Smm<I, O> {
    pub names: BiMap<NodeId, StateId>,
    pub transitions: OrderedMap<(StateId, I), Vec<StochasticEdge<O>>>,
    pub initial: StateId,
}

impl<I, O> Smm<I, O> {
    pub fn size(&self) -> usize {
        self.names.len()
    }
}

pub fn export_smm<I, O>(
    pta: &Pta<I, O>,
    red_states: &[NodeId],
    hoeffding_eps: Option<f64>,
) -> Smm<I, O>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    let names = name_states(pta, red_states);
    let mut transitions = OrderedMap::new();

    for &id in red_states {
        let Some(&sid) = names.get_by_left(&id) else {
            continue;
        };
        for (in_sym, by_output) in pta.node(id).transitions.iter() {
            let total: u64 = by_output.values().map(|info| info.count).sum();
            if total == 0 {
                continue;
            }
            let edges: Vec<_> = by_output
                .iter()
                .filter_map(|(out, info)| {
                    let target = *names.get_by_left(&info.target)?;
                    let probability = info.count as f64 / total as f64;
                    let interval = hoeffding_eps.map(|eps| hoeffding_interval(probability, total, eps));
                    Some(StochasticEdge {
                        output: out.clone(),
                        target,
                        probability,
                        interval,
                    })
                })
                .collect();
            transitions.insert((sid, in_sym.clone()), edges);
        }
    }

    Smm {
        names,
        transitions,
        initial: StateId(0),
    }
}

impl<I, O> Mdp<I, O>
where
    I: Debug,
    O: Debug,
{
    /// A one-line-per-transition rendering, used by the `aalearn` demo binary.
    pub fn describe(&self) -> String {
        self.transitions
            .iter()
            .sorted_by_key(|((sid, _), _)| sid.0)
            .flat_map(|((sid, input), edges)| {
                edges.iter().map(move |(target, p, interval)| match interval {
                    Some((lo, hi)) => format!(
                        "{sid} --{input:?}--> {target} [p={p:.3}, {lo:.3}..{hi:.3}]"
                    ),
                    None => format!("{sid} --{input:?}--> {target} [p={p:.3}]"),
                })
            })
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pta::{Trace, construct_pta};

    #[test]
    fn dfa_export_preserves_root_naming() {
        let pta = construct_pta(
            true,
            vec![
                Trace::new([('a', true), ('b', false)]),
                Trace::new([('a', true), ('c', true)]),
            ],
            true,
        )
        .unwrap();
        let red_states: Vec<_> = pta.node_ids().collect();
        let dfa = export_dfa(&pta, &red_states);
        assert_eq!(dfa.initial, StateId(0));
        assert!(dfa.is_accepting(StateId(0)));
        assert_eq!(dfa.size(), red_states.len());
    }

    #[test]
    fn mdp_export_normalizes_counts() {
        let pta = construct_pta(
            "q0",
            vec![
                Trace::new([('a', "heads")]),
                Trace::new([('a', "heads")]),
                Trace::new([('a', "heads")]),
                Trace::new([('a', "tails")]),
            ],
            false,
        )
        .unwrap();
        let red_states = vec![pta.root()];
        let mdp = export_mdp(&pta, &red_states, Some(0.05));
        let edges = mdp.transitions.get(&(StateId(0), 'a')).unwrap();
        let total_p: f64 = edges.iter().map(|(_, p, _)| p).sum();
        assert!((total_p - 1.0).abs() < 1e-9);
        assert!(edges.iter().any(|(_, p, _)| (*p - 0.75).abs() < 1e-9));
    }
}
