//! The prefix-tree acceptor: an arena of nodes built from a sample of traces, later mutated in
//! place by [`crate::gsm`]'s merge/partition machinery.
//!
//! Nodes are addressed by stable [`NodeId`]s rather than references, per the arena discipline
//! described in the design notes: merging rewires edges between indices, it never unifies
//! objects, so two nodes whose prefixes happen to coincide after a merge remain distinct arena
//! slots.

use std::fmt::Debug;
use std::hash::Hash;

use automata_core::math::OrderedMap;
use thiserror::Error;
use tracing::trace;

/// Stable index into a [`Pta`]'s arena. Never reused; a merge reassigns edges, not identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A single transition: the live merge-mutable fields `(target, count)` alongside the write-once
/// `(original_target, original_count)` pair fixed at PTA construction time.
///
/// For a transition that a merge introduces (the blue side contributes an input/output pair the
/// red side never had), `original_count` is `0` and `original_target` aliases `target` — the
/// write-once invariant still holds (nothing mutates these two fields again), it is simply
/// recording "this edge has no history in the original sample" without needing an `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionInfo {
    pub target: NodeId,
    pub count: u64,
    pub original_target: NodeId,
    pub original_count: u64,
}

impl TransitionInfo {
    fn fresh_from_original(target: NodeId, count: u64) -> Self {
        Self {
            target,
            count,
            original_target: target,
            original_count: count,
        }
    }

    /// A transition manufactured during partition construction for a blue-only edge: it has no
    /// counterpart in the original sample.
    pub fn introduced(target: NodeId, count: u64) -> Self {
        Self {
            target,
            count,
            original_target: target,
            original_count: 0,
        }
    }
}

/// One node of the prefix tree. `transitions` is a two-level table, `input -> output -> info`,
/// matching the data model: a deterministic PTA has at most one output per input, but the table
/// shape accommodates non-deterministic samples too.
#[derive(Debug, Clone)]
pub struct Node<I, O> {
    pub output: O,
    pub prefix: Vec<(I, O)>,
    pub transitions: OrderedMap<I, OrderedMap<O, TransitionInfo>>,
}

impl<I, O> Node<I, O>
where
    I: Clone + Eq + Hash,
    O: Clone + Eq + Hash,
{
    fn new(output: O, prefix: Vec<(I, O)>) -> Self {
        Self {
            output,
            prefix,
            transitions: OrderedMap::new(),
        }
    }

    /// Iterates over every `(input, output, info)` triple in this node's transition table, in
    /// insertion order.
    pub fn transition_iter(&self) -> impl Iterator<Item = (&I, &O, &TransitionInfo)> + '_ {
        self.transitions
            .iter()
            .flat_map(|(i, by_output)| by_output.iter().map(move |(o, info)| (i, o, info)))
    }

    /// Returns the transition table for a given input, or an empty one if the node has none.
    pub fn transitions_on<'a>(&'a self, input: &I) -> Option<&'a OrderedMap<O, TransitionInfo>> {
        self.transitions.get(input)
    }

    /// `true` if every input leads to at most one output (the deterministic-mode invariant).
    pub fn is_locally_deterministic(&self) -> bool {
        self.transitions.values().all(|by_output| by_output.len() <= 1)
    }
}

/// Raised when PTA construction runs in deterministic mode and two traces sharing an input
/// prefix disagree on the output of the next step.
#[derive(Debug, Error)]
#[error(
    "non-deterministic input: at prefix {prefix:?}, input already leads to output {existing:?}, \
     but a trace asks for output {conflicting:?}"
)]
pub struct NonDeterministicInput<I: Debug, O: Debug> {
    pub prefix: Vec<(I, O)>,
    pub existing: O,
    pub conflicting: O,
}

/// The prefix-tree acceptor. Lives for the duration of one [`crate::gsm::Gsm::run`] call.
#[derive(Debug, Clone)]
pub struct Pta<I, O> {
    arena: Vec<Node<I, O>>,
}

impl<I, O> Pta<I, O>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &Node<I, O> {
        &self.arena[id.as_usize()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<I, O> {
        &mut self.arena[id.as_usize()]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Every node currently in the arena, in creation order (which, since a node is only ever
    /// created as the first visit to a new prefix, is also breadth-first from the root — exactly
    /// the tie-break the default `node_order` wants).
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.arena.len() as u32).map(NodeId)
    }

    /// Finds or creates the child of `from` reached by `(input, output)`, bumping
    /// `count`/`original_count` on the traversed edge. Returns an error in deterministic mode if
    /// `input` already leads to a different `output` from `from`.
    fn step(
        &mut self,
        from: NodeId,
        input: I,
        output: O,
        deterministic: bool,
    ) -> Result<NodeId, NonDeterministicInput<I, O>> {
        if let Some(by_output) = self.arena[from.as_usize()].transitions.get(&input) {
            if deterministic {
                if let Some((existing_output, _)) = by_output.iter().next() {
                    if existing_output != &output {
                        return Err(NonDeterministicInput {
                            prefix: self.arena[from.as_usize()].prefix.clone(),
                            existing: existing_output.clone(),
                            conflicting: output,
                        });
                    }
                }
            }
            if let Some(info) = by_output.get(&output) {
                let target = info.target;
                let entry = self.arena[from.as_usize()]
                    .transitions
                    .get_mut(&input)
                    .unwrap()
                    .get_mut(&output)
                    .unwrap();
                entry.count += 1;
                entry.original_count += 1;
                trace!(?input, ?output, count = entry.count, "reused PTA transition");
                return Ok(target);
            }
        }

        let mut prefix = self.arena[from.as_usize()].prefix.clone();
        prefix.push((input.clone(), output.clone()));
        let child = Node::new(output.clone(), prefix);
        let child_id = NodeId(self.arena.len() as u32);
        self.arena.push(child);

        self.arena[from.as_usize()]
            .transitions
            .entry(input)
            .or_default()
            .insert(output, TransitionInfo::fresh_from_original(child_id, 1));

        Ok(child_id)
    }
}

/// One observed behavior: an optional shared initial output (Moore mode) followed by a sequence
/// of `(input, output)` steps.
#[derive(Debug, Clone)]
pub struct Trace<I, O> {
    pub steps: Vec<(I, O)>,
}

impl<I, O> Trace<I, O> {
    pub fn new(steps: impl IntoIterator<Item = (I, O)>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }
}

/// Builds a PTA from a multiset of traces.
///
/// `initial_output` is the color of the root: in Moore mode this is the (shared) initial output
/// carried by the sample; in Mealy/deterministic-transition mode there is no meaningful initial
/// output and callers pass a placeholder (e.g. `Void` or `()`).
///
/// Fails with [`NonDeterministicInput`] when `deterministic` is `true` and two traces share an
/// input prefix but disagree on the next output.
pub fn construct_pta<I, O>(
    initial_output: O,
    traces: impl IntoIterator<Item = Trace<I, O>>,
    deterministic: bool,
) -> Result<Pta<I, O>, NonDeterministicInput<I, O>>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    let root = Node::new(initial_output, Vec::new());
    let mut pta = Pta { arena: vec![root] };

    for trace in traces {
        let mut current = pta.root();
        for (input, output) in trace.steps {
            current = pta.step(current, input, output, deterministic)?;
        }
    }

    Ok(pta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_core::Void;

    fn trace(steps: &[(char, char)]) -> Trace<char, char> {
        Trace::new(steps.iter().copied())
    }

    #[test]
    fn pta_uniqueness_shared_prefix() {
        let pta = construct_pta(
            'Z',
            vec![trace(&[('a', '1'), ('b', '2')]), trace(&[('a', '1'), ('c', '3')])],
            true,
        )
        .unwrap();

        // both traces share the prefix "a/1" - the PTA must have a single node for it.
        assert_eq!(pta.len(), 4); // root, a/1, a/1-b/2, a/1-c/3
        let after_a = pta.node(pta.root()).transitions_on(&'a').unwrap().get(&'1').unwrap().target;
        assert_eq!(pta.node(after_a).prefix, vec![('a', '1')]);
    }

    #[test]
    fn deterministic_conflict_rejected() {
        let err = construct_pta(
            Void,
            vec![
                Trace::new([('a', 'x'), ('b', 'y')]),
                Trace::new([('a', 'x'), ('b', 'z')]),
            ],
            true,
        )
        .unwrap_err();
        assert_eq!(err.existing, 'y');
        assert_eq!(err.conflicting, 'z');
    }

    #[test]
    fn nondeterministic_mode_accepts_conflict() {
        let pta = construct_pta(
            Void,
            vec![
                Trace::new([('a', 'x'), ('b', 'y')]),
                Trace::new([('a', 'x'), ('b', 'z')]),
            ],
            false,
        )
        .unwrap();
        let a_node = pta.node(pta.root()).transitions_on(&'a').unwrap().get(&'x').unwrap().target;
        assert_eq!(pta.node(a_node).transitions_on(&'b').unwrap().len(), 2);
    }

    #[test]
    fn moore_mode_pta_shape() {
        // [(out0, [(a, o1), (a, o2)]), (out0, [(a, o1), (b, o3)])]
        let pta = construct_pta(
            "out0",
            vec![
                Trace::new([('a', "o1"), ('a', "o2")]),
                Trace::new([('a', "o1"), ('b', "o3")]),
            ],
            false,
        )
        .unwrap();
        assert_eq!(pta.node(pta.root()).output, "out0");
        let o1 = pta.node(pta.root()).transitions_on(&'a').unwrap().get(&"o1").unwrap().target;
        assert_eq!(pta.node(o1).output, "o1");
        assert_eq!(pta.node(o1).transitions.len(), 2); // 'a' and 'b'
        let o2 = pta.node(o1).transitions_on(&'a').unwrap().get(&"o2").unwrap().target;
        let o3 = pta.node(o1).transitions_on(&'b').unwrap().get(&"o3").unwrap().target;
        assert_eq!(pta.node(o2).output, "o2");
        assert_eq!(pta.node(o3).output, "o3");
    }
}
