//! The classification tree: a binary discriminator tree over access strings. Leaves correspond to
//! hypothesis states; inner nodes hold a distinguishing suffix and route by the SUL's output on
//! `access ++ discriminator`.

use std::fmt::Debug;
use std::hash::Hash;

use automata::automaton::{MooreMachine, StateId};
use automata::pta::NodeId;
use automata_core::alphabet::Alphabet;
use automata_core::math::OrderedMap;
use bimap::BiMap;
use tracing::trace;

use super::sul::Sul;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CtNodeId(u32);

#[derive(Debug, Clone)]
pub enum CtNode<I, O> {
    Leaf {
        access: Vec<I>,
    },
    Inner {
        discriminator: Vec<I>,
        children: OrderedMap<O, CtNodeId>,
    },
}

/// The classification tree itself. Grows monotonically: discriminators never change once set,
/// leaves may split into new inner nodes, but an existing leaf's access string never changes.
#[derive(Debug, Clone)]
pub struct ClassificationTree<I, O> {
    arena: Vec<CtNode<I, O>>,
    root: CtNodeId,
}

impl<I, O> ClassificationTree<I, O>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            arena: vec![CtNode::Leaf { access: Vec::new() }],
            root: CtNodeId(0),
        }
    }

    pub fn root(&self) -> CtNodeId {
        self.root
    }

    fn push(&mut self, node: CtNode<I, O>) -> CtNodeId {
        let id = CtNodeId(self.arena.len() as u32);
        self.arena.push(node);
        id
    }

    pub fn node(&self, id: CtNodeId) -> &CtNode<I, O> {
        &self.arena[id.0 as usize]
    }

    pub fn access_of(&self, id: CtNodeId) -> &[I] {
        match self.node(id) {
            CtNode::Leaf { access } => access,
            CtNode::Inner { .. } => panic!("access_of called on an inner node"),
        }
    }

    pub fn leaves(&self) -> impl Iterator<Item = CtNodeId> + '_ {
        (0..self.arena.len() as u32)
            .map(CtNodeId)
            .filter(|id| matches!(self.node(*id), CtNode::Leaf { .. }))
    }

    /// Sifts `word` down the tree against `sul`, discovering a new leaf (with access `word`) the
    /// first time an inner node's output isn't one of its known children.
    pub fn sift<S>(&mut self, sul: &mut S, word: &[I]) -> CtNodeId
    where
        S: Sul<Input = I, Output = O>,
    {
        let mut current = self.root;
        loop {
            let (discriminator, existing) = match self.node(current) {
                CtNode::Leaf { .. } => return current,
                CtNode::Inner { discriminator, children } => {
                    let mut query = word.to_vec();
                    query.extend_from_slice(discriminator);
                    let output = sul.classify(&query);
                    (discriminator.clone(), children.get(&output).copied())
                }
            };
            match existing {
                Some(child) => current = child,
                None => {
                    let mut query = word.to_vec();
                    query.extend_from_slice(&discriminator);
                    let output = sul.classify(&query);
                    let new_leaf = self.push(CtNode::Leaf { access: word.to_vec() });
                    if let CtNode::Inner { children, .. } = &mut self.arena[current.0 as usize] {
                        children.insert(output, new_leaf);
                    }
                    trace!(?word, "sift discovered new leaf");
                    return new_leaf;
                }
            }
        }
    }

    /// Splits `leaf` into an inner node with `discriminator`, keeping its old access string on
    /// one new child (classified by `old_output`) and adding `new_access` as the other
    /// (classified by `new_output`).
    pub fn split_leaf(
        &mut self,
        leaf: CtNodeId,
        discriminator: Vec<I>,
        old_output: O,
        new_access: Vec<I>,
        new_output: O,
    ) {
        let old_access = match &self.arena[leaf.0 as usize] {
            CtNode::Leaf { access } => access.clone(),
            CtNode::Inner { .. } => panic!("split_leaf called on an inner node"),
        };
        let old_leaf_id = self.push(CtNode::Leaf { access: old_access });
        let new_leaf_id = self.push(CtNode::Leaf { access: new_access });

        let mut children = OrderedMap::new();
        children.insert(old_output, old_leaf_id);
        children.insert(new_output, new_leaf_id);

        self.arena[leaf.0 as usize] = CtNode::Inner { discriminator, children };
    }

    /// Builds a [`MooreMachine`] hypothesis from the tree's current leaves, closing the tree along
    /// the way: every `access ++ symbol` successor is sifted into `self`, so a symbol that leads
    /// to previously-unseen behavior grows the tree with a fresh leaf before the hypothesis is
    /// built, rather than being approximated. Returns the machine alongside the mapping from each
    /// hypothesis state back to its originating leaf, so counterexample processing can recover
    /// access strings.
    pub fn gen_hypothesis<S, A>(
        &mut self,
        sul: &mut S,
        alphabet: &A,
    ) -> (MooreMachine<I, O>, OrderedMap<StateId, CtNodeId>)
    where
        S: Sul<Input = I, Output = O>,
        A: Alphabet<Symbol = I>,
    {
        // Closing pass: sift every successor of every known access string until no new leaves
        // appear. Bounded by the eventual number of reachable states.
        loop {
            let accesses: Vec<Vec<I>> = self.leaves().map(|l| self.access_of(l).to_vec()).collect();
            let before = self.arena.len();
            for access in &accesses {
                for symbol in alphabet.universe() {
                    let mut successor = access.clone();
                    successor.push(symbol);
                    self.sift(sul, &successor);
                }
            }
            if self.arena.len() == before {
                break;
            }
        }

        let leaves: Vec<CtNodeId> = self.leaves().collect();
        let mut names: BiMap<NodeId, StateId> = BiMap::new();
        let mut state_map = OrderedMap::new();
        for (i, &leaf) in leaves.iter().enumerate() {
            names.insert(NodeId(i as u32), StateId(i as u32));
            state_map.insert(StateId(i as u32), leaf);
        }

        let mut outputs = OrderedMap::new();
        let mut transitions = OrderedMap::new();

        for (i, &leaf) in leaves.iter().enumerate() {
            let sid = StateId(i as u32);
            let access = self.access_of(leaf).to_vec();
            let output = sul.classify(&access);
            outputs.insert(sid, output);

            for symbol in alphabet.universe() {
                let mut successor_word = access.clone();
                successor_word.push(symbol.clone());
                let successor_leaf = self.sift(sul, &successor_word);
                let target = leaves
                    .iter()
                    .position(|&l| l == successor_leaf)
                    .map(|idx| StateId(idx as u32))
                    .expect("closing pass guarantees every successor already has a leaf");
                transitions.insert((sid, symbol), target);
            }
        }

        (
            MooreMachine {
                names,
                outputs,
                transitions,
                initial: StateId(0),
            },
            state_map,
        )
    }
}

impl<I, O> Default for ClassificationTree<I, O>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
