//! The generalized state-merging (GSM) engine: a red/blue breadth-first state-merging search
//! over a [`Pta`], parameterized by when its compatibility scorer runs (§4.3).

pub mod score;

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;

use automata_core::math::OrderedMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::pta::{Node, NodeId, Pta, TransitionInfo};
use score::{AlwaysCompatible, LocalScore, PartitionInfo, deterministic_compatible, moore_compatible};

/// Whether a node's color is a Moore-style state output or purely transition-driven (Mealy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBehavior {
    Moore,
    Mealy,
}

/// The shape the learner assumes transitions have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionBehavior {
    Deterministic,
    NonDeterministic,
    Stochastic,
}

/// *When* the local score is evaluated relative to partition construction (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityBehavior {
    /// Only compare the futures of the two states, against the original (unmerged) PTA.
    Future,
    /// Check compatibility lazily while the partition is built.
    Partition,
    /// Check compatibility once, after the whole partition has been built.
    Merge,
}

/// The outcome of attempting to merge a blue state into a red state: either the merge is
/// infeasible, or it is feasible with a [`MergeScore`] and a [`Partition`] ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeScore {
    /// A distinguished perfect score (⊤): committed immediately, no other red candidate
    /// considered for this blue state.
    Perfect,
    Value(f64),
}

impl MergeScore {
    /// Whether `self` should replace `other` as the best candidate seen so far. `Perfect` beats
    /// every `Value` and never loses to one; two `Value`s compare numerically.
    fn beats(&self, other: &MergeScore) -> bool {
        match (self, other) {
            (MergeScore::Perfect, MergeScore::Perfect) => false,
            (MergeScore::Perfect, MergeScore::Value(_)) => true,
            (MergeScore::Value(_), MergeScore::Perfect) => false,
            (MergeScore::Value(a), MergeScore::Value(b)) => a > b,
        }
    }
}

/// Scores an entire partition (as opposed to [`LocalScore`], which scores one node pair), given
/// the [`PartitionInfo`] accumulated while the partition was walked. Used to pick among several
/// feasible merge candidates for the same blue state.
pub trait GlobalScore<I, O> {
    fn score(&self, partition: &Partition<I, O>, info: &PartitionInfo) -> MergeScore;
}

/// The default global score: every feasible merge is perfect, so the first red state for which
/// partition construction succeeds is used (scanned in `red_states` order).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGlobalScore;

impl<I, O> GlobalScore<I, O> for DefaultGlobalScore {
    fn score(&self, _partition: &Partition<I, O>, _info: &PartitionInfo) -> MergeScore {
        MergeScore::Perfect
    }
}

/// Orders blue-state candidates so the search is deterministic. The default prefers the
/// shorter prefix, breaking ties by the node's arena-creation order (itself already breadth-first
/// from the root).
pub trait NodeOrder<I, O> {
    fn compare(&self, pta: &Pta<I, O>, a: NodeId, b: NodeId) -> std::cmp::Ordering;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShorterPrefixFirst;

impl<I, O> NodeOrder<I, O> for ShorterPrefixFirst
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    fn compare(&self, pta: &Pta<I, O>, a: NodeId, b: NodeId) -> std::cmp::Ordering {
        pta.node(a)
            .prefix
            .len()
            .cmp(&pta.node(b).prefix.len())
            .then(a.cmp(&b))
    }
}

#[derive(Debug, Error)]
pub enum GsmError {
    #[error("invalid GSM configuration: {0}")]
    InvalidConfiguration(String),
}

/// A built partition: for every arena node visited while merging a blue state into a red state,
/// the transition table it should have after the merge commits.
#[derive(Debug, Default)]
pub struct Partition<I, O> {
    blocks: OrderedMap<NodeId, OrderedMap<I, OrderedMap<O, TransitionInfo>>>,
}

impl<I, O> Partition<I, O> {
    pub fn blocks(&self) -> impl Iterator<Item = (NodeId, &OrderedMap<I, OrderedMap<O, TransitionInfo>>)> {
        self.blocks.iter().map(|(id, block)| (*id, block))
    }
}

/// Configuration and state for one run of the generalized state-merging search.
pub struct Gsm<I, O, L = AlwaysCompatible, G = DefaultGlobalScore, N = ShorterPrefixFirst> {
    pta: Pta<I, O>,
    output_behavior: OutputBehavior,
    transition_behavior: TransitionBehavior,
    compatibility_behavior: CompatibilityBehavior,
    local_score: L,
    global_score: G,
    node_order: N,
    eval_compat_on_pta: bool,
    red_states: Vec<NodeId>,
    /// (red, blue) -> previously computed outcome. Persists across promotions; cleared whenever
    /// a merge is actually committed, since a commit changes the graph every subsequent
    /// candidate is evaluated against.
    cache: OrderedMap<(NodeId, NodeId), Option<(Partition<I, O>, MergeScore)>>,
}

impl<I, O> Gsm<I, O, AlwaysCompatible, DefaultGlobalScore, ShorterPrefixFirst>
where
    I: Clone + Eq + Hash + Debug + Ord,
    O: Clone + Eq + Hash + Debug + Ord,
{
    pub fn builder(pta: Pta<I, O>) -> GsmBuilder<I, O, AlwaysCompatible, DefaultGlobalScore, ShorterPrefixFirst> {
        GsmBuilder::new(pta)
    }
}

/// Builder for [`Gsm`], validating the configuration once at [`GsmBuilder::build`] rather than
/// scattering `assert!`s through the hot loop.
pub struct GsmBuilder<I, O, L, G, N> {
    pta: Pta<I, O>,
    output_behavior: OutputBehavior,
    transition_behavior: TransitionBehavior,
    compatibility_behavior: CompatibilityBehavior,
    local_score: L,
    global_score: G,
    node_order: N,
    eval_compat_on_pta: bool,
}

impl<I, O> GsmBuilder<I, O, AlwaysCompatible, DefaultGlobalScore, ShorterPrefixFirst>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug,
{
    fn new(pta: Pta<I, O>) -> Self {
        Self {
            pta,
            output_behavior: OutputBehavior::Moore,
            transition_behavior: TransitionBehavior::Deterministic,
            compatibility_behavior: CompatibilityBehavior::Partition,
            local_score: AlwaysCompatible,
            global_score: DefaultGlobalScore,
            node_order: ShorterPrefixFirst,
            eval_compat_on_pta: false,
        }
    }
}

impl<I, O, L, G, N> GsmBuilder<I, O, L, G, N> {
    pub fn output_behavior(mut self, ob: OutputBehavior) -> Self {
        self.output_behavior = ob;
        self
    }

    pub fn transition_behavior(mut self, tb: TransitionBehavior) -> Self {
        self.transition_behavior = tb;
        self
    }

    pub fn compatibility_behavior(mut self, cb: CompatibilityBehavior) -> Self {
        self.compatibility_behavior = cb;
        self
    }

    pub fn eval_compat_on_pta(mut self, flag: bool) -> Self {
        self.eval_compat_on_pta = flag;
        self
    }

    pub fn local_score<L2>(self, local_score: L2) -> GsmBuilder<I, O, L2, G, N> {
        GsmBuilder {
            pta: self.pta,
            output_behavior: self.output_behavior,
            transition_behavior: self.transition_behavior,
            compatibility_behavior: self.compatibility_behavior,
            local_score,
            global_score: self.global_score,
            node_order: self.node_order,
            eval_compat_on_pta: self.eval_compat_on_pta,
        }
    }

    pub fn global_score<G2>(self, global_score: G2) -> GsmBuilder<I, O, L, G2, N> {
        GsmBuilder {
            pta: self.pta,
            output_behavior: self.output_behavior,
            transition_behavior: self.transition_behavior,
            compatibility_behavior: self.compatibility_behavior,
            local_score: self.local_score,
            global_score,
            node_order: self.node_order,
            eval_compat_on_pta: self.eval_compat_on_pta,
        }
    }

    pub fn node_order<N2>(self, node_order: N2) -> GsmBuilder<I, O, L, G, N2> {
        GsmBuilder {
            pta: self.pta,
            output_behavior: self.output_behavior,
            transition_behavior: self.transition_behavior,
            compatibility_behavior: self.compatibility_behavior,
            local_score: self.local_score,
            global_score: self.global_score,
            node_order,
            eval_compat_on_pta: self.eval_compat_on_pta,
        }
    }

    pub fn build(self) -> Result<Gsm<I, O, L, G, N>, GsmError>
    where
        I: Clone + Eq + Hash + Debug,
        O: Clone + Eq + Hash + Debug,
    {
        // §9 design note: eval_compat_on_pta only makes sense when the scorer can see the
        // original PTA throughout the walk, i.e. in `future` mode. Pairing it with `merge` mode
        // (which evaluates the scorer only after the whole live partition is built) is
        // ambiguous, per the source's unresolved open question — we resolve it as fatal.
        if self.eval_compat_on_pta && self.compatibility_behavior == CompatibilityBehavior::Merge {
            return Err(GsmError::InvalidConfiguration(
                "eval_compat_on_pta=true is incompatible with compatibility_behavior=Merge"
                    .to_string(),
            ));
        }

        Ok(Gsm {
            pta: self.pta,
            output_behavior: self.output_behavior,
            transition_behavior: self.transition_behavior,
            compatibility_behavior: self.compatibility_behavior,
            local_score: self.local_score,
            global_score: self.global_score,
            node_order: self.node_order,
            eval_compat_on_pta: self.eval_compat_on_pta,
            red_states: vec![NodeId::ROOT],
            cache: OrderedMap::new(),
        })
    }
}

impl<I, O, L, G, N> Gsm<I, O, L, G, N>
where
    I: Clone + Eq + Hash + Debug + Ord,
    O: Clone + Eq + Hash + Debug + Ord,
    L: LocalScore<I, O>,
    G: GlobalScore<I, O>,
    N: NodeOrder<I, O>,
{
    pub fn pta(&self) -> &Pta<I, O> {
        &self.pta
    }

    pub fn red_states(&self) -> &[NodeId] {
        &self.red_states
    }

    /// Runs the Moore/deterministic check the built-in scorers always apply, then the
    /// user-supplied `local_score` on top.
    fn compute_local_score(&self, a: NodeId, b: NodeId, info: &PartitionInfo, use_original: bool) -> bool {
        let (na, nb) = (self.pta.node(a), self.pta.node(b));
        if self.output_behavior == OutputBehavior::Moore && !moore_compatible(na, nb) {
            return false;
        }
        if self.transition_behavior == TransitionBehavior::Deterministic
            && !deterministic_compatible(na, nb)
        {
            return false;
        }
        self.local_score.is_compatible(na, nb, info, use_original)
    }

    /// Enumerates blue states (transition targets of red states that are not themselves red) and
    /// returns the minimum under `node_order`, or `None` if none remain.
    fn next_blue_state(&self) -> Option<NodeId> {
        let mut best: Option<NodeId> = None;
        for &red in &self.red_states {
            for (_, _, info) in self.pta.node(red).transition_iter() {
                let candidate = info.target;
                if self.red_states.contains(&candidate) {
                    continue;
                }
                best = Some(match best {
                    None => candidate,
                    Some(current) => {
                        if self.node_order.compare(&self.pta, candidate, current)
                            == std::cmp::Ordering::Less
                        {
                            candidate
                        } else {
                            current
                        }
                    }
                });
            }
        }
        best
    }

    /// §4.3 "future" mode precheck: walk `(red, blue)` through the *original* PTA and reject if
    /// any local score fails.
    fn check_futures(&self, red: NodeId, blue: NodeId) -> bool {
        let mut queue = VecDeque::new();
        queue.push_back((red, blue));
        let mut info = PartitionInfo::default();

        while let Some((red, blue)) = queue.pop_front() {
            info.record(red, blue);
            if !self.compute_local_score(red, blue, &info, self.eval_compat_on_pta) {
                return false;
            }

            for (in_sym, out_sym, blue_info) in self.pta.node(blue).transition_iter() {
                let Some(by_output) = self.pta.node(red).transitions_on(in_sym) else {
                    continue;
                };
                let Some(red_info) = by_output.get(out_sym) else {
                    continue;
                };
                if self.eval_compat_on_pta {
                    if blue_info.original_count == 0 || red_info.original_count == 0 {
                        continue;
                    }
                    queue.push_back((red_info.original_target, blue_info.original_target));
                } else {
                    queue.push_back((red_info.target, blue_info.target));
                }
            }
        }
        true
    }

    /// Builds the partition that would result from merging `blue` into `red`; evaluates the
    /// local score inline (`partition` mode) or once at the end (`merge` mode). `future` mode
    /// skips local-score evaluation here entirely — it was already decided by
    /// [`Self::check_futures`].
    fn partition_from_merge(&self, red: NodeId, blue: NodeId) -> Option<(Partition<I, O>, PartitionInfo)> {
        let mut blocks: OrderedMap<NodeId, OrderedMap<I, OrderedMap<O, TransitionInfo>>> =
            OrderedMap::new();
        let mut info = PartitionInfo::default();

        let mut shadow = |blocks: &mut OrderedMap<NodeId, OrderedMap<I, OrderedMap<O, TransitionInfo>>>, id: NodeId| {
            blocks
                .entry(id)
                .or_insert_with(|| self.pta.node(id).transitions.clone());
        };

        shadow(&mut blocks, red);

        let mut queue = VecDeque::new();
        queue.push_back((red, blue));

        while let Some((red, blue)) = queue.pop_front() {
            info.record(red, blue);
            shadow(&mut blocks, red);

            if self.compatibility_behavior == CompatibilityBehavior::Partition {
                let partition_node_compatible = {
                    // the partition node's *current* (possibly already-merged) table is what
                    // the scorer should see, so clone-free borrow via a temp node view.
                    let block = blocks.get(&red).unwrap();
                    let real = self.pta.node(red);
                    let mut probe = real.clone();
                    probe.transitions = block.clone();
                    self.score_against(&probe, blue, &info)
                };
                if !partition_node_compatible {
                    return None;
                }
            }

            let blue_node = self.pta.node(blue);
            let block = blocks.get_mut(&red).unwrap();
            for (in_sym, out_sym, blue_info) in blue_node.transition_iter() {
                let existing_target = block
                    .get(in_sym)
                    .and_then(|by_output| by_output.get(out_sym))
                    .map(|info| info.target);

                if let Some(target) = existing_target {
                    block
                        .get_mut(in_sym)
                        .unwrap()
                        .get_mut(out_sym)
                        .unwrap()
                        .count += blue_info.count;
                    queue.push_back((target, blue_info.target));
                } else {
                    block.entry(in_sym.clone()).or_default().insert(
                        out_sym.clone(),
                        TransitionInfo::introduced(blue_info.target, blue_info.count),
                    );
                }
            }
        }

        if self.compatibility_behavior == CompatibilityBehavior::Merge {
            for (&new_node, block) in blocks.iter() {
                let real = self.pta.node(new_node);
                let mut probe = real.clone();
                probe.transitions = block.clone();
                if self.output_behavior == OutputBehavior::Moore
                    && !moore_compatible(&probe, real)
                {
                    return None;
                }
                if self.transition_behavior == TransitionBehavior::Deterministic
                    && !deterministic_compatible(&probe, real)
                {
                    return None;
                }
                if !self.local_score.is_compatible(&probe, real, &info, false) {
                    return None;
                }
            }
        }

        Some((Partition { blocks }, info))
    }

    fn score_against(&self, probe: &Node<I, O>, blue: NodeId, info: &PartitionInfo) -> bool {
        let blue_node = self.pta.node(blue);
        if self.output_behavior == OutputBehavior::Moore && !moore_compatible(probe, blue_node) {
            return false;
        }
        if self.transition_behavior == TransitionBehavior::Deterministic
            && !deterministic_compatible(probe, blue_node)
        {
            return false;
        }
        self.local_score.is_compatible(probe, blue_node, info, false)
    }

    /// Tries to merge `blue` into `red`, consulting/populating the cache.
    fn try_merge(&mut self, red: NodeId, blue: NodeId) -> Option<MergeScore> {
        if let Some(cached) = self.cache.get(&(red, blue)) {
            return cached.as_ref().map(|(_, score)| score.clone());
        }

        // All three compatibility modes build the partition and then score it the same way: the
        // global score (default or user-supplied) always runs over the finished partition and its
        // accumulated info, since a non-default global score may depend on partition contents the
        // future-mode precheck alone cannot see (§9).
        let outcome = match self.compatibility_behavior {
            CompatibilityBehavior::Future => {
                if self.check_futures(red, blue) {
                    self.partition_from_merge(red, blue).map(|(partition, info)| {
                        let score = self.global_score.score(&partition, &info);
                        (partition, score)
                    })
                } else {
                    None
                }
            }
            CompatibilityBehavior::Partition | CompatibilityBehavior::Merge => {
                self.partition_from_merge(red, blue).map(|(partition, info)| {
                    let score = self.global_score.score(&partition, &info);
                    (partition, score)
                })
            }
        };

        let score = outcome.as_ref().map(|(_, s)| s.clone());
        self.cache.insert((red, blue), outcome);
        score
    }

    fn commit(&mut self, red: NodeId, blue: NodeId) {
        // rewire the blue node's parent to point at red; its BFS rewiring already happened while
        // the partition walk ran, so here we only need the direct parent edge that the caller's
        // blue-state enumeration found (the blue node is, by the red/blue invariant, a direct
        // successor of some red state).
        let (_, partition) = self
            .cache
            .shift_remove(&(red, blue))
            .flatten()
            .expect("commit called only after a successful try_merge");

        for (id, block) in partition.blocks {
            self.pta.node_mut(id).transitions = block;
        }

        for &r in &self.red_states {
            let targets: Vec<(I, O)> = self
                .pta
                .node(r)
                .transition_iter()
                .filter(|(_, _, info)| info.target == blue)
                .map(|(i, o, _)| (i.clone(), o.clone()))
                .collect();
            for (i, o) in targets {
                self.pta
                    .node_mut(r)
                    .transitions
                    .get_mut(&i)
                    .unwrap()
                    .get_mut(&o)
                    .unwrap()
                    .target = red;
            }
        }

        self.cache.clear();
    }

    /// Runs the red/blue search to completion and returns the merged PTA plus the final set of
    /// red (representative) states.
    pub fn run(mut self) -> (Pta<I, O>, Vec<NodeId>) {
        debug!(size = self.pta.len(), "starting GSM run");

        loop {
            let Some(blue) = self.next_blue_state() else {
                break;
            };

            let mut best: Option<(NodeId, MergeScore)> = None;
            for &red in self.red_states.clone().iter() {
                if let Some(score) = self.try_merge(red, blue) {
                    let is_perfect = matches!(score, MergeScore::Perfect);
                    best = Some(match best.take() {
                        None => (red, score),
                        Some((bred, bscore)) => {
                            if score.beats(&bscore) {
                                (red, score)
                            } else {
                                (bred, bscore)
                            }
                        }
                    });
                    if is_perfect {
                        break;
                    }
                }
            }

            match best {
                None => {
                    trace!(?blue, "promoting blue state to red");
                    self.red_states.push(blue);
                }
                Some((red, _)) => {
                    trace!(?red, ?blue, "committing merge");
                    self.commit(red, blue);
                }
            }
        }

        debug!(states = self.red_states.len(), "GSM run complete");
        (self.pta, self.red_states)
    }
}
