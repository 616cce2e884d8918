//! Pluggable compatibility predicates over pairs of PTA nodes.
//!
//! A [`LocalScore`] is evaluated many times per merge attempt, so implementations should stay
//! cheap. The three built-ins mirror the distilled specification's §4.2 exactly; [`Gsm`] always
//! additionally enforces Moore-output and deterministic-transition agreement before consulting
//! the configured `LocalScore`, the same way the source's `compute_local_score` layers a
//! fixed check in front of the user-supplied one.
//!
//! [`Gsm`]: crate::gsm::Gsm

use std::hash::Hash;

use crate::pta::{Node, NodeId};

/// Accumulated side-channel state for one partition walk: every `(red, blue)` node pair visited
/// so far, in visitation order. Threaded through as the `info` argument of [`LocalScore`] and
/// [`crate::gsm::GlobalScore`], matching the source's 4-ary local-score signature
/// `(a, b, info, use_original)` (§4.2/§4.3) — the source has overlapping GSM variants that also
/// carry a 3-ary `(a, b, info)` form with `use_original` folded away; this crate exposes only the
/// 4-ary form. None of the built-in scorers below read it, but a custom score can use it to see
/// the wider shape of the merge in progress rather than just the one node pair it was called with.
#[derive(Debug, Clone, Default)]
pub struct PartitionInfo {
    visited: Vec<(NodeId, NodeId)>,
}

impl PartitionInfo {
    pub(crate) fn record(&mut self, red: NodeId, blue: NodeId) {
        self.visited.push((red, blue));
    }

    /// Every `(red, blue)` pair visited so far during the walk that produced this `info`, in
    /// visitation order.
    pub fn visited(&self) -> &[(NodeId, NodeId)] {
        &self.visited
    }
}

/// A compatibility check between two PTA nodes. The `use_original` flag selects between the
/// merge-mutated `count`/`target` fields and the untouched `original_count`/`original_target`
/// fields — required for `future`-mode analyses (Alergia among them) where the score must reflect
/// the original sample's frequencies rather than whatever has been merged into the node so far.
pub trait LocalScore<I, O> {
    fn is_compatible(&self, a: &Node<I, O>, b: &Node<I, O>, info: &PartitionInfo, use_original: bool) -> bool;
}

impl<I, O, F> LocalScore<I, O> for F
where
    F: Fn(&Node<I, O>, &Node<I, O>, &PartitionInfo, bool) -> bool,
{
    fn is_compatible(&self, a: &Node<I, O>, b: &Node<I, O>, info: &PartitionInfo, use_original: bool) -> bool {
        self(a, b, info, use_original)
    }
}

/// Always compatible — the default `local_score` for deterministic-transition GSM, where
/// Moore/deterministic agreement (enforced unconditionally by [`crate::gsm::Gsm`]) is already a
/// complete compatibility criterion.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCompatible;

impl<I, O> LocalScore<I, O> for AlwaysCompatible {
    fn is_compatible(
        &self,
        _a: &Node<I, O>,
        _b: &Node<I, O>,
        _info: &PartitionInfo,
        _use_original: bool,
    ) -> bool {
        true
    }
}

/// The Hoeffding-bound stochastic compatibility check (§4.2). Two empirical output distributions
/// over a shared input are compatible if, for every output in either support, the gap between
/// their relative frequencies stays within the Hoeffding bound at confidence `1 - eps`.
#[derive(Debug, Clone, Copy)]
pub struct HoeffdingCompatible {
    pub eps: f64,
}

impl HoeffdingCompatible {
    pub fn new(eps: f64) -> Self {
        Self { eps }
    }
}

impl<I, O> LocalScore<I, O> for HoeffdingCompatible
where
    I: Eq + Hash + Clone,
    O: Eq + Hash + Clone,
{
    fn is_compatible(
        &self,
        a: &Node<I, O>,
        b: &Node<I, O>,
        _info: &PartitionInfo,
        use_original: bool,
    ) -> bool {
        for (in_sym, a_trans) in a.transitions.iter() {
            let Some(b_trans) = b.transitions.get(in_sym) else {
                continue;
            };
            let a_total: u64 = if use_original {
                a_trans.values().map(|t| t.original_count).sum()
            } else {
                a_trans.values().map(|t| t.count).sum()
            };
            let b_total: u64 = if use_original {
                b_trans.values().map(|t| t.original_count).sum()
            } else {
                b_trans.values().map(|t| t.count).sum()
            };
            if a_total == 0 || b_total == 0 {
                continue;
            }
            let threshold = (1.0 / (a_total as f64).sqrt() + 1.0 / (b_total as f64).sqrt())
                * (0.5 * (2.0 / self.eps).ln()).sqrt();

            let outputs = a_trans.keys().chain(b_trans.keys());
            let mut seen = automata_core::math::OrderedSet::new();
            for out in outputs {
                if !seen.insert(out.clone()) {
                    continue;
                }
                let ac = if use_original {
                    a_trans.get(out).map(|t| t.original_count).unwrap_or(0)
                } else {
                    a_trans.get(out).map(|t| t.count).unwrap_or(0)
                };
                let bc = if use_original {
                    b_trans.get(out).map(|t| t.original_count).unwrap_or(0)
                } else {
                    b_trans.get(out).map(|t| t.count).unwrap_or(0)
                };
                let diff = (ac as f64 / a_total as f64) - (bc as f64 / b_total as f64);
                if diff.abs() > threshold {
                    return false;
                }
            }
        }
        true
    }
}

/// The non-deterministic support-equality check (§4.2): for every shared input whose supports are
/// both at least `eps` in total weight, the sets of possible outputs must agree.
#[derive(Debug, Clone, Copy)]
pub struct NonDeterministicCompatible {
    pub eps: u64,
}

impl NonDeterministicCompatible {
    pub fn new(eps: u64) -> Self {
        Self { eps }
    }
}

impl<I, O> LocalScore<I, O> for NonDeterministicCompatible
where
    I: Eq + Hash + Clone,
    O: Eq + Hash + Clone,
{
    fn is_compatible(
        &self,
        a: &Node<I, O>,
        b: &Node<I, O>,
        _info: &PartitionInfo,
        use_original: bool,
    ) -> bool {
        assert!(
            !use_original,
            "non-deterministic compatibility has no original-count variant"
        );
        for (in_sym, a_trans) in a.transitions.iter() {
            let Some(b_trans) = b.transitions.get(in_sym) else {
                continue;
            };
            let a_total: u64 = a_trans.values().map(|t| t.count).sum();
            let b_total: u64 = b_trans.values().map(|t| t.count).sum();
            if a_total < self.eps || b_total < self.eps {
                continue;
            }
            let a_support: automata_core::math::OrderedSet<_> = a_trans.keys().cloned().collect();
            let b_support: automata_core::math::OrderedSet<_> = b_trans.keys().cloned().collect();
            if a_support != b_support {
                return false;
            }
        }
        true
    }
}

/// `a.output == b.output` (§4.2). [`crate::gsm::Gsm`] applies this unconditionally whenever
/// `output_behavior` is `Moore`, in addition to whatever `local_score` the caller configured.
pub fn moore_compatible<I, O: PartialEq>(a: &Node<I, O>, b: &Node<I, O>) -> bool {
    a.output == b.output
}

/// For every input shared between `a` and `b`, the output each leads to must agree (§4.2).
/// [`crate::gsm::Gsm`] applies this unconditionally whenever `transition_behavior` is
/// `Deterministic`.
pub fn deterministic_compatible<I, O>(a: &Node<I, O>, b: &Node<I, O>) -> bool
where
    I: Eq + Hash,
    O: Eq + Hash,
{
    for (in_sym, a_trans) in a.transitions.iter() {
        let Some(b_trans) = b.transitions.get(in_sym) else {
            continue;
        };
        // deterministic nodes have exactly one output per input once the table is non-empty.
        let a_out = a_trans.keys().next();
        let b_out = b_trans.keys().next();
        if let (Some(ao), Some(bo)) = (a_out, b_out) {
            if ao != bo {
                return false;
            }
        }
    }
    true
}
