//! In-memory sample model: a multiset of observed traces, Moore-prefixed by a shared initial
//! output, feeding [`automata::pta::construct_pta`] and on into [`automata::gsm::Gsm`].

use std::fmt::Debug;
use std::hash::Hash;

use automata::automaton::{export_mdp, Mdp};
use automata::gsm::score::HoeffdingCompatible;
use automata::gsm::{CompatibilityBehavior, Gsm, GsmError, OutputBehavior, TransitionBehavior};
use automata::pta::{construct_pta, NonDeterministicInput};
use tracing::info;

/// One observed behavior: an optional initial output (shared across a [`Sample`] in Moore mode)
/// followed by a sequence of `(input, output)` steps.
#[derive(Debug, Clone)]
pub struct Trace<I, O> {
    pub initial_output: Option<O>,
    pub steps: Vec<(I, O)>,
}

impl<I, O> Trace<I, O> {
    pub fn new(initial_output: Option<O>, steps: impl IntoIterator<Item = (I, O)>) -> Self {
        Self {
            initial_output,
            steps: steps.into_iter().collect(),
        }
    }

    pub fn mealy(steps: impl IntoIterator<Item = (I, O)>) -> Self {
        Self::new(None, steps)
    }
}

/// A collection of [`Trace`]s over a common alphabet. All Moore-mode traces in a sample are
/// expected to share one `initial_output`; [`Sample::to_pta`] uses the first one it finds.
#[derive(Debug, Clone, Default)]
pub struct Sample<I, O> {
    pub traces: Vec<Trace<I, O>>,
}

impl<I, O> Sample<I, O> {
    pub fn new(traces: impl IntoIterator<Item = Trace<I, O>>) -> Self {
        Self {
            traces: traces.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

impl<I, O> Sample<I, O>
where
    I: Clone + Eq + Hash + Debug,
    O: Clone + Eq + Hash + Debug + Default,
{
    /// Builds the prefix-tree acceptor for this sample. The root's output is the first
    /// `initial_output` found among the traces, or `O::default()` if none carry one (the
    /// Mealy-mode / transition-driven case, where the root's own output is a placeholder).
    pub fn to_pta(&self, deterministic: bool) -> Result<automata::pta::Pta<I, O>, NonDeterministicInput<I, O>> {
        let initial_output = self
            .traces
            .iter()
            .find_map(|t| t.initial_output.clone())
            .unwrap_or_default();

        let core_traces = self
            .traces
            .iter()
            .cloned()
            .map(|t| automata::pta::Trace::new(t.steps));

        construct_pta(initial_output, core_traces, deterministic)
    }
}

/// Runs Alergia (`GSM(stochastic, future, hoeffding)`, §4.7) over `sample` and exports the result
/// as an [`Mdp`] with Hoeffding intervals attached at confidence `1 - eps`. Uses Mealy output
/// behavior: an MDP's states are bare identities distinguished only by their transition
/// distributions, not by a per-state Moore label, so compatibility is left entirely to
/// `HoeffdingCompatible`.
pub fn alergia<I, O>(sample: &Sample<I, O>, eps: f64) -> Result<Mdp<I, O>, GsmError>
where
    I: Clone + Eq + Hash + Debug + Ord,
    O: Clone + Eq + Hash + Debug + Ord + Default,
{
    info!(traces = sample.len(), eps, "running Alergia");
    let pta = sample
        .to_pta(false)
        .expect("stochastic samples are never rejected for non-determinism");

    let gsm = Gsm::builder(pta)
        .output_behavior(OutputBehavior::Mealy)
        .transition_behavior(TransitionBehavior::Stochastic)
        .compatibility_behavior(CompatibilityBehavior::Future)
        .eval_compat_on_pta(true)
        .local_score(HoeffdingCompatible::new(eps))
        .build()?;

    let (merged, red_states) = gsm.run();
    Ok(export_mdp(&merged, &red_states, Some(eps)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_pta_uses_first_initial_output() {
        let sample: Sample<char, bool> = Sample::new([
            Trace::new(Some(true), [('a', false), ('b', true)]),
            Trace::new(None, [('a', false)]),
        ]);
        let pta = sample.to_pta(true).expect("deterministic sample");
        assert_eq!(pta.node(pta.root()).output, true);
    }

    /// A biased coin: 1000 single-step traces over `{flip}`, 700 heads and 300 tails. Every trace
    /// is a leaf with no further history, so each merges trivially into the root regardless of
    /// the local score — the whole sample collapses to one state whose single `flip` transition
    /// carries the 70/30 split directly as two probability-weighted self-loops.
    #[test]
    fn alergia_learns_biased_coin_as_single_state() {
        let heads = (0..700).map(|_| Trace::new(Some(true), [('f', true)]));
        let tails = (0..300).map(|_| Trace::new(Some(true), [('f', false)]));
        let sample: Sample<char, bool> = Sample::new(heads.chain(tails));

        let mdp = alergia(&sample, 0.05).expect("valid configuration");
        assert_eq!(mdp.size(), 1, "every trace is a single 'flip' step, so nothing resists merging into the root");

        let s0 = *mdp.names.get_by_left(&automata::pta::NodeId::ROOT).unwrap();
        let edges = mdp.transitions.get(&(s0, 'f')).expect("the root has a 'flip' transition");
        assert_eq!(edges.len(), 2, "heads and tails stay distinct outcomes of the same transition");

        for &(target, probability, interval) in edges {
            assert_eq!(target, s0, "both outcomes loop back to the single state");
            let (low, high) = interval.expect("eps was supplied, so every edge carries an interval");
            assert!(low <= probability && probability <= high);

            if probability > 0.5 {
                assert!((0.67..=0.73).contains(&probability), "heads share should be close to 0.7, got {probability}");
            } else {
                assert!((0.27..=0.33).contains(&probability), "tails share should be close to 0.3, got {probability}");
            }
        }
    }
}
