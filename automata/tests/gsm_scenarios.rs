//! End-to-end scenarios over `Pta` + `Gsm` + the `automaton` export types.

use automata::automaton::{export_dfa, export_mdp};
use automata::gsm::score::{AlwaysCompatible, NonDeterministicCompatible};
use automata::gsm::{CompatibilityBehavior, Gsm, OutputBehavior, TransitionBehavior};
use automata::pta::{construct_pta, NodeId, Trace};

/// A sample with one single-step trace merges down to a single red state: the blue child has
/// the same (Moore) output as the root and no transitions of its own, so it's absorbed on the
/// first merge attempt.
#[test_log::test]
fn single_state_dfa_from_trivial_sample() {
    let traces = vec![Trace::new([('a', false)])];
    let pta = construct_pta(false, traces, true).expect("deterministic sample");

    let gsm = Gsm::builder(pta)
        .output_behavior(OutputBehavior::Moore)
        .transition_behavior(TransitionBehavior::Deterministic)
        .compatibility_behavior(CompatibilityBehavior::Partition)
        .local_score(AlwaysCompatible)
        .build()
        .expect("valid configuration");

    let (merged, red_states) = gsm.run();
    assert_eq!(red_states.len(), 1);

    let dfa = export_dfa(&merged, &red_states);
    assert_eq!(dfa.size(), 1);
}

/// Builds every word of length <= 3 over {a, b}, labels each prefix with whether it ends in 'a',
/// and checks that GSM's default (Moore, deterministic, always-compatible) configuration merges
/// the resulting PTA down to the 2-state minimal automaton for "words ending in a".
#[test_log::test]
fn moore_mode_merge_learns_ends_in_a() {
    fn words_up_to(n: usize) -> Vec<Vec<char>> {
        let mut out = vec![Vec::new()];
        let mut frontier = vec![Vec::new()];
        for _ in 0..n {
            let mut next = Vec::new();
            for w in &frontier {
                for &c in &['a', 'b'] {
                    let mut w2 = w.clone();
                    w2.push(c);
                    next.push(w2);
                }
            }
            out.extend(next.iter().cloned());
            frontier = next;
        }
        out
    }

    let traces = words_up_to(3).into_iter().map(|word| {
        let steps = word
            .into_iter()
            .map(|symbol| {
                let ends_in_a = symbol == 'a';
                (symbol, ends_in_a)
            })
            .collect::<Vec<_>>();
        Trace::new(steps)
    });

    let pta = construct_pta(false, traces, true).expect("deterministic sample");
    let raw_size = pta.len();

    let gsm = Gsm::builder(pta)
        .output_behavior(OutputBehavior::Moore)
        .transition_behavior(TransitionBehavior::Deterministic)
        .compatibility_behavior(CompatibilityBehavior::Partition)
        .local_score(AlwaysCompatible)
        .build()
        .expect("valid configuration");

    let (merged, red_states) = gsm.run();
    assert_eq!(red_states.len(), 2, "ends-in-a has exactly two Myhill-Nerode classes");
    assert!(red_states.len() < raw_size);

    let dfa = export_dfa(&merged, &red_states);
    assert_eq!(dfa.size(), 2);
    // root (empty prefix) does not end in 'a'
    assert!(!dfa.is_accepting(dfa.names.get_by_left(&NodeId::ROOT).copied().unwrap()));
}

/// The two branches that force `construct_pta` to reject in deterministic mode (see
/// `pta::tests::deterministic_conflict_rejected`/`nondeterministic_mode_accepts_conflict`) but
/// succeed in non-deterministic mode, plus a third trace giving the root itself a direct, disjoint
/// `'b'` transition. That third trace is what makes the merge search interesting: when the search
/// tries to fold the shared `a/x` node into the root, the root's own `'b' -> {w}` support collides
/// with the `a/x` node's `'b' -> {y, z}` support under `NonDeterministicCompatible`, so the merge is
/// rejected and the `a/x` node is promoted to its own red state instead. Its two leaf children have
/// no transitions of their own, so each trivially merges into whichever red state the search tries
/// first. The result is exactly the 2-state NFA described by the non-deterministic scenario: one
/// state for the root, one for the state reached after `a/x`.
#[test_log::test]
fn nondeterministic_transition_behavior_merges_divergent_outputs() {
    let traces = vec![
        Trace::new([('a', 'x'), ('b', 'y')]),
        Trace::new([('a', 'x'), ('b', 'z')]),
        Trace::new([('b', 'w')]),
    ];
    let pta = construct_pta('r', traces, false).expect("non-deterministic construction always succeeds");

    let gsm = Gsm::builder(pta)
        .output_behavior(OutputBehavior::Mealy)
        .transition_behavior(TransitionBehavior::NonDeterministic)
        .compatibility_behavior(CompatibilityBehavior::Partition)
        .local_score(NonDeterministicCompatible::new(0))
        .build()
        .expect("valid configuration");

    let (merged, red_states) = gsm.run();
    assert_eq!(red_states.len(), 2, "divergent 'b' outputs after a shared 'a/x' prefix force a 2-state NFA");

    let mdp = export_mdp(&merged, &red_states, None);
    assert_eq!(mdp.size(), 2);
}

/// `TransitionInfo::original_count`/`original_target` are fixed at PTA construction and must
/// survive every merge a transition is caught up in, even as `count`/`target` keep changing.
///
/// Two traces share no prefix (`a/false` vs `b/false`) but both continue with `x/true`, so a
/// Moore-mode merge folds the second branch's root-level node into the first's: the root's own
/// `'a'` and `'b'` entries each get their live `target` rewired to the root itself, while the
/// `'x'` entry introduced by the merge accumulates a second trace's count on top of the first.
#[test_log::test]
fn merge_preserves_original_transition_counts() {
    let traces = vec![
        Trace::new([('a', false), ('x', true)]),
        Trace::new([('b', false), ('x', true)]),
    ];
    let pta = construct_pta(false, traces, true).expect("deterministic sample");

    let original_a_target = pta.node(pta.root()).transitions_on(&'a').unwrap().get(&false).unwrap().target;
    let original_b_target = pta.node(pta.root()).transitions_on(&'b').unwrap().get(&false).unwrap().target;
    let original_x_target = pta.node(original_a_target).transitions_on(&'x').unwrap().get(&true).unwrap().target;

    let gsm = Gsm::builder(pta)
        .output_behavior(OutputBehavior::Moore)
        .transition_behavior(TransitionBehavior::Deterministic)
        .compatibility_behavior(CompatibilityBehavior::Partition)
        .local_score(AlwaysCompatible)
        .build()
        .expect("valid configuration");

    let (merged, red_states) = gsm.run();
    assert_eq!(red_states.len(), 2, "two traces differing only in their first symbol merge to 2 states");

    let root_node = merged.node(merged.root());

    let a_info = root_node.transitions_on(&'a').unwrap().get(&false).unwrap();
    assert_eq!(a_info.target, NodeId::ROOT, "the 'a' branch merged into the root itself");
    assert_eq!(a_info.original_target, original_a_target, "original_target is frozen at construction");
    assert_eq!(a_info.count, 1);
    assert_eq!(a_info.original_count, 1, "merging must not change a count recorded in the original sample");

    let b_info = root_node.transitions_on(&'b').unwrap().get(&false).unwrap();
    assert_eq!(b_info.target, NodeId::ROOT, "the 'b' branch was absorbed by the merge, not the other way round");
    assert_eq!(b_info.original_target, original_b_target, "original_target is frozen at construction");
    assert_eq!(b_info.count, 1);
    assert_eq!(b_info.original_count, 1, "merging must not change a count recorded in the original sample");

    let x_info = root_node.transitions_on(&'x').unwrap().get(&true).unwrap();
    assert_eq!(x_info.target, original_x_target);
    assert_eq!(x_info.count, 2, "the second trace's 'x' step accumulates onto the first's");
    assert_eq!(x_info.original_count, 0, "this edge has no history in the original sample: it was introduced by the merge");
}
