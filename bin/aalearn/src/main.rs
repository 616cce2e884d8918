//! Two small demos: Alergia over a synthetic biased-coin sample, and the KV loop learning a
//! Tomita-3-style DFA from a bounded random-walk oracle. Diagnostic only, not part of the
//! library's public contract.

use rand::Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use automata::automaton::{Dfa, StateId};
use automata_core::alphabet::CharAlphabet;
use automata_core::math::OrderedMap;
use automata_learning::active::oracle::RandomWalkOracle;
use automata_learning::active::sul::DfaSul;
use automata_learning::active::{CexProcessing, Kv};
use automata_learning::passive::{alergia, Sample, Trace};
use bimap::BiMap;
use tracing::info;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
        )
        .init();

    run_alergia_demo();
    println!();
    run_kv_demo();
}

/// Generates a biased-coin sample (70% heads) over alphabet `{f}` and runs Alergia on it.
fn run_alergia_demo() {
    info!("=== Alergia: biased-coin demo ===");
    let mut rng = rand::thread_rng();
    let bias = 0.7;

    let traces = (0..200).map(|_| {
        let len = rng.gen_range(1..=4);
        let steps = (0..len)
            .map(|_| {
                let heads = rng.gen_bool(bias);
                ('f', heads)
            })
            .collect::<Vec<_>>();
        Trace::new(Some(false), steps)
    });

    let sample: Sample<char, bool> = Sample::new(traces);
    let mdp = alergia(&sample, 0.05).expect("valid GSM configuration");

    println!("learned MDP with {} states:", mdp.size());
    println!("{}", mdp.describe());
}

/// A Tomita-3-style DFA over {0,1}: reject state q4 is the only non-accepting state, reached once
/// an odd run of 1s has been followed by a 0.
fn tomita_3() -> Dfa<char> {
    let states: Vec<StateId> = (0..5).map(|i| StateId(i as u32)).collect();
    let mut accepting = OrderedMap::new();
    for &s in &states {
        accepting.insert(s, s != StateId(4));
    }

    let mut transitions = OrderedMap::new();
    let edges = [
        (0, '0', 0),
        (0, '1', 1),
        (1, '0', 3),
        (1, '1', 2),
        (2, '0', 2),
        (2, '1', 2),
        (3, '0', 2),
        (3, '1', 4),
        (4, '0', 4),
        (4, '1', 4),
    ];
    for &(from, sym, to) in &edges {
        transitions.insert((StateId(from), sym), StateId(to));
    }

    Dfa {
        names: BiMap::new(),
        accepting,
        transitions,
        initial: StateId(0),
    }
}

fn run_kv_demo() {
    info!("=== KV: Tomita-3 demo ===");
    let target = tomita_3();
    let alphabet = CharAlphabet::from_chars(['0', '1']);

    let mut kv = Kv::builder(alphabet, DfaSul::new(target.clone()))
        .cex_processing(CexProcessing::Rs)
        .max_learning_rounds(30)
        .build()
        .expect("valid KV configuration");

    let mut oracle = RandomWalkOracle::new(DfaSul::new(target), vec!['0', '1'], 200, 15)
        .reset_probability(0.1);

    match kv.run(&mut oracle) {
        Ok(hypothesis) => println!("KV converged to a {}-state DFA", hypothesis.size()),
        Err(err) => println!("KV stopped before converging: {err}"),
    }
}
