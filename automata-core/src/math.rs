//! Thin aliases over [`indexmap`] collections. Every BFS/merge loop in `automata::gsm` and
//! `automata_learning::active::classification_tree` relies on insertion-order iteration to stay
//! reproducible across runs, which a plain `HashMap`/`HashSet` does not guarantee.

pub type OrderedMap<K, V> = indexmap::IndexMap<K, V>;
pub type OrderedSet<T> = indexmap::IndexSet<T>;

/// Alias matching the teacher crates' `math::Set` naming.
pub type Set<T> = OrderedSet<T>;
