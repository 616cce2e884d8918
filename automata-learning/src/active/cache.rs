//! Memoizes [`Sul`] queries by prefix and raises [`SulError`] the moment two queries over the
//! same prefix disagree. Wired into [`super::kv::Kv`], whose `sul` field wraps the caller's SUL
//! in a `CacheSul`: [`Kv::run`](super::kv::Kv::run) drains [`CacheSul::take_pending_error`] after
//! every SUL-touching step and surfaces a hit as `KvError::Sul`.

use std::fmt::Debug;
use std::hash::Hash;

use automata_core::math::OrderedMap;
use tracing::trace;

use super::SulError;
use super::sul::Sul;

/// Wraps a [`Sul`], caching every `(prefix, output)` pair it observes via [`Sul::step`]. A
/// repeated prefix that produces a different output than previously recorded is a
/// non-determinism violation — fatal, per the external-interfaces contract. `Sul::step` itself
/// can't return a `Result` (the trait has no error channel), so a detected violation is recorded
/// in `pending_error` for the caller to drain via [`Self::take_pending_error`] rather than
/// silently answered with the stale cached value.
pub struct CacheSul<S: Sul>
where
    S::Input: Debug,
    S::Output: Debug,
{
    inner: S,
    cache: OrderedMap<Vec<S::Input>, S::Output>,
    prefix: Vec<S::Input>,
    pending_error: Option<SulError<S::Input, S::Output>>,
}

impl<S: Sul> CacheSul<S>
where
    S::Input: Clone + Eq + Hash + Debug,
    S::Output: Clone + Eq + Debug,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: OrderedMap::new(),
            prefix: Vec::new(),
            pending_error: None,
        }
    }

    /// Number of distinct prefixes answered so far, queried or cached.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Takes the non-determinism violation recorded by the most recent [`Sul::step`] call that
    /// hit one, if any. Calling this clears it, so a violation is reported exactly once.
    pub fn take_pending_error(&mut self) -> Option<SulError<S::Input, S::Output>> {
        self.pending_error.take()
    }

    /// Like [`Sul::step`], but returns `Err` on a detected non-determinism violation instead of
    /// silently returning the (wrong) cached answer, and never touches `pending_error`.
    pub fn try_step(
        &mut self,
        input: &S::Input,
    ) -> Result<S::Output, SulError<S::Input, S::Output>> {
        self.prefix.push(input.clone());
        let observed = self.inner.step(input);

        match self.cache.get(&self.prefix) {
            Some(expected) if expected != &observed => {
                let err = SulError {
                    prefix: self.prefix.clone(),
                    expected: expected.clone(),
                    observed,
                };
                trace!(prefix = ?err.prefix, "non-determinism detected");
                Err(err)
            }
            Some(expected) => Ok(expected.clone()),
            None => {
                self.cache.insert(self.prefix.clone(), observed.clone());
                Ok(observed)
            }
        }
    }
}

impl<S: Sul> Sul for CacheSul<S>
where
    S::Input: Clone + Eq + Hash + Debug,
    S::Output: Clone + Eq + Debug,
{
    type Input = S::Input;
    type Output = S::Output;

    fn reset(&mut self) {
        self.inner.reset();
        self.prefix.clear();
    }

    fn step(&mut self, input: &Self::Input) -> Self::Output {
        match self.try_step(input) {
            Ok(observed) => observed,
            Err(err) => {
                let observed = err.observed.clone();
                self.pending_error = Some(err);
                observed
            }
        }
    }

    fn output(&mut self) -> Self::Output {
        self.inner.output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::sul::FunctionSul;

    #[test]
    fn stable_prefix_reuses_cached_answer() {
        let mut sul = CacheSul::new(FunctionSul::new(|w: &[char]| w.len() % 2 == 0));
        sul.reset();
        let first = sul.try_step(&'a').unwrap();
        sul.reset();
        let second = sul.try_step(&'a').unwrap();
        assert_eq!(first, second);
        assert_eq!(sul.cache_size(), 1);
    }

    #[test]
    fn flags_nondeterministic_prefix() {
        let parity = std::cell::Cell::new(false);
        let mut sul = CacheSul::new(FunctionSul::new(move |_: &[char]| {
            let value = parity.get();
            parity.set(!value);
            value
        }));
        sul.reset();
        sul.try_step(&'a').unwrap();
        sul.reset();
        let err = sul.try_step(&'a');
        assert!(err.is_err());
    }

    #[test]
    fn step_records_pending_error_instead_of_stale_value() {
        let parity = std::cell::Cell::new(false);
        let mut sul = CacheSul::new(FunctionSul::new(move |_: &[char]| {
            let value = parity.get();
            parity.set(!value);
            value
        }));
        sul.reset();
        let first = sul.step(&'a');
        sul.reset();
        let second = sul.step(&'a');

        assert_ne!(first, second, "step must return the freshly observed value, not the cache");
        let err = sul.take_pending_error().expect("non-determinism should be recorded");
        assert_eq!(err.expected, first);
        assert_eq!(err.observed, second);
        assert!(sul.take_pending_error().is_none(), "draining clears the pending error");
    }
}
