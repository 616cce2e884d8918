use itertools::Itertools;

/// Compact, human-readable rendering. Distinct from `Debug`/`Display` in that it is meant for
/// dense one-line summaries of learner-internal values (access strings, node prefixes,
/// discriminators) in trace logs and error messages.
pub trait Show {
    fn show(&self) -> String;

    /// Renders a collection of `Self` the same way the built-in implementations for tuples and
    /// sequences do, joined and wrapped in braces. Types with a more natural collection
    /// rendering (e.g. words, which join without separators) override this.
    fn show_collection<'a, I>(iter: I) -> String
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: DoubleEndedIterator,
    {
        format!("{{{}}}", iter.into_iter().map(Show::show).join(", "))
    }
}

impl Show for bool {
    fn show(&self) -> String {
        self.to_string()
    }
}

impl Show for char {
    fn show(&self) -> String {
        self.to_string()
    }

    fn show_collection<'a, I>(iter: I) -> String
    where
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: DoubleEndedIterator,
    {
        iter.into_iter().collect()
    }
}

impl Show for u32 {
    fn show(&self) -> String {
        self.to_string()
    }
}

impl Show for u64 {
    fn show(&self) -> String {
        self.to_string()
    }
}

impl Show for usize {
    fn show(&self) -> String {
        self.to_string()
    }
}

impl Show for String {
    fn show(&self) -> String {
        self.clone()
    }
}

impl<T: Show> Show for Vec<T> {
    fn show(&self) -> String {
        T::show_collection(self.iter())
    }
}
