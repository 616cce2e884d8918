use crate::Show;
use crate::alphabet::Symbol;

/// A finite sequence of input symbols: an access string, a discriminator, a counterexample, or a
/// membership-query word. Kept symbol-generic (rather than hard-coded to `char`) so the learner
/// works over alphabets of arbitrary tokens, not just single characters.
pub trait FiniteWord {
    type Symbol: Symbol;

    fn symbols(&self) -> impl Iterator<Item = Self::Symbol> + '_;

    fn len(&self) -> usize {
        self.symbols().count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_vec(&self) -> Vec<Self::Symbol> {
        self.symbols().collect()
    }

    fn show_word(&self) -> String
    where
        Self::Symbol: Show,
    {
        if self.len() == 0 {
            return "ε".to_string();
        }
        self.symbols().map(|s| s.show()).collect::<Vec<_>>().join("")
    }
}

impl<S: Symbol> FiniteWord for Vec<S> {
    type Symbol = S;

    fn symbols(&self) -> impl Iterator<Item = S> + '_ {
        self.iter().copied()
    }
}

impl<S: Symbol> FiniteWord for [S] {
    type Symbol = S;

    fn symbols(&self) -> impl Iterator<Item = S> + '_ {
        self.iter().copied()
    }
}

impl<S: Symbol> FiniteWord for &[S] {
    type Symbol = S;

    fn symbols(&self) -> impl Iterator<Item = S> + '_ {
        self.iter().copied()
    }
}
