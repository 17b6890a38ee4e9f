//! Running best-match reduction.
//!
//! The selector keeps the candidate with the strictly greatest match count.
//! On equal counts the candidate seen first is kept, so results depend on the
//! order in which batches are folded: fold them in file order.

use crate::matching::scoring::MatchResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BestMatchSelector {
    best: Option<MatchResult>,
    seen: usize,
}

impl BestMatchSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a single candidate
    pub fn offer(&mut self, candidate: MatchResult) {
        self.seen += 1;
        match &self.best {
            Some(best) if candidate.match_count <= best.match_count => {}
            _ => self.best = Some(candidate),
        }
    }

    /// Fold one batch of results, in batch order
    pub fn fold<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = MatchResult>,
    {
        for result in results {
            self.offer(result);
        }
    }

    /// Combine with a selector that covers input seen *after* this one
    #[must_use]
    pub fn merge(mut self, later: Self) -> Self {
        self.seen += later.seen;
        if let Some(candidate) = later.best {
            match &self.best {
                Some(best) if candidate.match_count <= best.match_count => {}
                _ => self.best = Some(candidate),
            }
        }
        self
    }

    /// Current best candidate, if any
    #[must_use]
    pub fn best(&self) -> Option<&MatchResult> {
        self.best.as_ref()
    }

    /// Number of candidates offered so far
    #[must_use]
    pub fn seen(&self) -> usize {
        self.seen
    }

    #[must_use]
    pub fn finish(self) -> Option<MatchResult> {
        self.best
    }
}
