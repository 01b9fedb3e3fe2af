//! Sequence-number range selection for "most recent N" fetches.

use std::fmt;

/// An inclusive range of mailbox sequence numbers, `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    lower: u32,
    upper: u32,
}

impl SequenceRange {
    /// The most recent `limit` messages of a mailbox holding `total`:
    /// `[max(1, total - limit + 1), total]`.
    ///
    /// Returns `None` for an empty mailbox or a zero limit.
    #[must_use]
    pub fn most_recent(total: u32, limit: u32) -> Option<Self> {
        if total == 0 || limit == 0 {
            return None;
        }
        let lower = total.saturating_sub(limit).saturating_add(1).max(1);
        (lower <= total).then_some(Self {
            lower,
            upper: total,
        })
    }

    #[must_use]
    pub fn lower(&self) -> u32 {
        self.lower
    }

    #[must_use]
    pub fn upper(&self) -> u32 {
        self.upper
    }

    /// Number of sequence numbers covered.
    #[must_use]
    pub fn len(&self) -> usize {
        (self.upper - self.lower) as usize + 1
    }

    /// Always false; empty ranges are represented by `None`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// IMAP sequence-set syntax (`lower:upper`).
impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lower, self.upper)
    }
}
