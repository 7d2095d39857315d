//! Sequence sets for message ranges.

use super::{SeqNum, Uid};
use std::fmt;

/// Set of message numbers as sent in FETCH and SEARCH commands.
///
/// The same syntax addresses sequence numbers and, in `UID` commands, UIDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSet {
    /// Single number.
    Single(SeqNum),
    /// Inclusive range.
    Range(SeqNum, SeqNum),
    /// From a number to the last message (`n:*`).
    RangeFrom(SeqNum),
    /// All messages (`1:*`).
    All,
    /// Comma-separated list.
    Set(Vec<Self>),
}

impl SequenceSet {
    /// Creates a sequence set from a single number.
    #[must_use]
    pub fn single(n: u32) -> Option<Self> {
        SeqNum::new(n).map(Self::Single)
    }

    /// Creates a range sequence set.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Option<Self> {
        Some(Self::Range(SeqNum::new(start)?, SeqNum::new(end)?))
    }

    /// Builds the shortest set covering exactly `numbers`, collapsing
    /// consecutive runs into ranges. Returns `None` for an empty slice.
    #[must_use]
    pub fn from_numbers(numbers: &[SeqNum]) -> Option<Self> {
        let mut sorted = numbers.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut items = Vec::new();
        let mut iter = sorted.into_iter();
        let first = iter.next()?;
        let (mut start, mut end) = (first, first);

        for n in iter {
            if n.get() == end.get() + 1 {
                end = n;
                continue;
            }
            items.push(Self::run(start, end));
            start = n;
            end = n;
        }
        items.push(Self::run(start, end));

        Some(if items.len() == 1 {
            items.remove(0)
        } else {
            Self::Set(items)
        })
    }

    fn run(start: SeqNum, end: SeqNum) -> Self {
        if start == end {
            Self::Single(start)
        } else {
            Self::Range(start, end)
        }
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::All => f.write_str("1:*"),
            Self::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// UID-based sequence set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidSet {
    /// Single UID.
    Single(Uid),
    /// Inclusive range of UIDs.
    Range(Uid, Uid),
}

impl UidSet {
    /// Converts to the sequence-set syntax used on the wire.
    #[must_use]
    pub fn as_sequence_set(&self) -> SequenceSet {
        match self {
            Self::Single(uid) => SequenceSet::Single(SeqNum(uid.0)),
            Self::Range(start, end) => SequenceSet::Range(SeqNum(start.0), SeqNum(end.0)),
        }
    }
}

impl From<Uid> for UidSet {
    fn from(uid: Uid) -> Self {
        Self::Single(uid)
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sequence_set())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn nums(values: &[u32]) -> Vec<SeqNum> {
        values.iter().map(|n| SeqNum::new(*n).unwrap()).collect()
    }

    #[test]
    fn display_forms() {
        assert_eq!(SequenceSet::single(1).unwrap().to_string(), "1");
        assert_eq!(SequenceSet::range(1, 10).unwrap().to_string(), "1:10");
        assert_eq!(SequenceSet::All.to_string(), "1:*");
        assert_eq!(
            SequenceSet::RangeFrom(SeqNum::new(5).unwrap()).to_string(),
            "5:*"
        );
        assert!(SequenceSet::single(0).is_none());
        assert!(SequenceSet::range(0, 3).is_none());
    }

    #[test]
    fn from_numbers_collapses_runs() {
        let set = SequenceSet::from_numbers(&nums(&[9, 1, 2, 3, 5, 8, 7])).unwrap();
        assert_eq!(set.to_string(), "1:3,5,7:9");
    }

    #[test]
    fn from_numbers_single_and_empty() {
        assert_eq!(
            SequenceSet::from_numbers(&nums(&[4, 4])).unwrap().to_string(),
            "4"
        );
        assert!(SequenceSet::from_numbers(&[]).is_none());
    }

    #[test]
    fn uid_set_display() {
        let uid = Uid::new(4827).unwrap();
        assert_eq!(UidSet::from(uid).to_string(), "4827");
        let range = UidSet::Range(Uid::new(1).unwrap(), Uid::new(3).unwrap());
        assert_eq!(range.to_string(), "1:3");
    }
}
