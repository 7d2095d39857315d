//! IMAP command tag generator.

use std::sync::atomic::{AtomicU32, Ordering};

/// Generates sequential command tags: `A0001`, `A0002`, ...
///
/// The counter wraps instead of failing; tags only have to be unique among
/// the commands in flight.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(1),
            prefix,
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{n:04}", self.prefix)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_tags() {
        let tags = TagGenerator::default();
        assert_eq!(tags.next(), "A0001");
        assert_eq!(tags.next(), "A0002");
    }

    #[test]
    fn custom_prefix_and_width() {
        let tags = TagGenerator::new('T');
        for _ in 0..10_000 {
            let _ = tags.next();
        }
        assert_eq!(tags.next(), "T10001");
    }
}
