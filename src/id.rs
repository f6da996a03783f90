//! Task identifier generation.
//!
//! Task IDs are ULIDs: lexicographically sortable, time-prefixed, 128-bit
//! values encoded as a 26-character Crockford-base32 string. This is the
//! same scheme the Python precursor used via its `ulid` package.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A task's unique, sortable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Ulid);

impl TaskId {
    /// Generates a new, time-ordered task ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses a task ID from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not a valid ULID string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ulid::from_string(s).map(Self)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_round_trips_through_display_and_parse() {
        let id = TaskId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 26);
        let parsed: TaskId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_ids_are_lexicographically_sortable_by_creation_order() {
        let first = TaskId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = TaskId::new();
        assert!(first.to_string() < second.to_string());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TaskId::parse("not-a-ulid").is_err());
    }
}
