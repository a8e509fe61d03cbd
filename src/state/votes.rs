use std::collections::HashMap;
use tracing::{error, info};

use super::library::{CounterDelta, EntryStore, StoreError};

/// A thumbs up or thumbs down press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vote {
    Up,
    Down,
}

/// How a record keeps its vote counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterLayout {
    /// Separate up and down counters (water sources), never below zero
    Split {
        up: &'static str,
        down: &'static str,
    },
    /// One net counter (discussion likes), may go negative
    Net { field: &'static str },
}

/// Counters of a water source
pub const SOURCE_VOTES: CounterLayout = CounterLayout::Split {
    up: "upVotes",
    down: "downVotes",
};

/// Counter of a discussion thread
pub const DISCUSSION_LIKES: CounterLayout = CounterLayout::Net { field: "likes" };

/// Field deltas for moving the user's vote from `previous` to `next`
pub fn vote_deltas(layout: CounterLayout, previous: Option<Vote>, next: Option<Vote>) -> Vec<CounterDelta> {
    let weight = |vote: Option<Vote>| match vote {
        Some(Vote::Up) => 1,
        Some(Vote::Down) => -1,
        None => 0,
    };

    match layout {
        CounterLayout::Net { field } => {
            let delta = weight(next) - weight(previous);
            if delta == 0 {
                Vec::new()
            } else {
                vec![CounterDelta {
                    field,
                    delta,
                    floor: None,
                }]
            }
        }
        CounterLayout::Split { up, down } => {
            let change = |vote: Vote, delta: i64| CounterDelta {
                field: match vote {
                    Vote::Up => up,
                    Vote::Down => down,
                },
                delta,
                floor: Some(0),
            };
            let mut deltas = Vec::new();
            if previous == next {
                return deltas;
            }
            if let Some(vote) = previous {
                deltas.push(change(vote, -1));
            }
            if let Some(vote) = next {
                deltas.push(change(vote, 1));
            }
            deltas
        }
    }
}

/// The signed-in user's votes, keyed by record id.
///
/// Pressing the current vote again takes it back; pressing the other one
/// switches. Counters change through store side increments only, so
/// concurrent voters on other devices are never overwritten.
#[derive(Debug, Default, Clone)]
pub struct VoteBook {
    votes: HashMap<String, Vote>,
}

impl VoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, id: &str) -> Option<Vote> {
        self.votes.get(id).copied()
    }

    /// Vote state after pressing `vote` on record `id`
    pub fn toggled(&self, id: &str, vote: Vote) -> Option<Vote> {
        match self.current(id) {
            Some(current) if current == vote => None,
            _ => Some(vote),
        }
    }

    /// Apply a press to the store. All counters of the press change in one
    /// store transaction, and the local state only changes once it went
    /// through.
    pub fn press(
        &mut self,
        store: &dyn EntryStore,
        layout: CounterLayout,
        collection: &str,
        id: &str,
        vote: Vote,
    ) -> Result<Option<Vote>, StoreError> {
        let previous = self.current(id);
        let next = self.toggled(id, vote);

        let deltas = vote_deltas(layout, previous, next);
        if !deltas.is_empty() {
            if let Err(e) = store.increment(collection, id, &deltas) {
                error!(collection, id, error = %e, "vote write failed");
                return Err(e);
            }
        }

        match next {
            Some(vote) => self.votes.insert(id.to_string(), vote),
            None => self.votes.remove(id),
        };
        info!(collection, id, ?next, "vote recorded");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::library::Library;
    use serde_json::json;

    fn split(field: &'static str, delta: i64) -> CounterDelta {
        CounterDelta { field, delta, floor: Some(0) }
    }

    fn net(delta: i64) -> CounterDelta {
        CounterDelta { field: "likes", delta, floor: None }
    }

    #[test]
    fn test_split_deltas() {
        assert_eq!(
            vote_deltas(SOURCE_VOTES, None, Some(Vote::Up)),
            vec![split("upVotes", 1)]
        );
        assert_eq!(
            vote_deltas(SOURCE_VOTES, Some(Vote::Up), None),
            vec![split("upVotes", -1)]
        );
        assert_eq!(
            vote_deltas(SOURCE_VOTES, Some(Vote::Up), Some(Vote::Down)),
            vec![split("upVotes", -1), split("downVotes", 1)]
        );
        assert!(vote_deltas(SOURCE_VOTES, Some(Vote::Down), Some(Vote::Down)).is_empty());
    }

    #[test]
    fn test_net_deltas() {
        assert_eq!(
            vote_deltas(DISCUSSION_LIKES, None, Some(Vote::Down)),
            vec![net(-1)]
        );
        assert_eq!(
            vote_deltas(DISCUSSION_LIKES, Some(Vote::Down), Some(Vote::Up)),
            vec![net(2)]
        );
    }

    #[test]
    fn test_press_toggles() {
        let book = VoteBook::new();
        assert_eq!(book.toggled("1", Vote::Up), Some(Vote::Up));

        let mut book = VoteBook::new();
        book.votes.insert("1".into(), Vote::Up);
        assert_eq!(book.toggled("1", Vote::Up), None);
        assert_eq!(book.toggled("1", Vote::Down), Some(Vote::Down));
    }

    #[test]
    fn test_press_updates_store() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("water_source", "1", &json!({"title": "Well", "upVotes": 3, "downVotes": 0}))
            .unwrap();
        let mut book = VoteBook::new();

        book.press(&library, SOURCE_VOTES, "water_source", "1", Vote::Up).unwrap();
        book.press(&library, SOURCE_VOTES, "water_source", "1", Vote::Down).unwrap();

        let snapshot = library.snapshot("water_source").unwrap();
        assert_eq!(snapshot["1"]["upVotes"], json!(3));
        assert_eq!(snapshot["1"]["downVotes"], json!(1));
        assert_eq!(book.current("1"), Some(Vote::Down));

        book.press(&library, SOURCE_VOTES, "water_source", "1", Vote::Down).unwrap();
        let snapshot = library.snapshot("water_source").unwrap();
        assert_eq!(snapshot["1"]["downVotes"], json!(0));
        assert_eq!(book.current("1"), None);
    }

    #[test]
    fn test_failed_write_keeps_local_vote() {
        let library = Library::in_memory().unwrap();
        let mut book = VoteBook::new();

        let result = book.press(&library, DISCUSSION_LIKES, "discussions", "missing", Vote::Up);

        assert!(result.is_err());
        assert_eq!(book.current("missing"), None);
    }

    #[test]
    fn test_dislike_then_like_on_unliked_thread() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("discussions", "d1", &json!({"title": "Boil notice?", "likes": 0}))
            .unwrap();
        let mut book = VoteBook::new();

        book.press(&library, DISCUSSION_LIKES, "discussions", "d1", Vote::Down).unwrap();
        assert_eq!(library.snapshot("discussions").unwrap()["d1"]["likes"], json!(-1));

        book.press(&library, DISCUSSION_LIKES, "discussions", "d1", Vote::Up).unwrap();
        assert_eq!(library.snapshot("discussions").unwrap()["d1"]["likes"], json!(1));
        assert_eq!(book.current("d1"), Some(Vote::Up));
    }

    #[test]
    fn test_failed_switch_keeps_store_and_book_in_step() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("water_source", "1", &json!({"title": "Well", "upVotes": 5, "downVotes": "x"}))
            .unwrap();
        let mut book = VoteBook::new();
        book.press(&library, SOURCE_VOTES, "water_source", "1", Vote::Up).unwrap();

        let result = book.press(&library, SOURCE_VOTES, "water_source", "1", Vote::Down);

        assert!(matches!(result, Err(StoreError::NotACounter { .. })));
        assert_eq!(library.snapshot("water_source").unwrap()["1"]["upVotes"], json!(6));
        assert_eq!(book.current("1"), Some(Vote::Up));

        // taking the vote back still works from the unchanged state
        book.press(&library, SOURCE_VOTES, "water_source", "1", Vote::Up).unwrap();
        assert_eq!(library.snapshot("water_source").unwrap()["1"]["upVotes"], json!(5));
        assert_eq!(book.current("1"), None);
    }
}
