//! Deterministic id sources for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::id::{IdSource, QueryId};

/// An [`IdSource`] that replays a fixed list of ids.
///
/// Lets a test pin down the exact ids a register will hand out, so stale-id
/// scenarios can be scripted literally. Panics when the script runs dry —
/// that is a test bug, not a runtime condition.
#[derive(Debug)]
pub struct ScriptedIds {
    script: Mutex<VecDeque<QueryId>>,
}

impl ScriptedIds {
    /// Script the given raw ids, handed out in order.
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: Mutex::new(ids.into_iter().map(QueryId::from_raw).collect()),
        }
    }
}

impl IdSource for ScriptedIds {
    fn next_id(&self) -> QueryId {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .expect("scripted id source exhausted")
    }
}

// ===========================================================================
// Tests
// ===========================================================================
