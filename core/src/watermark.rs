/// Timeline high-water mark
use serde::{Deserialize, Serialize};

/// Highest status id already delivered for a session's timeline
///
/// Only ever moves up. Ids of 0 (undecodable) never establish a mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark(Option<u64>);

impl Watermark {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<u64> {
        self.0
    }

    /// `since_id` parameter for the next timeline fetch, if any
    pub fn since_param(&self) -> Option<(&'static str, String)> {
        self.0.map(|id| ("since_id", id.to_string()))
    }

    /// Whether a status with `id` was already delivered
    pub fn covers(&self, id: u64) -> bool {
        match self.0 {
            Some(current) => id != 0 && id <= current,
            None => false,
        }
    }

    /// Raise the mark to `id` if it is higher; returns whether it moved
    pub fn observe(&mut self, id: u64) -> bool {
        if id == 0 {
            return false;
        }
        match self.0 {
            Some(current) if current >= id => false,
            _ => {
                self.0 = Some(id);
                true
            }
        }
    }

    /// Fold a whole page of ids into the mark
    pub fn observe_all<I>(&mut self, ids: I) -> bool
    where
        I: IntoIterator<Item = u64>,
    {
        match ids.into_iter().max() {
            Some(max) => self.observe(max),
            None => false,
        }
    }
}
