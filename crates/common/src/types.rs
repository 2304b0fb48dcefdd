use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::truncate_to_second;

/// Boundary between rows already replicated and rows still pending.
///
/// An absent watermark means "replicate everything". Ordering places the
/// absent value below every instant, so `max` over watermarks behaves the
/// way a cycle needs it to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark(Option<DateTime<Utc>>);

impl Watermark {
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(Some(instant))
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.0
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    /// Raise the watermark to `instant` if it is newer. Never lowers it.
    pub fn observe(&mut self, instant: DateTime<Utc>) {
        match self.0 {
            Some(current) if current >= instant => {}
            _ => self.0 = Some(instant),
        }
    }

    /// Whether a row created at `instant` is past the watermark.
    ///
    /// Both sides are truncated to whole seconds before the strict comparison,
    /// mirroring the relational query.
    pub fn admits(&self, instant: DateTime<Utc>) -> bool {
        match self.0 {
            None => true,
            Some(current) => truncate_to_second(instant) > truncate_to_second(current),
        }
    }
}

impl From<Option<DateTime<Utc>>> for Watermark {
    fn from(instant: Option<DateTime<Utc>>) -> Self {
        Self(instant)
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(instant) => write!(f, "{}", instant.to_rfc3339()),
            None => write!(f, "beginning"),
        }
    }
}
