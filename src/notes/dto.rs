use serde::Deserialize;

/// Body for creating or updating a note. Emptiness checks are the caller's
/// contract; the service persists what it is given.
#[derive(Debug, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub color: String,
}
