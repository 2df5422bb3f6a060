//! Journal and entry records as stored in the `journals` and `entries` tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A named collection of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub modified_at: i64,
}

/// A single journal entry.
///
/// `tags` are persisted as a JSON array in the `entries.tags` column; that
/// serialized form is what free-text search matches against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub journal_id: String,
    pub title: String,
    /// Rich-text body; may contain HTML markup.
    pub content: String,
    pub tags: Vec<String>,
    pub mood: Option<String>,
    pub entry_date: NaiveDate,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Field values for an entry that has not been written yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub journal_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Column list matching [`entry_from_row`], for `SELECT {ENTRY_COLUMNS} FROM entries e`.
pub(crate) const ENTRY_COLUMNS: &str = "e.id, e.journal_id, e.title, e.content, e.tags, e.mood, \
     e.entry_date, e.is_favorite, e.is_archived, e.created_at, e.modified_at";

/// Maps a row selected with [`ENTRY_COLUMNS`] into an [`Entry`].
///
/// A corrupt `tags` column surfaces as a conversion failure rather than an empty list.
pub(crate) fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
    let tags_json: String = row.get(4)?;
    let tags = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Entry {
        id: row.get(0)?,
        journal_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        tags,
        mood: row.get(5)?,
        entry_date: row.get(6)?,
        is_favorite: row.get::<_, i64>(7)? != 0,
        is_archived: row.get::<_, i64>(8)? != 0,
        created_at: row.get(9)?,
        modified_at: row.get(10)?,
    })
}

/// Lowercases, trims and deduplicates tags; the stored order is sorted.
pub(crate) fn normalise_tags(tags: &[String]) -> Vec<String> {
    let mut normalised: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    normalised.sort();
    normalised.dedup();
    normalised
}
