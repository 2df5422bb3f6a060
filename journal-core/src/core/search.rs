//! Substring search over persisted entries.
//!
//! Both entry points are read-only and return plain data. Free text is
//! matched as a substring of the title, the content or any single tag, with
//! full Unicode case folding (the same folding the snippet finder uses);
//! results are ordered newest-modified first.

use crate::core::entry::{entry_from_row, ENTRY_COLUMNS};
use crate::core::snippet::{extract_snippet, fold_case, Snippet};
use crate::{Entry, Result};
use chrono::NaiveDate;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Paging and scope for [`search`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Restrict matches to one journal.
    pub journal_id: Option<String>,
}

/// Which entries [`advanced_search`] considers by archive state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveFilter {
    #[default]
    Active,
    Archived,
    All,
}

/// Input to [`advanced_search`]. Every populated field is AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedSearch {
    /// Free-text query; blank counts as absent.
    pub text: Option<String>,
    /// Entry must carry at least one of these tags.
    pub tags: Vec<String>,
    pub mood: Option<String>,
    /// Inclusive lower bound on `entry_date`.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on `entry_date`.
    pub date_to: Option<NaiveDate>,
    pub favorite: Option<bool>,
    pub archive: ArchiveFilter,
    pub journal_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// An entry returned by [`advanced_search`], with its snippet when free text was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub entry: Entry,
    pub snippet: Option<Snippet>,
}

/// Finds entries whose title, content or tags contain `query`, ignoring case.
///
/// A blank query returns no entries rather than all of them.
///
/// # Errors
///
/// Returns [`crate::JournalError::Database`] for any SQLite failure.
pub fn search(conn: &Connection, query: &str, options: &SearchOptions) -> Result<Vec<Entry>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(vec![]);
    }

    let mut filter = EntryFilter::default();
    filter.text(query);
    if let Some(journal_id) = &options.journal_id {
        filter.push("e.journal_id = ?", journal_id.clone());
    }
    filter.run(conn, options.limit, options.offset)
}

/// Runs a filtered search and attaches a snippet to each hit when `input.text` is set.
///
/// # Errors
///
/// Returns [`crate::JournalError::Database`] for any SQLite failure.
pub fn advanced_search(conn: &Connection, input: &AdvancedSearch) -> Result<Vec<SearchResult>> {
    let text = input
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let mut filter = EntryFilter::default();
    if let Some(text) = text {
        filter.text(text);
    }

    let tags: Vec<String> = input
        .tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        let placeholders = vec!["?"; tags.len()].join(", ");
        filter.clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(e.tags) WHERE json_each.value IN ({placeholders}))"
        ));
        filter.params.extend(tags.into_iter().map(Value::Text));
    }
    if let Some(mood) = &input.mood {
        filter.push("e.mood = ?", mood.clone());
    }
    if let Some(from) = input.date_from {
        filter.push("e.entry_date >= ?", from.format("%Y-%m-%d").to_string());
    }
    if let Some(to) = input.date_to {
        filter.push("e.entry_date <= ?", to.format("%Y-%m-%d").to_string());
    }
    if let Some(favorite) = input.favorite {
        filter.push("e.is_favorite = ?", i64::from(favorite));
    }
    match input.archive {
        ArchiveFilter::Active => filter.clauses.push("e.is_archived = 0".to_string()),
        ArchiveFilter::Archived => filter.clauses.push("e.is_archived = 1".to_string()),
        ArchiveFilter::All => {}
    }
    if let Some(journal_id) = &input.journal_id {
        filter.push("e.journal_id = ?", journal_id.clone());
    }

    let entries = filter.run(conn, input.limit, input.offset)?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let snippet = text.and_then(|t| extract_snippet(&entry, t));
            SearchResult { entry, snippet }
        })
        .collect())
}

/// Installs the `fold_case(text)` SQL function the text predicate relies on.
///
/// Called for every connection a [`crate::Store`] opens.
pub(crate) fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| fold_case(&t)))
        },
    )?;
    Ok(())
}

/// WHERE clauses and their positional parameters, in matching order.
#[derive(Default)]
struct EntryFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl EntryFilter {
    fn push(&mut self, clause: &str, value: impl Into<Value>) {
        self.clauses.push(clause.to_string());
        self.params.push(value.into());
    }

    /// Tags are matched one value at a time, never against the stored JSON text.
    fn text(&mut self, query: &str) {
        let needle = fold_case(query);
        self.clauses.push(
            "(instr(fold_case(e.title), ?) > 0 \
              OR instr(fold_case(e.content), ?) > 0 \
              OR EXISTS (SELECT 1 FROM json_each(e.tags) \
                         WHERE instr(fold_case(json_each.value), ?) > 0))"
                .to_string(),
        );
        for _ in 0..3 {
            self.params.push(Value::Text(needle.clone()));
        }
    }

    fn run(mut self, conn: &Connection, limit: Option<u32>, offset: Option<u32>) -> Result<Vec<Entry>> {
        let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e");
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY e.modified_at DESC, e.id DESC");
        if limit.is_some() || offset.is_some() {
            // SQLite needs a LIMIT before OFFSET; -1 means unbounded.
            sql.push_str(" LIMIT ? OFFSET ?");
            self.params.push(Value::Integer(limit.map_or(-1, i64::from)));
            self.params.push(Value::Integer(offset.map_or(0, i64::from)));
        }

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(rusqlite::params_from_iter(self.params.iter()), entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
