//! Parameterized statements for journals, entries and settings.
//!
//! These functions take a plain [`Connection`]; write paths call them with the
//! [`Scope`](crate::Scope) of an open transaction, which derefs to one. None of
//! them begins, commits or rolls back on its own.

use crate::core::entry::{entry_from_row, normalise_tags, ENTRY_COLUMNS};
use crate::{Entry, Journal, JournalError, NewEntry, Result};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

/// Inserts a new journal named `name`.
pub fn create_journal(conn: &Connection, name: &str) -> Result<Journal> {
    let now = chrono::Utc::now().timestamp();
    let journal = Journal {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_at: now,
        modified_at: now,
    };
    conn.execute(
        "INSERT INTO journals (id, name, created_at, modified_at) VALUES (?, ?, ?, ?)",
        rusqlite::params![journal.id, journal.name, journal.created_at, journal.modified_at],
    )?;
    Ok(journal)
}

/// Returns all journals ordered by name.
pub fn list_journals(conn: &Connection) -> Result<Vec<Journal>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at, modified_at FROM journals ORDER BY name COLLATE NOCASE, id",
    )?;
    let journals = stmt
        .query_map([], |row| {
            Ok(Journal {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
                modified_at: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(journals)
}

/// Inserts `new` as a fresh, unarchived entry and returns it.
///
/// # Errors
///
/// Returns [`JournalError::JournalNotFound`] if `new.journal_id` does not exist.
pub fn insert_entry(conn: &Connection, new: &NewEntry) -> Result<Entry> {
    let journal_exists: bool = conn
        .query_row("SELECT 1 FROM journals WHERE id = ?", [&new.journal_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !journal_exists {
        return Err(JournalError::JournalNotFound(new.journal_id.clone()));
    }

    let now = chrono::Utc::now().timestamp();
    let entry = Entry {
        id: Uuid::new_v4().to_string(),
        journal_id: new.journal_id.clone(),
        title: new.title.clone(),
        content: new.content.clone(),
        tags: normalise_tags(&new.tags),
        mood: new.mood.clone(),
        entry_date: new.entry_date,
        is_favorite: new.is_favorite,
        is_archived: false,
        created_at: now,
        modified_at: now,
    };
    conn.execute(
        "INSERT INTO entries (id, journal_id, title, content, tags, mood, entry_date,
                              is_favorite, is_archived, created_at, modified_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        rusqlite::params![
            entry.id,
            entry.journal_id,
            entry.title,
            entry.content,
            serde_json::to_string(&entry.tags)?,
            entry.mood,
            entry.entry_date,
            entry.is_favorite,
            entry.created_at,
            entry.modified_at,
        ],
    )?;
    Ok(entry)
}

/// Fetches a single entry by id.
///
/// # Errors
///
/// Returns [`JournalError::EntryNotFound`] if no entry has that id.
pub fn get_entry(conn: &Connection, entry_id: &str) -> Result<Entry> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.id = ?"),
        [entry_id],
        entry_from_row,
    )
    .optional()?
    .ok_or_else(|| JournalError::EntryNotFound(entry_id.to_string()))
}

/// Replaces the title and body of an entry and bumps `modified_at`.
pub fn update_entry_text(conn: &Connection, entry_id: &str, title: &str, content: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "UPDATE entries SET title = ?, content = ?, modified_at = ? WHERE id = ?",
        rusqlite::params![title, content, now, entry_id],
    )?;
    ensure_changed(conn, entry_id)
}

/// Replaces all tags of an entry. Tags are lowercased, trimmed and deduplicated.
pub fn set_entry_tags(conn: &Connection, entry_id: &str, tags: &[String]) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "UPDATE entries SET tags = ?, modified_at = ? WHERE id = ?",
        rusqlite::params![serde_json::to_string(&normalise_tags(tags))?, now, entry_id],
    )?;
    ensure_changed(conn, entry_id)
}

pub fn set_entry_mood(conn: &Connection, entry_id: &str, mood: Option<&str>) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "UPDATE entries SET mood = ?, modified_at = ? WHERE id = ?",
        rusqlite::params![mood, now, entry_id],
    )?;
    ensure_changed(conn, entry_id)
}

pub fn set_entry_favorite(conn: &Connection, entry_id: &str, favorite: bool) -> Result<()> {
    conn.execute(
        "UPDATE entries SET is_favorite = ? WHERE id = ?",
        rusqlite::params![favorite, entry_id],
    )?;
    ensure_changed(conn, entry_id)
}

pub fn set_entry_archived(conn: &Connection, entry_id: &str, archived: bool) -> Result<()> {
    conn.execute(
        "UPDATE entries SET is_archived = ? WHERE id = ?",
        rusqlite::params![archived, entry_id],
    )?;
    ensure_changed(conn, entry_id)
}

pub fn delete_entry(conn: &Connection, entry_id: &str) -> Result<()> {
    conn.execute("DELETE FROM entries WHERE id = ?", [entry_id])?;
    ensure_changed(conn, entry_id)
}

/// Reads a value from the `settings` table.
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

/// Inserts or overwrites a value in the `settings` table.
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// UPDATE and DELETE silently affect zero rows for unknown ids; surface that as not-found.
fn ensure_changed(conn: &Connection, entry_id: &str) -> Result<()> {
    if conn.changes() == 0 {
        return Err(JournalError::EntryNotFound(entry_id.to_string()));
    }
    Ok(())
}
