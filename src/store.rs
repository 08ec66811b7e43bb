//! The entry store: rows of the `Entries` sheet, read and written through a `Sheet`.
//!
//! Row 0 of the sheet is the header. Every data row holds exactly `Column::ALL.len()` cells.
//! Rows are appended and deleted whole; the receipt link is the only cell ever written in place.

use crate::api::{Sheet, ENTRIES};
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{header_row, Column, Entry, NewEntry};
use crate::{clock, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info, trace};

/// Reads and writes entries. Holds the `Sheet` it was given for its whole life.
pub struct EntryStore {
    sheet: Box<dyn Sheet + Send>,
    /// Set once the table is known to exist with the canonical header.
    ready: bool,
}

impl EntryStore {
    pub fn new(sheet: Box<dyn Sheet + Send>) -> Self {
        Self {
            sheet,
            ready: false,
        }
    }

    /// Makes sure the `Entries` table exists and starts with the canonical header row. A missing
    /// table is created with default column widths; a table with a different (legacy) header has
    /// its header cells rewritten. After the first success this is a no-op.
    pub async fn ensure_table(&mut self) -> Result<()> {
        self.ensure_table_inner().await.pub_result(ErrorType::Storage)
    }

    /// All entries, newest first. Returns an empty list when the table does not exist yet.
    pub async fn list_entries(&mut self) -> Result<Vec<Entry>> {
        self.list_entries_inner()
            .await
            .context("Unable to read entries")
            .pub_result(ErrorType::Storage)
    }

    /// Appends one row for `new_entry` and returns the entry as stored. When the caller supplied
    /// no id, the current Unix time in milliseconds is used.
    pub async fn append_entry(&mut self, new_entry: &NewEntry) -> Result<Entry> {
        self.append_entry_at(new_entry, Utc::now())
            .await
            .context("Unable to save the entry")
            .pub_result(ErrorType::Storage)
    }

    /// Deletes the last row whose id is `id`. Returns `false` when there is no such row.
    pub async fn delete_entry(&mut self, id: &str) -> Result<bool> {
        self.delete_entry_inner(id)
            .await
            .with_context(|| format!("Unable to delete entry '{id}'"))
            .pub_result(ErrorType::Storage)
    }

    /// Writes `url` into the receipt link cell of the last row whose id is `id`. Returns `false`
    /// when there is no such row.
    pub async fn set_receipt_link(&mut self, id: &str, url: &str) -> Result<bool> {
        self.set_receipt_link_inner(id, url)
            .await
            .with_context(|| format!("Unable to write the receipt link for entry '{id}'"))
            .pub_result(ErrorType::Storage)
    }

    async fn ensure_table_inner(&mut self) -> Res<()> {
        if self.ready {
            return Ok(());
        }
        let header = header_row();
        let names = self.sheet.sheet_names().await?;
        if !names.iter().any(|n| n == ENTRIES) {
            info!("Creating the {ENTRIES} sheet");
            let widths: Vec<u32> = Column::ALL.iter().map(|c| c.width()).collect();
            self.sheet
                .add_sheet(ENTRIES, &widths)
                .await
                .with_context(|| format!("Unable to create the {ENTRIES} sheet"))?;
            self.sheet.append_row(ENTRIES, &header).await?;
            self.ready = true;
            return Ok(());
        }

        let rows = self.sheet.get(ENTRIES).await?;
        match rows.first() {
            None => {
                debug!("The {ENTRIES} sheet is empty, writing the header row");
                self.sheet.append_row(ENTRIES, &header).await?;
            }
            Some(existing) => {
                for column in Column::ALL {
                    let current = existing.get(column.index()).map(|s| s.trim()).unwrap_or("");
                    if current != column.header() {
                        debug!(
                            "Repairing header cell {}: '{current}' -> '{}'",
                            column.index(),
                            column.header()
                        );
                        self.sheet
                            .write_cell(ENTRIES, 0, column.index(), column.header())
                            .await
                            .context("Unable to repair the header row")?;
                    }
                }
            }
        }
        self.ready = true;
        Ok(())
    }

    async fn list_entries_inner(&mut self) -> Res<Vec<Entry>> {
        if !self.ready && !self.sheet.sheet_names().await?.iter().any(|n| n == ENTRIES) {
            debug!("There is no {ENTRIES} sheet yet");
            return Ok(Vec::new());
        }
        let rows = self.sheet.get(ENTRIES).await?;
        trace!("Read {} rows from {ENTRIES}", rows.len());
        Ok(rows
            .iter()
            .skip(1)
            .filter(|row| !id_cell(row).is_empty())
            .map(|row| Entry::from_row(row.as_slice()))
            .rev()
            .collect())
    }

    async fn append_entry_at(&mut self, new_entry: &NewEntry, now: DateTime<Utc>) -> Res<Entry> {
        self.ensure_table_inner().await?;
        let id = new_entry
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| clock::fallback_id(now));
        let entry = Entry {
            id,
            date: new_entry.date.clone(),
            direction: new_entry.direction,
            amount: new_entry.amount,
            method: new_entry.method.clone(),
            situation: new_entry.situation.clone(),
            desc: new_entry.desc.clone(),
            who: new_entry.who.clone(),
            saved_at: clock::saved_at(now),
            drive_link: String::new(),
        };
        self.sheet.append_row(ENTRIES, &entry.to_row()).await?;
        debug!("Appended entry {}", entry.id);
        Ok(entry)
    }

    async fn delete_entry_inner(&mut self, id: &str) -> Res<bool> {
        self.ensure_table_inner().await?;
        let rows = self.sheet.get(ENTRIES).await?;
        match find_last_row(&rows, id) {
            Some(row_ix) => {
                self.sheet.delete_row(ENTRIES, row_ix).await?;
                debug!("Deleted entry {id} at row {row_ix}");
                Ok(true)
            }
            None => {
                debug!("No row found for entry {id}");
                Ok(false)
            }
        }
    }

    async fn set_receipt_link_inner(&mut self, id: &str, url: &str) -> Res<bool> {
        self.ensure_table_inner().await?;
        let rows = self.sheet.get(ENTRIES).await?;
        let Some(row_ix) = find_last_row(&rows, id) else {
            return Ok(false);
        };
        self.sheet
            .write_cell(ENTRIES, row_ix, Column::ReceiptLink.index(), url)
            .await?;
        Ok(true)
    }
}

fn id_cell(row: &[String]) -> &str {
    row.get(Column::Id.index())
        .map(|s| s.trim())
        .unwrap_or_default()
}

/// The index of the last data row (never the header) whose id is `id`.
fn find_last_row(rows: &[Vec<String>], id: &str) -> Option<usize> {
    let id = id.trim();
    (1..rows.len()).rev().find(|&ix| id_cell(&rows[ix]) == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestSheet;
    use crate::model::{Amount, Direction};
    use std::collections::BTreeMap;

    fn new_entry(id: &str) -> NewEntry {
        NewEntry {
            id: Some(id.to_string()),
            date: "2026-01-21".to_string(),
            direction: Direction::Out,
            amount: Amount::coerce("680"),
            method: "cash".to_string(),
            situation: "lunch".to_string(),
            desc: "Ramen".to_string(),
            who: "me".to_string(),
            receipt_image: None,
        }
    }

    fn empty_store() -> (TestSheet, EntryStore) {
        let sheet = TestSheet::default();
        let store = EntryStore::new(Box::new(sheet.clone()));
        (sheet, store)
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_list_without_table_is_empty() {
        let (sheet, mut store) = empty_store();
        assert!(store.list_entries().await.unwrap().is_empty());
        // Listing never creates the table.
        assert!(sheet.rows(ENTRIES).is_none());
    }

    #[tokio::test]
    async fn test_ensure_table_creates_header_and_widths() {
        let (sheet, mut store) = empty_store();
        store.ensure_table().await.unwrap();
        assert_eq!(sheet.rows(ENTRIES).unwrap(), vec![header_row()]);
        let widths = &sheet.get_state().column_widths[ENTRIES];
        assert_eq!(widths.len(), 10);
        assert_eq!(widths[Column::Description.index()], 240);
    }

    #[tokio::test]
    async fn test_ensure_table_repairs_legacy_header() {
        let legacy: Vec<String> = [
            "ID",
            "Date",
            "Direction",
            "Amount (¥)",
            "Method",
            "Situation",
            "Description",
            "Who",
            "Saved At (JST)",
            "Receipt (Drive Link)",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let data = vec!["7".to_string(), "2026-01-01".to_string()];
        let mut sheets = BTreeMap::new();
        sheets.insert(ENTRIES.to_string(), vec![legacy, data.clone()]);
        let sheet = TestSheet::new(sheets);
        let mut store = EntryStore::new(Box::new(sheet.clone()));

        store.ensure_table().await.unwrap();
        let rows = sheet.rows(ENTRIES).unwrap();
        assert_eq!(rows[0], header_row());
        assert_eq!(rows[1], data);
    }

    #[tokio::test]
    async fn test_ensure_table_writes_header_into_empty_table() {
        let mut sheets = BTreeMap::new();
        sheets.insert(ENTRIES.to_string(), Vec::new());
        let sheet = TestSheet::new(sheets);
        let mut store = EntryStore::new(Box::new(sheet.clone()));
        store.ensure_table().await.unwrap();
        assert_eq!(sheet.rows(ENTRIES).unwrap(), vec![header_row()]);
    }

    #[tokio::test]
    async fn test_append_then_list_newest_first() {
        let (sheet, mut store) = empty_store();
        let first = store.append_entry(&new_entry("1")).await.unwrap();
        store.append_entry(&new_entry("2")).await.unwrap();

        assert_eq!(first.id, "1");
        assert!(first.drive_link.is_empty());
        assert_eq!(first.saved_at.len(), "2026-01-21 12:00:00".len());

        let rows = sheet.rows(ENTRIES).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 10));

        let entries = store.list_entries().await.unwrap();
        assert_eq!(ids(&entries), vec!["2", "1"]);
        assert_eq!(entries[1], first);
    }

    #[tokio::test]
    async fn test_append_without_id_uses_time() {
        let (_, mut store) = empty_store();
        let now = "2026-01-21T00:00:00.123Z".parse::<DateTime<Utc>>().unwrap();
        let mut entry = new_entry("");
        entry.id = None;
        let saved = store.append_entry_at(&entry, now).await.unwrap();
        assert_eq!(saved.id, "1768953600123");
        assert_eq!(saved.saved_at, "2026-01-21 09:00:00");
    }

    #[tokio::test]
    async fn test_list_skips_blank_ids_and_header() {
        let mut sheets = BTreeMap::new();
        sheets.insert(
            ENTRIES.to_string(),
            vec![
                header_row(),
                vec!["a".to_string(), "2026-01-01".to_string()],
                vec![String::new(), "2026-01-02".to_string()],
                vec![],
                vec!["b".to_string(), "2026/01/03".to_string()],
            ],
        );
        let mut store = EntryStore::new(Box::new(TestSheet::new(sheets)));
        let entries = store.list_entries().await.unwrap();
        assert_eq!(ids(&entries), vec!["b", "a"]);
        assert_eq!(entries[0].date, "2026-01-03");
        assert_eq!(entries[0].amount, Amount::ZERO);
        assert_eq!(entries[0].direction, Direction::Out);
    }

    #[tokio::test]
    async fn test_list_normalizes_locale_dates() {
        // A date cell typed by hand is a date value, which the sheet renders in its locale.
        let mut sheets = BTreeMap::new();
        sheets.insert(
            ENTRIES.to_string(),
            vec![
                header_row(),
                vec!["007".to_string(), "1/21/2026".to_string()],
                vec!["008".to_string(), "12/3/2025 0:00:00".to_string()],
            ],
        );
        let sheet = TestSheet::new(sheets);
        let mut store = EntryStore::new(Box::new(sheet.clone()));
        let entries = store.list_entries().await.unwrap();
        assert_eq!(ids(&entries), vec!["008", "007"]);
        assert_eq!(entries[0].date, "2025-12-03");
        assert_eq!(entries[1].date, "2026-01-21");

        assert!(store.delete_entry("007").await.unwrap());
        assert_eq!(sheet.rows(ENTRIES).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_only_the_last_match() {
        let (sheet, mut store) = empty_store();
        for id in ["1", "2", "3", "2"] {
            let mut entry = new_entry(id);
            entry.desc = format!("entry {}", sheet.rows(ENTRIES).map_or(0, |r| r.len()));
            store.append_entry(&entry).await.unwrap();
        }
        assert!(store.delete_entry("2").await.unwrap());

        let entries = store.list_entries().await.unwrap();
        assert_eq!(ids(&entries), vec!["3", "2", "1"]);
        // The earlier "2" survives.
        assert_eq!(entries[1].desc, "entry 2");
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let (_, mut store) = empty_store();
        store.append_entry(&new_entry("1")).await.unwrap();
        assert!(!store.delete_entry("nope").await.unwrap());
        // The header is never a match.
        assert!(!store.delete_entry("ID").await.unwrap());
        assert_eq!(store.list_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_then_delete_leaves_nothing() {
        let (_, mut store) = empty_store();
        store.append_entry(&new_entry("1")).await.unwrap();
        assert!(store.delete_entry("1").await.unwrap());
        assert!(store.list_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_receipt_link() {
        let (sheet, mut store) = empty_store();
        store.append_entry(&new_entry("1")).await.unwrap();
        store.append_entry(&new_entry("2")).await.unwrap();
        assert!(store
            .set_receipt_link("1", "https://drive.test/file/d/x/view")
            .await
            .unwrap());
        assert!(!store.set_receipt_link("9", "https://x").await.unwrap());

        let rows = sheet.rows(ENTRIES).unwrap();
        assert_eq!(rows[1][9], "https://drive.test/file/d/x/view");
        assert_eq!(rows[2][9], "");
        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries[1].drive_link, "https://drive.test/file/d/x/view");
    }

    #[tokio::test]
    async fn test_storage_failure_is_a_storage_error() {
        let sheet = TestSheet::seeded();
        let mut store = EntryStore::new(Box::new(sheet.clone()));
        sheet.set_unavailable(true);
        let err = store.list_entries().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Storage);
        assert!(err.to_string().contains("unavailable"));
    }
}
