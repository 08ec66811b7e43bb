//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.

use crate::api::{Sheet, ENTRIES};
use crate::error::Res;
use anyhow::{anyhow, bail, Context};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};

/// The data held by a `TestSheet`: the rows of each tab and the column widths it was created with.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct TestSheetState {
    pub sheets: BTreeMap<String, Vec<Vec<String>>>,
    pub column_widths: BTreeMap<String, Vec<u32>>,
    /// When set, every call fails as if the spreadsheet were unreachable.
    pub unavailable: bool,
}

/// An implementation of the `Sheet` trait that does not use Google sheets. Clones share the same
/// state, so a test can keep one handle to inspect what the app wrote through another.
#[derive(Debug, Clone, Default)]
pub struct TestSheet {
    state: Arc<Mutex<TestSheetState>>,
}

impl TestSheet {
    /// Create a new `TestSheet` using `sheets`. The map key is sheet name and the map value is the
    /// rows of the sheet.
    pub fn new(sheets: BTreeMap<String, Vec<Vec<String>>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TestSheetState {
                sheets,
                ..TestSheetState::default()
            })),
        }
    }

    /// A `TestSheet` holding an `Entries` tab with a few sample rows, used when the app runs in
    /// test mode.
    pub fn seeded() -> Self {
        let mut sheets = BTreeMap::new();
        sheets.insert(ENTRIES.to_string(), load_csv(ENTRY_DATA).unwrap_or_default());
        Self::new(sheets)
    }

    /// A copy of the current state.
    pub fn get_state(&self) -> TestSheetState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Replaces the current state.
    pub fn set_state(&self, state: TestSheetState) {
        if let Ok(mut s) = self.state.lock() {
            *s = state;
        }
    }

    /// The rows of `sheet_name`, or `None` if there is no such tab.
    pub fn rows(&self, sheet_name: &str) -> Option<Vec<Vec<String>>> {
        self.get_state().sheets.get(sheet_name).cloned()
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.unavailable = unavailable;
        }
    }

    fn state(&self) -> Res<MutexGuard<'_, TestSheetState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| anyhow!("TestSheet state lock poisoned"))?;
        if state.unavailable {
            bail!("The spreadsheet is unavailable");
        }
        Ok(state)
    }
}

impl TestSheetState {
    fn rows_mut(&mut self, sheet_name: &str) -> Res<&mut Vec<Vec<String>>> {
        self.sheets
            .get_mut(sheet_name)
            .with_context(|| format!("Sheet '{sheet_name}' not found"))
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn sheet_names(&mut self) -> Res<Vec<String>> {
        Ok(self.state()?.sheets.keys().cloned().collect())
    }

    async fn add_sheet(&mut self, sheet_name: &str, column_widths: &[u32]) -> Res<()> {
        let mut state = self.state()?;
        if state.sheets.contains_key(sheet_name) {
            bail!("A sheet with the name '{sheet_name}' already exists");
        }
        state.sheets.insert(sheet_name.to_string(), Vec::new());
        state
            .column_widths
            .insert(sheet_name.to_string(), column_widths.to_vec());
        Ok(())
    }

    async fn get(&mut self, sheet_name: &str) -> Res<Vec<Vec<String>>> {
        let mut state = self.state()?;
        let rows = state.rows_mut(sheet_name)?;
        // Like the Sheets API, leave out trailing empty cells.
        Ok(rows
            .iter()
            .map(|row| {
                let len = row.iter().rposition(|c| !c.is_empty()).map_or(0, |ix| ix + 1);
                row[..len].to_vec()
            })
            .collect())
    }

    async fn append_row(&mut self, sheet_name: &str, row: &[String]) -> Res<()> {
        let mut state = self.state()?;
        state.rows_mut(sheet_name)?.push(row.to_vec());
        Ok(())
    }

    async fn delete_row(&mut self, sheet_name: &str, row_ix: usize) -> Res<()> {
        let mut state = self.state()?;
        let rows = state.rows_mut(sheet_name)?;
        if row_ix >= rows.len() {
            bail!("Row {row_ix} is out of range for {sheet_name}");
        }
        rows.remove(row_ix);
        Ok(())
    }

    async fn write_cell(
        &mut self,
        sheet_name: &str,
        row_ix: usize,
        col_ix: usize,
        value: &str,
    ) -> Res<()> {
        let mut state = self.state()?;
        let rows = state.rows_mut(sheet_name)?;
        if rows.len() <= row_ix {
            rows.resize(row_ix + 1, Vec::new());
        }
        let row = &mut rows[row_ix];
        if row.len() <= col_ix {
            row.resize(col_ix + 1, String::new());
        }
        row[col_ix] = value.to_string();
        Ok(())
    }
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Res<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false) // Ensure headers are treated as part of the data
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed entry data.
const ENTRY_DATA: &str = r##"ID,Date,Direction,Amount,Method,Situation,Description,Who,Saved At,Receipt Link
1768953600001,2026-01-19,out,680,cash,lunch,Ramen Ichiran,me,2026-01-19 12:41:07,
1768953600002,2026-01-20,out,1250,card,groceries,Aeon weekly shop,me,2026-01-20 18:02:55,
1768953600003,2026-01-20,in,3000,transfer,gift,Birthday money,grandma,2026-01-20 20:15:31,
1768953600004,2026-01-21,out,210,IC card,commute,Train to Shibuya,me,2026-01-21 08:12:40,
"##;
