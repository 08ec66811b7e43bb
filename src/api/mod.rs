//! Traits and implementations for the two storage backends: the spreadsheet that holds entry rows
//! and the file-hosting service that holds receipt images.
//!
//! Each backend has a Google implementation and an in-memory implementation. The in-memory ones
//! are compiled into the production binary as well so that the whole app can be run, top to
//! bottom, without touching Google (see `Mode`).

mod drive;
mod drive_test_client;
mod files;
mod oauth;
mod sheet;
mod sheet_test_client;

use crate::error::Res;
use crate::Config;
use serde::{Deserialize, Serialize};

pub use drive_test_client::{TestDrive, TestDriveState, TestFile, TestFolder, TEST_ROOT_FOLDER};
pub use sheet_test_client::{TestSheet, TestSheetState};

pub(crate) use files::{SecretFile, TokenFile};
pub(crate) use oauth::{run_consent_flow, SharedTokenProvider, TokenProvider};

/// The name of the sheet (tab) that holds entries.
pub const ENTRIES: &str = "Entries";

/// OAuth scopes required for Sheets and Drive access. Full `drive` is needed because the receipt
/// folder lives next to the spreadsheet, which this app did not create.
pub(crate) const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

/// The environment variable that selects `Mode::Test` when set to a non-empty value.
pub const TEST_MODE_ENV: &str = "MONEY_TRACKER_IN_TEST_MODE";

/// Whether to talk to Google or to in-memory stand-ins.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Google,
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);

impl Mode {
    /// `Mode::Test` when `MONEY_TRACKER_IN_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// A very small view of a spreadsheet. Row and column indexes are zero-based and include the
/// header row.
#[async_trait::async_trait]
pub trait Sheet {
    /// The titles of all tabs in the spreadsheet.
    async fn sheet_names(&mut self) -> Res<Vec<String>>;

    /// Adds an empty tab and sets the pixel widths of its leading columns.
    async fn add_sheet(&mut self, sheet_name: &str, column_widths: &[u32]) -> Res<()>;

    /// All rows of a tab. Trailing empty cells may be omitted from a row.
    async fn get(&mut self, sheet_name: &str) -> Res<Vec<Vec<String>>>;

    /// Appends `row` after the last non-empty row.
    async fn append_row(&mut self, sheet_name: &str, row: &[String]) -> Res<()>;

    /// Removes the row at `row_ix`, shifting later rows up.
    async fn delete_row(&mut self, sheet_name: &str, row_ix: usize) -> Res<()>;

    /// Writes a single cell.
    async fn write_cell(
        &mut self,
        sheet_name: &str,
        row_ix: usize,
        col_ix: usize,
        value: &str,
    ) -> Res<()>;
}

/// A file stored by a `Drive`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DriveFile {
    pub id: String,
    /// The link a person can open in a browser.
    pub link: String,
}

/// A very small view of a file-hosting service organized in folders.
#[async_trait::async_trait]
pub trait Drive {
    /// The id of the (first) folder that contains `file_id`.
    async fn parent_folder(&mut self, file_id: &str) -> Res<String>;

    /// The id of the first folder in `parent_id` named `name`, if any.
    async fn find_folder(&mut self, parent_id: &str, name: &str) -> Res<Option<String>>;

    /// Creates a folder named `name` in `parent_id` and returns its id.
    async fn create_folder(&mut self, parent_id: &str, name: &str) -> Res<String>;

    /// Stores `data` as a new file in `parent_id`.
    async fn create_file(
        &mut self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Res<DriveFile>;

    /// Lets anyone with the link view the file.
    async fn share_with_anyone(&mut self, file_id: &str) -> Res<()>;
}

/// The two storage backends of a process.
pub(crate) struct Backends {
    pub(crate) sheet: Box<dyn Sheet + Send>,
    pub(crate) drive: Box<dyn Drive + Send>,
}

/// Creates the storage backends for `mode`.
pub(crate) async fn backends(config: &Config, mode: Mode) -> Res<Backends> {
    match mode {
        Mode::Google => {
            let tokens =
                SharedTokenProvider::load(config.client_secret_path(), config.token_path()).await?;
            google_backends(config, tokens).await
        }
        Mode::Test => Ok(Backends {
            sheet: Box::new(TestSheet::seeded()),
            drive: Box::new(TestDrive::default()),
        }),
    }
}

/// Creates the Google backends. Both use `tokens`, so only one of them refreshes at a time.
pub(crate) async fn google_backends(config: &Config, tokens: SharedTokenProvider) -> Res<Backends> {
    let sheet = sheet::GoogleSheet::new(config.clone(), tokens.clone()).await?;
    Ok(Backends {
        sheet: Box::new(sheet),
        drive: Box::new(drive::GoogleDrive::new(tokens)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_google_backends_load_saved_tokens() {
        let env = TestEnv::new().await;
        assert!(backends(&env.config(), Mode::Google).await.is_err());

        env.save_token().await;
        assert!(backends(&env.config(), Mode::Google).await.is_ok());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Google.to_string(), "google");
        assert_eq!(Mode::Test.to_string(), "test");
    }
}
