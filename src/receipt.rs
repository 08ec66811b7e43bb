//! Archives receipt images to the file-hosting backend.
//!
//! Images are filed as `Money Tracker Receipt/<yyyyMM>/<date>_<id>_<slug>.jpg`, where the top
//! folder sits next to the spreadsheet.

use crate::api::Drive;
use crate::error::{ErrorType, IntoResult, Res};
use crate::{clock, Result};
use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// The name of the folder that holds all receipt images.
pub const RECEIPT_FOLDER: &str = "Money Tracker Receipt";

const RECEIPT_MIME_TYPE: &str = "image/jpeg";
const SLUG_MAX_CHARS: usize = 40;
const EMPTY_SLUG: &str = "receipt";

/// Stores receipt images and hands back a shareable link.
pub struct ReceiptArchiver {
    drive: Box<dyn Drive + Send>,
    spreadsheet_id: String,
    /// The folder that contains the spreadsheet, looked up once.
    parent_id: Option<String>,
    /// The `RECEIPT_FOLDER`, looked up or created once.
    top_id: Option<String>,
}

impl ReceiptArchiver {
    /// `spreadsheet_id` identifies the file next to which the receipt folder is kept.
    pub fn new(drive: Box<dyn Drive + Send>, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            drive,
            spreadsheet_id: spreadsheet_id.into(),
            parent_id: None,
            top_id: None,
        }
    }

    /// Decodes `image` (base64, with or without a `data:image/...;base64,` prefix), stores it in
    /// the month folder for `date` and returns a link anyone can view.
    pub async fn store(
        &mut self,
        image: &str,
        entry_id: &str,
        date: &str,
        desc: &str,
    ) -> Result<String> {
        self.store_at(image, entry_id, date, desc, Utc::now())
            .await
            .with_context(|| format!("Unable to archive the receipt for entry '{entry_id}'"))
            .pub_result(ErrorType::Upload)
    }

    async fn store_at(
        &mut self,
        image: &str,
        entry_id: &str,
        date: &str,
        desc: &str,
        now: DateTime<Utc>,
    ) -> Res<String> {
        let data = decode_image(image)?;
        let date = date.trim();
        let year_month = clock::year_month(Some(date).filter(|d| !d.is_empty()), now);
        let name = filename(date, &year_month, entry_id, desc);

        let top_id = self.top_folder().await?;
        let month_id = self.folder(&top_id, &year_month).await?;
        let file = self
            .drive
            .create_file(&month_id, &name, RECEIPT_MIME_TYPE, data)
            .await
            .with_context(|| format!("Unable to create {name}"))?;
        self.drive
            .share_with_anyone(&file.id)
            .await
            .with_context(|| format!("Unable to share {name}"))?;
        info!("Archived receipt {RECEIPT_FOLDER}/{year_month}/{name}");
        Ok(file.link)
    }

    async fn top_folder(&mut self) -> Res<String> {
        if let Some(id) = &self.top_id {
            return Ok(id.clone());
        }
        let parent_id = match &self.parent_id {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .drive
                    .parent_folder(&self.spreadsheet_id)
                    .await
                    .context("Unable to find the folder that holds the spreadsheet")?;
                self.parent_id = Some(id.clone());
                id
            }
        };
        let id = self.folder(&parent_id, RECEIPT_FOLDER).await?;
        self.top_id = Some(id.clone());
        Ok(id)
    }

    /// The first folder in `parent_id` called `name`, created if there is none.
    async fn folder(&mut self, parent_id: &str, name: &str) -> Res<String> {
        if let Some(id) = self.drive.find_folder(parent_id, name).await? {
            return Ok(id);
        }
        debug!("Creating folder '{name}'");
        self.drive
            .create_folder(parent_id, name)
            .await
            .with_context(|| format!("Unable to create folder '{name}'"))
    }
}

/// Removes a leading `data:image/<type>;base64,` marker.
fn strip_data_uri(image: &str) -> &str {
    let image = image.trim();
    let Some(rest) = image.strip_prefix("data:image/") else {
        return image;
    };
    let type_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    match rest[type_len..].strip_prefix(";base64,") {
        Some(data) if type_len > 0 => data,
        _ => image,
    }
}

fn decode_image(image: &str) -> Res<Vec<u8>> {
    let encoded: String = strip_data_uri(image)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let data = STANDARD
        .decode(encoded.as_bytes())
        .context("The receipt image is not valid base64")?;
    anyhow::ensure!(!data.is_empty(), "The receipt image is empty");
    Ok(data)
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        // hiragana, katakana, CJK unified ideographs
        || ('\u{3040}'..='\u{309f}').contains(&c)
        || ('\u{30a0}'..='\u{30ff}').contains(&c)
        || ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// A filename-safe form of a description, e.g. `Lunch Ramen!!` -> `lunch-ramen`.
fn slug(desc: &str) -> String {
    let mut slug = String::new();
    for c in desc.to_lowercase().chars() {
        if is_slug_char(c) {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.chars().take(SLUG_MAX_CHARS).collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// `<date>_<id>_<slug>.jpg`, using the year-month in place of a missing date.
fn filename(date: &str, year_month: &str, entry_id: &str, desc: &str) -> String {
    let prefix = if date.is_empty() { year_month } else { date };
    format!("{prefix}_{entry_id}_{}.jpg", slug(desc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestDrive, TEST_ROOT_FOLDER};

    // A 1x1 JPEG would do, but any bytes are stored as-is.
    const IMAGE: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";

    fn archiver() -> (TestDrive, ReceiptArchiver) {
        let drive = TestDrive::default();
        let archiver = ReceiptArchiver::new(Box::new(drive.clone()), "spreadsheet-id");
        (drive, archiver)
    }

    fn now() -> DateTime<Utc> {
        "2026-03-31T16:30:00Z".parse().unwrap()
    }

    #[test]
    fn test_filename_example() {
        assert_eq!(
            filename("2026-01-21", "202601", "42", "Lunch Ramen!!"),
            "2026-01-21_42_lunch-ramen.jpg"
        );
    }

    #[test]
    fn test_filename_without_date_uses_year_month() {
        assert_eq!(filename("", "202604", "7", ""), "202604_7_receipt.jpg");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug(""), "receipt");
        assert_eq!(slug("!!!"), "receipt");
        assert_eq!(slug("  Café  Latte "), "caf-latte");
        assert_eq!(slug("ラーメン 一蘭"), "ラーメン-一蘭");
        assert_eq!(slug("Bus #12 / Shinjuku"), "bus-12-shinjuku");
        let long = "a".repeat(39) + " b";
        assert_eq!(slug(&long), "a".repeat(39));
        assert_eq!(slug(&"x".repeat(50)).chars().count(), 40);
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_uri("  data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_uri("AAAA"), "AAAA");
        assert_eq!(
            strip_data_uri("data:text/plain;base64,AAAA"),
            "data:text/plain;base64,AAAA"
        );
    }

    #[test]
    fn test_decode_image() {
        assert_eq!(decode_image("aGk=").unwrap(), b"hi");
        assert_eq!(decode_image("aG\nk=\n").unwrap(), b"hi");
        assert!(decode_image("not base64!").is_err());
        assert!(decode_image("").is_err());
    }

    #[tokio::test]
    async fn test_store_files_by_month_and_shares() {
        let (drive, mut archiver) = archiver();
        let link = archiver
            .store_at(IMAGE, "42", "2026-01-21", "Lunch Ramen!!", now())
            .await
            .unwrap();

        let state = drive.get_state();
        assert_eq!(state.files.len(), 1);
        let file = &state.files[0];
        assert_eq!(file.name, "2026-01-21_42_lunch-ramen.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert!(file.shared);
        assert_eq!(link, file.link());
        assert_eq!(state.folder_path(file), vec![RECEIPT_FOLDER, "202601"]);
        assert_eq!(state.folders[0].parent_id, TEST_ROOT_FOLDER);
    }

    #[tokio::test]
    async fn test_store_reuses_folders() {
        let (drive, mut archiver) = archiver();
        archiver
            .store_at(IMAGE, "1", "2026-01-02", "a", now())
            .await
            .unwrap();
        archiver
            .store_at(IMAGE, "2", "2026-01-30", "b", now())
            .await
            .unwrap();
        archiver
            .store_at(IMAGE, "3", "2026-02-01", "c", now())
            .await
            .unwrap();

        let state = drive.get_state();
        let names: Vec<&str> = state.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![RECEIPT_FOLDER, "202601", "202602"]);
        assert_eq!(state.files.len(), 3);
    }

    #[tokio::test]
    async fn test_store_without_date_uses_today_in_tokyo() {
        let (drive, mut archiver) = archiver();
        // 2026-03-31T16:30Z is already April 1st in Tokyo.
        archiver
            .store_at(IMAGE, "9", "", "", now())
            .await
            .unwrap();
        let state = drive.get_state();
        assert_eq!(state.files[0].name, "202604_9_receipt.jpg");
        assert_eq!(
            state.folder_path(&state.files[0]),
            vec![RECEIPT_FOLDER, "202604"]
        );
    }

    #[tokio::test]
    async fn test_bad_image_is_an_upload_error() {
        let (drive, mut archiver) = archiver();
        let err = archiver
            .store("data:image/jpeg;base64,@@@", "1", "2026-01-21", "x")
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Upload);
        assert!(drive.get_state().files.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_drive_is_an_upload_error() {
        let (drive, mut archiver) = archiver();
        drive.set_unavailable(true);
        let err = archiver
            .store(IMAGE, "1", "2026-01-21", "x")
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Upload);
    }
}
