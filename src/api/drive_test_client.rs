//! Implements the `Drive` trait in memory. Like `TestSheet`, this is part of the production build
//! so that test mode needs no Google account.

use crate::api::{Drive, DriveFile};
use crate::error::Res;
use anyhow::{anyhow, bail, Context};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// The folder every file lives in unless it was created in another folder.
pub const TEST_ROOT_FOLDER: &str = "root";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TestFolder {
    pub id: String,
    pub parent_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TestFile {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub shared: bool,
}

impl TestFile {
    pub fn link(&self) -> String {
        format!("https://drive.test/file/d/{}/view", self.id)
    }
}

/// Folders and files held by a `TestDrive`, in creation order.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct TestDriveState {
    pub folders: Vec<TestFolder>,
    pub files: Vec<TestFile>,
    /// When set, every call fails as if the service were unreachable.
    pub unavailable: bool,
    /// How long every call waits before doing anything.
    pub delay: Duration,
}

impl TestDriveState {
    /// The folder path of a file from just below the root, e.g. `["Receipts", "202601"]`.
    pub fn folder_path(&self, file: &TestFile) -> Vec<String> {
        let mut path = Vec::new();
        let mut parent = file.parent_id.as_str();
        while let Some(folder) = self.folders.iter().find(|f| f.id == parent) {
            path.push(folder.name.clone());
            parent = folder.parent_id.as_str();
        }
        path.reverse();
        path
    }
}

/// An in-memory `Drive`. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct TestDrive {
    state: Arc<Mutex<TestDriveState>>,
}

impl TestDrive {
    pub fn get_state(&self) -> TestDriveState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.unavailable = unavailable;
        }
    }

    /// Makes every subsequent call wait for `delay` first.
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut s) = self.state.lock() {
            s.delay = delay;
        }
    }

    async fn pause(&self) {
        let delay = self.state.lock().map(|s| s.delay).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn state(&self) -> Res<MutexGuard<'_, TestDriveState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| anyhow!("TestDrive state lock poisoned"))?;
        if state.unavailable {
            bail!("The file service is unavailable");
        }
        Ok(state)
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[async_trait::async_trait]
impl Drive for TestDrive {
    async fn parent_folder(&mut self, file_id: &str) -> Res<String> {
        self.pause().await;
        let state = self.state()?;
        // Files we do not know about, such as the spreadsheet, live in the root.
        Ok(state
            .files
            .iter()
            .find(|f| f.id == file_id)
            .map(|f| f.parent_id.clone())
            .unwrap_or_else(|| TEST_ROOT_FOLDER.to_string()))
    }

    async fn find_folder(&mut self, parent_id: &str, name: &str) -> Res<Option<String>> {
        self.pause().await;
        let state = self.state()?;
        Ok(state
            .folders
            .iter()
            .find(|f| f.parent_id == parent_id && f.name == name)
            .map(|f| f.id.clone()))
    }

    async fn create_folder(&mut self, parent_id: &str, name: &str) -> Res<String> {
        self.pause().await;
        let mut state = self.state()?;
        let id = new_id();
        state.folders.push(TestFolder {
            id: id.clone(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn create_file(
        &mut self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Res<DriveFile> {
        self.pause().await;
        let mut state = self.state()?;
        let file = TestFile {
            id: new_id(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data,
            shared: false,
        };
        let drive_file = DriveFile {
            id: file.id.clone(),
            link: file.link(),
        };
        state.files.push(file);
        Ok(drive_file)
    }

    async fn share_with_anyone(&mut self, file_id: &str) -> Res<()> {
        self.pause().await;
        let mut state = self.state()?;
        let file = state
            .files
            .iter_mut()
            .find(|f| f.id == file_id)
            .with_context(|| format!("File '{file_id}' not found"))?;
        file.shared = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_folder_path_and_sharing() {
        let observer = TestDrive::default();
        let mut drive = observer.clone();
        let parent = drive.parent_folder("spreadsheet").await.unwrap();
        assert_eq!(parent, TEST_ROOT_FOLDER);

        let top = drive.create_folder(&parent, "Top").await.unwrap();
        let month = drive.create_folder(&top, "202601").await.unwrap();
        assert_eq!(
            drive.find_folder(&top, "202601").await.unwrap(),
            Some(month.clone())
        );
        assert_eq!(drive.find_folder(&parent, "202601").await.unwrap(), None);

        let file = drive
            .create_file(&month, "a.jpg", "image/jpeg", vec![1, 2, 3])
            .await
            .unwrap();
        drive.share_with_anyone(&file.id).await.unwrap();

        let state = observer.get_state();
        assert_eq!(state.files.len(), 1);
        assert!(state.files[0].shared);
        assert_eq!(state.folder_path(&state.files[0]), vec!["Top", "202601"]);
        assert_eq!(file.link, state.files[0].link());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let mut drive = TestDrive::default();
        drive.set_unavailable(true);
        assert!(drive.create_folder(TEST_ROOT_FOLDER, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_delay() {
        let mut drive = TestDrive::default();
        drive.set_delay(Duration::from_secs(5));
        let slow = tokio::time::timeout(
            Duration::from_millis(20),
            drive.create_folder(TEST_ROOT_FOLDER, "x"),
        )
        .await;
        assert!(slow.is_err());
        assert!(drive.get_state().folders.is_empty());

        drive.set_delay(Duration::ZERO);
        assert!(drive.create_folder(TEST_ROOT_FOLDER, "x").await.is_ok());
    }
}
