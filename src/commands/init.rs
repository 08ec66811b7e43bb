use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the home directory, its `.secrets` subdirectory and:
/// - Creates an initial `config.json` file using `sheet_url`
/// - Moves `secret_file` into its default location in the home directory
///
/// # Arguments
/// - `home` - The directory that will be the home directory, e.g. `$HOME/money-tracker`
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON.
/// - `sheet_url` - The URL of the Google Sheet that holds the entries.
///
/// # Errors
/// - Returns an error if the URL is invalid or any file operation fails.
pub async fn init(home: &Path, secret_file: &Path, sheet_url: &str) -> Result<Out<()>> {
    let config = Config::create(home, secret_file, sheet_url).await?;
    Ok(format!(
        "Created {}. Next, run the auth command to sign in with Google",
        config.config_path().display()
    )
    .into())
}
