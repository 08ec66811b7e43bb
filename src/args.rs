//! These structs provide the CLI interface for the money-tracker CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// money-tracker: a small backend for a personal expense tracker.
///
/// Entries are kept as rows of an `Entries` tab in a Google Sheet, and receipt photos are filed
/// in Google Drive next to the sheet. The `serve` command exposes both to a client over HTTP.
///
/// You will need to set up a Google Cloud OAuth client for this and download its credentials.
/// Run `init`, then `auth`, then `serve`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and initialize the configuration files.
    ///
    /// This is the first command you should run. You need a few things ready beforehand.
    ///
    /// - Decide what directory you want to keep configuration in and pass it as --home. By
    ///   default it will be $HOME/money-tracker.
    ///
    /// - Get the URL of the Google Sheet that should hold your entries and pass it as
    ///   --sheet-url.
    ///
    /// - Create an OAuth client of type "Desktop app" in the Google Cloud console and download
    ///   its credentials. Pass the downloaded file as --client-secret.
    Init(InitArgs),
    /// Authenticate with Google via OAuth.
    Auth(AuthArgs),
    /// Serve the HTTP API.
    Serve(ServeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and credentials are held. Defaults to ~/money-tracker
    #[arg(long, env = "MONEY_TRACKER_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of your Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The path to your downloaded OAuth client credentials. This file will be moved to the
    /// default secrets location in the home directory.
    #[arg(long)]
    client_secret: PathBuf,
}

impl InitArgs {
    pub fn new(sheet_url: impl Into<String>, client_secret: impl Into<PathBuf>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }
}

/// (Not shown): Args for the `auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication instead of running the consent flow.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The address to listen on.
    #[arg(long, env = "MONEY_TRACKER_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

impl ServeArgs {
    pub fn new(bind: SocketAddr) -> Self {
        Self { bind }
    }

    pub fn bind(&self) -> SocketAddr {
        self.bind
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("money-tracker"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or MONEY_TRACKER_HOME instead of relying on the default \
                directory. If you continue using the program right now, you may have problems!",
            );
            PathBuf::from("money-tracker")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let args = Args::try_parse_from([
            "money-tracker",
            "--home",
            "/tmp/mt",
            "--log-level",
            "debug",
            "serve",
            "--bind",
            "0.0.0.0:9000",
        ])
        .unwrap();
        assert_eq!(args.common().home().path(), Path::new("/tmp/mt"));
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        let Command::Serve(serve) = args.command() else {
            panic!("expected serve");
        };
        assert_eq!(serve.bind().port(), 9000);
    }

    #[test]
    fn test_parse_init() {
        let args = Args::try_parse_from([
            "money-tracker",
            "init",
            "--sheet-url",
            "https://docs.google.com/spreadsheets/d/abc",
            "--client-secret",
            "/tmp/secret.json",
        ])
        .unwrap();
        let Command::Init(init) = args.command() else {
            panic!("expected init");
        };
        assert_eq!(init.client_secret(), Path::new("/tmp/secret.json"));
    }

    #[test]
    fn test_parse_auth_verify() {
        let args = Args::try_parse_from(["money-tracker", "auth", "--verify"]).unwrap();
        assert!(matches!(args.command(), Command::Auth(a) if a.verify()));
    }
}
