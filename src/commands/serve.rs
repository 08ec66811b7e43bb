use crate::api::{self, Mode};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::receipt::ReceiptArchiver;
use crate::server::{self, AppState};
use crate::store::EntryStore;
use crate::{Config, Result};
use std::net::SocketAddr;
use tracing::info;

/// Builds the application state for `mode`, making sure the `Entries` table exists.
pub(crate) async fn app_state(config: &Config, mode: Mode) -> Result<AppState> {
    let api::Backends { sheet, drive } =
        api::backends(config, mode).await.pub_result(ErrorType::Auth)?;

    let mut store = EntryStore::new(sheet);
    store.ensure_table().await?;
    let archiver = ReceiptArchiver::new(drive, config.spreadsheet_id());
    Ok(AppState::new(store, archiver))
}

/// Handles the `money-tracker serve` command - serves the HTTP API on `bind` until Ctrl-C.
pub async fn serve(config: Config, mode: Mode, bind: SocketAddr) -> Result<Out<()>> {
    info!("Serving {} in {mode} mode", config.sheet_url());
    let state = app_state(&config, mode).await?;
    server::run(server::create_app(state), bind)
        .await
        .pub_result(ErrorType::Service)?;
    Ok("Goodbye".into())
}
