use crate::receipt::ReceiptArchiver;
use crate::store::EntryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How long archiving one receipt may take before the entry is saved without a link.
pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state, cloned into every handler. The store and the archiver each handle
/// one operation at a time.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<EntryStore>>,
    archiver: Arc<Mutex<ReceiptArchiver>>,
    receipt_timeout: Duration,
}

impl AppState {
    pub fn new(store: EntryStore, archiver: ReceiptArchiver) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            archiver: Arc::new(Mutex::new(archiver)),
            receipt_timeout: RECEIPT_TIMEOUT,
        }
    }

    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    pub(crate) fn store(&self) -> &Mutex<EntryStore> {
        &self.store
    }

    pub(crate) fn archiver(&self) -> &Mutex<ReceiptArchiver> {
        &self.archiver
    }

    pub(crate) fn receipt_timeout(&self) -> Duration {
        self.receipt_timeout
    }
}
