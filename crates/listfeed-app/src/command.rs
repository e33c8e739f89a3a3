//! Item creation command

use std::sync::Arc;

use listfeed_core::{Clock, Result};
use listfeed_store::{Record, RecordStore};
use tracing::{error, info};

/// Appends one record stamped with the clock's current time.
pub struct CreateItemCommand {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl CreateItemCommand {
    /// Command writing to `store`, reading time from `clock`.
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Insert one record and commit.
    ///
    /// # Errors
    ///
    /// Returns the store's error when staging or committing fails. A failed
    /// commit is not rolled back: the record may already be visible to
    /// queries.
    pub async fn execute(&self) -> Result<Record> {
        self.insert(Record::new(self.clock.now())).await
    }

    /// Same as [`execute`](Self::execute) with a label attached.
    pub async fn execute_labelled(&self, label: impl Into<String>) -> Result<Record> {
        self.insert(Record::new(self.clock.now()).labelled(label)).await
    }

    async fn insert(&self, record: Record) -> Result<Record> {
        self.store.insert(record.clone()).await?;
        match self.store.commit().await {
            Ok(summary) => {
                info!(record = %record.id, timestamp = %record.timestamp, txn = ?summary.txn, "created item");
                Ok(record)
            }
            Err(e) => {
                error!(record = %record.id, error = %e, "failed to commit new item");
                Err(e)
            }
        }
    }
}
