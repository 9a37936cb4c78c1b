use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Fetching sprint work items failed: {0}")]
    Fetch(#[source] anyhow::Error),

    #[error("Time entry store I/O failed: {0}")]
    Store(#[from] std::io::Error),

    #[error("Could not serialize time entry: {0}")]
    StoreFormat(#[from] serde_json::Error),

    #[error("Remote update for work item {work_item_id} failed (entry {entry_index} of the batch): {source}")]
    Update {
        entry_index: usize,
        work_item_id: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("Entry targets placeholder item {0}; resolve it to its real parent first")]
    PlaceholderTarget(i64),
}
