/// Decode failures for raw chain logs. The only hard failure is a data blob
/// too short to cover the word offsets we read; malformed hex inside a full
/// word decodes deterministically to a number and is not an error.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("log data too short: need {needed} hex chars, got {got}")]
    DataTooShort { needed: usize, got: usize },
}

/// Outcome classes for supervised tasks. Cancellation is a distinct variant
/// so the supervisor can tell "stop cleanly" apart from "crashed, restart".
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}
