//! Pipeline error types.

use thiserror::Error;

/// PCR tracking error type.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A frame left the processing unit with no matching entering frame.
    ///
    /// Enter/leave calls are expected to pair up FIFO per track; once this
    /// fires the helper's bookkeeping is desynchronized and the caller should
    /// stop forwarding PCRs through it.
    #[error("output frame has no matching input frame, PCR tracking is desynchronized")]
    UnpairedFrame,
}

/// PCR tracking result type.
pub type Result<T> = std::result::Result<T, Error>;
