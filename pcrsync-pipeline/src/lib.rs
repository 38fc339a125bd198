//! PCR synchronization for asynchronous transcode stages.
//!
//! When frames pass through filters and encoders with unknown latency, the
//! Program Clock References observed on the input side can no longer be sent
//! downstream as-is: the frames they were aligned with have not reached the
//! muxer yet. [`PcrSync`] keeps per-track bookkeeping to re-insert each PCR
//! at the correct point of the output stream, [`TrackPcrHelper`] wraps it for
//! the common one-track-per-encoder case, and [`PcrForwarder`] implements the
//! pipeline-level forwarding policy.

mod error;
mod forward;
mod helper;
mod sync;

pub use error::{Error, Result};
pub use forward::PcrForwarder;
pub use helper::TrackPcrHelper;
pub use sync::{EsId, PcrSignal, PcrSync};
