//! # pcrsync-core
//!
//! Core types for the pcrsync library:
//! - Timestamp and duration handling on an arbitrary time base
//! - Frame metadata as seen by the synchronization engine
//!
//! The synchronization engine never touches payload bytes; everything it
//! consumes is described by [`FrameInfo`].

pub mod frame;
pub mod timestamp;

pub use frame::{FrameFlags, FrameInfo};
pub use timestamp::{Duration, TimeBase, Timestamp};
