//! Frame metadata as seen by the synchronization engine.
//!
//! The engine never inspects payload bytes. Pipelines hand it a [`FrameInfo`]
//! describing the timing of each frame entering or leaving a processing unit.

use crate::timestamp::{Duration, Timestamp};
use bitflags::bitflags;

bitflags! {
    /// Flags for frame timing properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u32 {
        /// The frame starts a new timestamp sequence; dts values before and
        /// after this frame must not be aligned against each other.
        const DISCONTINUITY = 0x0001;
        /// The frame is a keyframe.
        const KEYFRAME = 0x0002;
        /// The frame is known to be corrupted.
        const CORRUPT = 0x0004;
    }
}

/// Timing metadata for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInfo {
    /// Decode timestamp, the ordering key for synchronization.
    pub dts: Timestamp,
    /// Claimed duration of the frame's media content.
    pub duration: Duration,
    /// Frame flags.
    pub flags: FrameFlags,
}

impl FrameInfo {
    /// Create frame metadata with the given dts and no duration.
    pub fn new(dts: Timestamp) -> Self {
        Self {
            dts,
            duration: Duration::zero(),
            flags: FrameFlags::empty(),
        }
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the flags.
    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check whether this frame marks a timestamp discontinuity.
    pub fn is_discontinuity(&self) -> bool {
        self.flags.contains(FrameFlags::DISCONTINUITY)
    }
}
