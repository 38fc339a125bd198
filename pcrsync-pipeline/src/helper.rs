//! Per-track PCR helper for processing units with unknown latency.
//!
//! Encoders and filter chains delay frames by an amount the pipeline cannot
//! observe, and may drop frames outright. [`TrackPcrHelper`] wraps one
//! [`PcrSync`] track for this case: it models the frames currently in flight
//! inside the wrapped unit as a FIFO, pairs leaving frames with entering ones
//! positionally, and synthesizes a best-effort PCR when the in-flight media
//! duration grows past a ceiling, meaning the oldest frame was dropped.

use crate::error::{Error, Result};
use crate::sync::{EsId, PcrSync};
use pcrsync_core::frame::FrameInfo;
use pcrsync_core::timestamp::{Duration, Timestamp};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// A frame believed to be in flight inside the wrapped unit.
struct DelayedFrame {
    length: Duration,
    dts: Timestamp,
}

/// PCR bookkeeping for one track passing through an opaque processing unit.
///
/// Not internally locked: one helper belongs to one pipeline stage. The
/// wrapped unit is assumed to keep frames in order relative to each other,
/// though it may re-stamp, split, or drop them.
pub struct TrackPcrHelper {
    sync: Arc<PcrSync>,
    es: EsId,
    /// Ceiling on the media duration held in flight before the oldest frame
    /// is considered dropped.
    max_delay: Duration,
    /// Sum of the lengths of all in-flight frames.
    current_media_time: Duration,
    /// Dts of the most recent frame that left the unit.
    last_dts_output: Timestamp,
    in_flight: VecDeque<DelayedFrame>,
}

impl TrackPcrHelper {
    /// Create a helper, registering a dedicated track with `sync`.
    pub fn new(sync: Arc<PcrSync>, max_delay: Duration) -> Self {
        let es = sync.new_es_id();
        Self {
            sync,
            es,
            max_delay,
            current_media_time: Duration::zero(),
            last_dts_output: Timestamp::none(),
            in_flight: VecDeque::new(),
        }
    }

    /// The track id this helper registered with the synchronizer.
    pub fn es_id(&self) -> EsId {
        self.es
    }

    /// Number of frames currently believed to be in flight.
    pub fn in_flight_frames(&self) -> usize {
        self.in_flight.len()
    }

    /// Record a frame entering the wrapped unit.
    ///
    /// Returns a synthesized PCR timestamp when the in-flight media duration
    /// exceeded the helper's ceiling and the oldest in-flight frame had to be
    /// treated as dropped; the caller should forward that value downstream as
    /// it would a released PCR.
    pub fn signal_entering_frame(&mut self, frame: &FrameInfo) -> Option<Timestamp> {
        self.in_flight.push_back(DelayedFrame {
            length: frame.duration,
            dts: frame.dts,
        });
        self.current_media_time = self.current_media_time + frame.duration;
        self.sync.signal_frame(self.es, frame);

        if self.current_media_time > self.max_delay {
            return self.drop_oldest_frame();
        }
        None
    }

    /// Record a frame leaving the wrapped unit and return the PCR that may
    /// now be forwarded, if any.
    ///
    /// Pairing with entering frames is positional (FIFO). The synchronizer is
    /// matched against the paired frame's *entering* dts: that is the point
    /// the queued events snapshotted. The output frame's own dts only bounds
    /// the returned value and tracks the caller's notion of progress.
    pub fn signal_leaving_frame(&mut self, frame: &FrameInfo) -> Result<Option<Timestamp>> {
        let entered = self.in_flight.pop_front().ok_or(Error::UnpairedFrame)?;
        self.last_dts_output = frame.dts;
        self.current_media_time = self.current_media_time - entered.length;

        let pcr = self
            .sync
            .signal_frame_output(self.es, &FrameInfo::new(entered.dts));
        Ok(pcr.map(|pcr| {
            if frame.dts.is_valid() {
                pcr.min(frame.dts)
            } else {
                pcr
            }
        }))
    }

    /// The wrapped unit is holding more media than `max_delay`: consider the
    /// oldest in-flight frame dropped and synthesize a timestamp for the PCRs
    /// it was gating.
    fn drop_oldest_frame(&mut self) -> Option<Timestamp> {
        let dropped = self.in_flight.pop_front()?;
        self.current_media_time = self.current_media_time - dropped.length;
        debug!(dts = %dropped.dts, "in-flight ceiling exceeded, assuming frame dropped");

        // Drain every PCR release the dropped frame was holding back.
        let probe = FrameInfo::new(dropped.dts);
        let mut pcr = Timestamp::none();
        while let Some(released) = self.sync.signal_frame_output(self.es, &probe) {
            pcr = released;
        }

        let synthesized = if self.last_dts_output.is_valid() {
            self.last_dts_output.max(dropped.dts)
        } else {
            pcr
        };
        synthesized.is_valid().then_some(synthesized)
    }
}

impl Drop for TrackPcrHelper {
    fn drop(&mut self) {
        self.sync.del_es_id(self.es);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcrsync_core::timestamp::TimeBase;

    fn ts(value: i64) -> Timestamp {
        Timestamp::new(value, TimeBase::MILLISECONDS)
    }

    fn frame(dts: i64, length: i64) -> FrameInfo {
        FrameInfo::new(ts(dts)).with_duration(Duration::from_millis(length))
    }

    #[test]
    fn test_es_id_released_on_drop() {
        let sync = Arc::new(PcrSync::new());
        let first = {
            let helper = TrackPcrHelper::new(Arc::clone(&sync), Duration::from_seconds(1));
            helper.es_id()
        };
        // The slot freed by the helper is handed out again.
        assert_eq!(sync.new_es_id(), first);
    }

    #[test]
    fn test_leaving_without_entering_is_an_error() {
        let sync = Arc::new(PcrSync::new());
        let mut helper = TrackPcrHelper::new(sync, Duration::from_seconds(1));
        assert_eq!(
            helper.signal_leaving_frame(&frame(0, 20)),
            Err(Error::UnpairedFrame)
        );
    }

    #[test]
    fn test_in_flight_accounting() {
        let sync = Arc::new(PcrSync::new());
        let mut helper = TrackPcrHelper::new(sync, Duration::from_seconds(1));

        helper.signal_entering_frame(&frame(0, 20));
        helper.signal_entering_frame(&frame(20, 20));
        assert_eq!(helper.in_flight_frames(), 2);

        helper.signal_leaving_frame(&frame(5, 20)).unwrap();
        assert_eq!(helper.in_flight_frames(), 1);
    }
}
