//! Pipeline-level PCR forwarding policy.
//!
//! [`PcrForwarder`] sits between the input-side PCR source and the muxer. It
//! decides, for each observed PCR, what (if anything) reaches the muxer right
//! away; PCRs it queues come back out of the per-track helpers as frames
//! leave the encoders.

use crate::sync::{PcrSignal, PcrSync};
use pcrsync_core::timestamp::Timestamp;
use std::sync::Arc;
use tracing::warn;

/// Forwarding decisions for input-side PCRs.
pub struct PcrForwarder {
    sync: Arc<PcrSync>,
    enabled: bool,
    first_pcr_sent: bool,
    has_input: bool,
}

impl PcrForwarder {
    /// Create a forwarder around a shared synchronizer.
    pub fn new(sync: Arc<PcrSync>) -> Self {
        Self {
            sync,
            enabled: true,
            first_pcr_sent: false,
            has_input: false,
        }
    }

    /// The shared synchronizer, for registering tracks and helpers.
    pub fn sync(&self) -> &Arc<PcrSync> {
        &self.sync
    }

    /// Whether PCR re-synchronization is still active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record that transcoded input has been seen.
    ///
    /// Until then, fast-forwarded PCRs are dropped so no output DTS can end
    /// up below an already-forwarded clock value.
    pub fn mark_input(&mut self) {
        self.has_input = true;
    }

    /// Stop re-synchronizing and fall back to raw pass-through.
    ///
    /// Called after a helper reports a desync ([`Error::UnpairedFrame`]):
    /// the bookkeeping can no longer be trusted, and passing PCRs through
    /// untouched degrades timing instead of corrupting it.
    ///
    /// [`Error::UnpairedFrame`]: crate::Error::UnpairedFrame
    pub fn disable(&mut self) {
        if self.enabled {
            warn!("failed to match transcode input with encoder output, disabling PCR forwarding");
            self.enabled = false;
        }
    }

    /// Handle a PCR observed on the input side.
    ///
    /// Returns the value to forward to the muxer now, or `None` when the PCR
    /// was queued (or dropped). The first forwarded PCR is normalized to
    /// tick 0 to mark the stream start for downstream modules.
    pub fn on_pcr(&mut self, pcr: Timestamp) -> Option<Timestamp> {
        if !self.enabled {
            return Some(pcr);
        }

        match self.sync.signal_pcr(pcr) {
            PcrSignal::Queued => None,
            PcrSignal::Forward => {
                if !self.first_pcr_sent {
                    self.first_pcr_sent = true;
                    Some(Timestamp::zero(pcr.time_base))
                } else if self.has_input {
                    Some(pcr)
                } else {
                    None
                }
            }
        }
    }
}
