//! PCR (Program Clock Reference) synchronization engine.
//!
//! [`PcrSync`] tracks, for every registered elementary stream, the last frame
//! timestamp seen entering and leaving an asynchronous processing unit, plus
//! an ordered queue of PCR events observed on the input side. Output-side
//! signaling releases each queued PCR once every track has caught up with the
//! input position it had when the PCR was observed, so downstream muxers see
//! PCRs in their original order and never ahead of the frames they pace.

use parking_lot::Mutex;
use pcrsync_core::frame::FrameInfo;
use pcrsync_core::timestamp::Timestamp;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Identifier of a registered elementary-stream track.
///
/// Ids are dense small integers. A deleted id may be handed out again by a
/// later [`PcrSync::new_es_id`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EsId(usize);

impl EsId {
    /// Raw slot index of this id.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Outcome of signaling a PCR on the input side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcrSignal {
    /// Every live track is caught up and nothing is queued: the caller should
    /// forward the PCR immediately, nothing was queued.
    Forward,
    /// The PCR was queued and will be released by a later output frame.
    Queued,
}

/// Per-track bookkeeping slot.
struct EsTrack {
    /// Soft-deleted; the slot is eligible for reuse.
    deleted: bool,
    /// Most recent valid dts signaled on the input side.
    last_input_dts: Timestamp,
    /// Most recent valid dts signaled on the output side.
    last_output_dts: Timestamp,
    /// Dts of the most recent discontinuity frame; cleared once captured
    /// into a PCR event.
    discontinuity: Timestamp,
}

impl EsTrack {
    fn new() -> Self {
        Self {
            deleted: false,
            last_input_dts: Timestamp::none(),
            last_output_dts: Timestamp::none(),
            discontinuity: Timestamp::none(),
        }
    }

    /// The output side has consumed everything the input side produced.
    ///
    /// Holds for a fresh track too: both sides are invalid, hence equal.
    fn is_caught_up(&self) -> bool {
        self.last_output_dts == self.last_input_dts
    }
}

/// Snapshot of one track's input position inside a queued PCR event.
#[derive(Debug, Clone, Copy)]
struct EventEntry {
    dts: Timestamp,
    discontinuity: Timestamp,
    passed: bool,
}

impl EventEntry {
    /// Placeholder for a deleted slot; never counted in `entries_left`.
    fn placeholder() -> Self {
        Self {
            dts: Timestamp::none(),
            discontinuity: Timestamp::none(),
            passed: false,
        }
    }

    fn is_pending(&self) -> bool {
        self.dts.is_valid() && !self.passed
    }
}

/// A PCR waiting to be re-inserted into the output stream.
struct PcrEvent {
    pcr: Timestamp,
    /// One entry per track slot at queue time, indexed by raw ES id.
    entries: Vec<EventEntry>,
    /// Valid-dts entries not yet matched by an output frame.
    entries_left: usize,
    /// No live track advanced since the previous queued event; the PCR can
    /// be released as soon as it reaches the head of the queue.
    no_frame_before: bool,
}

struct State {
    tracks: Vec<EsTrack>,
    events: VecDeque<PcrEvent>,
}

/// The PCR synchronization primitive.
///
/// All operations serialize on one internal mutex; producer threads may call
/// [`signal_frame`](Self::signal_frame) and [`signal_pcr`](Self::signal_pcr)
/// concurrently with a consumer calling
/// [`signal_frame_output`](Self::signal_frame_output).
pub struct PcrSync {
    state: Mutex<State>,
}

impl Default for PcrSync {
    fn default() -> Self {
        Self::new()
    }
}

impl PcrSync {
    /// Create a synchronizer with no tracks and no pending events.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tracks: Vec::new(),
                events: VecDeque::new(),
            }),
        }
    }

    /// Register a track, reusing the first soft-deleted slot if any.
    pub fn new_es_id(&self) -> EsId {
        let mut state = self.state.lock();
        if let Some(index) = state.tracks.iter().position(|t| t.deleted) {
            state.tracks[index] = EsTrack::new();
            return EsId(index);
        }
        state.tracks.push(EsTrack::new());
        EsId(state.tracks.len() - 1)
    }

    /// Unregister a track.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not currently live.
    pub fn del_es_id(&self, id: EsId) {
        let mut state = self.state.lock();
        let track = &mut state.tracks[id.0];
        assert!(!track.deleted, "ES id {} deleted twice", id.0);
        track.deleted = true;
    }

    /// Record a frame entering the processing unit on track `id`.
    ///
    /// A frame with an invalid dts leaves the cached input position
    /// unchanged, so the track keeps counting as caught up to its last known
    /// position.
    pub fn signal_frame(&self, id: EsId, frame: &FrameInfo) {
        let mut state = self.state.lock();
        let track = &mut state.tracks[id.0];
        assert!(!track.deleted, "signal_frame on deleted ES id {}", id.0);

        if frame.dts.is_valid() {
            track.last_input_dts = frame.dts;
        }
        if frame.is_discontinuity() {
            debug_assert!(frame.dts.is_valid(), "discontinuity frame without dts");
            track.discontinuity = frame.dts;
        }
    }

    /// Record a PCR observed on the input side.
    ///
    /// PCRs must be signaled in temporal order relative to the frames already
    /// passed to [`signal_frame`](Self::signal_frame).
    pub fn signal_pcr(&self, pcr: Timestamp) -> PcrSignal {
        debug_assert!(pcr.is_valid(), "signaled an invalid PCR");
        let mut state = self.state.lock();

        let caught_up = state
            .tracks
            .iter()
            .filter(|t| !t.deleted)
            .all(EsTrack::is_caught_up);
        if caught_up && state.events.is_empty() {
            trace!(%pcr, "all tracks caught up, PCR forwarded untouched");
            return PcrSignal::Forward;
        }

        // Did any live track advance its input position since the last
        // queued event? A track absent from that event's snapshot counts as
        // having advanced. With an empty queue there are in-flight frames
        // (otherwise we would have forwarded above), so the PCR must wait
        // for them.
        let no_frame_before = match state.events.back() {
            Some(prev) => state
                .tracks
                .iter()
                .enumerate()
                .filter(|(_, t)| !t.deleted)
                .all(|(i, t)| {
                    prev.entries
                        .get(i)
                        .is_some_and(|e| e.dts == t.last_input_dts)
                }),
            None => false,
        };

        let mut entries = Vec::with_capacity(state.tracks.len());
        let mut entries_left = 0;
        for track in &mut state.tracks {
            if track.deleted {
                entries.push(EventEntry::placeholder());
                continue;
            }
            if track.last_input_dts.is_valid() {
                entries_left += 1;
            }
            entries.push(EventEntry {
                dts: track.last_input_dts,
                discontinuity: track.discontinuity,
                passed: false,
            });
            track.discontinuity = Timestamp::none();
        }

        trace!(%pcr, entries_left, no_frame_before, "PCR queued");
        state.events.push_back(PcrEvent {
            pcr,
            entries,
            entries_left,
            no_frame_before,
        });
        PcrSignal::Queued
    }

    /// Record a frame leaving the processing unit on track `id` and return
    /// the PCR that may now be forwarded downstream, if any.
    pub fn signal_frame_output(&self, id: EsId, frame: &FrameInfo) -> Option<Timestamp> {
        let mut state = self.state.lock();
        let state = &mut *state;

        let track = &mut state.tracks[id.0];
        assert!(
            !track.deleted,
            "signal_frame_output on deleted ES id {}",
            id.0
        );
        if frame.dts.is_valid() {
            track.last_output_dts = frame.dts;
        }

        let head = state.events.front()?;
        if head.no_frame_before || head.entries_left == 0 {
            // Either the head's tracks were already caught up when it was
            // queued, or cross-event matching drained it while it was not
            // yet the head.
            return Self::release_head(&mut state.events);
        }

        // Matching below needs an ordering key.
        if !frame.dts.is_valid() {
            return None;
        }
        let dts = frame.dts;

        let head_pending = head.entries.get(id.0).is_some_and(EventEntry::is_pending);
        if !head_pending {
            // This track was ahead of the others when the head event was
            // queued (or already satisfied it): pre-match its first pending
            // entry in a later event. The mutated event is released once it
            // becomes the head.
            for event in state.events.iter_mut().skip(1) {
                let Some(entry) = event.entries.get_mut(id.0) else {
                    // Track registered after this event was queued.
                    continue;
                };
                if !entry.is_pending() {
                    continue;
                }
                if entry.discontinuity.is_valid() && dts > entry.discontinuity {
                    // Stale pre-discontinuity output, skip the entry.
                    continue;
                }
                if dts >= entry.dts {
                    entry.passed = true;
                    event.entries_left -= 1;
                    debug!(track = id.0, %dts, "pre-matched entry in queued PCR event");
                }
                break;
            }
            return None;
        }

        let head = state.events.front_mut()?;
        let entry = &mut head.entries[id.0];
        if entry.discontinuity.is_valid() && dts > entry.discontinuity {
            // Output from before the splice; matching it against a
            // post-splice snapshot would release the PCR too early.
            return None;
        }
        if dts < entry.dts {
            // Not caught up to the snapshotted input position yet.
            return None;
        }

        entry.passed = true;
        head.entries_left -= 1;
        if head.entries_left == 0 {
            return Self::release_head(&mut state.events);
        }
        None
    }

    fn release_head(events: &mut VecDeque<PcrEvent>) -> Option<Timestamp> {
        let event = events.pop_front()?;
        trace!(pcr = %event.pcr, "PCR released to output");
        Some(event.pcr)
    }
}
