//! Per-stream group
//!
//! A group is the hub of one stream. It admits at most one producer (an RTMP
//! publisher, an RTSP publisher, or an RTMP pull session), builds the remux
//! pipelines the consumers need, keeps the caches that let subscribers join
//! mid-stream, and starts/stops relay push, HLS and recording together with
//! the producer.
//!
//! # Locking
//!
//! ```text
//!   add_* / del_*  ──► lifecycle ──► state ─┐  (slot, remuxers, caches)
//!                          │                │
//!                          └─► triggers ◄───┘  (state released)
//!
//!   publisher link / pull ───────► state ──► remuxers ──► caches, outlets
//! ```
//!
//! `lifecycle` serializes whole admissions and removals, trigger calls
//! included, so a removal never interleaves with a half-finished admission.
//! `state` is only held for bookkeeping and media processing; triggers and
//! `set_observer` run without it.

mod caches;
mod hooks;
mod inbound;
mod intake;
mod slot;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

pub use hooks::{
    ConsumerDemand, ConsumerTriggers, GroupHooks, MediaOutlets, NoopHooks, StaticDemand,
};

use crate::config::GroupConfig;
use crate::media::{EncodedFlvTag, FlvTag, PatPmt, SessionDescription, TsFrame};
use crate::registry::StreamKey;
use crate::remux::{AvPacketToRtmp, DummyAudioFilter, RtmpToMpegts, RtmpToRtsp};
use crate::session::ProducerKind;

use caches::GroupCaches;
use intake::ProducerLink;
use slot::InSession;

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

/// Point-in-time view of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    pub unique_key: String,
    pub stream: StreamKey,
    pub producer: Option<ProducerKind>,
    pub producer_key: Option<String>,
    pub pulling: bool,
    pub rtmp2rtsp: bool,
    pub rtsp2rtmp: bool,
    pub rtmp2mpegts: bool,
    pub dummy_audio: bool,
    pub rtmp_gop_frames: usize,
    pub httpflv_gop_frames: usize,
    pub httpts_gop_frames: usize,
}

pub(crate) struct GroupState {
    in_session: InSession,
    rtmp2rtsp: Option<Box<dyn RtmpToRtsp>>,
    rtsp2rtmp: Option<Box<dyn AvPacketToRtmp>>,
    rtmp2mpegts: Option<Box<dyn RtmpToMpegts>>,
    dummy_audio: Option<Arc<DummyAudioFilter>>,
    caches: GroupCaches,
    pulling: bool,
    /// Set while the slot is empty
    idle_since: Option<Instant>,
    /// Bumped on every admission
    admission: u64,
    /// Keeps the current publisher's link alive behind a dummy audio filter
    link: Option<Arc<ProducerLink>>,
}

impl GroupState {
    fn admits(&self, admission: u64) -> bool {
        !self.in_session.is_empty() && self.admission == admission
    }
}

/// The hub of one stream
pub struct Group {
    unique_key: String,
    stream: StreamKey,
    config: GroupConfig,
    hooks: GroupHooks,
    lifecycle: Mutex<()>,
    state: Mutex<GroupState>,
}

impl Group {
    pub fn new(stream: StreamKey, config: GroupConfig, hooks: GroupHooks) -> Arc<Self> {
        let unique_key = format!("GROUP{}", NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(group = %unique_key, stream = %stream, "Group created");

        let state = GroupState {
            in_session: InSession::Empty,
            rtmp2rtsp: None,
            rtsp2rtmp: None,
            rtmp2mpegts: None,
            dummy_audio: None,
            caches: GroupCaches::new(&config),
            pulling: false,
            idle_since: Some(Instant::now()),
            admission: 0,
            link: None,
        };

        Arc::new(Self {
            unique_key,
            stream,
            config,
            hooks,
            lifecycle: Mutex::new(()),
            state: Mutex::new(state),
        })
    }

    pub fn unique_key(&self) -> &str {
        &self.unique_key
    }

    pub fn stream(&self) -> &StreamKey {
        &self.stream
    }

    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    pub fn has_in_session(&self) -> bool {
        !self.state.lock().in_session.is_empty()
    }

    pub fn in_session_kind(&self) -> Option<ProducerKind> {
        self.state.lock().in_session.kind()
    }

    /// Mark that a pull from the origin is in progress (or no longer is)
    pub fn set_pulling_flag(&self, pulling: bool) {
        self.state.lock().pulling = pulling;
    }

    pub fn is_pulling(&self) -> bool {
        self.state.lock().pulling
    }

    /// How long the group has had no producer, `None` while it has one
    pub fn idle_for(&self) -> Option<Duration> {
        self.state.lock().idle_since.map(|since| since.elapsed())
    }

    /// Whether the group has no producer and no pull in flight
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.in_session.is_empty() && !state.pulling
    }

    /// Catch-up for a new RTMP subscriber
    pub fn rtmp_catchup(&self) -> Vec<FlvTag> {
        self.state.lock().caches.rtmp.catchup()
    }

    /// Catch-up for a new HTTP-FLV subscriber, already serialized
    pub fn httpflv_catchup(&self) -> Vec<EncodedFlvTag> {
        self.state.lock().caches.httpflv.catchup()
    }

    /// Catch-up for a new HTTP-TS subscriber
    pub fn httpts_catchup(&self) -> Vec<TsFrame> {
        self.state.lock().caches.httpts.catchup()
    }

    /// The SDP an RTSP subscriber needs, once known
    pub fn sdp(&self) -> Option<SessionDescription> {
        self.state.lock().caches.sdp.clone()
    }

    pub fn pat_pmt(&self) -> Option<PatPmt> {
        self.state.lock().caches.pat_pmt.clone()
    }

    pub fn stats(&self) -> GroupStats {
        let state = self.state.lock();
        GroupStats {
            unique_key: self.unique_key.clone(),
            stream: self.stream.clone(),
            producer: state.in_session.kind(),
            producer_key: state.in_session.unique_key(),
            pulling: state.pulling,
            rtmp2rtsp: state.rtmp2rtsp.is_some(),
            rtsp2rtmp: state.rtsp2rtmp.is_some(),
            rtmp2mpegts: state.rtmp2mpegts.is_some(),
            dummy_audio: state.dummy_audio.is_some(),
            rtmp_gop_frames: state.caches.rtmp.frame_count(),
            httpflv_gop_frames: state.caches.httpflv.frame_count(),
            httpts_gop_frames: state.caches.httpts.frame_count(),
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("unique_key", &self.unique_key)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}
