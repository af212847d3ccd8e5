//! What a group calls out to
//!
//! The group owns the input side of a stream. Everything downstream (relay
//! push, HLS, recording, subscriber fan-out) is reached through these traits,
//! which the embedding server implements.

use std::sync::Arc;

use crate::media::{FlvTag, PatPmt, RtpPacket, SessionDescription, TsFrame};
use crate::registry::StreamKey;
use crate::remux::{DefaultRemuxFactory, RemuxFactory};

/// Whether any consumer needs a derived representation of the stream
pub trait ConsumerDemand: Send + Sync {
    /// RTSP subscribers (or RTSP relay) may ask for this stream
    fn needs_rtsp_output(&self, stream: &StreamKey) -> bool;

    /// HLS, HTTP-TS or MPEG-TS recording is configured
    fn needs_mpegts_output(&self, stream: &StreamKey) -> bool;
}

/// Fixed answers, for servers whose outputs are all static configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticDemand {
    pub rtsp: bool,
    pub mpegts: bool,
}

impl ConsumerDemand for StaticDemand {
    fn needs_rtsp_output(&self, _stream: &StreamKey) -> bool {
        self.rtsp
    }

    fn needs_mpegts_output(&self, _stream: &StreamKey) -> bool {
        self.mpegts
    }
}

/// Consumers started and stopped with the producer
///
/// Each `start_*` decides on its own whether it applies to the stream; each
/// `stop_*` must be a no-op for a consumer that is not running. Starts are
/// invoked in the order push, HLS, FLV record, MPEG-TS record, and stops in the
/// same order. `now` is a unix timestamp in seconds, shared by both record
/// starts of one admission.
pub trait ConsumerTriggers: Send + Sync {
    fn start_push_if_needed(&self, stream: &StreamKey);
    fn stop_push_if_needed(&self, stream: &StreamKey);

    fn start_hls_if_needed(&self, stream: &StreamKey);
    fn stop_hls_if_needed(&self, stream: &StreamKey);

    fn start_record_flv_if_needed(&self, stream: &StreamKey, now: i64);
    fn stop_record_flv_if_needed(&self, stream: &StreamKey);

    fn start_record_mpegts_if_needed(&self, stream: &StreamKey, now: i64);
    fn stop_record_mpegts_if_needed(&self, stream: &StreamKey);
}

/// Live media leaving the group, after it has been cached
///
/// Called with the group's state lock held; implementations must not call
/// back into the group.
pub trait MediaOutlets: Send + Sync {
    fn on_rtmp_msg(&self, _stream: &StreamKey, _tag: &FlvTag) {}
    fn on_sdp(&self, _stream: &StreamKey, _sdp: &SessionDescription) {}
    fn on_rtp_packet(&self, _stream: &StreamKey, _packet: &RtpPacket) {}
    fn on_pat_pmt(&self, _stream: &StreamKey, _pat_pmt: &PatPmt) {}
    fn on_ts_frame(&self, _stream: &StreamKey, _frame: &TsFrame) {}
}

/// Does nothing; for groups nobody consumes from yet
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ConsumerDemand for NoopHooks {
    fn needs_rtsp_output(&self, _stream: &StreamKey) -> bool {
        false
    }

    fn needs_mpegts_output(&self, _stream: &StreamKey) -> bool {
        false
    }
}

impl ConsumerTriggers for NoopHooks {
    fn start_push_if_needed(&self, _stream: &StreamKey) {}
    fn stop_push_if_needed(&self, _stream: &StreamKey) {}
    fn start_hls_if_needed(&self, _stream: &StreamKey) {}
    fn stop_hls_if_needed(&self, _stream: &StreamKey) {}
    fn start_record_flv_if_needed(&self, _stream: &StreamKey, _now: i64) {}
    fn stop_record_flv_if_needed(&self, _stream: &StreamKey) {}
    fn start_record_mpegts_if_needed(&self, _stream: &StreamKey, _now: i64) {}
    fn stop_record_mpegts_if_needed(&self, _stream: &StreamKey) {}
}

impl MediaOutlets for NoopHooks {}

/// Everything a group is wired to
#[derive(Clone)]
pub struct GroupHooks {
    pub demand: Arc<dyn ConsumerDemand>,
    pub triggers: Arc<dyn ConsumerTriggers>,
    pub outlets: Arc<dyn MediaOutlets>,
    pub remux: Arc<dyn RemuxFactory>,
}

impl GroupHooks {
    pub fn with_demand(mut self, demand: Arc<dyn ConsumerDemand>) -> Self {
        self.demand = demand;
        self
    }

    pub fn with_triggers(mut self, triggers: Arc<dyn ConsumerTriggers>) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn with_outlets(mut self, outlets: Arc<dyn MediaOutlets>) -> Self {
        self.outlets = outlets;
        self
    }

    pub fn with_remux(mut self, remux: Arc<dyn RemuxFactory>) -> Self {
        self.remux = remux;
        self
    }
}

impl Default for GroupHooks {
    fn default() -> Self {
        Self {
            demand: Arc::new(NoopHooks),
            triggers: Arc::new(NoopHooks),
            outlets: Arc::new(NoopHooks),
            remux: Arc::new(DefaultRemuxFactory),
        }
    }
}

impl std::fmt::Debug for GroupHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupHooks").finish_non_exhaustive()
    }
}
