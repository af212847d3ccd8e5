//! Media entering the group
//!
//! Everything here runs under the state lock. Remuxers write their output
//! straight into the locked caches through the sinks below, so nothing
//! re-enters the group.
//!
//! Publishers reach the group through a [`ProducerLink`] bound to their
//! admission. A publisher whose transport still holds the link after it was
//! removed cannot write into the caches of whoever holds the slot next.

use std::sync::{Arc, Weak};

use crate::media::{AvPacket, FlvTag, PatPmt, RtpPacket, SessionDescription, TsFrame};
use crate::registry::StreamKey;
use crate::remux::{MpegtsSink, RtmpSink, RtmpToMpegts, RtmpToRtsp, RtspSink};
use crate::session::{RtmpMsgObserver, RtspPubObserver};

use super::caches::GroupCaches;
use super::hooks::MediaOutlets;
use super::slot::InSession;
use super::{Group, GroupState};

/// Caches plus outlets: where derived RTSP and MPEG-TS media ends up
struct Outputs<'a> {
    stream: &'a StreamKey,
    caches: &'a mut GroupCaches,
    outlets: &'a dyn MediaOutlets,
}

impl RtspSink for Outputs<'_> {
    fn on_sdp(&mut self, sdp: SessionDescription) {
        self.outlets.on_sdp(self.stream, &sdp);
        self.caches.sdp = Some(sdp);
    }

    fn on_rtp_packet(&mut self, packet: RtpPacket) {
        self.outlets.on_rtp_packet(self.stream, &packet);
    }
}

impl MpegtsSink for Outputs<'_> {
    fn on_pat_pmt(&mut self, pat_pmt: PatPmt) {
        self.outlets.on_pat_pmt(self.stream, &pat_pmt);
        self.caches.pat_pmt = Some(pat_pmt);
    }

    fn on_ts_frame(&mut self, frame: TsFrame) {
        self.outlets.on_ts_frame(self.stream, &frame);
        self.caches.httpts.push(frame);
    }
}

/// An RTMP message is cached, sent out, then fed to the RTMP-input remuxers
struct RtmpFanout<'a> {
    outputs: Outputs<'a>,
    rtmp2rtsp: Option<&'a mut Box<dyn RtmpToRtsp>>,
    rtmp2mpegts: Option<&'a mut Box<dyn RtmpToMpegts>>,
}

impl RtmpSink for RtmpFanout<'_> {
    fn on_rtmp_msg(&mut self, tag: FlvTag) {
        self.outputs.caches.push_rtmp(&tag);
        self.outputs.outlets.on_rtmp_msg(self.outputs.stream, &tag);

        if let Some(remuxer) = self.rtmp2rtsp.as_mut() {
            remuxer.feed_rtmp_msg(&tag, &mut self.outputs);
        }
        if let Some(remuxer) = self.rtmp2mpegts.as_mut() {
            remuxer.feed_rtmp_msg(&tag, &mut self.outputs);
        }
    }
}

impl Group {
    fn outputs<'a>(&'a self, caches: &'a mut GroupCaches) -> Outputs<'a> {
        Outputs {
            stream: &self.stream,
            caches,
            outlets: &*self.hooks.outlets,
        }
    }

    /// Flush a disposed mpegts remuxer into the caches and outlets
    pub(super) fn dispose_mpegts(&self, state: &mut GroupState) {
        let GroupState {
            rtmp2mpegts,
            caches,
            ..
        } = state;

        if let Some(mut remuxer) = rtmp2mpegts.take() {
            remuxer.dispose(&mut self.outputs(caches));
        }
    }
}

impl Group {
    fn feed_rtmp(&self, state: &mut GroupState, tag: FlvTag) {
        let GroupState {
            rtmp2rtsp,
            rtmp2mpegts,
            caches,
            ..
        } = state;

        let mut fanout = RtmpFanout {
            outputs: self.outputs(caches),
            rtmp2rtsp: rtmp2rtsp.as_mut(),
            rtmp2mpegts: rtmp2mpegts.as_mut(),
        };
        fanout.on_rtmp_msg(tag);
    }

    fn feed_sdp(&self, state: &mut GroupState, sdp: SessionDescription) {
        tracing::debug!(group = %self.unique_key, "Sdp received");
        let GroupState {
            rtsp2rtmp,
            rtmp2rtsp,
            rtmp2mpegts,
            caches,
            ..
        } = state;

        let mut fanout = RtmpFanout {
            outputs: self.outputs(caches),
            rtmp2rtsp: rtmp2rtsp.as_mut(),
            rtmp2mpegts: rtmp2mpegts.as_mut(),
        };
        if let Some(remuxer) = rtsp2rtmp.as_mut() {
            remuxer.on_sdp(&sdp, &mut fanout);
        }
        fanout.outputs.on_sdp(sdp);
    }

    fn feed_av_packet(&self, state: &mut GroupState, packet: AvPacket) {
        let GroupState {
            rtsp2rtmp,
            rtmp2rtsp,
            rtmp2mpegts,
            caches,
            ..
        } = state;

        let Some(remuxer) = rtsp2rtmp.as_mut() else {
            return;
        };
        let mut fanout = RtmpFanout {
            outputs: self.outputs(caches),
            rtmp2rtsp: rtmp2rtsp.as_mut(),
            rtmp2mpegts: rtmp2mpegts.as_mut(),
        };
        remuxer.feed_av_packet(&packet, &mut fanout);
    }
}

/// Entry point for the pull proxy; only accepted while a pull holds the slot
impl RtmpMsgObserver for Group {
    fn on_read_rtmp_av_msg(&self, tag: FlvTag) {
        let mut state = self.state.lock();
        if !matches!(state.in_session, InSession::RtmpPull(_)) {
            tracing::trace!(
                group = %self.unique_key,
                timestamp = tag.timestamp,
                "Dropping rtmp message, no pull session"
            );
            return;
        }
        self.feed_rtmp(&mut state, tag);
    }
}

/// Observer handed to a publisher on admission
pub(crate) struct ProducerLink {
    group: Weak<Group>,
    admission: u64,
}

impl ProducerLink {
    pub(super) fn new(group: &Arc<Group>, admission: u64) -> Self {
        Self {
            group: Arc::downgrade(group),
            admission,
        }
    }

    /// Run `f` with the group state if this link's admission still holds the slot
    fn with_state(&self, what: &str, f: impl FnOnce(&Group, &mut GroupState)) {
        let Some(group) = self.group.upgrade() else {
            return;
        };
        let mut state = group.state.lock();
        if !state.admits(self.admission) {
            tracing::trace!(
                group = %group.unique_key,
                admission = self.admission,
                current = state.admission,
                "Dropping {} from a producer no longer in the slot",
                what
            );
            return;
        }
        f(&group, &mut *state);
    }
}

impl RtmpMsgObserver for ProducerLink {
    fn on_read_rtmp_av_msg(&self, tag: FlvTag) {
        self.with_state("rtmp message", |group, state| group.feed_rtmp(state, tag));
    }
}

impl RtspPubObserver for ProducerLink {
    fn on_sdp(&self, sdp: SessionDescription) {
        self.with_state("sdp", |group, state| group.feed_sdp(state, sdp));
    }

    fn on_rtp_packet(&self, packet: RtpPacket) {
        self.with_state("rtp packet", |group, state| {
            let GroupState { caches, .. } = state;
            group.outputs(caches).on_rtp_packet(packet);
        });
    }

    fn on_av_packet(&self, packet: AvPacket) {
        self.with_state("av packet", |group, state| group.feed_av_packet(state, packet));
    }
}
