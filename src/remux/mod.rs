//! Remux pipelines
//!
//! A remuxer converts the producer's representation into another one without
//! touching codec data. It is handed its output sink on every call instead of
//! holding a callback, so a group can feed a remuxer while holding its own
//! state lock and receive the output into the same locked state:
//!
//! ```text
//!   RTMP producer ──FlvTag──► Rtmp2RtspRemuxer ──► RtspSink   (SDP + RTP)
//!                        └──► Rtmp2MpegtsRemuxer ► MpegtsSink (PAT/PMT + TS frames)
//!   RTSP producer ─AvPacket─► AvPacket2RtmpRemuxer ► RtmpSink (FLV tags)
//! ```
//!
//! The [`DummyAudioFilter`] is not a remuxer; it sits in front of the group as
//! the RTMP publisher's observer.

mod avpacket2rtmp;
mod dummy_audio;
mod rtmp2mpegts;
mod rtmp2rtsp;

pub use avpacket2rtmp::AvPacket2RtmpRemuxer;
pub use dummy_audio::DummyAudioFilter;
pub use rtmp2mpegts::Rtmp2MpegtsRemuxer;
pub use rtmp2rtsp::Rtmp2RtspRemuxer;

use crate::media::{AvPacket, FlvTag, PatPmt, RtpPacket, SessionDescription, TsFrame};
use crate::registry::StreamKey;

/// Output of a remuxer producing RTMP
pub trait RtmpSink {
    fn on_rtmp_msg(&mut self, tag: FlvTag);
}

/// Output of a remuxer producing RTSP
pub trait RtspSink {
    fn on_sdp(&mut self, sdp: SessionDescription);
    fn on_rtp_packet(&mut self, packet: RtpPacket);
}

/// Output of a remuxer producing MPEG-TS
pub trait MpegtsSink {
    fn on_pat_pmt(&mut self, pat_pmt: PatPmt);
    fn on_ts_frame(&mut self, frame: TsFrame);
}

/// RTMP → RTSP
pub trait RtmpToRtsp: Send {
    fn feed_rtmp_msg(&mut self, tag: &FlvTag, sink: &mut dyn RtspSink);
}

/// RTSP (reassembled packets) → RTMP
pub trait AvPacketToRtmp: Send {
    fn on_sdp(&mut self, sdp: &SessionDescription, sink: &mut dyn RtmpSink);
    fn feed_av_packet(&mut self, packet: &AvPacket, sink: &mut dyn RtmpSink);
}

/// RTMP → MPEG-TS
pub trait RtmpToMpegts: Send {
    fn feed_rtmp_msg(&mut self, tag: &FlvTag, sink: &mut dyn MpegtsSink);

    /// Emit everything still buffered; the remuxer is dropped afterwards
    fn dispose(&mut self, sink: &mut dyn MpegtsSink);
}

/// Constructs the remuxers a group needs
pub trait RemuxFactory: Send + Sync {
    fn rtmp_to_rtsp(&self, stream: &StreamKey) -> Box<dyn RtmpToRtsp>;
    fn av_packet_to_rtmp(&self, stream: &StreamKey) -> Box<dyn AvPacketToRtmp>;
    fn rtmp_to_mpegts(&self, stream: &StreamKey) -> Box<dyn RtmpToMpegts>;
}

/// Builds the remuxers in this module
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRemuxFactory;

impl RemuxFactory for DefaultRemuxFactory {
    fn rtmp_to_rtsp(&self, _stream: &StreamKey) -> Box<dyn RtmpToRtsp> {
        Box::new(Rtmp2RtspRemuxer::new())
    }

    fn av_packet_to_rtmp(&self, _stream: &StreamKey) -> Box<dyn AvPacketToRtmp> {
        Box::new(AvPacket2RtmpRemuxer::new())
    }

    fn rtmp_to_mpegts(&self, stream: &StreamKey) -> Box<dyn RtmpToMpegts> {
        Box::new(Rtmp2MpegtsRemuxer::new(stream.clone()))
    }
}
