use crate::media::{AvPacket, FlvTag, RtpPacket, SessionDescription};

/// Receives media from an RTMP publisher or pull session
pub trait RtmpMsgObserver: Send + Sync {
    fn on_read_rtmp_av_msg(&self, tag: FlvTag);
}

/// Receives media from an RTSP publisher
pub trait RtspPubObserver: Send + Sync {
    /// Called once the publisher's ANNOUNCE has been parsed
    fn on_sdp(&self, sdp: SessionDescription);

    /// Raw RTP packet, relayed unchanged to RTSP subscribers
    fn on_rtp_packet(&self, packet: RtpPacket);

    /// Reassembled access unit
    fn on_av_packet(&self, packet: AvPacket);
}
