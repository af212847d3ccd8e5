//! RTSP → RTMP remuxer
//!
//! Input is the RTSP session's reassembled [`AvPacket`]s: AVC access units as
//! 4-byte length-prefixed NAL units, AAC as one raw frame per packet.

use bytes::{BufMut, Bytes, BytesMut};

use crate::media::{AvPacket, AvPacketPt, AvcConfig, FlvTag, NaluIterator, NaluType, SessionDescription};

use super::{AvPacketToRtmp, RtmpSink};

const NALU_LENGTH_SIZE: u8 = 4;

#[derive(Default)]
pub struct AvPacket2RtmpRemuxer {
    avc: Option<AvcConfig>,
    aac_header_sent: bool,
}

impl AvPacket2RtmpRemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_avc(&mut self, timestamp: u32, sps: Bytes, pps: Bytes, sink: &mut dyn RtmpSink) {
        if let Some((cur_sps, cur_pps)) = self.avc.as_ref().and_then(|c| c.first_parameter_sets()) {
            if *cur_sps == sps && *cur_pps == pps {
                return;
            }
        }

        match AvcConfig::from_parameter_sets(sps, pps) {
            Ok(config) => {
                sink.on_rtmp_msg(FlvTag::avc_sequence_header(timestamp, &config.raw));
                self.avc = Some(config);
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring unusable SPS/PPS"),
        }
    }

    fn feed_avc(&mut self, packet: &AvPacket, sink: &mut dyn RtmpSink) {
        let mut sps = None;
        let mut pps = None;
        let mut keyframe = false;
        let mut body = BytesMut::with_capacity(packet.payload.len());

        for nalu in NaluIterator::new(&packet.payload, NALU_LENGTH_SIZE) {
            let Some(&first) = nalu.first() else { continue };
            match NaluType::from_byte(first) {
                Some(NaluType::Sps) => sps = Some(Bytes::copy_from_slice(nalu)),
                Some(NaluType::Pps) => pps = Some(Bytes::copy_from_slice(nalu)),
                Some(NaluType::Aud) => {}
                other => {
                    keyframe |= other == Some(NaluType::Idr);
                    body.put_u32(nalu.len() as u32);
                    body.put_slice(nalu);
                }
            }
        }

        if let (Some(sps), Some(pps)) = (sps, pps) {
            self.update_avc(packet.timestamp, sps, pps, sink);
        }

        if self.avc.is_none() {
            tracing::trace!("AVC packet before sequence header");
            return;
        }
        if body.is_empty() {
            return;
        }

        let cts = packet.pts.wrapping_sub(packet.timestamp) as i32;
        sink.on_rtmp_msg(FlvTag::avc_nalus(packet.timestamp, keyframe, cts, &body));
    }
}

impl AvPacketToRtmp for AvPacket2RtmpRemuxer {
    fn on_sdp(&mut self, sdp: &SessionDescription, sink: &mut dyn RtmpSink) {
        if let Some(video) = &sdp.video {
            self.update_avc(0, video.sps.clone(), video.pps.clone(), sink);
        }
        if let Some(audio) = &sdp.audio {
            if !audio.asc.is_empty() {
                sink.on_rtmp_msg(FlvTag::aac_sequence_header(0, &audio.asc));
                self.aac_header_sent = true;
            }
        }
    }

    fn feed_av_packet(&mut self, packet: &AvPacket, sink: &mut dyn RtmpSink) {
        match packet.payload_type {
            AvPacketPt::Avc => self.feed_avc(packet, sink),
            AvPacketPt::Aac => {
                if !self.aac_header_sent {
                    tracing::trace!("AAC packet before sequence header");
                    return;
                }
                sink.on_rtmp_msg(FlvTag::aac_raw(packet.timestamp, &packet.payload));
            }
        }
    }
}
