//! RTMP → RTSP remuxer
//!
//! The SDP is generated once, when the first media frame follows the sequence
//! headers. H.264 is packetized per RFC 6184 (single NAL unit or FU-A), AAC per
//! RFC 3640 (AAC-hbr, one AU per packet).

use bytes::{BufMut, Bytes, BytesMut};

use crate::media::flv::{AudioFormat, FlvTagType, VideoCodec};
use crate::media::rtp::{RtpPacker, RTP_MAX_PAYLOAD};
use crate::media::sdp::{AUDIO_PAYLOAD_TYPE, VIDEO_PAYLOAD_TYPE};
use crate::media::{
    AacData, AudioSpecificConfig, AudioTrack, AvcConfig, FlvTag, H264Data, NaluIterator, NaluType,
    SessionDescription, VideoTrack,
};

use super::{RtmpToRtsp, RtspSink};

const VIDEO_SSRC: u32 = 0x1234_5678;
const AUDIO_SSRC: u32 = 0x2345_6789;
const VIDEO_CLOCK_PER_MS: u32 = 90;
const FU_A: u8 = 28;

pub struct Rtmp2RtspRemuxer {
    avc: Option<AvcConfig>,
    asc: Option<AudioSpecificConfig>,
    sdp_sent: bool,
    video: RtpPacker,
    audio: RtpPacker,
}

impl Rtmp2RtspRemuxer {
    pub fn new() -> Self {
        Self {
            avc: None,
            asc: None,
            sdp_sent: false,
            video: RtpPacker::new(VIDEO_PAYLOAD_TYPE, VIDEO_SSRC),
            audio: RtpPacker::new(AUDIO_PAYLOAD_TYPE, AUDIO_SSRC),
        }
    }

    /// Emit the SDP if it has not been sent yet. Returns whether media may flow.
    fn ensure_sdp(&mut self, sink: &mut dyn RtspSink) -> bool {
        if self.sdp_sent {
            return true;
        }

        let video = self
            .avc
            .as_ref()
            .and_then(|avc| avc.first_parameter_sets())
            .map(|(sps, pps)| VideoTrack {
                payload_type: VIDEO_PAYLOAD_TYPE,
                sps: sps.clone(),
                pps: pps.clone(),
            });
        let audio = self.asc.as_ref().map(|asc| AudioTrack {
            payload_type: AUDIO_PAYLOAD_TYPE,
            sample_rate: asc.sampling_frequency,
            channels: asc.channels(),
            asc: asc.raw.clone(),
        });

        if video.is_none() && audio.is_none() {
            return false;
        }

        sink.on_sdp(SessionDescription::new(video, audio));
        self.sdp_sent = true;
        true
    }

    fn feed_video(&mut self, tag: &FlvTag, sink: &mut dyn RtspSink) {
        if tag.video_codec() != Some(VideoCodec::Avc) {
            return;
        }

        match H264Data::parse(tag.data.slice(1..)) {
            Ok(H264Data::SequenceHeader(config)) => {
                if self.sdp_sent {
                    tracing::debug!("AVC sequence header changed after SDP was sent");
                }
                self.avc = Some(config);
            }
            Ok(H264Data::Frame {
                composition_time,
                nalus,
            }) => {
                if self.avc.is_none() || !self.ensure_sdp(sink) {
                    return;
                }
                let Some(avc) = &self.avc else { return };

                let pts = (i64::from(tag.timestamp) + i64::from(composition_time)).max(0) as u32;
                let rtp_ts = pts.wrapping_mul(VIDEO_CLOCK_PER_MS);

                let units: Vec<&[u8]> = NaluIterator::new(&nalus, avc.nalu_length_size)
                    .filter(|n| match n.first() {
                        Some(&b) => NaluType::from_byte(b) != Some(NaluType::Aud),
                        None => false,
                    })
                    .collect();

                let last = units.len().saturating_sub(1);
                for (i, nalu) in units.into_iter().enumerate() {
                    packetize_nalu(&mut self.video, rtp_ts, nalu, i == last, sink);
                }
            }
            Ok(H264Data::EndOfSequence) => {}
            Err(e) => tracing::debug!(error = %e, "Dropping malformed AVC tag"),
        }
    }

    fn feed_audio(&mut self, tag: &FlvTag, sink: &mut dyn RtspSink) {
        if tag.audio_format() != Some(AudioFormat::Aac) {
            return;
        }

        match AacData::parse(tag.data.slice(1..)) {
            Ok(AacData::SequenceHeader(config)) => {
                if self.sdp_sent {
                    tracing::debug!("AAC sequence header changed after SDP was sent");
                }
                self.asc = Some(config);
            }
            Ok(AacData::Frame { data }) => {
                if self.asc.is_none() || !self.ensure_sdp(sink) {
                    return;
                }
                let Some(asc) = &self.asc else { return };

                let rtp_ts =
                    (u64::from(tag.timestamp) * u64::from(asc.sampling_frequency) / 1000) as u32;

                let len = data.len();
                let mut payload = BytesMut::with_capacity(4 + len);
                // AU-headers-length (16 bits), then one 13-bit size + 3-bit index
                payload.put_slice(&[0x00, 0x10, (len >> 5) as u8, ((len & 0x1F) << 3) as u8]);
                payload.put_slice(&data);

                sink.on_rtp_packet(self.audio.pack(rtp_ts, true, payload.freeze()));
            }
            Err(e) => tracing::debug!(error = %e, "Dropping malformed AAC tag"),
        }
    }
}

impl Default for Rtmp2RtspRemuxer {
    fn default() -> Self {
        Self::new()
    }
}

fn packetize_nalu(
    packer: &mut RtpPacker,
    timestamp: u32,
    nalu: &[u8],
    last_in_frame: bool,
    sink: &mut dyn RtspSink,
) {
    if nalu.len() <= RTP_MAX_PAYLOAD {
        sink.on_rtp_packet(packer.pack(
            timestamp,
            last_in_frame,
            Bytes::copy_from_slice(nalu),
        ));
        return;
    }

    let header = nalu[0];
    let indicator = (header & 0xE0) | FU_A;
    let nalu_type = header & 0x1F;

    let body = &nalu[1..];
    let chunk_size = RTP_MAX_PAYLOAD - 2;
    let chunks = body.chunks(chunk_size);
    let count = chunks.len();

    for (i, chunk) in chunks.enumerate() {
        let start = i == 0;
        let end = i + 1 == count;

        let mut fu_header = nalu_type;
        if start {
            fu_header |= 0x80;
        }
        if end {
            fu_header |= 0x40;
        }

        let mut payload = BytesMut::with_capacity(2 + chunk.len());
        payload.put_u8(indicator);
        payload.put_u8(fu_header);
        payload.put_slice(chunk);

        sink.on_rtp_packet(packer.pack(timestamp, end && last_in_frame, payload.freeze()));
    }
}

impl RtmpToRtsp for Rtmp2RtspRemuxer {
    fn feed_rtmp_msg(&mut self, tag: &FlvTag, sink: &mut dyn RtspSink) {
        match tag.tag_type {
            FlvTagType::Video => self.feed_video(tag, sink),
            FlvTagType::Audio => self.feed_audio(tag, sink),
            FlvTagType::Script => {}
        }
    }
}
