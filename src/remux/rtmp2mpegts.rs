//! RTMP → MPEG-TS remuxer
//!
//! H.264 AVCC NAL units become Annex-B access units (AUD first, SPS/PPS in front
//! of every IDR); raw AAC frames get ADTS headers. Audio is held back until a
//! video frame arrives or the held audio spans [`AUDIO_CACHE_MAX_DELAY`], so
//! that audio and video leave in decode order.

use bytes::{BufMut, Bytes, BytesMut};

use crate::media::aac::generate_adts_header;
use crate::media::flv::{AudioFormat, FlvTagType, VideoCodec};
use crate::media::h264::START_CODE;
use crate::media::ts::TS_CLOCK_PER_MS;
use crate::media::{
    AacData, AudioSpecificConfig, AvcConfig, FlvTag, H264Data, NaluIterator, NaluType, PatPmt,
    TsFrame,
};
use crate::registry::StreamKey;

use super::{MpegtsSink, RtmpToMpegts};

/// Longest span of audio held back waiting for video (150ms at 90kHz)
pub const AUDIO_CACHE_MAX_DELAY: u64 = 150 * TS_CLOCK_PER_MS;

const AUD_NALU: [u8; 2] = [0x09, 0xF0];

pub struct Rtmp2MpegtsRemuxer {
    stream: StreamKey,
    avc: Option<AvcConfig>,
    asc: Option<AudioSpecificConfig>,
    pat_pmt_sent: bool,
    audio_cache: Vec<TsFrame>,
}

impl Rtmp2MpegtsRemuxer {
    pub fn new(stream: StreamKey) -> Self {
        Self {
            stream,
            avc: None,
            asc: None,
            pat_pmt_sent: false,
            audio_cache: Vec::new(),
        }
    }

    /// Number of audio frames held back
    pub fn buffered_audio(&self) -> usize {
        self.audio_cache.len()
    }

    fn feed_audio(&mut self, tag: &FlvTag, sink: &mut dyn MpegtsSink) {
        if tag.audio_format() != Some(AudioFormat::Aac) {
            tracing::trace!(stream = %self.stream, "Skipping non-AAC audio");
            return;
        }

        match AacData::parse(tag.data.slice(1..)) {
            Ok(AacData::SequenceHeader(config)) => self.asc = Some(config),
            Ok(AacData::Frame { data }) => {
                let Some(asc) = &self.asc else {
                    tracing::debug!(stream = %self.stream, "AAC frame before sequence header");
                    return;
                };

                let mut payload = BytesMut::with_capacity(7 + data.len());
                payload.put_slice(&generate_adts_header(asc, data.len()));
                payload.put_slice(&data);

                let pts = u64::from(tag.timestamp) * TS_CLOCK_PER_MS;
                self.audio_cache.push(TsFrame::audio(pts, payload.freeze()));

                let first_pts = self.audio_cache.first().map_or(pts, |f| f.pts);
                if pts.saturating_sub(first_pts) >= AUDIO_CACHE_MAX_DELAY {
                    self.flush_audio(sink);
                }
            }
            Err(e) => {
                tracing::debug!(stream = %self.stream, error = %e, "Dropping malformed AAC tag");
            }
        }
    }

    fn feed_video(&mut self, tag: &FlvTag, sink: &mut dyn MpegtsSink) {
        if tag.video_codec() != Some(VideoCodec::Avc) {
            tracing::trace!(stream = %self.stream, "Skipping non-AVC video");
            return;
        }

        match H264Data::parse(tag.data.slice(1..)) {
            Ok(H264Data::SequenceHeader(config)) => self.avc = Some(config),
            Ok(H264Data::Frame {
                composition_time,
                nalus,
            }) => {
                let Some(avc) = &self.avc else {
                    tracing::debug!(stream = %self.stream, "AVC frame before sequence header");
                    return;
                };

                let key = tag.is_keyframe();
                let payload = to_annexb(avc, key, &nalus);
                let dts = u64::from(tag.timestamp) * TS_CLOCK_PER_MS;
                let pts = (i64::from(tag.timestamp) + i64::from(composition_time)).max(0) as u64
                    * TS_CLOCK_PER_MS;

                self.flush_audio(sink);
                self.emit(TsFrame::video(dts, pts, key, payload), sink);
            }
            Ok(H264Data::EndOfSequence) => {}
            Err(e) => {
                tracing::debug!(stream = %self.stream, error = %e, "Dropping malformed AVC tag");
            }
        }
    }

    fn flush_audio(&mut self, sink: &mut dyn MpegtsSink) {
        for frame in std::mem::take(&mut self.audio_cache) {
            self.emit(frame, sink);
        }
    }

    fn emit(&mut self, frame: TsFrame, sink: &mut dyn MpegtsSink) {
        if !self.pat_pmt_sent {
            sink.on_pat_pmt(PatPmt::new(self.avc.is_some(), self.asc.is_some()));
            self.pat_pmt_sent = true;
        }
        sink.on_ts_frame(frame);
    }
}

/// AVCC → Annex-B, with AUD and (on keyframes) parameter sets in front
fn to_annexb(avc: &AvcConfig, key: bool, nalus: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(nalus.len() + 64);

    out.put_slice(&START_CODE);
    out.put_slice(&AUD_NALU);

    if key {
        for ps in avc.sps.iter().chain(avc.pps.iter()) {
            out.put_slice(&START_CODE);
            out.put_slice(ps);
        }
    }

    for nalu in NaluIterator::new(nalus, avc.nalu_length_size) {
        match nalu.first().and_then(|b| NaluType::from_byte(*b)) {
            Some(NaluType::Aud) => continue,
            Some(t) if key && t.is_parameter_set() => continue,
            _ => {}
        }
        out.put_slice(&START_CODE);
        out.put_slice(nalu);
    }

    out.freeze()
}

impl RtmpToMpegts for Rtmp2MpegtsRemuxer {
    fn feed_rtmp_msg(&mut self, tag: &FlvTag, sink: &mut dyn MpegtsSink) {
        match tag.tag_type {
            FlvTagType::Audio => self.feed_audio(tag, sink),
            FlvTagType::Video => self.feed_video(tag, sink),
            FlvTagType::Script => {}
        }
    }

    fn dispose(&mut self, sink: &mut dyn MpegtsSink) {
        tracing::debug!(
            stream = %self.stream,
            buffered = self.audio_cache.len(),
            "Disposing mpegts remuxer"
        );
        self.flush_audio(sink);
    }
}
