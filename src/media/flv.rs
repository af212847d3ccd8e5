//! FLV tags
//!
//! An RTMP audio/video/data message body is an FLV tag body. The group carries
//! media from RTMP producers (and from the RTSP→RTMP remuxer) as [`FlvTag`]s.
//!
//! Full FLV tag as written to HTTP-FLV subscribers:
//! ```text
//! +--------+-------------+-----------+-------------+---------+-------------------+
//! | Type(1)| DataSize(3) | TS(3+1)   | StreamID(3) | Data(N) | PrevTagSize(4)    |
//! +--------+-------------+-----------+-------------+---------+-------------------+
//! ```
//!
//! Video body: `FrameType(4 bits) | CodecID(4 bits) | AVCPacketType | CTS(3) | ...`
//! Audio body: `SoundFormat(4) | Rate(2) | Size(1) | Type(1) | AACPacketType | ...`

use bytes::{BufMut, Bytes, BytesMut};

use super::gop::{GopUnit, UnitKind};

/// FLV tag type codes
pub const TAG_TYPE_AUDIO: u8 = 8;
pub const TAG_TYPE_VIDEO: u8 = 9;
pub const TAG_TYPE_SCRIPT: u8 = 18;

/// FLV tag header is always 11 bytes
pub const TAG_HEADER_SIZE: usize = 11;

/// AAC, 44kHz, 16-bit, stereo
const AAC_SOUND_HEADER: u8 = 0xAF;

/// FLV tag type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio,
    Video,
    Script,
}

impl FlvTagType {
    pub fn code(&self) -> u8 {
        match self {
            FlvTagType::Audio => TAG_TYPE_AUDIO,
            FlvTagType::Video => TAG_TYPE_VIDEO,
            FlvTagType::Script => TAG_TYPE_SCRIPT,
        }
    }
}

/// Video frame type (upper 4 bits of first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFrameType {
    Keyframe = 1,
    InterFrame = 2,
    DisposableInterFrame = 3,
    GeneratedKeyframe = 4,
    VideoInfoFrame = 5,
}

impl VideoFrameType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x0F {
            1 => Some(VideoFrameType::Keyframe),
            2 => Some(VideoFrameType::InterFrame),
            3 => Some(VideoFrameType::DisposableInterFrame),
            4 => Some(VideoFrameType::GeneratedKeyframe),
            5 => Some(VideoFrameType::VideoInfoFrame),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(
            self,
            VideoFrameType::Keyframe | VideoFrameType::GeneratedKeyframe
        )
    }
}

/// Video codec ID (lower 4 bits of first byte)
///
/// Only AVC is remuxed; the rest pass through the RTMP paths untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    SorensonH263 = 2,
    Vp6 = 4,
    Avc = 7,
    Hevc = 12,
}

impl VideoCodec {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x0F {
            2 => Some(VideoCodec::SorensonH263),
            4 => Some(VideoCodec::Vp6),
            7 => Some(VideoCodec::Avc),
            12 => Some(VideoCodec::Hevc),
            _ => None,
        }
    }
}

/// Audio format (upper 4 bits of first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3 = 2,
    G711ALaw = 7,
    G711MuLaw = 8,
    Aac = 10,
    Speex = 11,
}

impl AudioFormat {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x0F {
            2 => Some(AudioFormat::Mp3),
            7 => Some(AudioFormat::G711ALaw),
            8 => Some(AudioFormat::G711MuLaw),
            10 => Some(AudioFormat::Aac),
            11 => Some(AudioFormat::Speex),
            _ => None,
        }
    }
}

/// An RTMP media message body with its timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvTag {
    /// Tag type
    pub tag_type: FlvTagType,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Tag body (including codec headers)
    pub data: Bytes,
}

impl FlvTag {
    /// Create a new video tag
    pub fn video(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Video,
            timestamp,
            data,
        }
    }

    /// Create a new audio tag
    pub fn audio(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Audio,
            timestamp,
            data,
        }
    }

    /// Create a script data tag (onMetaData)
    pub fn script(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Script,
            timestamp,
            data,
        }
    }

    /// AVC sequence header tag wrapping an AVCDecoderConfigurationRecord
    pub fn avc_sequence_header(timestamp: u32, record: &[u8]) -> Self {
        let mut data = BytesMut::with_capacity(5 + record.len());
        data.put_slice(&[0x17, 0x00, 0x00, 0x00, 0x00]);
        data.put_slice(record);
        Self::video(timestamp, data.freeze())
    }

    /// AVC NALU tag; `nalus` are length-prefixed (AVCC)
    pub fn avc_nalus(timestamp: u32, keyframe: bool, composition_time: i32, nalus: &[u8]) -> Self {
        let mut data = BytesMut::with_capacity(5 + nalus.len());
        data.put_u8(if keyframe { 0x17 } else { 0x27 });
        data.put_u8(0x01);
        let cts = composition_time.to_be_bytes();
        data.put_slice(&cts[1..]);
        data.put_slice(nalus);
        Self::video(timestamp, data.freeze())
    }

    /// AAC sequence header tag wrapping an AudioSpecificConfig
    pub fn aac_sequence_header(timestamp: u32, asc: &[u8]) -> Self {
        let mut data = BytesMut::with_capacity(2 + asc.len());
        data.put_slice(&[AAC_SOUND_HEADER, 0x00]);
        data.put_slice(asc);
        Self::audio(timestamp, data.freeze())
    }

    /// Raw AAC frame tag
    pub fn aac_raw(timestamp: u32, frame: &[u8]) -> Self {
        let mut data = BytesMut::with_capacity(2 + frame.len());
        data.put_slice(&[AAC_SOUND_HEADER, 0x01]);
        data.put_slice(frame);
        Self::audio(timestamp, data.freeze())
    }

    pub fn is_video(&self) -> bool {
        self.tag_type == FlvTagType::Video
    }

    pub fn is_audio(&self) -> bool {
        self.tag_type == FlvTagType::Audio
    }

    pub fn is_metadata(&self) -> bool {
        self.tag_type == FlvTagType::Script
    }

    /// For video tags, get the frame type
    pub fn video_frame_type(&self) -> Option<VideoFrameType> {
        if self.is_video() && !self.data.is_empty() {
            VideoFrameType::from_byte(self.data[0])
        } else {
            None
        }
    }

    /// For video tags, get the codec
    pub fn video_codec(&self) -> Option<VideoCodec> {
        if self.is_video() && !self.data.is_empty() {
            VideoCodec::from_byte(self.data[0])
        } else {
            None
        }
    }

    /// For audio tags, get the format
    pub fn audio_format(&self) -> Option<AudioFormat> {
        if self.is_audio() && !self.data.is_empty() {
            AudioFormat::from_byte(self.data[0])
        } else {
            None
        }
    }

    /// Check if this is a keyframe (sequence headers excluded)
    pub fn is_keyframe(&self) -> bool {
        !self.is_avc_sequence_header()
            && self
                .video_frame_type()
                .map(|ft| ft.is_keyframe())
                .unwrap_or(false)
    }

    /// Check if this is an AVC sequence header
    pub fn is_avc_sequence_header(&self) -> bool {
        self.is_video()
            && self.data.len() >= 2
            && VideoCodec::from_byte(self.data[0]) == Some(VideoCodec::Avc)
            && self.data[1] == 0
    }

    /// Check if this is an AAC sequence header
    pub fn is_aac_sequence_header(&self) -> bool {
        self.is_audio()
            && self.data.len() >= 2
            && AudioFormat::from_byte(self.data[0]) == Some(AudioFormat::Aac)
            && self.data[1] == 0
    }

    /// Size of the tag body
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Serialize as a complete FLV tag followed by its PreviousTagSize
    pub fn encode(&self) -> Bytes {
        let data_size = self.data.len() as u32;
        let mut out = BytesMut::with_capacity(TAG_HEADER_SIZE + self.data.len() + 4);

        out.put_u8(self.tag_type.code());
        out.put_slice(&data_size.to_be_bytes()[1..]);
        // lower 24 bits, then the extension byte
        out.put_slice(&self.timestamp.to_be_bytes()[1..]);
        out.put_u8((self.timestamp >> 24) as u8);
        out.put_slice(&[0, 0, 0]);
        out.put_slice(&self.data);
        out.put_u32(TAG_HEADER_SIZE as u32 + data_size);

        out.freeze()
    }
}

impl GopUnit for FlvTag {
    fn kind(&self) -> UnitKind {
        match self.tag_type {
            FlvTagType::Script => UnitKind::Metadata,
            FlvTagType::Video if self.is_avc_sequence_header() => UnitKind::VideoHeader,
            FlvTagType::Audio if self.is_aac_sequence_header() => UnitKind::AudioHeader,
            FlvTagType::Video if self.is_keyframe() => UnitKind::KeyFrame,
            _ => UnitKind::Frame,
        }
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}

/// A fully serialized FLV tag, ready to write to an HTTP-FLV subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFlvTag {
    kind: UnitKind,
    /// Tag header + body + PreviousTagSize
    pub raw: Bytes,
}

impl From<&FlvTag> for EncodedFlvTag {
    fn from(tag: &FlvTag) -> Self {
        Self {
            kind: tag.kind(),
            raw: tag.encode(),
        }
    }
}

impl GopUnit for EncodedFlvTag {
    fn kind(&self) -> UnitKind {
        self.kind
    }

    fn size(&self) -> usize {
        self.raw.len()
    }
}
