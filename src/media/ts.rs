//! MPEG-TS units
//!
//! The RTMP→MPEG-TS remuxer emits elementary-stream frames already converted to
//! the representation TS expects (Annex-B H.264, ADTS AAC) with 90 kHz
//! timestamps. Splitting them into 188-byte transport packets is left to the
//! HLS / recording writers that consume them.

use bytes::Bytes;

use super::gop::{GopUnit, UnitKind};

/// Program map PID
pub const PMT_PID: u16 = 0x1001;
/// Elementary stream PIDs
pub const VIDEO_PID: u16 = 0x100;
pub const AUDIO_PID: u16 = 0x101;

/// Milliseconds → 90 kHz clock
pub const TS_CLOCK_PER_MS: u64 = 90;

/// Elementary stream type, as carried in the PMT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    H264 = 0x1B,
    Aac = 0x0F,
}

/// One elementary stream announced in the PMT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmtStream {
    pub pid: u16,
    pub stream_type: StreamType,
}

/// Program table of contents (PAT + PMT) for the single program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatPmt {
    pub pmt_pid: u16,
    pub video: Option<PmtStream>,
    pub audio: Option<PmtStream>,
}

impl PatPmt {
    pub fn new(has_video: bool, has_audio: bool) -> Self {
        Self {
            pmt_pid: PMT_PID,
            video: has_video.then_some(PmtStream {
                pid: VIDEO_PID,
                stream_type: StreamType::H264,
            }),
            audio: has_audio.then_some(PmtStream {
                pid: AUDIO_PID,
                stream_type: StreamType::Aac,
            }),
        }
    }
}

/// One PES-level frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsFrame {
    pub pid: u16,
    pub stream_type: StreamType,
    /// Presentation timestamp, 90 kHz
    pub pts: u64,
    /// Decode timestamp, 90 kHz
    pub dts: u64,
    /// IDR access unit
    pub key: bool,
    pub payload: Bytes,
}

impl TsFrame {
    pub fn video(dts: u64, pts: u64, key: bool, payload: Bytes) -> Self {
        Self {
            pid: VIDEO_PID,
            stream_type: StreamType::H264,
            pts,
            dts,
            key,
            payload,
        }
    }

    pub fn audio(pts: u64, payload: Bytes) -> Self {
        Self {
            pid: AUDIO_PID,
            stream_type: StreamType::Aac,
            pts,
            dts: pts,
            key: false,
            payload,
        }
    }

    pub fn is_video(&self) -> bool {
        self.stream_type == StreamType::H264
    }
}

impl GopUnit for TsFrame {
    fn kind(&self) -> UnitKind {
        if self.key {
            UnitKind::KeyFrame
        } else {
            UnitKind::Frame
        }
    }

    fn size(&self) -> usize {
        self.payload.len()
    }
}
