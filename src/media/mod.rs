//! Media units flowing through a group
//!
//! This module provides:
//! - FLV tags (RTMP / HTTP-FLV representation)
//! - H.264/AVC and AAC parsing needed for remuxing
//! - RTP packets, reassembled RTSP packets and SDP
//! - MPEG-TS frames and the program table
//! - GOP caching for fast subscriber join

pub mod aac;
pub mod flv;
pub mod gop;
pub mod h264;
pub mod rtp;
pub mod sdp;
pub mod ts;

pub use aac::{AacData, AudioSpecificConfig};
pub use flv::{EncodedFlvTag, FlvTag, FlvTagType};
pub use gop::{GopCache, GopUnit, UnitKind};
pub use h264::{AvcConfig, H264Data, NaluIterator, NaluType};
pub use rtp::{AvPacket, AvPacketPt, RtpPacket};
pub use sdp::{AudioTrack, SessionDescription, VideoTrack};
pub use ts::{PatPmt, TsFrame};
