//! RTSP-side media units
//!
//! An RTSP publisher hands the group two things per media unit: the raw
//! [`RtpPacket`] (relayed as-is to RTSP subscribers) and the reassembled
//! [`AvPacket`] (fed to the RTSP→RTMP remuxer).

use bytes::{BufMut, Bytes, BytesMut};

/// RTP fixed header size
pub const RTP_HEADER_SIZE: usize = 12;

/// Largest RTP payload produced when packetizing
pub const RTP_MAX_PAYLOAD: usize = 1400;

/// Codec of a reassembled packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvPacketPt {
    Avc,
    Aac,
}

/// A reassembled access unit from an RTSP publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvPacket {
    pub payload_type: AvPacketPt,
    /// Decode timestamp in milliseconds
    pub timestamp: u32,
    /// Presentation timestamp in milliseconds
    pub pts: u32,
    /// AVC: 4-byte length-prefixed NAL units; AAC: one raw frame
    pub payload: Bytes,
}

/// One RTP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub payload_type: u8,
    pub marker: bool,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Bytes,
}

impl RtpPacket {
    /// Serialize with the 12-byte fixed header (version 2, no CSRC)
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(RTP_HEADER_SIZE + self.payload.len());

        out.put_u8(0x80);
        out.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        out.put_u16(self.sequence);
        out.put_u32(self.timestamp);
        out.put_u32(self.ssrc);
        out.put_slice(&self.payload);

        out.freeze()
    }
}

/// Sequence/SSRC state for one outgoing RTP track
#[derive(Debug)]
pub struct RtpPacker {
    payload_type: u8,
    ssrc: u32,
    sequence: u16,
}

impl RtpPacker {
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        Self {
            payload_type,
            ssrc,
            sequence: 0,
        }
    }

    pub fn pack(&mut self, timestamp: u32, marker: bool, payload: Bytes) -> RtpPacket {
        let packet = RtpPacket {
            payload_type: self.payload_type,
            marker,
            sequence: self.sequence,
            timestamp,
            ssrc: self.ssrc,
            payload,
        };
        self.sequence = self.sequence.wrapping_add(1);
        packet
    }
}
