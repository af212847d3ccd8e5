//! Session description (SDP)
//!
//! RTSP subscribers bootstrap from the SDP. It either arrives from an RTSP
//! publisher (already parsed by the session layer) or is generated by the
//! RTMP→RTSP remuxer from the AVC/AAC sequence headers.

use std::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

pub const VIDEO_PAYLOAD_TYPE: u8 = 96;
pub const AUDIO_PAYLOAD_TYPE: u8 = 97;

/// H.264 track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTrack {
    pub payload_type: u8,
    pub sps: Bytes,
    pub pps: Bytes,
}

/// MPEG4-GENERIC (AAC) track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    pub payload_type: u8,
    pub sample_rate: u32,
    pub channels: u8,
    /// AudioSpecificConfig
    pub asc: Bytes,
}

/// Session description text together with its parsed tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub raw: String,
    pub video: Option<VideoTrack>,
    pub audio: Option<AudioTrack>,
}

impl SessionDescription {
    /// Generate the SDP text for the given tracks
    pub fn new(video: Option<VideoTrack>, audio: Option<AudioTrack>) -> Self {
        let mut raw = String::from(
            "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=No Name\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\n",
        );

        // Writing into a String cannot fail
        let mut stream_id = 0;
        if let Some(v) = &video {
            let profile_level_id = v.sps.get(1..4).map(hex::encode).unwrap_or_default();
            let _ = write!(
                raw,
                "m=video 0 RTP/AVP {pt}\r\n\
                 a=rtpmap:{pt} H264/90000\r\n\
                 a=fmtp:{pt} packetization-mode=1; sprop-parameter-sets={sps},{pps}; profile-level-id={plid}\r\n\
                 a=control:streamid={sid}\r\n",
                pt = v.payload_type,
                sps = STANDARD.encode(&v.sps),
                pps = STANDARD.encode(&v.pps),
                plid = profile_level_id,
                sid = stream_id,
            );
            stream_id += 1;
        }
        if let Some(a) = &audio {
            let _ = write!(
                raw,
                "m=audio 0 RTP/AVP {pt}\r\n\
                 a=rtpmap:{pt} MPEG4-GENERIC/{rate}/{ch}\r\n\
                 a=fmtp:{pt} profile-level-id=1;mode=AAC-hbr;sizelength=13;indexlength=3;indexdeltalength=3;config={config}\r\n\
                 a=control:streamid={sid}\r\n",
                pt = a.payload_type,
                rate = a.sample_rate,
                ch = a.channels,
                config = hex::encode(&a.asc),
                sid = stream_id,
            );
        }

        Self { raw, video, audio }
    }
}
