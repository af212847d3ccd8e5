use crate::config::GroupConfig;
use crate::media::{EncodedFlvTag, FlvTag, GopCache, PatPmt, SessionDescription, TsFrame};

/// Per-format state kept for subscribers that join mid-stream
#[derive(Debug)]
pub(crate) struct GroupCaches {
    pub rtmp: GopCache<FlvTag>,
    pub httpflv: GopCache<EncodedFlvTag>,
    pub httpts: GopCache<TsFrame>,
    pub sdp: Option<SessionDescription>,
    pub pat_pmt: Option<PatPmt>,
}

impl GroupCaches {
    pub fn new(config: &GroupConfig) -> Self {
        let max = config.gop_cache_max_size;
        Self {
            rtmp: GopCache::with_max_size(config.rtmp_gop_num, max),
            httpflv: GopCache::with_max_size(config.httpflv_gop_num, max),
            httpts: GopCache::with_max_size(config.httpts_gop_num, max),
            sdp: None,
            pat_pmt: None,
        }
    }

    /// An RTMP message feeds both the RTMP and the HTTP-FLV cache
    pub fn push_rtmp(&mut self, tag: &FlvTag) {
        self.httpflv.push(EncodedFlvTag::from(tag));
        self.rtmp.push(tag.clone());
    }

    pub fn clear(&mut self) {
        self.rtmp.clear();
        self.httpflv.clear();
        self.httpts.clear();
        self.sdp = None;
        self.pat_pmt = None;
    }

    pub fn is_empty(&self) -> bool {
        self.rtmp.is_empty()
            && self.httpflv.is_empty()
            && self.httpts.is_empty()
            && self.sdp.is_none()
            && self.pat_pmt.is_none()
    }
}
