//! GOP (Group of Pictures) cache for fast subscriber join
//!
//! When a new subscriber attaches to a live stream it needs:
//! 1. The metadata and sequence headers (SPS/PPS, AudioSpecificConfig)
//! 2. The most recent keyframe
//! 3. All frames since that keyframe
//!
//! The group keeps one cache per served format (RTMP tags, encoded HTTP-FLV
//! tags, MPEG-TS frames), so the cache is generic over the unit it stores.

use std::collections::VecDeque;

/// How a unit participates in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Metadata,
    VideoHeader,
    AudioHeader,
    /// Starts a new GOP
    KeyFrame,
    Frame,
}

/// A unit that can be stored in a [`GopCache`]
pub trait GopUnit: Clone {
    fn kind(&self) -> UnitKind;

    /// Size in bytes, counted against the cache limit
    fn size(&self) -> usize;
}

#[derive(Debug)]
struct Gop<T> {
    units: Vec<T>,
    size: usize,
}

/// Cache of the last `gop_num` GOPs plus headers
#[derive(Debug)]
pub struct GopCache<T> {
    /// Maximum number of complete GOPs retained
    gop_num: usize,
    /// Maximum buffered bytes across all GOPs
    max_size: usize,
    current_size: usize,
    metadata: Option<T>,
    video_header: Option<T>,
    audio_header: Option<T>,
    gops: VecDeque<Gop<T>>,
}

impl<T: GopUnit> GopCache<T> {
    /// Create a cache with a default max size (4MB)
    pub fn new(gop_num: usize) -> Self {
        Self::with_max_size(gop_num, 4 * 1024 * 1024)
    }

    pub fn with_max_size(gop_num: usize, max_size: usize) -> Self {
        Self {
            gop_num,
            max_size,
            current_size: 0,
            metadata: None,
            video_header: None,
            audio_header: None,
            gops: VecDeque::new(),
        }
    }

    /// Add a unit
    ///
    /// Returns false if the unit was not retained: a frame before the first
    /// keyframe, any frame when `gop_num` is 0, or a frame that cannot fit
    /// even after evicting older GOPs.
    pub fn push(&mut self, unit: T) -> bool {
        match unit.kind() {
            UnitKind::Metadata => self.metadata = Some(unit),
            UnitKind::VideoHeader => self.video_header = Some(unit),
            UnitKind::AudioHeader => self.audio_header = Some(unit),
            UnitKind::KeyFrame => {
                if self.gop_num == 0 {
                    return false;
                }
                self.gops.push_back(Gop {
                    units: Vec::new(),
                    size: 0,
                });
                while self.gops.len() > self.gop_num {
                    self.evict_oldest();
                }
                if !self.append(unit) {
                    // Drop the empty GOP so frames wait for the next keyframe
                    self.gops.pop_back();
                    return false;
                }
                return true;
            }
            UnitKind::Frame => {
                if self.gops.is_empty() {
                    return false;
                }
                return self.append(unit);
            }
        }
        true
    }

    fn append(&mut self, unit: T) -> bool {
        let size = unit.size();

        // Make room by dropping whole GOPs, never the one being written
        while self.current_size + size > self.max_size && self.gops.len() > 1 {
            self.evict_oldest();
        }
        if self.current_size + size > self.max_size {
            return false;
        }

        if let Some(gop) = self.gops.back_mut() {
            gop.units.push(unit);
            gop.size += size;
            self.current_size += size;
            true
        } else {
            false
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(old) = self.gops.pop_front() {
            self.current_size -= old.size;
        }
    }

    /// Clear everything including headers
    pub fn clear(&mut self) {
        self.gops.clear();
        self.current_size = 0;
        self.metadata = None;
        self.video_header = None;
        self.audio_header = None;
    }

    /// True when neither headers nor frames are cached
    pub fn is_empty(&self) -> bool {
        self.gops.is_empty()
            && self.metadata.is_none()
            && self.video_header.is_none()
            && self.audio_header.is_none()
    }

    pub fn metadata(&self) -> Option<&T> {
        self.metadata.as_ref()
    }

    pub fn video_header(&self) -> Option<&T> {
        self.video_header.as_ref()
    }

    pub fn audio_header(&self) -> Option<&T> {
        self.audio_header.as_ref()
    }

    /// Units for a joining subscriber: metadata, sequence headers, then GOPs
    pub fn catchup(&self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.frame_count() + 3);

        result.extend(self.metadata.iter().cloned());
        result.extend(self.video_header.iter().cloned());
        result.extend(self.audio_header.iter().cloned());
        for gop in &self.gops {
            result.extend(gop.units.iter().cloned());
        }

        result
    }

    pub fn gop_count(&self) -> usize {
        self.gops.len()
    }

    pub fn frame_count(&self) -> usize {
        self.gops.iter().map(|gop| gop.units.len()).sum()
    }

    /// Buffered frame bytes (headers excluded)
    pub fn size(&self) -> usize {
        self.current_size
    }
}
