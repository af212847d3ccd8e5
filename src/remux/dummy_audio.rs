//! Silent audio for video-only RTMP publishers
//!
//! Some players refuse to start an FLV stream without an audio track. The
//! filter holds back the first `wait_audio_ms` of media; if real audio shows up
//! in that window the cached media is replayed untouched, otherwise a silent
//! AAC track is generated and interleaved with the video from then on.

use std::sync::Weak;

use parking_lot::Mutex;

use crate::media::aac::{SILENT_AUDIO_SPECIFIC_CONFIG, SILENT_FRAME_LC_STEREO, SILENT_SAMPLE_RATE};
use crate::media::FlvTag;
use crate::session::RtmpMsgObserver;

const SILENT_SAMPLES_PER_FRAME: u64 = 1024;

/// Larger video gaps restart the silent clock instead of backfilling
const MAX_SILENT_GAP_MS: u64 = 1000;

/// Where the filter is in its decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    /// Caching, waiting for audio
    Analysis,
    /// Real audio seen; everything passes through
    Normal,
    /// No audio within the window; silent frames are generated
    Dummy,
}

struct FilterState {
    stage: FilterStage,
    cache: Vec<FlvTag>,
    first_video_ts: Option<u32>,
    silent_base_ts: u32,
    silent_frames: u64,
}

impl FilterState {
    /// Milliseconds from `silent_base_ts` to the next silent frame
    fn silent_offset(&self) -> u64 {
        self.silent_frames * SILENT_SAMPLES_PER_FRAME * 1000 / u64::from(SILENT_SAMPLE_RATE)
    }

    /// Dummy stage: silent frames up to `tag`'s timestamp, then `tag` itself
    fn emit_with_silence(&mut self, tag: FlvTag, out: &mut Vec<FlvTag>) {
        if tag.is_audio() {
            tracing::trace!(timestamp = tag.timestamp, "Dropping audio in dummy stage");
            return;
        }

        if tag.is_video() {
            let mut elapsed = u64::from(tag.timestamp.wrapping_sub(self.silent_base_ts));
            if elapsed > self.silent_offset() + MAX_SILENT_GAP_MS {
                tracing::debug!(
                    from = self.silent_base_ts,
                    to = tag.timestamp,
                    "Video timestamp jumped, restarting silent audio clock"
                );
                self.silent_base_ts = tag.timestamp;
                self.silent_frames = 0;
                elapsed = 0;
            }

            while self.silent_offset() <= elapsed {
                let timestamp = self.silent_base_ts.wrapping_add(self.silent_offset() as u32);
                out.push(FlvTag::aac_raw(timestamp, &SILENT_FRAME_LC_STEREO));
                self.silent_frames += 1;
            }
        }
        out.push(tag);
    }
}

/// Sits between an RTMP publisher and its group
pub struct DummyAudioFilter {
    unique_key: String,
    wait_audio_ms: u32,
    downstream: Weak<dyn RtmpMsgObserver>,
    state: Mutex<FilterState>,
}

impl DummyAudioFilter {
    pub fn new(
        unique_key: impl Into<String>,
        wait_audio_ms: u32,
        downstream: Weak<dyn RtmpMsgObserver>,
    ) -> Self {
        Self {
            unique_key: unique_key.into(),
            wait_audio_ms,
            downstream,
            state: Mutex::new(FilterState {
                stage: FilterStage::Analysis,
                cache: Vec::new(),
                first_video_ts: None,
                silent_base_ts: 0,
                silent_frames: 0,
            }),
        }
    }

    pub fn stage(&self) -> FilterStage {
        self.state.lock().stage
    }

    fn process(&self, tag: FlvTag) -> Vec<FlvTag> {
        let mut state = self.state.lock();
        let mut out = Vec::new();
        let stage = state.stage;

        match stage {
            FilterStage::Normal => out.push(tag),
            FilterStage::Dummy => state.emit_with_silence(tag, &mut out),
            FilterStage::Analysis if tag.is_audio() => {
                tracing::debug!(group = %self.unique_key, "Audio detected, dummy audio not needed");
                state.stage = FilterStage::Normal;
                out.append(&mut state.cache);
                out.push(tag);
            }
            FilterStage::Analysis => {
                let timestamp = tag.timestamp;
                let is_video = tag.is_video();
                state.cache.push(tag);

                if !is_video {
                    return out;
                }
                let first = *state.first_video_ts.get_or_insert(timestamp);
                if timestamp.wrapping_sub(first) < self.wait_audio_ms {
                    return out;
                }

                tracing::info!(
                    group = %self.unique_key,
                    wait_audio_ms = self.wait_audio_ms,
                    "No audio detected, adding dummy audio"
                );
                state.stage = FilterStage::Dummy;
                state.silent_base_ts = first;
                out.push(FlvTag::aac_sequence_header(first, &SILENT_AUDIO_SPECIFIC_CONFIG));
                for cached in std::mem::take(&mut state.cache) {
                    state.emit_with_silence(cached, &mut out);
                }
            }
        }

        out
    }
}

impl RtmpMsgObserver for DummyAudioFilter {
    fn on_read_rtmp_av_msg(&self, tag: FlvTag) {
        let out = self.process(tag);
        if out.is_empty() {
            return;
        }

        let Some(downstream) = self.downstream.upgrade() else {
            return;
        };
        for tag in out {
            downstream.on_read_rtmp_av_msg(tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<FlvTag>>);

    impl RtmpMsgObserver for Recorder {
        fn on_read_rtmp_av_msg(&self, tag: FlvTag) {
            self.0.lock().push(tag);
        }
    }

    fn setup(wait_audio_ms: u32) -> (Arc<Recorder>, DummyAudioFilter) {
        let recorder = Arc::new(Recorder::default());
        let downstream: Arc<dyn RtmpMsgObserver> = recorder.clone();
        let filter = DummyAudioFilter::new("GROUP1", wait_audio_ms, Arc::downgrade(&downstream));
        (recorder, filter)
    }

    fn video(ts: u32) -> FlvTag {
        FlvTag::avc_nalus(ts, ts == 0, 0, &[0, 0, 0, 1, 0x41])
    }

    #[test]
    fn test_real_audio_replays_cache() {
        let (recorder, filter) = setup(150);

        filter.on_read_rtmp_av_msg(FlvTag::script(0, Bytes::from_static(b"meta")));
        filter.on_read_rtmp_av_msg(video(0));
        filter.on_read_rtmp_av_msg(video(40));
        assert!(recorder.0.lock().is_empty());

        filter.on_read_rtmp_av_msg(FlvTag::aac_sequence_header(50, &[0x12, 0x10]));
        assert_eq!(filter.stage(), FilterStage::Normal);

        filter.on_read_rtmp_av_msg(video(80));

        let seen = recorder.0.lock();
        let timestamps: Vec<u32> = seen.iter().map(|t| t.timestamp).collect();
        assert_eq!(timestamps, vec![0, 0, 40, 50, 80]);
        assert!(seen[0].is_metadata());
    }

    #[test]
    fn test_video_only_gets_silent_track() {
        let (recorder, filter) = setup(100);

        for ts in [0, 40, 80] {
            filter.on_read_rtmp_av_msg(video(ts));
        }
        assert_eq!(filter.stage(), FilterStage::Analysis);

        filter.on_read_rtmp_av_msg(video(120));
        assert_eq!(filter.stage(), FilterStage::Dummy);

        let seen = recorder.0.lock();
        assert!(seen[0].is_aac_sequence_header());
        assert_eq!(&seen[0].data[2..], &SILENT_AUDIO_SPECIFIC_CONFIG);

        // silent frames every 1024/44100 s: 0, 23, 46, 69, 92, 116
        let audio: Vec<u32> = seen[1..]
            .iter()
            .filter(|t| t.is_audio())
            .map(|t| t.timestamp)
            .collect();
        assert_eq!(audio, vec![0, 23, 46, 69, 92, 116]);

        let mut last = 0;
        for tag in &seen[1..] {
            assert!(tag.timestamp >= last);
            last = tag.timestamp;
        }
        assert_eq!(seen.last().map(|t| t.timestamp), Some(120));
    }

    #[test]
    fn test_real_audio_dropped_in_dummy_stage() {
        let (recorder, filter) = setup(0);

        filter.on_read_rtmp_av_msg(video(0));
        assert_eq!(filter.stage(), FilterStage::Dummy);
        let before = recorder.0.lock().len();

        filter.on_read_rtmp_av_msg(FlvTag::aac_raw(10, &[0x21]));
        assert_eq!(recorder.0.lock().len(), before);
    }

    #[test]
    fn test_silent_clock_near_timestamp_wrap() {
        let (recorder, filter) = setup(0);

        filter.on_read_rtmp_av_msg(video(u32::MAX - 5));
        assert_eq!(filter.stage(), FilterStage::Dummy);

        let seen = recorder.0.lock();
        let timestamps: Vec<u32> = seen.iter().map(|t| t.timestamp).collect();
        assert_eq!(timestamps, vec![u32::MAX - 5; 3]);
        assert!(seen[1].is_audio());
        assert!(seen[2].is_video());
    }

    #[test]
    fn test_silent_clock_follows_wrapped_video() {
        let (recorder, filter) = setup(0);

        filter.on_read_rtmp_av_msg(video(u32::MAX - 5));
        filter.on_read_rtmp_av_msg(video(40));

        let seen = recorder.0.lock();
        let audio: Vec<u32> = seen
            .iter()
            .skip(1)
            .filter(|t| t.is_audio())
            .map(|t| t.timestamp)
            .collect();
        // 46 ms after the base lands on 40, past the wrap
        assert_eq!(audio, vec![u32::MAX - 5, 17, 40]);
        assert_eq!(seen.last().map(|t| t.timestamp), Some(40));
    }

    #[test]
    fn test_timestamp_jump_restarts_silent_clock() {
        let (recorder, filter) = setup(0);

        filter.on_read_rtmp_av_msg(video(0));
        let before = recorder.0.lock().len();

        filter.on_read_rtmp_av_msg(video(3_600_000));

        let seen = recorder.0.lock();
        let added: Vec<(bool, u32)> = seen[before..]
            .iter()
            .map(|t| (t.is_audio(), t.timestamp))
            .collect();
        assert_eq!(added, vec![(true, 3_600_000), (false, 3_600_000)]);
    }

    #[test]
    fn test_downstream_gone() {
        let downstream: Arc<dyn RtmpMsgObserver> = Arc::new(Recorder::default());
        let filter = DummyAudioFilter::new("GROUP1", 0, Arc::downgrade(&downstream));
        drop(downstream);

        filter.on_read_rtmp_av_msg(video(0));
        assert_eq!(filter.stage(), FilterStage::Dummy);
    }
}
