//! Video-only publisher walkthrough
//!
//! Feeds synthetic H.264 into a group with dummy audio and MPEG-TS output
//! enabled, then removes the publisher and prints what the group did.
//!
//! Run with:
//! ```sh
//! RUST_LOG=relay_group=debug cargo run --example video_only_publisher
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use relay_group::media::{FlvTag, TsFrame};
use relay_group::{
    ConsumerTriggers, GroupConfig, GroupHooks, GroupManager, MediaOutlets, RegistryConfig,
    RtmpMsgObserver, RtmpPubSession, Session, StaticDemand, StreamKey,
};

const AVC_RECORD: &[u8] = &[
    0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, 0x01, 0x00, 0x03, 0x68,
    0xEF, 0x38,
];

/// Logs every start/stop signal
struct LoggingTriggers;

impl ConsumerTriggers for LoggingTriggers {
    fn start_push_if_needed(&self, stream: &StreamKey) {
        println!("[{}] start push", stream);
    }
    fn stop_push_if_needed(&self, stream: &StreamKey) {
        println!("[{}] stop push", stream);
    }
    fn start_hls_if_needed(&self, stream: &StreamKey) {
        println!("[{}] start hls", stream);
    }
    fn stop_hls_if_needed(&self, stream: &StreamKey) {
        println!("[{}] stop hls", stream);
    }
    fn start_record_flv_if_needed(&self, stream: &StreamKey, now: i64) {
        println!("[{}] start flv record at {}", stream, now);
    }
    fn stop_record_flv_if_needed(&self, stream: &StreamKey) {
        println!("[{}] stop flv record", stream);
    }
    fn start_record_mpegts_if_needed(&self, stream: &StreamKey, now: i64) {
        println!("[{}] start mpegts record at {}", stream, now);
    }
    fn stop_record_mpegts_if_needed(&self, stream: &StreamKey) {
        println!("[{}] stop mpegts record", stream);
    }
}

/// Counts TS frames by kind
#[derive(Default)]
struct TsCounter {
    video: Mutex<usize>,
    audio: Mutex<usize>,
}

impl MediaOutlets for TsCounter {
    fn on_ts_frame(&self, _stream: &StreamKey, frame: &TsFrame) {
        if frame.is_video() {
            *self.video.lock() += 1;
        } else {
            *self.audio.lock() += 1;
        }
    }
}

/// Stand-in for an RTMP server session
struct DemoPublisher {
    observer: Mutex<Option<Arc<dyn RtmpMsgObserver>>>,
}

impl Session for DemoPublisher {
    fn unique_key(&self) -> &str {
        "RTMPPUBSUB1"
    }
}

impl RtmpPubSession for DemoPublisher {
    fn set_observer(&self, observer: Arc<dyn RtmpMsgObserver>) {
        *self.observer.lock() = Some(observer);
    }
}

impl DemoPublisher {
    fn send(&self, tag: FlvTag) {
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_read_rtmp_av_msg(tag);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_group=debug".parse()?),
        )
        .init();

    let counter = Arc::new(TsCounter::default());
    let hooks = GroupHooks::default()
        .with_demand(Arc::new(StaticDemand {
            rtsp: true,
            mpegts: true,
        }))
        .with_triggers(Arc::new(LoggingTriggers))
        .with_outlets(counter.clone());

    let manager = Arc::new(GroupManager::with_config(
        RegistryConfig::default(),
        GroupConfig::default().add_dummy_audio(150),
        hooks,
    ));
    let cleanup = manager.spawn_cleanup_task();

    let key = StreamKey::new("live", "test");
    let group = manager.get_or_create_group(&key).await;

    let publisher = Arc::new(DemoPublisher {
        observer: Mutex::new(None),
    });
    group.add_rtmp_pub_session(publisher.clone())?;

    // Two seconds of 25fps video, keyframe every second
    publisher.send(FlvTag::avc_sequence_header(0, AVC_RECORD));
    for i in 0..50u32 {
        let keyframe = i % 25 == 0;
        let nalu: &[u8] = if keyframe {
            &[0, 0, 0, 2, 0x65, 0x88]
        } else {
            &[0, 0, 0, 2, 0x41, 0x9A]
        };
        publisher.send(FlvTag::avc_nalus(i * 40, keyframe, 0, nalu));
    }

    println!("{}", serde_json::to_string_pretty(&group.stats())?);
    if let Some(sdp) = group.sdp() {
        println!("{}", sdp.raw);
    }

    let publisher: Arc<dyn RtmpPubSession> = publisher;
    group.del_rtmp_pub_session(&publisher);

    println!(
        "ts frames: video={} audio={}",
        counter.video.lock(),
        counter.audio.lock()
    );

    cleanup.abort();
    Ok(())
}
