use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::error::GroupError;
use crate::media::sdp::{AUDIO_PAYLOAD_TYPE, VIDEO_PAYLOAD_TYPE};
use crate::media::{AudioTrack, AvPacket, AvPacketPt, RtpPacket, VideoTrack};
use crate::session::{
    RtmpMsgObserver, RtmpPubSession, RtmpPullSession, RtspPubObserver, RtspPubSession, Session,
};

const AVC_RECORD: &[u8] = &[
    0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, 0x01, 0x00, 0x03, 0x68,
    0xEF, 0x38,
];
const ASC: &[u8] = &[0x12, 0x10];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    StartPush,
    StopPush,
    StartHls,
    StopHls,
    StartRecordFlv(i64),
    StopRecordFlv,
    StartRecordMpegts(i64),
    StopRecordMpegts,
    RtmpMsg(u32),
    Sdp,
    RtpPacket,
    PatPmt,
    TsFrame(u64),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn count(&self, event: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events.lock().iter().position(pred)
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl ConsumerTriggers for Recorder {
    fn start_push_if_needed(&self, _stream: &StreamKey) {
        self.record(Event::StartPush);
    }
    fn stop_push_if_needed(&self, _stream: &StreamKey) {
        self.record(Event::StopPush);
    }
    fn start_hls_if_needed(&self, _stream: &StreamKey) {
        self.record(Event::StartHls);
    }
    fn stop_hls_if_needed(&self, _stream: &StreamKey) {
        self.record(Event::StopHls);
    }
    fn start_record_flv_if_needed(&self, _stream: &StreamKey, now: i64) {
        self.record(Event::StartRecordFlv(now));
    }
    fn stop_record_flv_if_needed(&self, _stream: &StreamKey) {
        self.record(Event::StopRecordFlv);
    }
    fn start_record_mpegts_if_needed(&self, _stream: &StreamKey, now: i64) {
        self.record(Event::StartRecordMpegts(now));
    }
    fn stop_record_mpegts_if_needed(&self, _stream: &StreamKey) {
        self.record(Event::StopRecordMpegts);
    }
}

impl MediaOutlets for Recorder {
    fn on_rtmp_msg(&self, _stream: &StreamKey, tag: &FlvTag) {
        self.record(Event::RtmpMsg(tag.timestamp));
    }
    fn on_sdp(&self, _stream: &StreamKey, _sdp: &SessionDescription) {
        self.record(Event::Sdp);
    }
    fn on_rtp_packet(&self, _stream: &StreamKey, _packet: &RtpPacket) {
        self.record(Event::RtpPacket);
    }
    fn on_pat_pmt(&self, _stream: &StreamKey, _pat_pmt: &PatPmt) {
        self.record(Event::PatPmt);
    }
    fn on_ts_frame(&self, _stream: &StreamKey, frame: &TsFrame) {
        self.record(Event::TsFrame(frame.pts));
    }
}

struct FakeRtmpPub {
    key: String,
    observer: Mutex<Option<Arc<dyn RtmpMsgObserver>>>,
}

impl FakeRtmpPub {
    fn new(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_owned(),
            observer: Mutex::new(None),
        })
    }

    fn observer(&self) -> Option<Arc<dyn RtmpMsgObserver>> {
        self.observer.lock().clone()
    }

    fn send(&self, tag: FlvTag) {
        if let Some(observer) = self.observer() {
            observer.on_read_rtmp_av_msg(tag);
        }
    }
}

impl Session for FakeRtmpPub {
    fn unique_key(&self) -> &str {
        &self.key
    }
}

impl RtmpPubSession for FakeRtmpPub {
    fn set_observer(&self, observer: Arc<dyn RtmpMsgObserver>) {
        *self.observer.lock() = Some(observer);
    }
}

struct FakeRtspPub {
    key: String,
    observer: Mutex<Option<Arc<dyn RtspPubObserver>>>,
}

impl FakeRtspPub {
    fn new(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_owned(),
            observer: Mutex::new(None),
        })
    }

    fn observer(&self) -> Arc<dyn RtspPubObserver> {
        self.observer.lock().clone().expect("observer set on admission")
    }
}

impl Session for FakeRtspPub {
    fn unique_key(&self) -> &str {
        &self.key
    }
}

impl RtspPubSession for FakeRtspPub {
    fn set_observer(&self, observer: Arc<dyn RtspPubObserver>) {
        *self.observer.lock() = Some(observer);
    }
}

struct FakePull(String);

impl Session for FakePull {
    fn unique_key(&self) -> &str {
        &self.0
    }
}

impl RtmpPullSession for FakePull {}

fn pull(key: &str) -> Arc<dyn RtmpPullSession> {
    Arc::new(FakePull(key.to_owned()))
}

struct Fixture {
    group: Arc<Group>,
    recorder: Arc<Recorder>,
}

fn fixture(config: GroupConfig, demand: StaticDemand) -> Fixture {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let hooks = GroupHooks::default()
        .with_demand(Arc::new(demand))
        .with_triggers(recorder.clone())
        .with_outlets(recorder.clone());
    let group = Group::new(StreamKey::new("live", "test"), config, hooks);
    Fixture { group, recorder }
}

fn mpegts_demand() -> StaticDemand {
    StaticDemand {
        rtsp: false,
        mpegts: true,
    }
}

fn send_av(session: &FakeRtmpPub) {
    session.send(FlvTag::script(0, Bytes::from_static(b"onMetaData")));
    session.send(FlvTag::avc_sequence_header(0, AVC_RECORD));
    session.send(FlvTag::aac_sequence_header(0, ASC));
    session.send(FlvTag::avc_nalus(0, true, 0, &[0, 0, 0, 2, 0x65, 0x88]));
    session.send(FlvTag::aac_raw(10, &[0x21, 0x00]));
    session.send(FlvTag::avc_nalus(40, false, 0, &[0, 0, 0, 1, 0x41]));
}

fn sdp() -> SessionDescription {
    SessionDescription::new(
        Some(VideoTrack {
            payload_type: VIDEO_PAYLOAD_TYPE,
            sps: Bytes::from_static(&[0x67, 0x42, 0x00, 0x1E]),
            pps: Bytes::from_static(&[0x68, 0xCE, 0x3C]),
        }),
        Some(AudioTrack {
            payload_type: AUDIO_PAYLOAD_TYPE,
            sample_rate: 48000,
            channels: 2,
            asc: Bytes::from_static(&[0x11, 0x90]),
        }),
    )
}

fn idr_packet(timestamp: u32) -> AvPacket {
    AvPacket {
        payload_type: AvPacketPt::Avc,
        timestamp,
        pts: timestamp,
        payload: Bytes::from_static(&[0, 0, 0, 2, 0x65, 0x11]),
    }
}

#[test]
fn test_only_one_producer_admitted() {
    let Fixture { group, .. } = fixture(GroupConfig::default(), StaticDemand::default());
    let first = FakeRtmpPub::new("RTMPPUBSUB1");

    assert_ok!(group.add_rtmp_pub_session(first.clone()));

    let err = assert_err!(group.add_rtmp_pub_session(FakeRtmpPub::new("RTMPPUBSUB2")));
    assert_eq!(
        err,
        GroupError::DuplicateProducer {
            stream: StreamKey::new("live", "test"),
            incoming: "RTMPPUBSUB2".into(),
            existing: "RTMPPUBSUB1".into(),
        }
    );
    assert_err!(group.add_rtsp_pub_session(FakeRtspPub::new("RTSPPUBSUB1")));
    assert!(!group.add_rtmp_pull_session(pull("RTMPPULL1")));

    let stats = group.stats();
    assert_eq!(stats.producer, Some(ProducerKind::RtmpPub));
    assert_eq!(stats.producer_key.as_deref(), Some("RTMPPUBSUB1"));
}

#[test]
fn test_rejected_admission_leaves_state_untouched() {
    let Fixture { group, recorder } = fixture(GroupConfig::default(), mpegts_demand());
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));
    send_av(&session);

    let before = group.stats();
    let events_before = recorder.events().len();

    let rejected = FakeRtmpPub::new("RTMPPUBSUB2");
    assert_err!(group.add_rtmp_pub_session(rejected.clone()));

    assert_eq!(group.stats(), before);
    assert_eq!(recorder.events().len(), events_before);
    assert!(rejected.observer().is_none());
}

#[test]
fn test_mismatched_removal_is_ignored() {
    let Fixture { group, recorder } = fixture(GroupConfig::default(), mpegts_demand());
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));
    send_av(&session);

    let before = group.stats();
    let catchup_before = group.rtmp_catchup();

    // same key, different session
    let stale: Arc<dyn RtmpPubSession> = FakeRtmpPub::new("RTMPPUBSUB1");
    group.del_rtmp_pub_session(&stale);
    let other_kind: Arc<dyn RtspPubSession> = FakeRtspPub::new("RTSPPUBSUB1");
    group.del_rtsp_pub_session(&other_kind);

    assert_eq!(group.stats(), before);
    assert_eq!(group.rtmp_catchup(), catchup_before);
    assert_eq!(recorder.count(&Event::StopPush), 0);
}

#[test]
fn test_buffered_ts_flushed_before_consumers_stop() {
    let Fixture { group, recorder } = fixture(GroupConfig::default(), mpegts_demand());
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));

    session.send(FlvTag::aac_sequence_header(0, ASC));
    for ts in [0, 23, 46, 69, 92] {
        session.send(FlvTag::aac_raw(ts, &[0x21, 0x00, 0x49]));
    }
    assert!(recorder.position(|e| matches!(e, Event::TsFrame(_))).is_none());

    let session: Arc<dyn RtmpPubSession> = session;
    group.del_rtmp_pub_session(&session);

    let events = recorder.events();
    let frames: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::TsFrame(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(frames.len(), 5);

    let first_stop = recorder.position(|e| *e == Event::StopPush).unwrap();
    assert!(frames.iter().all(|&i| i < first_stop));
    assert!(recorder.position(|e| *e == Event::PatPmt).unwrap() < frames[0]);
}

#[test]
fn test_removal_clears_caches() {
    let Fixture { group, .. } = fixture(
        GroupConfig::default(),
        StaticDemand {
            rtsp: true,
            mpegts: true,
        },
    );
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));
    send_av(&session);

    assert!(!group.rtmp_catchup().is_empty());
    assert!(!group.httpflv_catchup().is_empty());
    assert!(!group.httpts_catchup().is_empty());
    assert!(group.sdp().is_some());
    assert!(group.pat_pmt().is_some());

    let session: Arc<dyn RtmpPubSession> = session;
    group.del_rtmp_pub_session(&session);

    assert!(group.rtmp_catchup().is_empty());
    assert!(group.httpflv_catchup().is_empty());
    assert!(group.httpts_catchup().is_empty());
    assert!(group.sdp().is_none());
    assert!(group.pat_pmt().is_none());
    assert!(!group.has_in_session());
    assert!(group.idle_for().is_some());
}

#[test]
fn test_late_media_after_removal_is_dropped() {
    let Fixture { group, .. } = fixture(GroupConfig::default(), StaticDemand::default());
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));

    let as_dyn: Arc<dyn RtmpPubSession> = session.clone();
    group.del_rtmp_pub_session(&as_dyn);

    // the session still holds its link into the group
    send_av(&session);
    assert!(group.rtmp_catchup().is_empty());
}

#[test]
fn test_stale_publisher_cannot_feed_next_producer() {
    let Fixture { group, .. } = fixture(GroupConfig::default(), mpegts_demand());
    let first = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(first.clone()));
    let first_dyn: Arc<dyn RtmpPubSession> = first.clone();
    group.del_rtmp_pub_session(&first_dyn);

    let second = FakeRtmpPub::new("RTMPPUBSUB2");
    assert_ok!(group.add_rtmp_pub_session(second.clone()));

    // same slot kind, but the first link belongs to an earlier admission
    send_av(&first);
    assert!(group.rtmp_catchup().is_empty());
    assert!(group.httpts_catchup().is_empty());

    send_av(&second);
    assert!(!group.rtmp_catchup().is_empty());
}

#[test]
fn test_direct_feed_ignored_while_publisher_holds_slot() {
    let Fixture { group, .. } = fixture(GroupConfig::default(), StaticDemand::default());
    assert_ok!(group.add_rtmp_pub_session(FakeRtmpPub::new("RTMPPUBSUB1")));

    group.on_read_rtmp_av_msg(FlvTag::avc_sequence_header(0, AVC_RECORD));
    assert!(group.rtmp_catchup().is_empty());
}

#[test]
fn test_readmission_does_not_see_previous_producer() {
    let Fixture { group, .. } = fixture(GroupConfig::default(), mpegts_demand());
    let first = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(first.clone()));
    send_av(&first);
    let first: Arc<dyn RtmpPubSession> = first;
    group.del_rtmp_pub_session(&first);

    let second = FakeRtspPub::new("RTSPPUBSUB1");
    assert_ok!(group.add_rtsp_pub_session(second.clone()));
    assert!(group.rtmp_catchup().is_empty());
    assert!(group.pat_pmt().is_none());

    let observer = second.observer();
    observer.on_sdp(sdp());
    observer.on_av_packet(idr_packet(1000));

    let catchup = group.rtmp_catchup();
    assert!(catchup.iter().all(|tag| !tag.is_metadata()));
    assert!(catchup.iter().all(|tag| tag.timestamp == 0 || tag.timestamp == 1000));
    // sequence header rebuilt from the new SDP
    assert_eq!(&catchup[0].data[5..], &sdp_avc_record()[..]);

    let ts = group.httpts_catchup();
    assert_eq!(ts.len(), 1);
    assert_eq!(ts[0].dts, 1000 * 90);
}

fn sdp_avc_record() -> Vec<u8> {
    crate::media::AvcConfig::from_parameter_sets(
        Bytes::from_static(&[0x67, 0x42, 0x00, 0x1E]),
        Bytes::from_static(&[0x68, 0xCE, 0x3C]),
    )
    .unwrap()
    .raw
    .to_vec()
}

#[test]
fn test_dummy_audio_filter_is_interposed() {
    let Fixture { group, .. } = fixture(
        GroupConfig::default().add_dummy_audio(150),
        StaticDemand::default(),
    );
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));

    let observer = session.observer().unwrap();
    assert!(!std::ptr::addr_eq(Arc::as_ptr(&observer), Arc::as_ptr(&group)));
    assert!(group.stats().dummy_audio);

    // video only: the filter adds a silent track once the window passes
    session.send(FlvTag::avc_sequence_header(0, AVC_RECORD));
    for ts in (0..=200).step_by(40) {
        session.send(FlvTag::avc_nalus(ts, ts == 0, 0, &[0, 0, 0, 1, 0x65]));
    }
    let catchup = group.rtmp_catchup();
    assert!(catchup.iter().any(|tag| tag.is_aac_sequence_header()));
    assert!(catchup.iter().any(|tag| tag.is_audio() && !tag.is_aac_sequence_header()));
}

#[test]
fn test_publisher_feeds_group_without_dummy_audio() {
    let Fixture { group, .. } = fixture(GroupConfig::default(), StaticDemand::default());
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));

    assert!(!group.stats().dummy_audio);

    // no analysis window: the first keyframe is cached straight away
    session.send(FlvTag::avc_sequence_header(0, AVC_RECORD));
    session.send(FlvTag::avc_nalus(0, true, 0, &[0, 0, 0, 1, 0x65]));
    assert_eq!(group.rtmp_catchup().len(), 2);
}

#[test]
fn test_rtmp_pub_lifecycle_triggers() {
    let Fixture { group, recorder } = fixture(GroupConfig::default(), mpegts_demand());
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));

    assert!(group.stats().rtmp2mpegts);
    assert!(!group.stats().rtmp2rtsp);
    for event in [Event::StartPush, Event::StartHls] {
        assert_eq!(recorder.count(&event), 1);
    }
    let events = recorder.events();
    let flv_now = events.iter().find_map(|e| match e {
        Event::StartRecordFlv(now) => Some(*now),
        _ => None,
    });
    let ts_now = events.iter().find_map(|e| match e {
        Event::StartRecordMpegts(now) => Some(*now),
        _ => None,
    });
    assert!(flv_now.unwrap() > 0);
    assert_eq!(flv_now, ts_now);
    assert_eq!(
        &events[..4],
        &[
            Event::StartPush,
            Event::StartHls,
            Event::StartRecordFlv(flv_now.unwrap()),
            Event::StartRecordMpegts(flv_now.unwrap()),
        ]
    );

    let session: Arc<dyn RtmpPubSession> = session;
    group.del_rtmp_pub_session(&session);

    let events = recorder.events();
    assert_eq!(
        &events[4..],
        &[
            Event::StopPush,
            Event::StopHls,
            Event::StopRecordFlv,
            Event::StopRecordMpegts,
        ]
    );
    assert!(!group.stats().rtmp2mpegts);
    assert!(!group.has_in_session());
}

#[test]
fn test_rtsp_pub_always_remuxes_to_rtmp() {
    let Fixture { group, recorder } = fixture(GroupConfig::default(), StaticDemand::default());
    let session = FakeRtspPub::new("RTSPPUBSUB1");
    assert_ok!(group.add_rtsp_pub_session(session.clone()));

    let stats = group.stats();
    assert!(stats.rtsp2rtmp);
    assert!(!stats.rtmp2rtsp);
    assert!(!stats.rtmp2mpegts);

    let observer = session.observer();
    observer.on_sdp(sdp());
    observer.on_rtp_packet(RtpPacket {
        payload_type: VIDEO_PAYLOAD_TYPE,
        marker: true,
        sequence: 1,
        timestamp: 0,
        ssrc: 1,
        payload: Bytes::from_static(&[0x65]),
    });
    observer.on_av_packet(idr_packet(0));

    assert!(group.sdp().is_some());
    assert_eq!(recorder.count(&Event::Sdp), 1);
    assert_eq!(recorder.count(&Event::RtpPacket), 1);

    let catchup = group.rtmp_catchup();
    assert_eq!(catchup.len(), 3);
    assert!(catchup[0].is_avc_sequence_header());
    assert!(catchup[1].is_aac_sequence_header());
    assert!(catchup[2].is_keyframe());

    let session: Arc<dyn RtspPubSession> = session;
    group.del_rtsp_pub_session(&session);
    assert!(!group.stats().rtsp2rtmp);
}

#[test]
fn test_rtsp_pub_remux_ignores_rtsp_demand() {
    let Fixture { group, .. } = fixture(
        GroupConfig::default(),
        StaticDemand {
            rtsp: true,
            mpegts: true,
        },
    );
    let session = FakeRtspPub::new("RTSPPUBSUB1");
    assert_ok!(group.add_rtsp_pub_session(session.clone()));

    let stats = group.stats();
    assert!(stats.rtsp2rtmp);
    assert!(!stats.rtmp2rtsp);
    assert!(stats.rtmp2mpegts);

    let observer = session.observer();
    observer.on_sdp(sdp());
    observer.on_av_packet(idr_packet(0));
    assert_eq!(group.rtmp_catchup().len(), 3);
    assert_eq!(group.httpts_catchup().len(), 1);
}

#[test]
fn test_rtmp_to_rtsp_built_on_demand() {
    let Fixture { group, recorder } = fixture(
        GroupConfig::default(),
        StaticDemand {
            rtsp: true,
            mpegts: false,
        },
    );
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session.clone()));
    assert!(group.stats().rtmp2rtsp);

    send_av(&session);

    let sdp = group.sdp().unwrap();
    assert!(sdp.video.is_some());
    assert!(sdp.audio.is_some());
    assert!(recorder.count(&Event::RtpPacket) >= 3);
}

#[test]
fn test_pull_removal_is_unconditional() {
    let Fixture { group, recorder } = fixture(
        GroupConfig::default(),
        StaticDemand {
            rtsp: true,
            mpegts: false,
        },
    );
    group.set_pulling_flag(true);
    assert!(group.add_rtmp_pull_session(pull("RTMPPULL1")));
    assert!(group.stats().rtmp2rtsp);
    assert_eq!(group.in_session_kind(), Some(ProducerKind::RtmpPull));

    group.on_read_rtmp_av_msg(FlvTag::avc_sequence_header(0, AVC_RECORD));
    assert!(!group.rtmp_catchup().is_empty());

    group.del_rtmp_pull_session(&pull("RTMPPULL2"));

    assert!(!group.is_pulling());
    assert!(!group.has_in_session());
    assert!(group.rtmp_catchup().is_empty());
    assert_eq!(recorder.count(&Event::StopPush), 1);
}

#[test]
fn test_pull_removal_evicts_publisher() {
    let Fixture { group, .. } = fixture(GroupConfig::default(), StaticDemand::default());
    let session = FakeRtmpPub::new("RTMPPUBSUB1");
    assert_ok!(group.add_rtmp_pub_session(session));

    group.del_rtmp_pull_session(&pull("RTMPPULL1"));
    assert!(!group.has_in_session());
}

#[test]
fn test_concurrent_admission_admits_one() {
    let Fixture { group, recorder } = fixture(GroupConfig::default(), mpegts_demand());

    let admitted: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let group = &group;
                scope.spawn(move || group.add_rtmp_pull_session(pull(&format!("RTMPPULL{i}"))))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum()
    });

    assert_eq!(admitted, 1);
    assert_eq!(recorder.count(&Event::StartPush), 1);
}

#[test]
fn test_stats_serialize() {
    let Fixture { group, .. } = fixture(GroupConfig::default(), StaticDemand::default());
    assert!(group.add_rtmp_pull_session(pull("RTMPPULL1")));

    let value = serde_json::to_value(group.stats()).unwrap();
    assert_eq!(value["producer"], "rtmp-pull");
    assert_eq!(value["producer_key"], "RTMPPULL1");
    assert_eq!(value["stream"]["app"], "live");
}
