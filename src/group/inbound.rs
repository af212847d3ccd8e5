//! Producer admission and removal

use std::sync::Arc;
use std::time::Instant;

use crate::error::GroupError;
use crate::remux::DummyAudioFilter;
use crate::session::{same_session, RtmpMsgObserver, RtmpPubSession, RtmpPullSession, RtspPubSession};

use super::intake::ProducerLink;
use super::slot::InSession;
use super::{Group, GroupState};

impl Group {
    /// Admit an RTMP publisher
    ///
    /// On success the session's observer is set to a link into the group
    /// bound to this admission, or to a dummy audio filter in front of that
    /// link when configured.
    pub fn add_rtmp_pub_session(
        self: &Arc<Self>,
        session: Arc<dyn RtmpPubSession>,
    ) -> Result<(), GroupError> {
        let _lifecycle = self.lifecycle.lock();
        tracing::debug!(
            group = %self.unique_key,
            session = session.unique_key(),
            "Add rtmp pub session into group"
        );

        let observer: Arc<dyn RtmpMsgObserver> = {
            let mut state = self.state.lock();
            self.check_slot_free(&state, session.unique_key())?;

            state.in_session = InSession::RtmpPub(Arc::clone(&session));
            let link: Arc<dyn RtmpMsgObserver> = self.add_in(&mut state);
            self.build_rtmp2rtsp_if_needed(&mut state);

            if self.config.add_dummy_audio_enable {
                let filter = Arc::new(DummyAudioFilter::new(
                    self.unique_key.clone(),
                    self.config.add_dummy_audio_wait_audio_ms,
                    Arc::downgrade(&link),
                ));
                state.dummy_audio = Some(Arc::clone(&filter));
                filter
            } else {
                link
            }
        };

        self.start_consumers();

        session.set_observer(observer);
        Ok(())
    }

    /// Admit an RTSP publisher; its media is always remuxed to RTMP
    pub fn add_rtsp_pub_session(
        self: &Arc<Self>,
        session: Arc<dyn RtspPubSession>,
    ) -> Result<(), GroupError> {
        let _lifecycle = self.lifecycle.lock();
        tracing::debug!(
            group = %self.unique_key,
            session = session.unique_key(),
            "Add rtsp pub session into group"
        );

        let link = {
            let mut state = self.state.lock();
            self.check_slot_free(&state, session.unique_key())?;

            state.in_session = InSession::RtspPub(Arc::clone(&session));
            let link = self.add_in(&mut state);
            state.rtsp2rtmp = Some(self.hooks.remux.av_packet_to_rtmp(&self.stream));
            link
        };

        self.start_consumers();

        session.set_observer(link);
        Ok(())
    }

    /// Admit an RTMP pull session
    ///
    /// Returns false if the group already has a producer. The pull proxy that
    /// owns the session routes its media to the group's own
    /// [`RtmpMsgObserver::on_read_rtmp_av_msg`].
    pub fn add_rtmp_pull_session(self: &Arc<Self>, session: Arc<dyn RtmpPullSession>) -> bool {
        let _lifecycle = self.lifecycle.lock();
        tracing::debug!(
            group = %self.unique_key,
            session = session.unique_key(),
            "Add rtmp pull session into group"
        );

        {
            let mut state = self.state.lock();
            if self.check_slot_free(&state, session.unique_key()).is_err() {
                return false;
            }

            state.in_session = InSession::RtmpPull(session);
            self.add_in(&mut state);
            self.build_rtmp2rtsp_if_needed(&mut state);
        }

        self.start_consumers();
        true
    }

    /// Remove an RTMP publisher; ignored unless it is the current producer
    pub fn del_rtmp_pub_session(&self, session: &Arc<dyn RtmpPubSession>) {
        let _lifecycle = self.lifecycle.lock();
        tracing::debug!(
            group = %self.unique_key,
            session = session.unique_key(),
            "Del rtmp pub session from group"
        );

        let matched = matches!(
            &self.state.lock().in_session,
            InSession::RtmpPub(current) if same_session(current, session)
        );
        if !matched {
            self.warn_mismatch(session.unique_key());
            return;
        }

        self.del_in();
    }

    /// Remove an RTSP publisher; ignored unless it is the current producer
    pub fn del_rtsp_pub_session(&self, session: &Arc<dyn RtspPubSession>) {
        let _lifecycle = self.lifecycle.lock();
        tracing::debug!(
            group = %self.unique_key,
            session = session.unique_key(),
            "Del rtsp pub session from group"
        );

        let matched = matches!(
            &self.state.lock().in_session,
            InSession::RtspPub(current) if same_session(current, session)
        );
        if !matched {
            self.warn_mismatch(session.unique_key());
            return;
        }

        self.del_in();
    }

    /// Remove an RTMP pull session
    ///
    /// Unlike the publisher variants there is no identity check: the pull
    /// proxy calls this when its pull ends, whatever the slot holds. The
    /// pulling flag is reset as well.
    pub fn del_rtmp_pull_session(&self, session: &Arc<dyn RtmpPullSession>) {
        let _lifecycle = self.lifecycle.lock();
        tracing::debug!(
            group = %self.unique_key,
            session = session.unique_key(),
            "Del rtmp pull session from group"
        );

        {
            let mut state = self.state.lock();
            let matched = matches!(
                &state.in_session,
                InSession::RtmpPull(current) if same_session(current, session)
            );
            if !matched {
                tracing::warn!(
                    group = %self.unique_key,
                    session = session.unique_key(),
                    current = ?state.in_session.unique_key(),
                    "Del rtmp pull session but slot holds another producer, removing anyway"
                );
            }
            state.pulling = false;
        }

        self.del_in();
    }

    fn check_slot_free(&self, state: &GroupState, incoming: &str) -> Result<(), GroupError> {
        let Some(existing) = state.in_session.unique_key() else {
            return Ok(());
        };

        tracing::error!(
            group = %self.unique_key,
            incoming,
            existing = %existing,
            "In stream already exists at group"
        );
        Err(GroupError::DuplicateProducer {
            stream: self.stream.clone(),
            incoming: incoming.to_owned(),
            existing,
        })
    }

    fn warn_mismatch(&self, session: &str) {
        tracing::warn!(
            group = %self.unique_key,
            session,
            current = ?self.state.lock().in_session.unique_key(),
            "Del session but not match"
        );
    }

    /// State half of admission; the slot is already set
    ///
    /// Returns the observer the new producer feeds.
    fn add_in(self: &Arc<Self>, state: &mut GroupState) -> Arc<ProducerLink> {
        state.idle_since = None;
        state.admission += 1;

        if self.hooks.demand.needs_mpegts_output(&self.stream) {
            state.rtmp2mpegts = Some(self.hooks.remux.rtmp_to_mpegts(&self.stream));
        }

        let link = Arc::new(ProducerLink::new(self, state.admission));
        state.link = Some(Arc::clone(&link));
        link
    }

    fn build_rtmp2rtsp_if_needed(&self, state: &mut GroupState) {
        if self.hooks.demand.needs_rtsp_output(&self.stream) {
            state.rtmp2rtsp = Some(self.hooks.remux.rtmp_to_rtsp(&self.stream));
        }
    }

    fn start_consumers(&self) {
        let now = chrono::Utc::now().timestamp();
        let triggers = &self.hooks.triggers;

        triggers.start_push_if_needed(&self.stream);
        triggers.start_hls_if_needed(&self.stream);
        triggers.start_record_flv_if_needed(&self.stream, now);
        triggers.start_record_mpegts_if_needed(&self.stream, now);
    }

    /// Flush, stop consumers, then reset to empty
    fn del_in(&self) {
        self.dispose_mpegts(&mut self.state.lock());

        let triggers = &self.hooks.triggers;
        triggers.stop_push_if_needed(&self.stream);
        triggers.stop_hls_if_needed(&self.stream);
        triggers.stop_record_flv_if_needed(&self.stream);
        triggers.stop_record_mpegts_if_needed(&self.stream);

        let mut state = self.state.lock();
        state.in_session = InSession::Empty;
        state.rtsp2rtmp = None;
        state.rtmp2rtsp = None;
        state.dummy_audio = None;
        state.link = None;
        state.caches.clear();
        state.idle_since = Some(Instant::now());

        tracing::info!(group = %self.unique_key, stream = %self.stream, "Group in session removed");
    }
}
