use std::sync::Arc;

use crate::session::{ProducerKind, RtmpPubSession, RtmpPullSession, RtspPubSession};

/// The group's single input slot
#[derive(Clone, Default)]
pub(crate) enum InSession {
    #[default]
    Empty,
    RtmpPub(Arc<dyn RtmpPubSession>),
    RtspPub(Arc<dyn RtspPubSession>),
    RtmpPull(Arc<dyn RtmpPullSession>),
}

impl InSession {
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, InSession::Empty)
    }

    pub(crate) fn kind(&self) -> Option<ProducerKind> {
        match self {
            InSession::Empty => None,
            InSession::RtmpPub(_) => Some(ProducerKind::RtmpPub),
            InSession::RtspPub(_) => Some(ProducerKind::RtspPub),
            InSession::RtmpPull(_) => Some(ProducerKind::RtmpPull),
        }
    }

    pub(crate) fn unique_key(&self) -> Option<String> {
        match self {
            InSession::Empty => None,
            InSession::RtmpPub(s) => Some(s.unique_key().to_owned()),
            InSession::RtspPub(s) => Some(s.unique_key().to_owned()),
            InSession::RtmpPull(s) => Some(s.unique_key().to_owned()),
        }
    }
}
