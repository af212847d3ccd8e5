//! Producer sessions as seen by a group
//!
//! The wire-protocol sessions live in the transport layer. A group only needs
//! to identify them, compare them by identity, and hand them a media
//! observer bound to their admission.

mod observer;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use observer::{RtmpMsgObserver, RtspPubObserver};

/// Common surface of every session the group can hold
pub trait Session: Send + Sync {
    /// Unique key used in logs, e.g. `RTMPPUBSUB1`
    fn unique_key(&self) -> &str;
}

/// An RTMP publisher
pub trait RtmpPubSession: Session {
    /// Route the session's audio/video/data messages to `observer`
    fn set_observer(&self, observer: Arc<dyn RtmpMsgObserver>);
}

/// An RTSP publisher
pub trait RtspPubSession: Session {
    /// Route the session's SDP, RTP packets and reassembled packets to `observer`
    fn set_observer(&self, observer: Arc<dyn RtspPubObserver>);
}

/// An RTMP session pulling the stream from a remote origin
///
/// The pull proxy that owns it wires its media to the group.
pub trait RtmpPullSession: Session {}

/// Which kind of session occupies a group's input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProducerKind {
    RtmpPub,
    RtspPub,
    RtmpPull,
}

impl fmt::Display for ProducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerKind::RtmpPub => write!(f, "rtmp-pub"),
            ProducerKind::RtspPub => write!(f, "rtsp-pub"),
            ProducerKind::RtmpPull => write!(f, "rtmp-pull"),
        }
    }
}

/// Identity comparison of two session handles, ignoring vtables
pub fn same_session<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
