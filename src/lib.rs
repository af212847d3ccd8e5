//! Per-stream group hub for a live media relay
//!
//! A [`Group`] admits a single producer for a stream (RTMP publish, RTSP
//! publish, or an RTMP pull), converts its media into the other
//! representations consumers need, keeps fast-join caches, and starts/stops
//! relay push, HLS and recording together with the producer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay_group::{GroupConfig, GroupHooks, GroupManager, RegistryConfig, StaticDemand, StreamKey};
//!
//! # async fn run() {
//! let hooks = GroupHooks::default().with_demand(Arc::new(StaticDemand {
//!     rtsp: true,
//!     mpegts: true,
//! }));
//! let manager = Arc::new(GroupManager::with_config(
//!     RegistryConfig::default(),
//!     GroupConfig::default().add_dummy_audio(150),
//!     hooks,
//! ));
//! let _cleanup = manager.spawn_cleanup_task();
//!
//! let group = manager.get_or_create_group(&StreamKey::new("live", "cam1")).await;
//! assert!(!group.has_in_session());
//! # }
//! ```

pub mod config;
pub mod error;
pub mod group;
pub mod media;
pub mod registry;
pub mod remux;
pub mod session;

pub use config::GroupConfig;
pub use error::{Error, GroupError, MediaError, Result};
pub use group::{
    ConsumerDemand, ConsumerTriggers, Group, GroupHooks, GroupStats, MediaOutlets, StaticDemand,
};
pub use registry::{GroupManager, RegistryConfig, StreamKey};
pub use session::{
    ProducerKind, RtmpMsgObserver, RtmpPubSession, RtmpPullSession, RtspPubObserver,
    RtspPubSession, Session,
};
