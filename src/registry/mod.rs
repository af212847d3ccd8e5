//! Group registry
//!
//! One [`Group`](crate::group::Group) per stream key, shared by every session
//! that publishes, pulls, or plays that stream.
//!
//! ```text
//!                       Arc<GroupManager>
//!                 ┌──────────────────────────┐
//!                 │ groups: HashMap<Key,     │
//!                 │   Arc<Group>             │
//!                 │ >                        │
//!                 └────────────┬─────────────┘
//!                              │ get_or_create_group()
//!         ┌────────────────────┼────────────────────┐
//!         ▼                    ▼                    ▼
//!   [RTMP publisher]    [RTSP publisher]     [pull proxy]
//!   add_rtmp_pub_*      add_rtsp_pub_*       add_rtmp_pull_*
//! ```
//!
//! Groups without a producer are dropped by the cleanup task once they have
//! been idle for `idle_group_timeout`.

pub mod config;
pub mod key;
pub mod store;

pub use config::RegistryConfig;
pub use key::StreamKey;
pub use store::GroupManager;
