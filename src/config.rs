//! Group configuration

use serde::Deserialize;

/// Per-group configuration
///
/// Every group created by a [`GroupManager`](crate::registry::GroupManager)
/// shares one copy of this.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Interpose the dummy audio filter in front of RTMP publishers
    pub add_dummy_audio_enable: bool,

    /// How much video (by timestamp) the filter waits for real audio
    pub add_dummy_audio_wait_audio_ms: u32,

    /// GOPs kept for RTMP subscribers (0 = headers only)
    pub rtmp_gop_num: usize,

    /// GOPs kept for HTTP-FLV subscribers (0 = headers only)
    pub httpflv_gop_num: usize,

    /// GOPs kept for HTTP-TS subscribers (0 = nothing)
    pub httpts_gop_num: usize,

    /// Upper bound in bytes for each gop cache
    pub gop_cache_max_size: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            add_dummy_audio_enable: false,
            add_dummy_audio_wait_audio_ms: 150,
            rtmp_gop_num: 1,
            httpflv_gop_num: 1,
            httpts_gop_num: 1,
            gop_cache_max_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

impl GroupConfig {
    /// Enable the dummy audio filter with the given wait window
    pub fn add_dummy_audio(mut self, wait_audio_ms: u32) -> Self {
        self.add_dummy_audio_enable = true;
        self.add_dummy_audio_wait_audio_ms = wait_audio_ms;
        self
    }

    /// Set the GOP count for all three caches
    pub fn gop_num(mut self, num: usize) -> Self {
        self.rtmp_gop_num = num;
        self.httpflv_gop_num = num;
        self.httpts_gop_num = num;
        self
    }

    /// Set the byte limit for each gop cache
    pub fn gop_cache_max_size(mut self, size: usize) -> Self {
        self.gop_cache_max_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GroupConfig::default();

        assert!(!config.add_dummy_audio_enable);
        assert_eq!(config.add_dummy_audio_wait_audio_ms, 150);
        assert_eq!(config.rtmp_gop_num, 1);
        assert_eq!(config.gop_cache_max_size, 4 * 1024 * 1024);
    }

    #[test]
    fn test_builder_chaining() {
        let config = GroupConfig::default()
            .add_dummy_audio(300)
            .gop_num(2)
            .gop_cache_max_size(1024);

        assert!(config.add_dummy_audio_enable);
        assert_eq!(config.add_dummy_audio_wait_audio_ms, 300);
        assert_eq!(config.rtmp_gop_num, 2);
        assert_eq!(config.httpflv_gop_num, 2);
        assert_eq!(config.httpts_gop_num, 2);
        assert_eq!(config.gop_cache_max_size, 1024);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: GroupConfig =
            serde_json::from_str(r#"{"add_dummy_audio_enable": true, "httpts_gop_num": 0}"#)
                .unwrap();

        assert!(config.add_dummy_audio_enable);
        assert_eq!(config.add_dummy_audio_wait_audio_ms, 150);
        assert_eq!(config.httpts_gop_num, 0);
        assert_eq!(config.rtmp_gop_num, 1);
    }
}
