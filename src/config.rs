use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Core-owned tunables. Connection configuration belongs to the storage
/// collaborators and is deliberately not represented here.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Bounded window size for live message subscriptions.
    pub message_window: usize,
    /// Maximum accepted length of a message body, in characters.
    pub max_message_len: usize,
    /// Entry cap for the profile read-through cache.
    pub profile_cache_capacity: usize,
    /// Time-to-live for cached profiles.
    pub profile_cache_ttl: Duration,
    /// How often an unread aggregator re-syncs its room set from `chatIds`.
    pub unread_resync_interval: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            message_window: 50,
            max_message_len: 4000,
            profile_cache_capacity: 1024,
            profile_cache_ttl: Duration::from_secs(300),
            unread_resync_interval: Duration::from_secs(30),
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();
        Self {
            message_window: env_usize("CHAT_MESSAGE_WINDOW", defaults.message_window),
            max_message_len: env_usize("CHAT_MAX_MESSAGE_LEN", defaults.max_message_len),
            profile_cache_capacity: env_usize(
                "CHAT_PROFILE_CACHE_CAPACITY",
                defaults.profile_cache_capacity,
            ),
            profile_cache_ttl: Duration::from_secs(env_u64(
                "CHAT_PROFILE_CACHE_TTL_SECS",
                defaults.profile_cache_ttl.as_secs(),
            )),
            unread_resync_interval: Duration::from_secs(env_u64(
                "CHAT_UNREAD_RESYNC_SECS",
                defaults.unread_resync_interval.as_secs(),
            )),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
