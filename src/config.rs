//! Runtime configuration.

use std::time::Duration;

/// Default pause between a match being decided and the advancement check.
pub const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(1200);

/// Default per-lobby mailbox depth.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Tunables for the lobby runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentConfig {
    /// How long the final result of a match stays on screen before the
    /// round controller may move on
    pub advance_delay: Duration,

    /// Bounded queue depth of each lobby actor
    pub mailbox_capacity: usize,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            advance_delay: DEFAULT_ADVANCE_DELAY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl TournamentConfig {
    /// Read `ROYALE_ADVANCE_DELAY_MS` and `ROYALE_MAILBOX_CAPACITY`, falling
    /// back to defaults for anything missing or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let advance_delay = read(&lookup, "ROYALE_ADVANCE_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.advance_delay);
        let mailbox_capacity = read(&lookup, "ROYALE_MAILBOX_CAPACITY")
            .map(|n| n as usize)
            .filter(|n| *n > 0)
            .unwrap_or(defaults.mailbox_capacity);

        Self {
            advance_delay,
            mailbox_capacity,
        }
    }

    pub fn with_advance_delay(mut self, delay: Duration) -> Self {
        self.advance_delay = delay;
        self
    }
}

fn read(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    lookup(key).and_then(|raw| raw.trim().parse::<u64>().ok())
}
