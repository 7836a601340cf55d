//! Tournament participants.
//!
//! A player is created when a channel successfully joins a lobby and lives
//! until the lobby is dropped. Elimination and disconnection are one-way:
//! nothing in the tournament ever revives a player.

/// Opaque transport channel identifier.
///
/// The transport assigns one per connected participant (or host). Within a
/// lobby it doubles as the player's identity.
pub type ChannelId = u64;

/// Maximum display name length, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// A participant in one lobby.
#[derive(Debug, Clone)]
pub struct Player {
    /// Channel the player joined from
    pub id: ChannelId,

    /// Display name, unique within the lobby (case-insensitive)
    pub name: String,

    /// Whether the player has been knocked out
    pub eliminated: bool,

    /// Cleared on disconnect; never set again
    pub connected: bool,
}

impl Player {
    pub fn new(id: ChannelId, name: String) -> Self {
        Self {
            id,
            name,
            eliminated: false,
            connected: true,
        }
    }

    /// Check if the player can still be paired.
    pub fn is_active(&self) -> bool {
        !self.eliminated
    }

    pub fn eliminate(&mut self) {
        self.eliminated = true;
    }

    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    /// Case-insensitive name comparison.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Normalize a requested display name.
///
/// Surrounding whitespace is trimmed and the result truncated to
/// [`MAX_NAME_LEN`] characters. Returns `None` when nothing is left.
pub fn normalize_name(raw: &str) -> Option<String> {
    let name: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    // Truncation can leave trailing whitespace from the middle of the input.
    let name = name.trim_end();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
