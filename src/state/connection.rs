//! Channel membership tracking.
//!
//! The transport only reports that a channel went away. This table remembers
//! which lobby each channel belongs to, and in what role, so a disconnect can
//! be routed to the right lobby.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::lobby::canonical_code;
use super::player::ChannelId;

/// What a channel is to its lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Created the lobby; leaving closes it
    Host,
    /// Joined as a contestant
    Player,
}

/// A channel's membership in one lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Upper-case lobby code
    pub code: String,

    pub role: Role,
}

impl Membership {
    pub fn new(code: &str, role: Role) -> Self {
        Self {
            code: canonical_code(code),
            role,
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }
}

/// Connection manager - channel to lobby membership.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    members: HashMap<ChannelId, Membership>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a membership. A channel belongs to one lobby at a time, so an
    /// existing membership is returned and left in place.
    pub fn add(&mut self, channel: ChannelId, membership: Membership) -> Result<(), &Membership> {
        match self.members.entry(channel) {
            Entry::Occupied(entry) => Err(&*entry.into_mut()),
            Entry::Vacant(entry) => {
                entry.insert(membership);
                Ok(())
            }
        }
    }

    pub fn get(&self, channel: ChannelId) -> Option<&Membership> {
        self.members.get(&channel)
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.members.contains_key(&channel)
    }

    /// Forget a channel, returning what it was a member of.
    pub fn remove(&mut self, channel: ChannelId) -> Option<Membership> {
        self.members.remove(&channel)
    }

    /// Forget every channel in lobby `code`. Returns the channels removed.
    pub fn remove_lobby(&mut self, code: &str) -> Vec<ChannelId> {
        let code = canonical_code(code);
        let gone: Vec<ChannelId> = self
            .members
            .iter()
            .filter(|(_, m)| m.code == code)
            .map(|(id, _)| *id)
            .collect();

        for id in &gone {
            self.members.remove(id);
        }

        gone
    }
}
