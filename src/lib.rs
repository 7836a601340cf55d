//! Royale State Library
//!
//! Lobby and bracket orchestration for short single-elimination
//! rock-paper-scissors tournaments.
//!
//! # Overview
//!
//! - **Lobbies** - A host creates a lobby with a five-character code, players
//!   join under a display name, and the host starts the tournament.
//!
//! - **Brackets** - Each round the survivors are shuffled and paired. An odd
//!   survivor gets a bye.
//!
//! - **Matches** - Best of three. Both contestants lock a move, the exchange is
//!   resolved, and the first to two wins eliminates the other.
//!
//! - **Round controller** - The last match of a round to finish triggers the
//!   next round (after a short presentation delay) or crowns the champion.
//!
//! - **Runtime** - One actor task per lobby serializes everything that happens
//!   to it; lobbies never share state.
//!
//! # Design Principles
//!
//! 1. **State is synchronous** - `state` has no async and no transport. Every
//!    operation returns its validation result and queues notifications in an
//!    [`state::Outbox`].
//!
//! 2. **One owner per lobby** - The `runtime` hands each lobby to its own
//!    actor; actions reach it through a mailbox.
//!
//! 3. **Serialization-ready** - Every notification serializes to JSON for
//!    clients.
//!
//! # Example
//!
//! ```rust
//! use royale_state::state::{LobbyRegistry, Notification, Outbox, Phase};
//!
//! let mut registry: LobbyRegistry = LobbyRegistry::new();
//! let mut out = Outbox::new();
//!
//! // Channel 1 hosts, channels 2 and 3 play
//! let code = registry.create(1, &mut out);
//! let lobby = registry.get_mut(&code).unwrap();
//! lobby.join(2, "Ann", &mut out).unwrap();
//! lobby.join(3, "Bob", &mut out).unwrap();
//! lobby.start(1, &mut out).unwrap();
//! assert_eq!(lobby.phase(), Phase::InProgress);
//!
//! lobby.submit_move(2, "rock", &mut out).unwrap();
//! lobby.submit_move(3, "scissors", &mut out).unwrap();
//! assert!(out
//!     .for_channel(2)
//!     .any(|n| matches!(n, Notification::RoundResult(r) if r.your_score == 1)));
//! ```

pub mod config;
pub mod runtime;
pub mod state;

pub use config::TournamentConfig;
pub use runtime::Hub;
// Re-export everything from state module at crate root
pub use state::*;
