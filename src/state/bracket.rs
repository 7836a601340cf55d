//! Bracket pairing.
//!
//! Each round the survivors are shuffled and paired off in order. With an odd
//! number of survivors the last one after shuffling sits the round out.

use rand::seq::SliceRandom;
use rand::Rng;

use super::game::Match;
use super::player::ChannelId;

/// One round's pairing.
#[derive(Debug, Clone)]
pub struct Bracket {
    pub matches: Vec<Match>,
    /// Survivor advanced without playing
    pub bye: Option<ChannelId>,
}

/// Pair `survivors` into matches for `round`.
///
/// The shuffle is a Fisher-Yates permutation drawn from `rng`, so every
/// ordering is equally likely. Pass a seeded RNG for a reproducible bracket.
pub fn pair<R: Rng + ?Sized>(mut survivors: Vec<ChannelId>, round: u32, rng: &mut R) -> Bracket {
    survivors.shuffle(rng);

    let bye = if survivors.len() % 2 == 1 {
        survivors.pop()
    } else {
        None
    };

    let matches = survivors
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| Match::new(round, i + 1, pair[0], pair[1]))
        .collect();

    Bracket { matches, bye }
}
