//! Bot tournament driver.
//!
//! Creates one lobby, fills it with bots that pick random moves, starts it
//! and prints the bracket outcome. Run with `--log-level debug` to watch
//! the round controller.

use std::time::Duration;

use anyhow::{ensure, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use royale_state::{ChannelId, Hub, Move, Notification, Phase, TournamentConfig};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, Level};

const HOST: ChannelId = 0;

#[derive(Parser, Debug)]
#[command(about = "Run a rock-paper-scissors tournament between bots")]
struct Args {
    /// Number of bot players
    #[arg(long, default_value_t = 8)]
    players: u64,

    /// Seed for codes, brackets and bot moves
    #[arg(long)]
    seed: Option<u64>,

    /// Delay before the next round starts, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Log verbosity
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    ensure!(args.players >= 2, "a tournament needs at least two players");

    let mut config = TournamentConfig::from_env();
    if let Some(ms) = args.delay_ms {
        config = config.with_advance_delay(Duration::from_millis(ms));
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (outbound, mut inbox) = mpsc::unbounded_channel();
    let hub = Hub::with_rng(config, outbound, StdRng::seed_from_u64(rng.gen()));

    let code = hub.create_lobby(HOST).context("creating lobby")?;
    info!(%code, players = args.players, "lobby created");

    for id in 1..=args.players {
        hub.join(id, &code, &format!("Bot{id}"))
            .await
            .with_context(|| format!("bot {id} joining {code}"))?;
    }
    hub.start(HOST, &code).await.context("starting tournament")?;

    while let Some(message) = inbox.recv().await {
        trace!(to = message.to, payload = %message.to_json(), "outbound");
        match message.notification {
            Notification::Status(view) => {
                let Some(current) = view.current_match else {
                    continue;
                };
                if current.you_locked {
                    continue;
                }
                let choice = Move::ALL.choose(&mut rng).copied().unwrap_or(Move::Rock);
                // Statuses can be stale by the time they are read; a rejected
                // move is harmless.
                if let Err(err) = hub.submit_move(message.to, &code, choice.as_str()).await {
                    debug!(bot = message.to, %err, "move rejected");
                }
            }
            Notification::RoundResult(result) => {
                debug!(
                    bot = message.to,
                    mine = %result.your_move,
                    theirs = %result.opponent_move,
                    score = ?(result.your_score, result.opponent_score),
                    "exchange"
                );
            }
            Notification::Message(text) => info!(bot = message.to, "{text}"),
            Notification::LobbyState(view) if view.phase == Phase::Finished => {
                println!(
                    "champion after {} rounds: {}",
                    view.round,
                    view.champion.as_deref().unwrap_or("nobody")
                );
                for player in &view.players {
                    let standing = if player.eliminated {
                        "eliminated"
                    } else {
                        "champion"
                    };
                    println!("  {:<20} {standing}", player.name);
                }
                break;
            }
            _ => {}
        }
    }

    hub.disconnect(HOST).await;
    Ok(())
}
