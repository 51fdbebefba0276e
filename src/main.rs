//! DERBY — horse race betting game
//!
//! Terminal driver. Loads configuration, initialises structured logging,
//! and runs a command loop on stdin. Races are driven by a fixed-rate
//! timer that feeds ticks into the game core, with a short pause on the
//! result before the track resets.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use derby::config::{self, DisplayConfig};
use derby::types::{DerbyError, HorseNumber, SpeedPolicy};
use derby::{GameEvent, GameObserver, GameState};

const BANNER: &str = r#"
 ____  _____ ____  ______   __
|  _ \| ____|  _ \| __ ) \ / /
| | | |  _| | |_) |  _ \\ V /
| |_| | |___|  _ <| |_) || |
|____/|_____|_| \_\____/ |_|

  Place your bet. Watch them run.
"#;

const HELP: &str = "\
commands:
  bet <horse> <amount>   bet on a horse and run the race
  deposit <amount>       add funds
  undo | redo            revert or re-apply the last bet/balance change
  policy <name>          emergent | predetermined
  balance | stats | history | help | quit";

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Bet { horse: HorseNumber, amount: Decimal },
    Deposit(Decimal),
    Undo,
    Redo,
    Policy(SpeedPolicy),
    Balance,
    Stats,
    History,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let command = match parts.as_slice() {
        ["bet", horse, amount] => Command::Bet {
            horse: horse.parse().with_context(|| format!("Not a horse number: {horse}"))?,
            amount: parse_amount(amount)?,
        },
        ["deposit", amount] => Command::Deposit(parse_amount(amount)?),
        ["undo"] => Command::Undo,
        ["redo"] => Command::Redo,
        ["policy", name] => Command::Policy(name.parse()?),
        ["balance"] => Command::Balance,
        ["stats"] => Command::Stats,
        ["history"] => Command::History,
        ["help"] | ["?"] => Command::Help,
        ["quit"] | ["exit"] => Command::Quit,
        _ => anyhow::bail!("Unknown command: {line} (try `help`)"),
    };
    Ok(command)
}

fn parse_amount(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim_start_matches('$')).with_context(|| format!("Not an amount: {s}"))
}

// ---------------------------------------------------------------------------
// Console presentation
// ---------------------------------------------------------------------------

/// Renders game events to stdout.
struct ConsoleObserver {
    track_length: f64,
    /// Draw the track every this many ticks.
    frame_every: u64,
}

impl ConsoleObserver {
    fn new(display: &DisplayConfig) -> Self {
        Self {
            track_length: display.track_length,
            frame_every: u64::from((display.tick_rate_hz / 2).max(1)),
        }
    }

    fn draw_track(&self, positions: &[(HorseNumber, f64)]) {
        const WIDTH: usize = 50;
        for (number, position) in positions {
            let progress = (position / self.track_length).clamp(0.0, 1.0);
            let filled = (progress * WIDTH as f64) as usize;
            println!("  #{number} |{}>{}|", "=".repeat(filled), " ".repeat(WIDTH - filled));
        }
        println!();
    }
}

impl GameObserver for ConsoleObserver {
    fn on_event(&mut self, event: &GameEvent) {
        match event {
            GameEvent::BetPlaced(bet) => println!("✓ Bet placed: {bet}"),
            GameEvent::BetCleared(bet) => println!("✗ Bet withdrawn: {bet}"),
            GameEvent::RaceStarted { policy, .. } => println!("🏇 And they're off! ({policy})"),
            GameEvent::Ticked { tick, positions } => {
                if tick % self.frame_every == 0 {
                    self.draw_track(positions);
                }
            }
            GameEvent::WinnerDecided { winner, .. } => println!("🏁 Horse #{winner} crosses the line!"),
            GameEvent::Settled(s) => {
                if s.player_won {
                    println!("🎉 You win ${:.2}!", s.payout);
                } else {
                    println!("💸 You lose ${:.2}.", s.payout);
                }
            }
            GameEvent::BalanceChanged { after, .. } => println!("💰 Balance: ${after:.2}"),
            GameEvent::RaceReset { cancelled: true } => println!("Race cancelled."),
            GameEvent::RaceReset { cancelled: false } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("DERBY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load_or_default(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        horses = cfg.game.horse_count,
        balance = cfg.game.starting_balance,
        policy = %cfg.race.policy,
        tick_rate_hz = cfg.display.tick_rate_hz,
        "DERBY starting up"
    );

    let mut game = GameState::new(&cfg)?;
    game.subscribe(Box::new(ConsoleObserver::new(&cfg.display)));

    println!("{HELP}");
    println!("💰 Balance: ${:.2}", game.balance());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(line.trim()) {
            Ok(c) => c,
            Err(e) => {
                println!("✗ {e}");
                continue;
            }
        };

        match command {
            Command::Bet { horse, amount } => {
                if let Err(e) = game.place_bet(horse, amount) {
                    println!("✗ {e}");
                    continue;
                }
                let interrupted = tokio::select! {
                    result = run_race(&mut game, &cfg.display) => {
                        result?;
                        false
                    }
                    _ = &mut shutdown => true,
                };
                if interrupted {
                    game.reset();
                    info!("Shutdown signal received mid-race.");
                    break;
                }
            }
            Command::Deposit(amount) => report(game.deposit_money(amount)),
            Command::Undo => match game.undo() {
                Ok(Some(entry)) => println!("↶ Undid {entry}"),
                Ok(None) => println!("Nothing to undo."),
                Err(e) => println!("✗ {e}"),
            },
            Command::Redo => match game.redo() {
                Ok(Some(entry)) => println!("↷ Redid {entry}"),
                Ok(None) => println!("Nothing to redo."),
                Err(e) => println!("✗ {e}"),
            },
            Command::Policy(policy) => {
                report(game.set_policy(policy));
                println!("Speed policy: {}", game.policy());
            }
            Command::Balance => println!("💰 Balance: ${:.2}", game.balance()),
            Command::Stats => println!("{}", game.stats()),
            Command::History => {
                let json = serde_json::to_string_pretty(game.settlements())
                    .context("Failed to serialise race history")?;
                println!("{json}");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    info!(
        balance = format!("${:.2}", game.balance()),
        races = game.stats().races_settled,
        pnl = format!("${:.2}", game.stats().total_pnl),
        "DERBY shut down cleanly."
    );
    Ok(())
}

/// Run one race: start, tick at the configured rate until a winner is
/// decided, hold the result on screen, settle, and reset.
async fn run_race(game: &mut GameState, display: &DisplayConfig) -> Result<()> {
    game.setup_race()?;

    let period = Duration::from_secs_f64(1.0 / f64::from(display.tick_rate_hz));
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if game.tick(display.track_length)?.is_some() {
            break;
        }
    }

    tokio::time::sleep(Duration::from_millis(display.result_pause_ms)).await;

    if let Err(e) = game.resolve_race() {
        error!(error = %e, "Settlement failed");
    }
    game.reset();
    Ok(())
}

fn report(result: Result<(), DerbyError>) {
    if let Err(e) = result {
        println!("✗ {e}");
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("derby=info"));

    let json_logging = std::env::var("DERBY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
