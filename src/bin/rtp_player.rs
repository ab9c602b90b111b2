//! RTP Player Application
//!
//! Reads dissected RTP packets as JSON lines, reconstructs every track
//! through the jitter buffer simulation and plays up to two of them.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rtp_player::{
    audio::{list_output_devices, PlaybackState},
    config::{default_config_path, ClockMode, PlayerConfig, SyncMode},
    protocol::MediaPacketRecord,
    Player,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "rtp-player")]
#[command(about = "Replay captured RTP audio as a jitter buffer would have played it")]
#[command(version)]
struct Args {
    /// JSON-lines file of packet records
    input: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "RTP_PLAYER_CONFIG")]
    config: Option<PathBuf>,

    /// Absolute time the record arrival offsets count from (RFC 3339)
    #[arg(long)]
    capture_start: Option<DateTime<Utc>>,

    /// Jitter buffer size in milliseconds
    #[arg(short, long)]
    jitter: Option<u32>,

    /// Play packets by their RTP timestamps instead of arrival time
    #[arg(long)]
    media_clock: bool,

    /// Play every packet back to back, ignoring timing
    #[arg(long)]
    uninterrupted: bool,

    /// Play both tracks in full instead of only their overlap
    #[arg(long)]
    union: bool,

    /// Only decode streams of these calls
    #[arg(long = "call")]
    calls: Vec<u32>,

    /// Tracks to select, up to two
    #[arg(short, long = "track", num_args = 1..=2, default_values_t = vec![0usize])]
    tracks: Vec<usize>,

    /// Output device name
    #[arg(short, long)]
    device: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Start playing right away
    #[arg(long)]
    autoplay: bool,
}

/// Interactive command read from stdin
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Play,
    Pause,
    Stop,
    Seek(f64),
    Select(usize, usize),
    Status,
    Tracks,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(word) => word.to_ascii_lowercase(),
            None => return Err("empty command".to_string()),
        };
        let mut number = |what: &str| -> std::result::Result<String, String> {
            words.next().map(str::to_string).ok_or(format!("missing {}", what))
        };

        match command.as_str() {
            "play" | "p" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "stop" | "s" => Ok(Self::Stop),
            "seek" => number("seconds")?
                .parse()
                .map(Self::Seek)
                .map_err(|e| format!("bad seconds: {}", e)),
            "select" => {
                let slot = number("slot")?.parse().map_err(|e| format!("bad slot: {}", e))?;
                let track = number("track")?.parse().map_err(|e| format!("bad track: {}", e))?;
                Ok(Self::Select(slot, track))
            }
            "status" => Ok(Self::Status),
            "tracks" | "ls" => Ok(Self::Tracks),
            "help" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_devices {
        print_devices();
        return Ok(());
    }
    let Some(input) = args.input.as_deref() else {
        bail!("No input file given (use --list-devices to only list devices)");
    };

    let config = load_config(&args)?;
    let capture_start = args.capture_start.unwrap_or_else(Utc::now);
    let mut player = Player::new(config, capture_start).context("Invalid configuration")?;

    let count = ingest(&player, input)?;
    tracing::info!("Read {} packets from {}", count, input.display());

    let decoded = if args.calls.is_empty() {
        player.decode_all()?
    } else {
        player.decode_calls(&args.calls)?
    };
    if decoded == 0 {
        bail!("No tracks could be reconstructed from {}", input.display());
    }
    print_tracks(&player);

    for (slot, &track) in args.tracks.iter().enumerate() {
        player
            .select_track(slot, track)
            .with_context(|| format!("Failed to select track {}", track))?;
    }

    if args.autoplay {
        run(&mut player, Command::Play);
    }
    println!("Commands: play, pause, stop, seek <secs>, select <slot> <track>, status, tracks, quit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => run(&mut player, command),
                    Err(e) => println!("{}", e),
                }
            }
            _ = ticker.tick() => {
                if player.state() != PlaybackState::Stopped
                    && player.poll() == PlaybackState::Stopped
                {
                    println!("Playback finished");
                }
            }
        }
    }

    player.stop();
    tracing::info!("Shutting down");
    Ok(())
}

fn load_config(args: &Args) -> Result<PlayerConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = PlayerConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    if let Some(jitter) = args.jitter {
        config.decode.jitter_budget_ms = jitter;
    }
    if args.media_clock {
        config.decode.clock_mode = ClockMode::MediaTimestamp;
    }
    if args.uninterrupted {
        config.decode.uninterrupted = true;
    }
    if args.union {
        config.decode.sync_mode = SyncMode::Union;
    }
    if args.device.is_some() {
        config.output.device = args.device.clone();
    }
    Ok(config)
}

/// Feed every record of a JSON-lines file into the player
fn ingest(player: &Player, path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut count = 0;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: MediaPacketRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid packet record", path.display(), number + 1))?;
        player.add_packet(record);
        count += 1;
    }
    Ok(count)
}

fn run(player: &mut Player, command: Command) {
    let result = match command {
        Command::Play => player.play().map_err(anyhow::Error::from),
        Command::Pause => {
            player.pause();
            Ok(())
        }
        Command::Stop => {
            player.stop();
            Ok(())
        }
        Command::Seek(secs) => {
            player.seek_secs(secs);
            Ok(())
        }
        Command::Select(slot, track) => match player.select_track(slot, track) {
            Ok(_) => {
                print_tracks(player);
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Command::Status => {
            print_status(player);
            Ok(())
        }
        Command::Tracks => {
            print_tracks(player);
            Ok(())
        }
        Command::Help => {
            println!("play | pause | stop | seek <secs> | select <slot> <track> | status | tracks | quit");
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    if let Err(e) = result {
        println!("error: {:#}", e);
    }
}

fn print_tracks(player: &Player) {
    println!("\n=== Tracks ===");
    for status in player.track_status() {
        let slot = match status.selected_slot {
            Some(slot) => format!("[{}]", slot),
            None => "   ".to_string(),
        };
        println!(
            "{} {:>3}  {}  {} Hz  {:.2}s  packets {}  dropped {}  out of order {}  wrong ts {}",
            slot,
            status.track_id,
            status.label,
            status.sample_rate,
            status.duration_secs,
            status.stats.packet_count,
            status.stats.dropped_count,
            status.stats.out_of_order_count,
            status.stats.wrong_timestamp_count
        );
    }
    println!();
}

fn print_status(player: &Player) {
    let alignment = player.alignment();
    println!(
        "{:?} at {:.2}s (frame {} of {})",
        player.state(),
        player.position_secs(),
        player.position(),
        alignment.max_len
    );
    if let Some(status) = player.status() {
        println!(
            "  device frames {}  pause/seek drift {}",
            status.frames_rendered(),
            status.pause_duration()
        );
    }
}

fn print_devices() {
    println!("\n=== Available Output Devices ===");
    for device in list_output_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}:", device.name, default_marker);
        println!("    ID: {}", device.id);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}
