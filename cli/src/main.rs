mod client;
mod script;

use std::io::Read;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use scene::session::SessionConfig;
use scene::surface::Surface;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::client::Participant;
use crate::script::{Effect, ScriptRunner};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid relay URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("relay error {code}: {message}")]
    Relay { code: String, message: String },
    #[error("missing room; pass --room or set COLLAB_ROOM")]
    MissingRoom,
    #[error("read input failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("script: {0}")]
    Script(#[from] script::ScriptError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "collab-draw", about = "Headless participant for the collab-draw scene relay")]
struct Cli {
    #[arg(long, env = "COLLAB_RELAY_URL", default_value = "http://127.0.0.1:3001")]
    relay_url: String,

    #[arg(long, env = "COLLAB_USERNAME", default_value = "cli")]
    username: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the relay's health endpoint.
    Ping,
    Room(RoomCommand),
    /// Join a room and log what happens in it.
    Watch(WatchArgs),
    /// Join a room and replay JSONL edits from a file or stdin.
    Script(ScriptArgs),
}

#[derive(Args, Debug)]
struct RoomCommand {
    #[command(subcommand)]
    command: RoomSubcommand,
}

#[derive(Subcommand, Debug)]
enum RoomSubcommand {
    /// Print a fresh room id.
    New,
}

#[derive(Args, Debug)]
struct SessionArgs {
    #[arg(long, env = "COLLAB_ROOM")]
    room: Option<String>,

    #[arg(long, default_value_t = scene::consts::ECHO_WINDOW_MS)]
    echo_window_ms: i64,

    #[arg(long, default_value_t = scene::consts::DEFAULT_HISTORY_LIMIT)]
    history_limit: usize,

    #[arg(long, default_value = scene::consts::DEFAULT_BACKGROUND)]
    background: String,

    #[arg(long, default_value_t = 2000, help = "How long to wait for a peer to send the scene")]
    bootstrap_timeout_ms: u64,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[command(flatten)]
    session: SessionArgs,

    #[arg(long, help = "Stop after this many seconds; run until the relay closes otherwise")]
    duration_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct ScriptArgs {
    #[command(flatten)]
    session: SessionArgs,

    #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
    input: String,

    #[arg(long, default_value_t = false, help = "Allow `clear` commands without prompting")]
    assume_yes: bool,

    #[arg(long, default_value_t = 500, help = "Keep syncing this long after the last command")]
    linger_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.relay_url).await,
        Command::Room(room) => match room.command {
            RoomSubcommand::New => {
                println!("{}", new_room_id(frames::now_ms(), Uuid::new_v4()));
                Ok(())
            }
        },
        Command::Watch(args) => run_watch(&cli.relay_url, &cli.username, args).await,
        Command::Script(args) => run_script(&cli.relay_url, &cli.username, args).await,
    }
}

async fn run_ping(relay_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", relay_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_watch(relay_url: &str, username: &str, args: WatchArgs) -> Result<(), CliError> {
    let mut participant = join(relay_url, username, &args.session).await?;
    participant.pump(args.duration_secs.map(Duration::from_secs)).await?;
    print_scene(&participant)
}

async fn run_script(relay_url: &str, username: &str, args: ScriptArgs) -> Result<(), CliError> {
    let text = if args.input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.input)?
    };
    let steps = script::parse(&text)?;

    let mut participant = join(relay_url, username, &args.session).await?;
    let assume_yes = args.assume_yes;
    let confirm = move |prompt: &str| {
        if !assume_yes {
            tracing::warn!(%prompt, "refusing without --assume-yes");
        }
        assume_yes
    };

    let mut runner = ScriptRunner::new();
    let total = steps.len();
    for step in steps {
        let effect = runner.run(participant.session_mut(), step.command, &confirm)?;
        participant.flush().await?;
        if let Effect::Wait(duration) = effect {
            participant.pump(Some(duration)).await?;
        }
    }
    eprintln!("script complete: steps={total}");

    participant.pump(Some(Duration::from_millis(args.linger_ms))).await?;
    print_scene(&participant)
}

async fn join(relay_url: &str, username: &str, args: &SessionArgs) -> Result<Participant, CliError> {
    let room = args.room.clone().ok_or(CliError::MissingRoom)?;
    let config = SessionConfig {
        username: username.to_owned(),
        echo_window_ms: args.echo_window_ms,
        history_limit: args.history_limit,
        background: args.background.clone(),
    };
    let mut participant = Participant::connect(relay_url, config).await?;
    participant.join(&room, Duration::from_millis(args.bootstrap_timeout_ms)).await?;
    Ok(participant)
}

fn print_scene(participant: &Participant) -> Result<(), CliError> {
    let snapshot: Value = serde_json::from_str(&participant.session().surface().to_snapshot())?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Room id in the form `room_<base36 millis>_<base36 random>`.
fn new_room_id(now_ms: i64, entropy: Uuid) -> String {
    let suffix = to_base36(u64::from_le_bytes(entropy.as_bytes()[..8].try_into().unwrap_or([0; 8])));
    format!("room_{}_{suffix}", to_base36(u64::try_from(now_ms).unwrap_or(0)))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[usize::try_from(n % 36).unwrap_or(0)]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
