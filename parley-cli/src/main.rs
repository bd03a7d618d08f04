mod console;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use colored::*;
use console::ConsoleObserver;
use dialoguer::Select;
use parley_core::utils::DEFAULT_STUN_ADDR;
use parley_core::{IceServerConfig, RoomId, RoomKind};
use parley_peer::{
    ManagerHandle, PeerConfig, RelayClient, RtcConnectorFactory, SessionContext, SessionManager,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley", version, about = "Peer-to-peer chat and file transfer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room, or create one when none is given.
    Join {
        room: Option<String>,

        #[arg(long, env = "PARLEY_RELAY_URL", default_value = "ws://127.0.0.1:3000")]
        relay: String,

        #[arg(long, env = "PARLEY_STUN", default_value = DEFAULT_STUN_ADDR)]
        stun: String,

        /// Where received files are written.
        #[arg(long, default_value = ".")]
        downloads: PathBuf,
    },
    /// Print a fresh room identifier.
    NewRoom {
        #[arg(long)]
        multi: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("parley_peer=warn,webrtc=error")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::NewRoom { multi } => {
            let kind = if multi {
                RoomKind::MultiParty
            } else {
                RoomKind::TwoParty
            };
            println!("{}", RoomId::generate(kind));
        }
        Commands::Join {
            room,
            relay,
            stun,
            downloads,
        } => {
            let room = match room {
                Some(raw) => RoomId::parse(&raw).context("Invalid room")?,
                None => RoomId::generate(prompt_room_kind()?),
            };

            let config = PeerConfig {
                relay_url: relay,
                ice_servers: vec![IceServerConfig {
                    urls: vec![stun],
                    username: None,
                    credential: None,
                }],
                ..Default::default()
            };

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            LocalSet::new().block_on(&runtime, run(room, config, downloads))?;
        }
    }

    Ok(())
}

fn prompt_room_kind() -> Result<RoomKind> {
    let choice = Select::new()
        .with_prompt("No room given. Create one for")
        .items(&["two people", "a group"])
        .default(0)
        .interact()?;

    Ok(match choice {
        0 => RoomKind::TwoParty,
        _ => RoomKind::MultiParty,
    })
}

async fn run(room: RoomId, config: PeerConfig, downloads: PathBuf) -> Result<()> {
    let client = RelayClient::connect(&config.relay_url, &room)
        .await
        .context("Failed to reach the relay")?;
    let (sink, inbound) = client.into_parts();

    let ctx = SessionContext {
        factory: Arc::new(RtcConnectorFactory::new(&config)),
        signaling: Arc::new(sink),
        observer: Rc::new(ConsoleObserver::new(downloads)),
        config: Rc::new(config),
        tracks: Vec::new(),
    };
    let manager = SessionManager::new(room.kind(), ctx);
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = ManagerHandle::new(tx);
    let mut manager_task = tokio::task::spawn_local(manager.run(inbound, rx));

    println!("{}", format!("Joined room {room}").green().bold());
    println!(
        "{}",
        "Type to chat, /file <path> to send a file, /quit to leave.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Input::Empty => {}
                    Input::Quit => break,
                    Input::File(path) => send_file(&handle, path).await,
                    Input::Chat(text) => {
                        handle.send_chat(text)?;
                    }
                }
            }
            _ = &mut manager_task => {
                println!("{}", "Relay connection lost".red().bold());
                return Ok(());
            }
        }
    }

    let _ = handle.leave();
    manager_task.await?;
    println!("{}", "Left the room".dimmed());
    Ok(())
}

async fn send_file(handle: &ManagerHandle, path: &Path) {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{}", format!("Cannot read {}: {e}", path.display()).red());
            return;
        }
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    match handle.send_file(name, mime_type(path), Bytes::from(data)) {
        Ok(metadata) => println!(
            "{}",
            format!("Sending {} ({} bytes)", metadata.name, metadata.size).dimmed()
        ),
        Err(e) => eprintln!("{}", format!("Cannot send {}: {e}", path.display()).red()),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    File(&'a Path),
    Chat(&'a str),
}

fn parse_line(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line == "/quit" {
        return Input::Quit;
    }
    match line.strip_prefix("/file ") {
        Some(path) if !path.trim().is_empty() => Input::File(Path::new(path.trim())),
        _ => Input::Chat(line),
    }
}

fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
