use async_trait::async_trait;
use colored::*;
use parley_core::{ChatMessage, PeerId, Receipt};
use parley_peer::channel::ReceivedFile;
use parley_peer::{ConnectionState, RemoteTrack, SessionObserver};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Prints session activity to the terminal and stores received files.
pub struct ConsoleObserver {
    downloads: PathBuf,
}

impl ConsoleObserver {
    pub fn new(downloads: PathBuf) -> Self {
        Self { downloads }
    }

    /// Keeps only the final path component of a remote-supplied name.
    fn target_path(&self, name: &str) -> PathBuf {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "received.bin".into());
        self.downloads.join(file_name)
    }
}

#[async_trait(?Send)]
impl SessionObserver for ConsoleObserver {
    async fn on_session_created(&self, peer_id: &PeerId, polite: bool) {
        let role = if polite { "polite" } else { "impolite" };
        println!("{}", format!("· session with {peer_id} ({role})").dimmed());
    }

    async fn on_session_closed(&self, peer_id: &PeerId) {
        println!("{}", format!("· session with {peer_id} closed").dimmed());
    }

    async fn on_connection_state(&self, peer_id: &PeerId, state: ConnectionState) {
        match state {
            ConnectionState::Connected => {
                println!("{}", format!("✔ connected to {peer_id}").green().bold())
            }
            ConnectionState::Disconnected | ConnectionState::Failed => {
                println!("{}", format!("⚠ connection to {peer_id}: {state:?}").yellow())
            }
            _ => {}
        }
    }

    async fn on_track(&self, peer_id: &PeerId, track: RemoteTrack) {
        println!(
            "{}",
            format!("· {peer_id} is sending {} ({})", track.kind, track.id).dimmed()
        );
    }

    async fn on_message(&self, peer_id: &PeerId, message: ChatMessage) {
        println!("{} {}", format!("{peer_id}:").cyan().bold(), message.text);
    }

    async fn on_file(&self, peer_id: &PeerId, file: ReceivedFile) {
        let path = self.target_path(&file.metadata.name);
        match tokio::fs::write(&path, &file.data).await {
            Ok(()) => println!(
                "{} {} ({} bytes, {}) saved to {}",
                format!("{peer_id}:").cyan().bold(),
                file.metadata.name,
                file.metadata.size,
                file.metadata.mime_type,
                path.display()
            ),
            Err(e) => warn!("Failed to save {}: {}", path.display(), e),
        }
    }

    async fn on_receipt(&self, _peer_id: &PeerId, _receipt: Receipt, delayed: bool) {
        if delayed {
            println!("{}", "  ✓ delivered (delayed)".yellow().dimmed());
        } else {
            println!("{}", "  ✓ delivered".dimmed());
        }
    }

    async fn on_reset(&self, peer_id: &PeerId) {
        println!("{}", format!("↻ connection to {peer_id} reset").yellow());
    }
}
