//! services/api/src/adapters/client_audio.rs
//!
//! The browser's audio element seen as an `AudioOutput`: each command becomes a
//! `ServerMessage` queued for the player socket.

use playlist_core::ports::AudioOutput;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::web::protocol::ServerMessage;

pub struct ClientAudio {
    outbox: UnboundedSender<ServerMessage>,
}

impl ClientAudio {
    pub fn new(outbox: UnboundedSender<ServerMessage>) -> Self {
        Self { outbox }
    }

    fn send(&self, message: ServerMessage) {
        if self.outbox.send(message).is_err() {
            warn!("Player socket is gone, dropping audio command");
        }
    }
}

impl AudioOutput for ClientAudio {
    fn attach(&mut self, url: &str) {
        self.send(ServerMessage::AttachSource { url: url.to_string() });
    }

    fn set_rate(&mut self, rate: f32) {
        self.send(ServerMessage::SetRate { rate });
    }

    fn seek(&mut self, position_seconds: f64) {
        self.send(ServerMessage::Seek { position_seconds });
    }

    fn play(&mut self) {
        self.send(ServerMessage::Play);
    }

    fn pause(&mut self) {
        self.send(ServerMessage::Pause);
    }

    fn release(&mut self) {
        self.send(ServerMessage::Release);
    }
}
