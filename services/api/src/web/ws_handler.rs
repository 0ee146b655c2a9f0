//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a player connection.
//! Each socket owns one `PlaybackController` whose audio output is the
//! browser's audio element; the user's listen queue is shared with the REST
//! handlers through the cached list session.

use crate::{
    adapters::ClientAudio,
    web::{
        protocol::{ClientMessage, PlayerState, ServerMessage},
        state::{AppState, UserLists},
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use playlist_core::playback::{AudioEvent, PlaybackController, PlaybackEffect};
use playlist_core::ports::AudioOutput;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct PlayerParams {
    pub user_id: Uuid,
}

/// The handler for upgrading HTTP requests to player WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<PlayerParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, params.user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!(%user_id, "New player connection established");

    let (sender, mut receiver) = socket.split();
    let (outbox, outbox_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let lists = app_state.lists_for(user_id).await;
    let cancellation_token = CancellationToken::new();

    // --- 1. Writer Task ---
    let writer = tokio::spawn(write_loop(
        sender,
        outbox_rx,
        lists.notices.subscribe(),
        cancellation_token.clone(),
    ));

    // --- 2. Initialization Phase ---
    let mut controller = PlaybackController::new(ClientAudio::new(outbox.clone()));
    {
        let queue = lists.queue().await;
        controller.set_queue(queue.entries().to_vec());
    }
    let _ = outbox.send(ServerMessage::SessionInitialized {
        user_id,
        queue_len: controller.queue().len(),
    });
    let _ = outbox.send(ServerMessage::State(PlayerState::from(controller.snapshot())));

    // --- 3. Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(client_msg, &lists, &mut controller, &outbox).await;
                }
                Err(e) => {
                    warn!(%user_id, error = %e, "Failed to deserialize client message");
                    let _ = outbox.send(ServerMessage::Error {
                        message: "Unrecognised player message.".to_string(),
                    });
                }
            },
            Some(Ok(Message::Close(_))) => {
                info!(%user_id, "Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(%user_id, error = %e, "Player socket error");
                break;
            }
            None => {
                info!(%user_id, "Client disconnected.");
                break;
            }
        }
    }

    // --- 4. Cleanup ---
    controller.teardown();
    cancellation_token.cancel();
    if let Err(e) = writer.await {
        error!(%user_id, error = %e, "Player writer task failed");
    }
    info!(%user_id, "Player connection closed.");
}

/// Applies one client message and writes the resulting effects back to the
/// user's queue, then re-syncs the controller with the (possibly patched) queue.
async fn handle_client_message<A: AudioOutput>(
    message: ClientMessage,
    lists: &UserLists,
    controller: &mut PlaybackController<A>,
    outbox: &mpsc::UnboundedSender<ServerMessage>,
) {
    let is_tick = matches!(message, ClientMessage::TimeUpdate { .. });
    let refresh = matches!(message, ClientMessage::Refresh);
    let effects = dispatch(controller, message);

    if is_tick && effects.is_empty() {
        return;
    }

    {
        let mut queue = lists.queue().await;
        if refresh {
            queue.list(lists.user_id).await;
        }
        queue.apply_playback_effects(lists.user_id, effects).await;
        controller.set_queue(queue.entries().to_vec());
    }

    if !is_tick {
        let _ = outbox.send(ServerMessage::State(PlayerState::from(controller.snapshot())));
    }
}

/// Routes a client message to the matching controller transition.
fn dispatch<A: AudioOutput>(
    controller: &mut PlaybackController<A>,
    message: ClientMessage,
) -> Vec<PlaybackEffect> {
    debug!(?message, "Player message");
    match message {
        ClientMessage::Play => controller.play(),
        ClientMessage::Pause => controller.pause(),
        ClientMessage::Next => controller.next(),
        ClientMessage::Previous => controller.previous(),
        ClientMessage::Seek { percentage } => controller.seek(percentage),
        ClientMessage::ChangeSpeed { rate } => controller.change_speed(rate),
        ClientMessage::PlayItem { index } => controller.play_item(index),
        ClientMessage::Refresh => {}
        ClientMessage::MetadataLoaded { duration_seconds } => {
            return controller.handle_event(AudioEvent::MetadataLoaded { duration_seconds });
        }
        ClientMessage::TimeUpdate { position_seconds } => {
            return controller.handle_event(AudioEvent::TimeUpdate { position_seconds });
        }
        ClientMessage::Ended => return controller.handle_event(AudioEvent::Ended),
        ClientMessage::AudioError { message } => {
            return controller.handle_event(AudioEvent::Failed { reason: message });
        }
    }
    Vec::new()
}

/// Forwards audio commands and notices to the socket until cancelled, then
/// flushes whatever commands are still queued (e.g. the final `Release`).
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::UnboundedReceiver<ServerMessage>,
    mut notices: broadcast::Receiver<playlist_core::Notice>,
    cancellation_token: CancellationToken,
) {
    let mut notices_open = true;
    loop {
        let message = tokio::select! {
            biased;
            Some(message) = outbox.recv() => message,
            notice = notices.recv(), if notices_open => match notice {
                Ok(notice) => ServerMessage::from(notice),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Player fell behind on notices");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    notices_open = false;
                    continue;
                }
            },
            _ = cancellation_token.cancelled() => break,
        };
        if send_json(&mut sender, &message).await.is_err() {
            error!("Failed to send player message. Ending writer.");
            return;
        }
    }

    while let Ok(message) = outbox.try_recv() {
        if send_json(&mut sender, &message).await.is_err() {
            return;
        }
    }
    let _ = sender.close().await;
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            error!(error = %e, "Failed to serialize player message");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryLists;
    use playlist_core::domain::{ArticleAudio, AudioRendition, AudioVersion};
    use playlist_core::playback::PlaybackState;
    use playlist_core::ListenQueueEntry;

    fn entry(order: i32) -> ListenQueueEntry {
        ListenQueueEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            article_id: Uuid::new_v4(),
            audio_version: AudioVersion::Full,
            queue_order: order,
            is_played: false,
            progress_seconds: 0,
            playback_speed: 1.0,
            added_at: chrono::Utc::now(),
            played_at: None,
            article: None,
            audio: ArticleAudio {
                summary: None,
                full: Some(AudioRendition {
                    url: Some(format!("https://cdn.test/{}.mp3", order)),
                    duration_seconds: Some(30),
                }),
            },
        }
    }

    async fn session(
        rows: Vec<ListenQueueEntry>,
    ) -> (
        Arc<MemoryLists>,
        UserLists,
        PlaybackController<ClientAudio>,
        mpsc::UnboundedReceiver<ServerMessage>,
        mpsc::UnboundedSender<ServerMessage>,
    ) {
        let store = MemoryLists::with_queue(rows);
        let lists = UserLists::new(Uuid::nil(), store.clone(), store.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let mut controller = PlaybackController::new(ClientAudio::new(tx.clone()));
        controller.set_queue(lists.queue().await.entries().to_vec());
        (store, lists, controller, rx, tx)
    }

    #[tokio::test]
    async fn completion_is_written_back_and_the_next_entry_attached() {
        let rows = vec![entry(1), entry(2)];
        let first = rows[0].id;
        let (store, lists, mut controller, mut rx, tx) = session(rows).await;

        for message in [
            ClientMessage::Play,
            ClientMessage::MetadataLoaded { duration_seconds: 30.0 },
            ClientMessage::TimeUpdate { position_seconds: 5.2 },
            ClientMessage::Ended,
        ] {
            handle_client_message(message, &lists, &mut controller, &tx).await;
        }

        assert_eq!(*store.progress_writes.lock().unwrap(), vec![(first, 5)]);
        assert!(store.queue.lock().unwrap()[0].is_played);
        assert_eq!(controller.current_index(), Some(1));
        assert_eq!(controller.state(), PlaybackState::Loading);

        let mut attached = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let ServerMessage::AttachSource { url } = message {
                attached.push(url);
            }
        }
        assert_eq!(attached, vec!["https://cdn.test/1.mp3", "https://cdn.test/2.mp3"]);
    }

    #[tokio::test]
    async fn refresh_picks_up_queue_edits() {
        let rows = vec![entry(1)];
        let (store, lists, mut controller, _rx, tx) = session(rows).await;
        store.queue.lock().unwrap().push(entry(2));

        handle_client_message(ClientMessage::Refresh, &lists, &mut controller, &tx).await;

        assert_eq!(controller.queue().len(), 2);
    }

    #[tokio::test]
    async fn unplayable_entries_surface_in_the_state() {
        let mut broken = entry(2);
        broken.audio.full = None;
        let broken_id = broken.id;
        let (_, lists, mut controller, mut rx, tx) = session(vec![entry(1), broken]).await;
        while rx.try_recv().is_ok() {}

        handle_client_message(ClientMessage::PlayItem { index: 1 }, &lists, &mut controller, &tx)
            .await;

        let mut saw_play = false;
        let mut last_state = None;
        while let Ok(message) = rx.try_recv() {
            match message {
                ServerMessage::Play => saw_play = true,
                ServerMessage::State(state) => last_state = Some(state),
                _ => {}
            }
        }
        assert!(!saw_play);
        let state = last_state.expect("state");
        assert_eq!(state.state, "unplayable");
        assert_eq!(state.unplayable_entry_id, Some(broken_id));
    }
}
