//! WebSocket broadcasting of quiz events.
//!
//! Observers connect to `/api/ws`, receive a `connected` event carrying the
//! current snapshot, and then every [`QuizEvent`] the engine emits.
//!
//! # Example
//!
//! ```no_run
//! use radsim_engine::websocket::EventBroadcaster;
//! use radsim_engine::events::{QuizEvent, SessionStartedPayload};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(QuizEvent::SessionStarted(SessionStartedPayload { total_exercises: 5 }));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::events::QuizEvent;

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Fans quiz events out to every connected observer.
///
/// Events are not kept for observers that connect later.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<QuizEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind gets a `Lagged` error and misses events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QuizEvent> {
        self.sender.subscribe()
    }

    /// Sends an event to every subscriber.
    ///
    /// Returns the number of receivers; 0 means nobody is listening.
    pub fn send(&self, event: QuizEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Sends a batch of events in order.
    pub fn send_all(&self, events: impl IntoIterator<Item = QuizEvent>) {
        for event in events {
            debug!(event = event.event_name(), "Broadcasting");
            self.send(event);
        }
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// WebSocket upgrade handler for `GET /api/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles a single WebSocket connection.
///
/// - Subscribes before reading the snapshot so no event is lost in between
/// - Sends `connected` with the current snapshot
/// - Forwards every broadcast event
/// - Sends `resync` with a fresh snapshot when the client falls behind
/// - Pings every 30 seconds and closes after 3 missed pongs
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_receiver = state.broadcaster.subscribe();
    let snapshot = state.engine.lock().await.snapshot();

    if !send_event(&mut sender, &QuizEvent::connected(snapshot)).await {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent snapshot");

    let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
    // the first tick completes immediately
    heartbeat_interval.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring data message from client");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                let quiz_event = match event {
                    Ok(quiz_event) => quiz_event,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Client lagged, sending a fresh snapshot");
                        resync_event(&state, missed).await
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                };

                if !send_event(&mut sender, &quiz_event).await {
                    debug!("Failed to send event, client disconnected");
                    break;
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

/// Builds the event that brings a lagging observer back in step.
///
/// Missed ticks and feedback changes are not replayed; the snapshot already
/// reflects them.
async fn resync_event(state: &AppState, missed: u64) -> QuizEvent {
    let snapshot = state.engine.lock().await.snapshot();
    QuizEvent::resync(missed, snapshot)
}

/// Serializes and sends one event. Returns `false` once the client is gone.
///
/// An event that fails to serialize is logged and skipped.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &QuizEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(event = event.event_name(), "Failed to serialize event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json)).await.is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use radsim_scene::HeadlessScene;

    use super::*;
    use crate::events::{SessionStartedPayload, TickPayload};
    use crate::{Catalog, Config, QuizEngine};

    #[tokio::test]
    async fn test_broadcaster_delivers_to_subscribers() {
        let broadcaster = EventBroadcaster::new(16);
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();

        let count = broadcaster.send(QuizEvent::SessionStarted(SessionStartedPayload {
            total_exercises: 5,
        }));
        assert_eq!(count, 2);

        assert_eq!(rx1.recv().await.unwrap().event_name(), "session_started");
        assert_eq!(rx2.recv().await.unwrap().event_name(), "session_started");
    }

    #[test]
    fn test_send_without_subscribers_returns_zero() {
        let broadcaster = EventBroadcaster::default();
        let count = broadcaster.send(QuizEvent::Tick(TickPayload {
            index: 0,
            time_remaining: 10,
        }));
        assert_eq!(count, 0);
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_send_all_preserves_order() {
        let broadcaster = EventBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();
        broadcaster.send_all((0..3).map(|i| {
            QuizEvent::Tick(TickPayload {
                index: 0,
                time_remaining: 60 - i,
            })
        }));

        for expected in [60, 59, 58] {
            let event = rx.recv().await.unwrap();
            assert!(matches!(
                event,
                QuizEvent::Tick(TickPayload { time_remaining, .. }) if time_remaining == expected
            ));
        }
    }

    #[test]
    fn test_subscriber_count_tracks_drops() {
        let broadcaster = EventBroadcaster::new(4);
        let rx = broadcaster.subscribe();
        assert_eq!(broadcaster.receiver_count(), 1);
        drop(rx);
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_gets_resync_snapshot() {
        let config = Config::default();
        let engine = QuizEngine::new(config.clone(), Catalog::reference(), HeadlessScene::new());
        let state = AppState::new(config, engine);
        let broadcaster = EventBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();

        {
            let mut engine = state.engine.lock().await;
            engine.start().unwrap();
            engine.confirm_lab(true).unwrap();
            engine.advance(Duration::from_secs(5)).unwrap();
            broadcaster.send_all(engine.drain_events());
        }

        let lagged = rx.recv().await;
        assert!(matches!(lagged, Err(broadcast::error::RecvError::Lagged(n)) if n > 0));
        let Err(broadcast::error::RecvError::Lagged(missed)) = lagged else {
            return;
        };

        let event = resync_event(&state, missed).await;
        assert_eq!(event.event_name(), "resync");
        assert!(matches!(
            &event,
            QuizEvent::Resync(payload)
                if payload.missed == missed
                    && payload.snapshot.state.attempt_index() == Some(0)
                    && payload.snapshot.time_remaining == Some(55)
        ));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["snapshot"]["timeRemaining"], 55);
        assert_eq!(json["payload"]["snapshot"]["state"]["kind"], "attempt");
    }
}
