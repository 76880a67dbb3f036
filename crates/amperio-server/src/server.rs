//! WebSocket control server.
//!
//! Accepts front-end connections, executes [`Request`]s against the
//! engine, and pushes telemetry to every connection roughly every 100 ms
//! while audio runs. One tokio task per connection; pushed messages travel
//! a broadcast channel so connections never block each other.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::controller::EngineController;
use crate::protocol::{Request, Response};

/// Interval between telemetry pushes.
const STATS_PUSH_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

/// Shared server state.
pub struct ServerState {
    controller: EngineController,
}

impl ServerState {
    /// Wrap an engine controller for serving.
    pub fn new(controller: EngineController) -> Self {
        Self { controller }
    }
}

/// Serve the control protocol on `addr` until `shutdown` resolves.
pub async fn run(
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "control server listening");

    let (push_tx, _) = broadcast::channel::<String>(64);

    // Telemetry pump: one task for all connections.
    let stats_state = Arc::clone(&state);
    let stats_tx = push_tx.clone();
    let stats_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_PUSH_INTERVAL);
        loop {
            ticker.tick().await;
            if stats_state.controller.is_running() {
                let stats = stats_state.controller.handle().stats();
                let message = Response::Stats {
                    cpu: stats.cpu_usage,
                    latency: stats.latency_ms,
                    peak_input: stats.peak_input,
                    peak_output: stats.peak_output,
                }
                .to_json();
                // No receivers is fine; nobody is connected.
                let _ = stats_tx.send(message);
            }
        }
    });

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        let state = Arc::clone(&state);
                        let push_rx = push_tx.subscribe();
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(socket, peer, state, push_rx).await {
                                debug!(%peer, %err, "connection closed with error");
                            }
                        });
                    }
                    Err(err) => warn!(%err, "accept failed"),
                }
            }
            () = &mut shutdown => break,
        }
    }

    stats_task.abort();
    info!("control server stopped");
    Ok(())
}

async fn serve_connection(
    socket: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
    mut push_rx: broadcast::Receiver<String>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(socket).await?;
    info!(%peer, "client connected");
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_message(&state, text.as_str()).await;
                        sink.send(Message::text(response.to_json())).await?;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        sink.send(Message::Pong(payload)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary and pong frames are ignored
                    Some(Err(err)) => return Err(err.into()),
                }
            }
            pushed = push_rx.recv() => {
                match pushed {
                    Ok(message) => sink.send(Message::text(message)).await?,
                    // Lagged receivers just miss a few stats frames.
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!(%peer, "client disconnected");
    Ok(())
}

/// Execute one control message and build its response.
pub async fn handle_message(state: &ServerState, text: &str) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(err) => {
            debug!(%err, "rejected malformed control message");
            return Response::error(format!("invalid message: {err}"));
        }
    };
    handle_request(state, request).await
}

async fn handle_request(state: &ServerState, request: Request) -> Response {
    let controller = &state.controller;
    match request {
        Request::Start => match controller.start().await {
            Ok(()) => Response::Status { running: true },
            Err(err) => Response::error(err.to_string()),
        },
        Request::Stop => match controller.stop().await {
            Ok(()) => Response::Status { running: false },
            Err(err) => Response::error(err.to_string()),
        },
        Request::GetStats => {
            let stats = controller.handle().stats();
            Response::Stats {
                cpu: stats.cpu_usage,
                latency: stats.latency_ms,
                peak_input: stats.peak_input,
                peak_output: stats.peak_output,
            }
        }
        Request::AddEffect {
            effect_type,
            pedal_id,
            position,
            effect_id,
        } => {
            let position = position.and_then(|p| usize::try_from(p).ok());
            match controller.manager().add_effect(
                &effect_type,
                &pedal_id,
                position,
                effect_id.as_deref(),
            ) {
                Ok(assigned) => {
                    // Preview insertions audition through the test tone.
                    if assigned.starts_with("preview-") {
                        let handle = controller.handle();
                        handle.set_test_tone_frequency(440.0);
                        handle.set_test_tone_amplitude(0.3);
                        handle.enable_test_tone(true);
                    }
                    Response::ack_with_id(assigned)
                }
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::RemoveEffect { effect_id } => {
            match controller.manager().remove_effect(&effect_id) {
                Ok(()) => {
                    if effect_id.starts_with("preview-") {
                        controller.handle().enable_test_tone(false);
                    }
                    Response::ack()
                }
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::SetParameter {
            effect_id,
            parameter,
            value,
        } => {
            match controller
                .manager()
                .set_parameter(&effect_id, &parameter, value as f32)
            {
                Ok(()) => Response::ack(),
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::MoveEffect {
            effect_id,
            to_position,
        } => {
            let Ok(to_position) = usize::try_from(to_position) else {
                return Response::error("toPosition must be non-negative");
            };
            match controller.manager().move_effect(&effect_id, to_position) {
                Ok(()) => Response::ack(),
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::ToggleBypass {
            effect_id,
            bypassed,
        } => {
            match controller.manager().toggle_bypass(&effect_id, bypassed) {
                Ok(()) => Response::ack(),
                Err(err) => Response::error(err.to_string()),
            }
        }
    }
}
