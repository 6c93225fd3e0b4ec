use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::SinkExt;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::AppState;

pub async fn handle_socket<T>(socket: WebSocket, state: AppState, rx: broadcast::Receiver<T>)
where
    T: Serialize + Clone,
{
    let _tracker_token = state.ws_graceful_shutdown.tracker.token();
    let cancellation_token = state.ws_graceful_shutdown.token.child_token();

    debug!("websocket connected");
    let mut controller = EgressController {
        ws: socket,
        rx,
        cancellation_token,
    };

    while controller.next().await {}
    controller.ws.close().await.ok();
    debug!("websocket disconnected");
}

struct EgressController<T> {
    ws: WebSocket,
    rx: broadcast::Receiver<T>,
    cancellation_token: CancellationToken,
}

impl<T> EgressController<T>
where
    T: Serialize + Clone,
{
    async fn close(&mut self, reason: EgressWsError) -> anyhow::Result<()> {
        let frame = reason.into_close_frame();
        match frame {
            Some(CloseFrame { code, ref reason }) if code != close_code::NORMAL => {
                debug!(
                    code,
                    %reason,
                    "closing websocket with error"
                );
            }
            _ => {}
        }
        self.ws.send(Message::Close(frame)).await?;
        Ok(())
    }

    async fn next(&mut self) -> bool {
        tokio::select! {
            snapshot = self.rx.recv() => {
                match snapshot {
                    Ok(snapshot) => {
                        if let Err(e) = self.push(snapshot).await {
                            self.close(e).await.ok();
                            return false;
                        }
                        true
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // capacity-1 channel: just catch up with the newest
                        trace!(skipped, "subscriber lagged, skipping to newest snapshot");
                        true
                    }
                    Err(RecvError::Closed) => {
                        self.close(EgressWsError::Shutdown).await.ok();
                        false
                    }
                }
            }
            msg = self.ws.recv() => {
                match msg {
                    Some(Ok(Message::Close(Some(CloseFrame { code, reason })))) => {
                        trace!(code, %reason, "websocket closed by peer");
                        false
                    }
                    Some(Ok(Message::Close(None))) => false,
                    // push-only protocol: anything else from the peer is ignored
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        debug!("websocket receive error: {e}");
                        false
                    }
                    None => false,
                }
            }
            _ = self.cancellation_token.cancelled() => {
                self.close(EgressWsError::Shutdown).await.ok();
                false
            }
        }
    }

    async fn push(&mut self, snapshot: T) -> Result<(), EgressWsError> {
        let payload =
            serde_json::to_string(&snapshot).map_err(|e| EgressWsError::Internal(e.to_string()))?;
        self.ws
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| EgressWsError::Internal(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum EgressWsError {
    #[error("server is shutting down")]
    Shutdown,
    #[error("internal error: {0}")]
    Internal(String),
}

impl EgressWsError {
    fn into_close_frame(self) -> Option<CloseFrame> {
        Some(match self {
            EgressWsError::Shutdown => CloseFrame {
                code: close_code::AWAY,
                reason: "server shutting down".into(),
            },
            EgressWsError::Internal(reason) => CloseFrame {
                code: close_code::ERROR,
                reason: format!("internal error: {}", reason).into(),
            },
        })
    }
}
