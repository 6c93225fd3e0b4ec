use std::{
    io::Stdout,
    sync::{Arc, Mutex},
};

use futures_util::StreamExt;
use http::Uri;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Message, protocol::CloseFrame},
};
use tokio_util::sync::CancellationToken;

use crate::{
    screen::{MountId, Screen},
    view::Gauge,
};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to paint frame: {0}")]
    Paint(#[from] std::io::Error),
    #[error("screen lock poisoned")]
    ScreenPoisoned,
}

/// One stream-to-render wiring: a long-lived receive-only connection
/// whose every text frame is decoded, passed through `view` and
/// rendered into this wiring's own mount.
///
/// A frame that fails to decode is logged and dropped; the stream
/// stays up. A closed connection ends the wiring for good, there is
/// no reconnect.
pub async fn run_stream<T, V>(
    url: Uri,
    shutdown: CancellationToken,
    screen: Arc<Mutex<Screen<Stdout>>>,
    mount: MountId,
    view: V,
) -> Result<(), StreamError>
where
    T: DeserializeOwned,
    V: Fn(&T) -> Vec<Gauge>,
{
    let (mut socket, _) = connect_async(url.clone()).await?;
    debug!("connected to {url}");

    loop {
        tokio::select! {
            msg = socket.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        debug!("{url} stream ended");
                        return Ok(());
                    }
                };

                match msg {
                    Message::Text(payload) => match decode(payload.as_str()) {
                        Ok(snapshot) => {
                            let gauges = view(&snapshot);
                            let mut screen =
                                screen.lock().map_err(|_| StreamError::ScreenPoisoned)?;
                            screen.render(mount, &gauges)?;
                        }
                        Err(e) => warn!("dropping undecodable frame from {url}: {e}"),
                    },
                    Message::Close(frame) => {
                        if let Some(CloseFrame { code, reason }) = frame {
                            debug!("{url} closed by server: code={code}, reason={reason}");
                        }
                        return Ok(());
                    }
                    // ping/pong are answered by tungstenite itself
                    _ => {}
                }
            }
            _ = shutdown.cancelled() => {
                socket.close(None).await.ok();
                return Ok(());
            }
        }
    }
}

fn decode<T: DeserializeOwned>(payload: &str) -> serde_json::Result<T> {
    serde_json::from_str(payload)
}
