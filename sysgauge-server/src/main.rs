use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use axum::{Router, routing::get};
use clap::Parser;
use confique::Config;
use sysgauge_proto::{CPUS_ENDPOINT, CpuSnapshot, RAM_ENDPOINT, RamSnapshot};
use tokio::{net::TcpListener, signal, sync::broadcast};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod route;
mod sample;

// Latest-wins: a slow subscriber only ever skips to the newest snapshot.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 1;

#[derive(Debug, Parser)]
#[command(name = "sysgauge-server")]
struct Cli {
    #[arg(short, long, value_name = "FILE", help = "Path to config file")]
    config_path: Option<String>,
}

#[derive(Config, Debug)]
struct Conf {
    /// Port to listen on
    #[config(default = 7032)]
    port: u16,

    /// Bind address
    #[config(default = "127.0.0.1")]
    address: IpAddr,

    /// Interval between two host samples, in milliseconds
    #[config(default = 600)]
    sample_interval_ms: u64,
}

fn config(path: &str) -> anyhow::Result<Conf> {
    Conf::builder()
        .env()
        .file(path)
        .load()
        .map_err(|e| e.into())
}

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    pub cpus_tx: broadcast::Sender<CpuSnapshot>,
    pub ram_tx: broadcast::Sender<RamSnapshot>,
    pub ws_graceful_shutdown: WebsocketGraceful,
}

#[derive(Clone, Debug)]
pub(crate) struct WebsocketGraceful {
    pub token: CancellationToken,
    pub tracker: TaskTracker,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(route::health))
        .route(CPUS_ENDPOINT, get(route::realtime::cpus_ws))
        .route(RAM_ENDPOINT, get(route::realtime::ram_ws))
        .layer((
            TraceLayer::new_for_http(),
            // Prevent requests to hang forever
            TimeoutLayer::new(Duration::from_secs(60)),
        ))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    trace!("using command line arguments {:?}", cli);

    let config = config(&cli.config_path.unwrap_or("config.toml".to_owned()))?;
    trace!("using config {:?}", config);

    let (cpus_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
    let (ram_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);

    let state = AppState {
        cpus_tx: cpus_tx.clone(),
        ram_tx: ram_tx.clone(),
        ws_graceful_shutdown: WebsocketGraceful {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        },
    };

    let sampler_task = tokio::spawn(sample::run(
        sample::SystemSampler::new(),
        cpus_tx,
        ram_tx,
        Duration::from_millis(config.sample_interval_ms),
        state.ws_graceful_shutdown.token.clone(),
    ));

    let addr = SocketAddr::from((config.address, config.port));
    info!("listening on {addr}");
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(shutdown_signal(state.ws_graceful_shutdown.token.clone()))
        .await?;

    let ws_tracker = state.ws_graceful_shutdown.tracker.clone();
    ws_tracker.close();

    trace!("waiting {} websocket connection shutdown", ws_tracker.len());
    ws_tracker.wait().await;

    sampler_task.await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                #[cfg(debug_assertions)]
                let default_log_level = format!(
                    "{}=debug,tower_http=debug,axum=trace",
                    env!("CARGO_CRATE_NAME")
                )
                .into();

                #[cfg(not(debug_assertions))]
                let default_log_level = format!(
                    "{}=info,tower_http=info,axum=info",
                    env!("CARGO_CRATE_NAME")
                )
                .into();

                default_log_level
            }),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

async fn shutdown_signal(ws_token: CancellationToken) {
    let _ws_shutdown_guard = ws_token.drop_guard();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use futures_util::{SinkExt, StreamExt};
    use http_body_util::BodyExt;
    use tokio_tungstenite::{connect_async, tungstenite};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let (cpus_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let (ram_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        AppState {
            cpus_tx,
            ram_tx,
            ws_graceful_shutdown: WebsocketGraceful {
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
            },
        }
    }

    async fn serve_app(state: AppState) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });
        addr
    }

    async fn wait_for_subscriber<T: Clone>(tx: &broadcast::Sender<T>) {
        while tx.receiver_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn health_is_ok() {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let res = app(test_state()).oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn cpus_endpoint_forwards_snapshots_as_json_text() {
        let state = test_state();
        let cpus_tx = state.cpus_tx.clone();
        let addr = serve_app(state).await;

        let (mut socket, _) = connect_async(format!("ws://{addr}{CPUS_ENDPOINT}"))
            .await
            .unwrap();

        wait_for_subscriber(&cpus_tx).await;
        cpus_tx.send(vec![12.345, 87.6]).unwrap();

        let frame = socket.next().await.unwrap().unwrap();
        let tungstenite::Message::Text(payload) = frame else {
            panic!("expected a text frame, got {frame:?}");
        };
        let snapshot: CpuSnapshot = serde_json::from_str(payload.as_str()).unwrap();
        assert_eq!(snapshot, vec![12.345, 87.6]);

        socket.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn ram_endpoint_forwards_snapshots_as_json_text() {
        let state = test_state();
        let ram_tx = state.ram_tx.clone();
        let addr = serve_app(state).await;

        let (mut socket, _) = connect_async(format!("ws://{addr}{RAM_ENDPOINT}"))
            .await
            .unwrap();

        wait_for_subscriber(&ram_tx).await;
        ram_tx
            .send(RamSnapshot {
                used: 2_000_000_000,
                total: 8_000_000_000,
            })
            .unwrap();

        let frame = socket.next().await.unwrap().unwrap();
        let tungstenite::Message::Text(payload) = frame else {
            panic!("expected a text frame, got {frame:?}");
        };
        let snapshot: RamSnapshot = serde_json::from_str(payload.as_str()).unwrap();
        assert_eq!(snapshot.used, 2_000_000_000);
        assert_eq!(snapshot.total, 8_000_000_000);

        socket.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn inbound_text_does_not_close_the_stream() {
        let state = test_state();
        let cpus_tx = state.cpus_tx.clone();
        let addr = serve_app(state).await;

        let (mut socket, _) = connect_async(format!("ws://{addr}{CPUS_ENDPOINT}"))
            .await
            .unwrap();
        wait_for_subscriber(&cpus_tx).await;

        // the protocol is push-only; stray client frames are ignored
        socket
            .send(tungstenite::Message::Text("hello?".into()))
            .await
            .unwrap();

        cpus_tx.send(vec![1.0]).unwrap();
        let frame = socket.next().await.unwrap().unwrap();
        assert!(matches!(frame, tungstenite::Message::Text(_)));

        socket.close(None).await.unwrap();
    }
}
