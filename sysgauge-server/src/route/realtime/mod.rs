use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use tracing::{Instrument, debug_span};

use crate::AppState;

mod egress;

pub async fn cpus_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let rx = state.cpus_tx.subscribe();
    ws.on_upgrade(move |socket| {
        egress::handle_socket(socket, state, rx).instrument(debug_span!("realtime_ws", metric = "cpus"))
    })
}

pub async fn ram_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let rx = state.ram_tx.subscribe();
    ws.on_upgrade(move |socket| {
        egress::handle_socket(socket, state, rx).instrument(debug_span!("realtime_ws", metric = "ram"))
    })
}
