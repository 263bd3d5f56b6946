use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use ipnet::IpNet;
use pingmon_core::{ApiReply, AuthRequest, SubscriberFeed, TargetRegistry};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

pub struct AppState {
    pub registry: Arc<TargetRegistry>,
    pub feed: Arc<SubscriberFeed>,
    pub allowed: Vec<IpNet>,
    pub project_path: Option<PathBuf>,
}

/// Comma-separated subnet list, e.g. `127.0.0.0/8,10.0.0.0/8`. Use
/// `0.0.0.0/0` to admit everyone.
pub fn parse_allow_list(spec: &str) -> Result<Vec<IpNet>> {
    spec.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<IpNet>()
                .with_context(|| format!("invalid subnet '{part}'"))
        })
        .collect()
}

pub async fn serve(listen: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("unable to bind {listen}"))?;
    info!(%listen, "web interface listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("web server failed")
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/WebsocketToken", get(websocket_token))
        .route("/AddCheck", post(add_check))
        .route("/EditCheck", post(edit_check))
        .route("/DeleteCheck/:addr", post(delete_check))
        .route("/ToggleCheck/:addr", post(toggle_check))
        .route("/PauseAllChecks", post(pause_all_checks))
        .route("/ResumeAllChecks", post(resume_all_checks))
        .route("/SaveChanges", post(save_changes))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

pub(crate) fn whitelisted(state: &AppState, peer: &SocketAddr) -> bool {
    state.allowed.iter().any(|net| net.contains(&peer.ip()))
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiReply::fail(
            "your address is not approved to access this facility",
        )),
    )
        .into_response()
}

fn reply<E: std::fmt::Display>(outcome: Result<(), E>) -> Response {
    match outcome {
        Ok(()) => Json(ApiReply::ok()).into_response(),
        Err(err) => Json(ApiReply::fail(err.to_string())).into_response(),
    }
}

fn parse_address(text: &str) -> Result<IpAddr, Response> {
    text.trim().parse::<IpAddr>().map_err(|_| {
        Json(ApiReply::fail(format!("'{}' is not a valid IP address", text.trim()))).into_response()
    })
}

pub(crate) async fn websocket_token(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    Json(ApiReply::ok_with(state.feed.issue_token())).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddCheckBody {
    pub(crate) addr: String,
    pub(crate) displayname: String,
}

pub(crate) async fn add_check(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<AddCheckBody>,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    let address = match parse_address(&body.addr) {
        Ok(address) => address,
        Err(response) => return response,
    };
    reply(state.registry.create(&body.displayname, address, false))
}

#[derive(Debug, Deserialize)]
pub(crate) struct EditCheckBody {
    pub(crate) oldaddr: String,
    pub(crate) newaddr: String,
    pub(crate) displayname: String,
}

pub(crate) async fn edit_check(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<EditCheckBody>,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    let old = match parse_address(&body.oldaddr) {
        Ok(address) => address,
        Err(response) => return response,
    };
    let new = match parse_address(&body.newaddr) {
        Ok(address) => address,
        Err(response) => return response,
    };

    if let Err(err) = state.registry.re_address(old, new).await {
        return reply(Err::<(), _>(err));
    }
    reply(state.registry.rename(new, &body.displayname))
}

pub(crate) async fn delete_check(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(addr): Path<String>,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    let address = match parse_address(&addr) {
        Ok(address) => address,
        Err(response) => return response,
    };
    reply(state.registry.remove(address).await)
}

pub(crate) async fn toggle_check(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(addr): Path<String>,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    let address = match parse_address(&addr) {
        Ok(address) => address,
        Err(response) => return response,
    };
    reply(state.registry.toggle(address).await)
}

pub(crate) async fn pause_all_checks(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    state.registry.pause_all().await;
    Json(ApiReply::ok()).into_response()
}

pub(crate) async fn resume_all_checks(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    state.registry.resume_all().await;
    Json(ApiReply::ok()).into_response()
}

pub(crate) async fn save_changes(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    match &state.project_path {
        Some(path) => reply(crate::save_project(path, &state.registry.snapshot())),
        None => Json(ApiReply::fail(
            "no project file is configured; start the daemon with --project",
        ))
        .into_response(),
    }
}

pub(crate) async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    if !whitelisted(&state, &peer) {
        return forbidden();
    }
    ws.on_upgrade(move |socket| ws_session(socket, state))
}

async fn ws_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();

    if let Some(reason) = authenticate(&state, &mut stream).await {
        let _ = send_json(&mut sink, &ApiReply::fail(reason)).await;
        let _ = sink.close().await;
        return;
    }
    if send_json(&mut sink, &ApiReply::ok()).await.is_err() {
        return;
    }

    // Subscribe before replaying the snapshot so no update is missed in
    // between; an update crossing the replay repeats at most once.
    let mut events = state.feed.subscribe();
    for handle in state.registry.handles() {
        if send_json(&mut sink, &handle.snapshot_event()).await.is_err() {
            return;
        }
    }
    info!("dashboard session authenticated");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_json(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    // The session fell behind the feed; resend the full
                    // picture rather than leaving stale panels.
                    warn!(missed, "dashboard session lagged, resynchronising");
                    for handle in state.registry.handles() {
                        if send_json(&mut sink, &handle.snapshot_event()).await.is_err() {
                            return;
                        }
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                // Clients only speak during the handshake; drain and ignore.
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }

    debug!("dashboard session closed");
}

/// Returns a rejection reason, or None when the session authenticated.
async fn authenticate(state: &AppState, stream: &mut SplitStream<WebSocket>) -> Option<&'static str> {
    match stream.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<AuthRequest>(&text) {
            Ok(auth) if state.feed.redeem_token(&auth.token) => None,
            Ok(_) => Some("token is invalid or already used"),
            Err(_) => Some("malformed authentication message"),
        },
        _ => Some("expected an authentication message"),
    }
}

async fn send_json<T: serde::Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).map_err(axum::Error::new)?;
    sink.send(Message::Text(text)).await
}
