//! Connection manager: TCP listener, per-socket reader/writer threads, and
//! the connection state machine.
//!
//! State machine per socket:
//! connected -> authenticating (first frame must be CMD_AUTHENTICATE)
//!           -> authenticated (active loop) -> disconnected
//! Auth failure or a protocol-version mismatch answers with RESP_ERROR and
//! closes the socket. Inbound frames are handled in arrival order on the
//! reader thread; outbound frames flow through the session's bounded queue
//! to the writer thread.

use std::io::Write;
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use common::protocol::{
    codes, read_frame, write_frame, ChunkUpdatePayload, ErrorCategory, ErrorPayload, Frame,
    MessageType, PlayerJoinedPayload, PROTOCOL_VERSION,
};

use crate::context::ServerContext;
use crate::handlers;
use crate::map::TileMap;
use crate::session::Session;

/// How long an unauthenticated socket may sit before the first frame.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept loop. Returns when shutdown is requested.
pub fn run_listener(ctx: &Arc<ServerContext>) -> Result<(), String> {
    let addr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);
    let listener =
        TcpListener::bind(&addr).map_err(|e| format!("Failed to bind {addr}: {e}"))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| format!("Failed to set listener non-blocking: {e}"))?;
    log::info!("Listening on {addr}");

    loop {
        if ctx.is_shutting_down() {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                log::info!("Connection from {peer}");
                let ctx = Arc::clone(ctx);
                if let Err(e) = std::thread::Builder::new()
                    .name(format!("conn-{peer}"))
                    .spawn(move || handle_connection(&ctx, stream))
                {
                    log::error!("Failed to spawn connection thread: {e}");
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                log::error!("Accept failed: {e}");
                std::thread::sleep(Duration::from_millis(200));
            }
        }
    }

    Ok(())
}

fn close(stream: &TcpStream) {
    let _ = stream.shutdown(Shutdown::Both);
}

fn write_direct(stream: &mut TcpStream, frame: &Frame) {
    if let Err(e) = write_frame(stream, frame) {
        log::debug!("Write during handshake failed: {e}");
    }
}

fn handle_connection(ctx: &Arc<ServerContext>, mut stream: TcpStream) {
    let _ = stream.set_nodelay(true);
    let _ = stream.set_read_timeout(Some(AUTH_TIMEOUT));

    // ---- AUTHENTICATING: the first frame must be CMD_AUTHENTICATE. ----
    let first = match read_frame(&mut stream) {
        Ok(frame) => frame,
        Err(e) => {
            log::debug!("Handshake read failed: {e}");
            close(&stream);
            return;
        }
    };

    if first.version != PROTOCOL_VERSION {
        write_direct(
            &mut stream,
            &Frame::error(
                first.id.clone(),
                &ErrorPayload::new(
                    codes::VERSION_MISMATCH,
                    ErrorCategory::Validation,
                    format!(
                        "Protocol version {} not supported (server speaks {PROTOCOL_VERSION})",
                        first.version
                    ),
                ),
            ),
        );
        close(&stream);
        return;
    }
    if first.msg_type != MessageType::CmdAuthenticate {
        write_direct(
            &mut stream,
            &Frame::error(
                first.id.clone(),
                &ErrorPayload::new(
                    codes::AUTH_REQUIRED,
                    ErrorCategory::Permission,
                    "Authenticate first",
                ),
            ),
        );
        close(&stream);
        return;
    }

    let (row, runtime) = match handlers::auth::authenticate(ctx, &first) {
        Ok(result) => result,
        Err(error) => {
            write_direct(&mut stream, &Frame::error(first.id.clone(), &error));
            close(&stream);
            return;
        }
    };
    let player_id = runtime.player_id;

    // A reconnect replaces any lingering session for the same account.
    if let Some(stale) = ctx.sessions.unregister(player_id) {
        log::info!("Replacing stale session for player {player_id}");
        stale.mark_disconnected();
    }

    let (session, outbound_rx) = Session::new(
        player_id,
        runtime.username.clone(),
        row.role,
        runtime.map_id.clone(),
    );
    ctx.sessions.register(Arc::clone(&session));

    // ---- AUTHENTICATED: split into writer thread + reader loop. ----
    let _ = stream.set_read_timeout(None);
    let writer_stream = match stream.try_clone() {
        Ok(clone) => clone,
        Err(e) => {
            log::error!("Cloning stream for player {player_id}: {e}");
            ctx.logout_player(player_id, "socket error");
            close(&stream);
            return;
        }
    };
    let writer_session = Arc::clone(&session);
    let writer = std::thread::Builder::new()
        .name(format!("send-{player_id}"))
        .spawn(move || {
            let mut stream = writer_stream;
            while let Ok(frame) = outbound_rx.recv() {
                if let Err(e) = write_frame(&mut stream, &frame) {
                    log::debug!("Send to player {player_id} failed: {e}");
                    writer_session.mark_disconnected();
                    break;
                }
            }
            let _ = stream.flush();
            let _ = stream.shutdown(Shutdown::Both);
        });
    if let Err(e) = writer {
        log::error!("Failed to spawn writer for player {player_id}: {e}");
        ctx.logout_player(player_id, "internal error");
        close(&stream);
        return;
    }

    // Handshake replies: success, welcome snapshot, initial chunks, and a
    // join announcement for observers.
    match ctx.welcome_payload(&row, &runtime) {
        Ok(welcome) => {
            handlers::send_success(&session, first.id.clone(), &serde_json::json!({}));
            match Frame::event(MessageType::EventWelcome, &welcome) {
                Ok(frame) => {
                    session.send(frame);
                }
                Err(e) => log::error!("Encoding welcome for {player_id}: {e}"),
            }
        }
        Err(e) => {
            log::error!("Building welcome for {player_id}: {e}");
            handlers::send_error(
                &session,
                first.id.clone(),
                codes::SYS_INTERNAL_ERROR,
                ErrorCategory::System,
                "Login failed",
            );
            ctx.logout_player(player_id, "welcome failure");
            return;
        }
    }
    send_initial_chunks(ctx, &session, &runtime.map_id, (runtime.x, runtime.y));

    // Replay the recent chat history so the channel isn't empty on arrival.
    for message in ctx.chat.recent(10) {
        if let Ok(frame) = Frame::event(MessageType::EventChatMessage, &message) {
            session.send(frame);
        }
    }

    let joined = PlayerJoinedPayload {
        player_id,
        username: runtime.username.clone(),
        map_id: runtime.map_id.clone(),
        x: runtime.x,
        y: runtime.y,
    };
    if let Ok(frame) = Frame::event(MessageType::EventPlayerJoined, &joined) {
        ctx.broadcast_to_observers(&runtime.map_id, (runtime.x, runtime.y), frame, Some(player_id));
    }
    log::info!("Player {} ({player_id}) entered the world", runtime.username);

    // ---- ACTIVE LOOP ----
    loop {
        if session.is_disconnected() || ctx.is_shutting_down() {
            break;
        }
        let frame = match read_frame(&mut stream) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Read from player {player_id} ended: {e}");
                break;
            }
        };
        if frame.version != PROTOCOL_VERSION {
            handlers::send_error(
                &session,
                frame.id.clone(),
                codes::VERSION_MISMATCH,
                ErrorCategory::Validation,
                "Protocol version mismatch",
            );
            break;
        }
        handlers::dispatch(ctx, &session, &frame);
    }

    ctx.logout_player(player_id, "socket closed");
    close(&stream);
}

/// Push the chunks around the login position so the client can render
/// before its first QUERY_MAP_CHUNKS.
fn send_initial_chunks(
    ctx: &Arc<ServerContext>,
    session: &Arc<Session>,
    map_id: &str,
    position: (i32, i32),
) {
    let Some(map) = ctx.maps.get(map_id) else {
        return;
    };
    let radius = ctx.config.maps.chunk_radius;
    let (ccx, ccy) = TileMap::chunk_of(position.0, position.1);
    let mut chunks = Vec::new();
    for cy in (ccy - radius)..=(ccy + radius) {
        for cx in (ccx - radius)..=(ccx + radius) {
            if let Some(chunk) = map.chunk(cx, cy) {
                chunks.push(chunk);
            }
        }
    }
    let payload = ChunkUpdatePayload {
        map_id: map_id.to_string(),
        chunks,
    };
    if let Ok(frame) = Frame::event(MessageType::EventChunkUpdate, &payload) {
        session.send(frame);
    }
}
