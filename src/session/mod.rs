//! Per-connection TCP session (component 4.E), grounded in
//! `original_source/server.c`'s per-client worker thread, translated into
//! one `tokio::spawn`-ed task per connection.

pub mod command;

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::room::GlobalState;
use crate::store::Role;

/// Matches `original_source/common.h`'s line buffer size.
const MAX_LINE_BYTES: usize = 8192;

pub struct Session {
    pub authenticated: bool,
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    /// Correct answer for whatever question `PRACTICE` last handed out.
    pub practice_correct: Option<char>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            authenticated: false,
            user_id: 0,
            username: String::new(),
            role: Role::Student,
            practice_correct: None,
        }
    }
}

pub async fn handle_connection(socket: TcpStream, peer: std::net::SocketAddr, state: Arc<Mutex<GlobalState>>) {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut session = Session::default();
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await;
        match read {
            Ok(0) => break,
            Ok(_) if line.len() > MAX_LINE_BYTES => {
                if write_half.write_all(b"FAIL Request too large\n").await.is_err() {
                    break;
                }
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("read error from {}: {}", peer, err);
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!("{} -> {}", peer, trimmed);

        let should_exit = trimmed.eq_ignore_ascii_case("EXIT");
        let response = match command::parse(trimmed) {
            Ok(cmd) => {
                let mut guard = state.lock().await;
                command::dispatch(cmd, &mut session, &mut guard).await
            }
            Err(err) => format!("FAIL {}\n", err),
        };

        if !response.is_empty() && write_half.write_all(response.as_bytes()).await.is_err() {
            break;
        }
        if should_exit {
            break;
        }
    }

    info!("connection closed: {}", peer);
}

#[cfg(all(test, feature = "sql"))]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use crate::room::GlobalState;
    use crate::store::Store;

    async fn spawn_server() -> std::net::SocketAddr {
        let store = Store::open_in_memory().await.unwrap();
        let state = Arc::new(Mutex::new(GlobalState::new(
            store,
            "secret".to_string(),
            "test.log".to_string(),
        )));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, peer) = listener.accept().await.unwrap();
            handle_connection(socket, peer, state).await;
        });
        addr
    }

    async fn read_response(stream: &mut TcpStream) -> String {
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).to_string()
    }

    #[tokio::test]
    async fn register_then_login_round_trip_over_tcp() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"REGISTER alice hunter2\n").await.unwrap();
        let reply = read_response(&mut stream).await;
        assert!(reply.starts_with("SUCCESS"), "unexpected reply: {}", reply);

        stream.write_all(b"LOGIN alice hunter2\n").await.unwrap();
        let reply = read_response(&mut stream).await;
        assert!(reply.starts_with("SUCCESS"), "unexpected reply: {}", reply);
    }

    #[tokio::test]
    async fn oversized_line_gets_rejected_without_closing_connection() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let huge = "x".repeat(MAX_LINE_BYTES + 100);
        stream.write_all(huge.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
        let reply = read_response(&mut stream).await;
        assert_eq!(reply, "FAIL Request too large\n");

        stream.write_all(b"REGISTER bob hunter2\n").await.unwrap();
        let reply = read_response(&mut stream).await;
        assert!(reply.starts_with("SUCCESS"));
    }

    #[tokio::test]
    async fn exit_closes_the_connection() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"EXIT\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "server should close after EXIT");
    }
}
