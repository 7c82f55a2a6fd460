//! Minimal single-request-per-connection HTTP/1.1 server for the seed
//! scenarios (§8). Serves a default status/body/delay for any path, with
//! per-path override sequences (consumed in order, sticking on the last
//! entry once exhausted) for the retry and partial-failure scenarios.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl StubResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self { status: 200, body: body.into(), delay: Duration::ZERO }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: Vec::new(), delay: Duration::ZERO }
    }

    pub fn delayed(body: impl Into<Vec<u8>>, delay: Duration) -> Self {
        Self { status: 200, body: body.into(), delay }
    }
}

struct ServerState {
    default: StubResponse,
    per_path: HashMap<String, VecDeque<StubResponse>>,
    sticky: HashMap<String, StubResponse>,
}

pub struct StubServer {
    pub base_url: String,
}

/// Starts a background-thread server answering every request with
/// `default` unless `overrides` has a (still-unconsumed or sticky) entry
/// for that path.
pub fn start(default: StubResponse, overrides: HashMap<String, Vec<StubResponse>>) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let port = listener.local_addr().unwrap().port();

    let state = Arc::new(Mutex::new(ServerState {
        default,
        per_path: overrides.into_iter().map(|(k, v)| (k, v.into())).collect(),
        sticky: HashMap::new(),
    }));

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&state);
            thread::spawn(move || handle(stream, &state));
        }
    });

    StubServer { base_url: format!("http://127.0.0.1:{port}") }
}

fn handle(mut stream: std::net::TcpStream, state: &Mutex<ServerState>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    let response = {
        let mut guard = state.lock().unwrap();
        if let Some(queue) = guard.per_path.get_mut(&path) {
            if let Some(next) = queue.pop_front() {
                guard.sticky.insert(path.clone(), next.clone());
                next
            } else if let Some(last) = guard.sticky.get(&path) {
                last.clone()
            } else {
                guard.default.clone()
            }
        } else {
            guard.default.clone()
        }
    };

    if !response.delay.is_zero() {
        thread::sleep(response.delay);
    }

    let status_text = match response.status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        other => return write_raw(&mut stream, other, &[]),
    };
    let header = format!(
        "HTTP/1.1 {status_text}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&response.body);
}

fn write_raw(stream: &mut std::net::TcpStream, status: u16, body: &[u8]) {
    let header = format!(
        "HTTP/1.1 {status} Error\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
}
