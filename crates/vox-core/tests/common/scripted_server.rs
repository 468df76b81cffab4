//! Minimal HTTP/1.1 server that replays scripted responses for integration tests.
//!
//! Each incoming request consumes the next response in the script; once the
//! script runs out the last response is repeated. Every request head is
//! recorded so tests can assert on hit counts and headers.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Scripted {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

struct State {
    script: VecDeque<Scripted>,
    last: Option<Scripted>,
    requests: Vec<String>,
}

/// Handle to a running server. The server runs until the process exits.
#[derive(Clone)]
pub struct ScriptedServer {
    pub base_url: String,
    state: Arc<Mutex<State>>,
}

impl ScriptedServer {
    /// Number of requests served so far.
    pub fn hits(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Raw request heads (request line + headers) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

/// Starts a server in a background thread. Returns a handle whose `base_url`
/// looks like "http://127.0.0.1:12345".
pub fn start(script: Vec<Scripted>) -> ScriptedServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State {
        script: script.into(),
        last: None,
        requests: Vec::new(),
    }));
    let server_state = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&server_state);
            thread::spawn(move || handle(stream, &state));
        }
    });
    ScriptedServer {
        base_url: format!("http://127.0.0.1:{}", port),
        state,
    }
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let head = match read_request(&mut stream) {
        Some(h) => h,
        None => return,
    };

    let response = {
        let mut st = state.lock().unwrap();
        st.requests.push(head);
        let next = st.script.pop_front().or_else(|| st.last.clone());
        if let Some(r) = &next {
            st.last = Some(r.clone());
        }
        next.unwrap_or_else(|| Scripted::new(500, "script empty"))
    };

    let mut out = format!("HTTP/1.1 {} Scripted\r\n", response.status);
    for (k, v) in &response.headers {
        out.push_str(&format!("{}: {}\r\n", k, v));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.body.len()
    ));
    let _ = stream.write_all(out.as_bytes());
    let _ = stream.write_all(&response.body);
    let _ = stream.flush();
}

/// Reads the request head and drains any `Content-Length` body. Returns the head.
fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();

    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut have = buf.len() - (head_end + 4);
    while have < content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => have += n,
        }
    }
    Some(head)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
