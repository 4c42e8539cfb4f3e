//! In-process S3 endpoint for tests that go over real HTTP.
//!
//! Serves path-style requests (`/<bucket>/<key>`) from a map, answers
//! missing keys with a `NoSuchKey` error document, and records every
//! request it sees.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// One request as received by [`MockS3`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct State {
    objects: HashMap<String, Vec<u8>>,
    requests: Vec<RecordedRequest>,
}

pub struct MockS3 {
    port: u16,
    state: Arc<Mutex<State>>,
}

impl MockS3 {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));

        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let state = Arc::clone(&shared);
                thread::spawn(move || {
                    let _ = serve(stream, &state);
                });
            }
        });

        Self { port, state }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Configuration document pointing at this endpoint, with `extra`
    /// JSON members appended.
    pub fn config(&self, bucket: &str, extra: &str) -> String {
        let mut doc = format!(
            r#"{{"bucket_name": "{bucket}", "host": "127.0.0.1", "port": {}, "use_ssl": false"#,
            self.port
        );
        if !extra.is_empty() {
            doc.push_str(", ");
            doc.push_str(extra);
        }
        doc.push('}');
        doc
    }

    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state
            .objects
            .insert(format!("/{bucket}/{key}"), data.to_vec());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.objects.get(&format!("/{bucket}/{key}")).cloned()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

struct Reply {
    status: &'static str,
    content_length: usize,
    body: Vec<u8>,
}

impl Reply {
    fn empty(status: &'static str) -> Self {
        Self {
            status,
            content_length: 0,
            body: Vec::new(),
        }
    }

    fn with_body(status: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_length: body.len(),
            body,
        }
    }

    fn no_such_key(key: &str) -> Self {
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>NoSuchKey</Code>\
             <Message>The specified key does not exist.</Message><Key>{key}</Key></Error>"
        );
        Self::with_body("404 Not Found", xml.into_bytes())
    }
}

fn serve(stream: TcpStream, state: &Mutex<State>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line)? == 0 {
            return Ok(());
        }
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let target = parts.next().unwrap_or_default().to_string();

        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        if headers
            .get("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
        {
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n")?;
        }
        let length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = vec![0; length];
        reader.read_exact(&mut body)?;

        let path = target.split('?').next().unwrap_or_default().to_string();
        let reply = {
            let mut state = state.lock().unwrap();
            state.requests.push(RecordedRequest {
                method: method.clone(),
                path: path.clone(),
                headers,
            });
            respond(&mut state.objects, &method, &path, body)
        };

        let mut head = format!("HTTP/1.1 {}\r\n", reply.status);
        if !reply.status.starts_with("204") {
            head.push_str(&format!("Content-Length: {}\r\n", reply.content_length));
        }
        if reply.status.starts_with("404") && method != "HEAD" {
            head.push_str("Content-Type: application/xml\r\n");
        }
        if method == "PUT" {
            head.push_str("ETag: \"0\"\r\n");
        }
        head.push_str("\r\n");
        writer.write_all(head.as_bytes())?;
        if method != "HEAD" {
            writer.write_all(&reply.body)?;
        }
        writer.flush()?;
    }
}

fn respond(
    objects: &mut HashMap<String, Vec<u8>>,
    method: &str,
    path: &str,
    body: Vec<u8>,
) -> Reply {
    let key = path.rsplit('/').next().unwrap_or_default();
    match method {
        "PUT" => {
            objects.insert(path.to_string(), body);
            Reply::empty("200 OK")
        }
        "GET" => match objects.get(path) {
            Some(data) => Reply::with_body("200 OK", data.clone()),
            None => Reply::no_such_key(key),
        },
        "HEAD" => match objects.get(path) {
            Some(data) => Reply {
                status: "200 OK",
                content_length: data.len(),
                body: Vec::new(),
            },
            None => Reply::empty("404 Not Found"),
        },
        "DELETE" => match objects.remove(path) {
            Some(_) => Reply::empty("204 No Content"),
            None => Reply::no_such_key(key),
        },
        _ => Reply::empty("405 Method Not Allowed"),
    }
}
