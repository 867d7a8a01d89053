//! Scripted HTTP exchange for driving the client without a network.
//!
//! Replies are queued per path (the URL minus the host). The last reply
//! queued for a path repeats once the queue drains, so a single
//! `reply("submissions/1", ...)` answers every poll.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use skyplate::client::{EncodedRequest, HttpExchange, NovaClient, RawResponse, Transport};

pub const HOST: &str = "http://nova.test/";
pub const BASE_URL: &str = "http://nova.test/api/";

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16, String),
    Bytes(Vec<u8>),
    NetworkError(String),
}

/// One call as the service saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    /// Decoded `request-json` object, for POSTs.
    pub args: Option<Value>,
    /// Filename and bytes of an uploaded file part.
    pub file: Option<(String, Vec<u8>)>,
    pub headers: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn session(&self) -> Option<&str> {
        self.args.as_ref()?.get("session")?.as_str()
    }
}

#[derive(Default)]
pub struct ScriptedExchange {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a reply for an API service, e.g. `"login"` or `"jobs/7"`.
    pub fn reply(&self, service: &str, reply: Reply) -> &Self {
        self.queue(format!("api/{}", service), reply)
    }

    pub fn json(&self, service: &str, body: Value) -> &Self {
        self.reply(service, Reply::Json(body))
    }

    /// Queues bytes for a result file path, e.g. `"wcs_file/7"`.
    pub fn file(&self, path: &str, bytes: &[u8]) -> &Self {
        self.queue(path.to_string(), Reply::Bytes(bytes.to_vec()))
    }

    pub fn file_reply(&self, path: &str, reply: Reply) -> &Self {
        self.queue(path.to_string(), reply)
    }

    fn queue(&self, path: String, reply: Reply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(path)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made to one API service, in order.
    pub fn calls_to(&self, service: &str) -> Vec<RecordedCall> {
        let path = format!("api/{}", service);
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    pub fn count(&self, service: &str) -> usize {
        self.calls_to(service).len()
    }

    fn next_reply(&self, path: &str) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Reply::Status(404, format!("no script for {}", path)),
        }
    }

    fn respond(&self, path: &str) -> Result<RawResponse, String> {
        match self.next_reply(path) {
            Reply::Json(value) => Ok(RawResponse {
                status: 200,
                body: serde_json::to_vec(&value).unwrap(),
            }),
            Reply::Status(status, body) => Ok(RawResponse {
                status,
                body: body.into_bytes(),
            }),
            Reply::Bytes(body) => Ok(RawResponse { status: 200, body }),
            Reply::NetworkError(message) => Err(message),
        }
    }
}

fn path_of(url: &str) -> String {
    url.strip_prefix(HOST).unwrap_or(url).to_string()
}

/// Pulls the `request-json` object and any file part out of an encoded body.
fn decode_request(request: &EncodedRequest) -> (Option<Value>, Option<(String, Vec<u8>)>) {
    match request.boundary() {
        None => {
            let args = url::form_urlencoded::parse(&request.body)
                .find(|(key, _)| key == "request-json")
                .and_then(|(_, json)| serde_json::from_str(&json).ok());
            (args, None)
        }
        Some(boundary) => {
            let body = String::from_utf8_lossy(&request.body).into_owned();
            let parts: Vec<&str> = body.split(&format!("--{}", boundary)).collect();

            let content = |part: &str| -> String {
                part.split_once("\r\n\r\n")
                    .map(|(_, content)| content.strip_suffix("\r\n").unwrap_or(content))
                    .unwrap_or_default()
                    .to_string()
            };

            let args = parts
                .get(1)
                .and_then(|part| serde_json::from_str(&content(part)).ok());
            let file = parts.get(2).map(|part| {
                let filename = part
                    .split("filename=\"")
                    .nth(1)
                    .and_then(|rest| rest.split('"').next())
                    .unwrap_or_default()
                    .to_string();
                (filename, content(part).into_bytes())
            });
            (args, file)
        }
    }
}

#[async_trait]
impl HttpExchange for ScriptedExchange {
    async fn post(&self, url: &str, request: EncodedRequest) -> Result<RawResponse, String> {
        let path = path_of(url);
        let (args, file) = decode_request(&request);
        self.calls.lock().unwrap().push(RecordedCall {
            method: "POST",
            path: path.clone(),
            args,
            file,
            headers: request.headers.clone(),
        });
        self.respond(&path)
    }

    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<RawResponse, String> {
        let path = path_of(url);
        self.calls.lock().unwrap().push(RecordedCall {
            method: "GET",
            path: path.clone(),
            args: None,
            file: None,
            headers: headers.to_vec(),
        });
        self.respond(&path)
    }
}

/// A client talking to `exchange`, with no session yet.
pub fn client(exchange: &Arc<ScriptedExchange>) -> NovaClient {
    let exchange: Arc<dyn HttpExchange> = exchange.clone();
    NovaClient::new(Transport::new(BASE_URL, exchange))
}
