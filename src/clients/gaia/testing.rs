use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use futures_util::StreamExt;

use super::{ChatTransport, RelayError, TransportResponse, UpstreamEventStream};

/// Canned transport for relay tests: replays a fixed status and body (or
/// stream chunks) and counts every outbound call it receives.
pub struct StubTransport {
    status: u16,
    body: Bytes,
    chunks: Vec<Bytes>,
    calls: AtomicUsize,
    sent: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn replying(status: u16, body: &str) -> Self {
        StubTransport {
            status,
            body: Bytes::from(body.to_string()),
            chunks: Vec::new(),
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn streaming(status: u16, chunks: &[&str]) -> Self {
        StubTransport {
            status,
            body: Bytes::new(),
            chunks: chunks.iter().map(|c| Bytes::from(c.to_string())).collect(),
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent_bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, body: String) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(body);
    }
}

impl ChatTransport for StubTransport {
    async fn post_json(
        &self,
        _url: &str,
        _api_key: &str,
        body: String,
    ) -> Result<TransportResponse, RelayError> {
        self.record(body);
        Ok(TransportResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }

    async fn post_json_stream(
        &self,
        _url: &str,
        _api_key: &str,
        body: String,
    ) -> Result<UpstreamEventStream, RelayError> {
        self.record(body);
        let chunks: Vec<Result<Bytes, RelayError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(UpstreamEventStream {
            status: self.status,
            bytes: futures_util::stream::iter(chunks).boxed(),
        })
    }

    async fn get_json(&self, _url: &str, _api_key: &str) -> Result<TransportResponse, RelayError> {
        self.record(String::new());
        Ok(TransportResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}
