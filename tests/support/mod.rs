#![allow(dead_code)]

use std::time::Duration;

use bigip_xfer::{ApplianceClient, Credentials, TransferSettings};
use wiremock::{Request, Respond, ResponseTemplate};

pub const USER: &str = "admin";
pub const PASS: &str = "admin";

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub fn settings(chunk_size: u64) -> TransferSettings {
    TransferSettings {
        chunk_size,
        timeout: Duration::from_secs(5),
        ..TransferSettings::default()
    }
}

pub fn client(base_url: &str, settings: TransferSettings) -> ApplianceClient {
    ApplianceClient::with_base_url(base_url, Credentials::new(USER, PASS), settings).unwrap()
}

pub fn content_range(req: &Request) -> String {
    req.headers
        .get("content-range")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `(start, end)` from a `start-end/total` request header.
pub fn parse_window(header: &str) -> Option<(u64, u64)> {
    let (window, _) = header.split_once('/')?;
    let (start, end) = window.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

/// Serves `data` the way the appliance does: the requested window, clipped to
/// the file, with `Content-Range: start-end/total`. Windows starting at or past
/// `fail_from` get a 400.
pub struct ServeFile {
    pub data: Vec<u8>,
    pub fail_from: Option<u64>,
}

impl ServeFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, fail_from: None }
    }

    pub fn failing_from(data: Vec<u8>, offset: u64) -> Self {
        Self { data, fail_from: Some(offset) }
    }
}

impl Respond for ServeFile {
    fn respond(&self, req: &Request) -> ResponseTemplate {
        let total = self.data.len() as u64;
        let Some((start, end)) = parse_window(&content_range(req)) else {
            return ResponseTemplate::new(400);
        };

        if self.fail_from.is_some_and(|offset| start >= offset) {
            return ResponseTemplate::new(400);
        }

        if total == 0 {
            return ResponseTemplate::new(200).insert_header("Content-Range", "*/0");
        }

        let end = end.min(total - 1);
        if start > end {
            return ResponseTemplate::new(400);
        }

        ResponseTemplate::new(200)
            .insert_header("Content-Range", format!("{}-{}/{}", start, end, total).as_str())
            .set_body_bytes(self.data[start as usize..=end as usize].to_vec())
    }
}

/// Rebuilds a file from captured upload requests by placing each body at the
/// start offset named in its `Content-Range` header.
pub fn reassemble(requests: &[Request]) -> Vec<u8> {
    let mut out = Vec::new();
    for req in requests {
        let (start, _) = parse_window(&content_range(req)).unwrap();
        let start = start as usize;
        if out.len() < start + req.body.len() {
            out.resize(start + req.body.len(), 0);
        }
        out[start..start + req.body.len()].copy_from_slice(&req.body);
    }
    out
}
