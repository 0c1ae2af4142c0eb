// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A wiremock responder serving a byte buffer with `Range` support.
//!
//! Handles `bytes=a-b`, `bytes=a-` and suffix `bytes=-n` ranges with
//! `206 Partial Content`. Requests without a range get the whole body.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use wiremock::{Request, Respond, ResponseTemplate};

/// Serves `body` honoring single byte ranges, counting ranged requests.
#[derive(Clone)]
pub struct RangeResponder {
    body: Arc<Vec<u8>>,
    ranged_requests: Arc<AtomicUsize>,
}

impl RangeResponder {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            ranged_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `Range` requests served so far, across clones.
    pub fn ranged_requests(&self) -> usize {
        self.ranged_requests.load(Ordering::SeqCst)
    }

    fn parse(&self, header: &str) -> Option<(usize, usize)> {
        let len = self.body.len();
        let range = header.trim().strip_prefix("bytes=")?;
        let (start, end) = range.split_once('-')?;
        if start.is_empty() {
            let suffix: usize = end.parse().ok()?;
            return Some((len.saturating_sub(suffix), len.checked_sub(1)?));
        }
        let start: usize = start.parse().ok()?;
        let end = if end.is_empty() {
            len.checked_sub(1)?
        } else {
            end.parse::<usize>().ok()?.min(len.checked_sub(1)?)
        };
        (start <= end).then_some((start, end))
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(range) = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
        else {
            return ResponseTemplate::new(200).set_body_bytes(self.body.as_slice());
        };

        self.ranged_requests.fetch_add(1, Ordering::SeqCst);
        match self.parse(range) {
            Some((start, end)) => ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {start}-{end}/{}", self.body.len()).as_str(),
                )
                .set_body_bytes(&self.body[start..=end]),
            None => ResponseTemplate::new(416)
                .insert_header("content-range", format!("bytes */{}", self.body.len()).as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer};

    #[tokio::test]
    async fn serves_requested_slices() {
        let server = MockServer::start().await;
        let responder = RangeResponder::new((0u8..100).collect());
        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/blob", server.uri());

        let resp = client.get(&url).header("range", "bytes=10-19").send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 206);
        assert_eq!(
            resp.headers()["content-range"].to_str().unwrap(),
            "bytes 10-19/100"
        );
        assert_eq!(resp.bytes().await.unwrap().as_ref(), &(10u8..20).collect::<Vec<_>>()[..]);

        let resp = client.get(&url).header("range", "bytes=-5").send().await.unwrap();
        assert_eq!(resp.bytes().await.unwrap().as_ref(), &[95, 96, 97, 98, 99]);

        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(responder.ranged_requests(), 2);
    }
}
