// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Random-access reads of a remote zip archive over HTTP range requests.
//!
//! Firmware archives run to several gigabytes while the manifest inside is a
//! few hundred kilobytes. [`HttpRangeReader`] exposes the remote file as
//! `Read + Seek` so `zip::ZipArchive` only pulls the central directory and the
//! one member it decompresses.
//!
//! Everything here is blocking; callers run it on `spawn_blocking`.

use std::io::{self, Read, Seek, SeekFrom};

use betasign_core::BetasignError;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, RANGE};
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOCATION: u64 = 16 << 20;

/// `Read + Seek` view of a remote file, fetched one block at a time.
pub struct HttpRangeReader {
    client: Client,
    url: reqwest::Url,
    len: u64,
    pos: u64,
    block_size: u64,
    buf_start: u64,
    buf: Vec<u8>,
}

impl HttpRangeReader {
    /// Open `url`, fetching its last block and learning the total size.
    ///
    /// The tail holds the zip end-of-central-directory record, so the first
    /// reads `ZipArchive` makes are served from this block.
    pub fn open(client: Client, url: reqwest::Url, block_size: u64) -> Result<Self, BetasignError> {
        let block_size = block_size.max(1);
        let response = client
            .get(url.clone())
            .header(RANGE, format!("bytes=-{block_size}"))
            .send()
            .map_err(request_error)?;

        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT {
            return Err(status_error(status, &url));
        }

        let (start, len) = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| BetasignError::malformed(format!("{url}: missing or invalid Content-Range")))?;
        let buf = response.bytes().map_err(request_error)?.to_vec();
        debug!(%url, len, tail = buf.len(), "opened remote archive");

        Ok(Self {
            client,
            url,
            len,
            pos: 0,
            block_size,
            buf_start: start,
            buf,
        })
    }

    fn buffered(&self, pos: u64) -> bool {
        pos >= self.buf_start && pos < self.buf_start + self.buf.len() as u64
    }

    fn fill(&mut self, start: u64) -> io::Result<()> {
        let end = (start + self.block_size).min(self.len) - 1;
        let response = self
            .client
            .get(self.url.clone())
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .map_err(io::Error::other)?;
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(io::Error::other(format!(
                "range {start}-{end} returned HTTP {}",
                response.status()
            )));
        }
        let bytes = response.bytes().map_err(io::Error::other)?;
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("range {start}-{end} returned no data"),
            ));
        }
        self.buf_start = start;
        self.buf = bytes.to_vec();
        Ok(())
    }
}

impl Read for HttpRangeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || out.is_empty() {
            return Ok(0);
        }
        if !self.buffered(self.pos) {
            self.fill(self.pos)?;
        }
        let offset = (self.pos - self.buf_start) as usize;
        let n = out.len().min(self.buf.len() - offset);
        out[..n].copy_from_slice(&self.buf[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeReader {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let next = match target {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let next = next.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of archive")
        })?;
        self.pos = next;
        Ok(next)
    }
}

/// Read the first archive member whose name contains `pattern`.
///
/// "First" follows the central directory order.
pub fn read_member(
    client: Client,
    url: reqwest::Url,
    pattern: &str,
    block_size: u64,
) -> Result<Vec<u8>, BetasignError> {
    let reader = HttpRangeReader::open(client, url.clone(), block_size)?;
    let mut archive = ZipArchive::new(reader).map_err(zip_error)?;

    let mut found = None;
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(zip_error)?;
        if entry.name().contains(pattern) {
            found = Some(index);
            break;
        }
    }
    let index =
        found.ok_or_else(|| BetasignError::not_found(format!("member `{pattern}` in {url}")))?;

    let mut entry = archive.by_index(index).map_err(zip_error)?;
    debug!(%url, member = entry.name(), size = entry.size(), "reading archive member");
    let mut out = Vec::with_capacity(initial_capacity(entry.size()));
    entry.read_to_end(&mut out).map_err(|e| zip_error(ZipError::Io(e)))?;
    Ok(out)
}

/// Buffer to reserve for a member; the declared size comes from the archive
/// and is not trusted.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOCATION)).unwrap_or(0)
}

/// Parse `bytes start-end/total` into `(start, total)`.
fn parse_content_range(value: &str) -> Option<(u64, u64)> {
    let rest = value.trim().strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, _end) = range.split_once('-')?;
    Some((start.trim().parse().ok()?, total.trim().parse().ok()?))
}

fn request_error(e: reqwest::Error) -> BetasignError {
    BetasignError::Network {
        message: format!("archive request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

fn status_error(status: StatusCode, url: &reqwest::Url) -> BetasignError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BetasignError::network(format!("{url}: HTTP {status}"))
    } else if status.is_success() {
        BetasignError::not_found(format!("{url}: range requests not supported"))
    } else {
        BetasignError::not_found(format!("{url}: HTTP {status}"))
    }
}

/// I/O failures mid-archive come from the network and may be retried.
fn zip_error(e: ZipError) -> BetasignError {
    match e {
        ZipError::Io(io) => BetasignError::Network {
            message: format!("archive read failed: {io}"),
            source: Some(Box::new(io)),
        },
        ZipError::FileNotFound => BetasignError::not_found("archive member"),
        other => BetasignError::malformed(format!("archive: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betasign_test_utils::{RangeResponder, zip_archive};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(server: &MockServer, route: &str, body: Vec<u8>) -> RangeResponder {
        let responder = RangeResponder::new(body);
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(responder.clone())
            .mount(server)
            .await;
        responder
    }

    async fn read_blocking(
        url: String,
        pattern: &'static str,
        block_size: u64,
    ) -> Result<Vec<u8>, BetasignError> {
        tokio::task::spawn_blocking(move || {
            let url = reqwest::Url::parse(&url).unwrap();
            read_member(Client::new(), url, pattern, block_size)
        })
        .await
        .unwrap()
    }

    /// Incompressible bytes, so deflate keeps the archive large.
    fn filler(n: usize) -> Vec<u8> {
        let mut state: u32 = 0x2545_F491;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn content_range_parsing() {
        assert_eq!(parse_content_range("bytes 100-199/1000"), Some((100, 1000)));
        assert_eq!(parse_content_range("bytes */1000"), None);
        assert_eq!(parse_content_range("items 0-1/2"), None);
    }

    #[test]
    fn declared_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(0), 0);
        assert_eq!(initial_capacity(4096), 4096);
        assert_eq!(initial_capacity(u64::MAX), 16 << 20);
        assert_eq!(initial_capacity(MAX_PREALLOCATION + 1), 16 << 20);
    }

    #[tokio::test]
    async fn reads_first_matching_member() {
        let server = MockServer::start().await;
        let archive = zip_archive(&[
            ("Firmware/all_flash/LLB.im4p", &filler(4096)),
            ("BuildManifest.plist", b"first manifest"),
            ("Firmware/BuildManifest.plist", b"second manifest"),
        ]);
        serve(&server, "/fw/Restore.ipsw", archive).await;

        let out = read_blocking(
            format!("{}/fw/Restore.ipsw", server.uri()),
            "BuildManifest",
            256 * 1024,
        )
        .await
        .unwrap();
        assert_eq!(out, b"first manifest");
    }

    #[tokio::test]
    async fn small_blocks_issue_many_ranged_requests() {
        let server = MockServer::start().await;
        let manifest = filler(20_000);
        let archive = zip_archive(&[
            ("Restore.plist", &filler(50_000)),
            ("BuildManifest.plist", &manifest),
        ]);
        let responder = serve(&server, "/fw/Restore.ipsw", archive).await;

        let out = read_blocking(format!("{}/fw/Restore.ipsw", server.uri()), "BuildManifest", 1024)
            .await
            .unwrap();
        assert_eq!(out, manifest);
        assert!(responder.ranged_requests() > 2);
    }

    #[tokio::test]
    async fn missing_member_is_not_found() {
        let server = MockServer::start().await;
        serve(&server, "/fw/Restore.ipsw", zip_archive(&[("Restore.plist", b"x")])).await;

        let err = read_blocking(format!("{}/fw/Restore.ipsw", server.uri()), "BuildManifest", 4096)
            .await
            .unwrap_err();
        assert!(matches!(err, BetasignError::NotFound { .. }));
    }

    #[tokio::test]
    async fn corrupt_archive_is_malformed() {
        let server = MockServer::start().await;
        serve(&server, "/fw/Restore.ipsw", filler(10_000)).await;

        let err = read_blocking(format!("{}/fw/Restore.ipsw", server.uri()), "BuildManifest", 4096)
            .await
            .unwrap_err();
        assert!(matches!(err, BetasignError::MalformedData { .. }));
    }

    #[tokio::test]
    async fn server_without_range_support_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fw/Restore.ipsw"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let err = read_blocking(format!("{}/fw/Restore.ipsw", server.uri()), "BuildManifest", 4096)
            .await
            .unwrap_err();
        assert!(matches!(err, BetasignError::NotFound { .. }));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = read_blocking(format!("{}/fw/Restore.ipsw", server.uri()), "BuildManifest", 4096)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
