use std::path::Path;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_RANGE};
use reqwest::{Method, Response, StatusCode};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ApplianceClient;
use crate::endpoint::{self, Direction, Mode};
use crate::error::TransferError;
use crate::range::{DownloadCursor, Sizing, TransferRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Every byte of the remote file was written.
    Complete { bytes_written: u64, chunks: u32 },
    /// The remote file has zero bytes; the local file was left empty.
    Empty,
    /// The cancel token fired. `bytes_written` bytes were flushed to disk.
    Cancelled { bytes_written: u64 },
}

/// Downloads the remote file named after `local_path` into `local_path`.
///
/// The remote size is unknown up front: the first request is a sizing request whose
/// `Content-Range` answer sizes the transfer and whose payload is dropped.
/// After that each window is fetched and appended in order.
///
/// The destination is truncated before the first request. On error the bytes
/// written so far are flushed and left on disk. See [`download_with_cancel`]
/// for a variant that can be stopped from outside.
///
/// # Arguments
///
/// * `client`            — Appliance connection and transfer settings.
/// * `mode`              — Selects the image or UCS download endpoint.
/// * `local_path`        — Destination; its file name is also the remote name.
/// * `progress_callback` — Optional, called after every chunk with
///                         `(bytes_written_so_far, total_size)`.
pub async fn download<F>(
    client: &ApplianceClient,
    mode: Mode,
    local_path: &Path,
    progress_callback: Option<F>,
) -> Result<DownloadOutcome, TransferError>
where
    F: Fn(u64, u64),
{
    let never = CancellationToken::new();
    download_with_cancel(client, mode, local_path, progress_callback, &never).await
}

/// Same as [`download`], but stops between reads once `cancel` fires and
/// returns [`DownloadOutcome::Cancelled`] after flushing what was received.
pub async fn download_with_cancel<F>(
    client: &ApplianceClient,
    mode: Mode,
    local_path: &Path,
    progress_callback: Option<F>,
    cancel: &CancellationToken,
) -> Result<DownloadOutcome, TransferError>
where
    F: Fn(u64, u64),
{
    let file_name = endpoint::remote_file_name(local_path)?;
    let endpoint_path = endpoint::resolve(Direction::Download, mode, file_name)?;
    let url = client.url(endpoint_path, file_name);

    let file = fs::File::create(local_path).await.map_err(|e| {
        TransferError::io(format!("Failed to create {}", local_path.display()), e)
    })?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);

    let outcome = fetch_chunks(client, &url, &mut writer, progress_callback, cancel).await;

    // Flush on every path so an aborted transfer still leaves its bytes behind.
    let flushed = writer.flush().await.map_err(|e| {
        TransferError::io(format!("Failed to flush {}", local_path.display()), e)
    });

    let outcome = outcome?;
    flushed?;
    Ok(outcome)
}

async fn fetch_chunks<W, F>(
    client: &ApplianceClient,
    url: &str,
    writer: &mut W,
    progress_callback: Option<F>,
    cancel: &CancellationToken,
) -> Result<DownloadOutcome, TransferError>
where
    W: AsyncWrite + Unpin,
    F: Fn(u64, u64),
{
    let mut cursor = DownloadCursor::new(client.settings().chunk_size);
    let mut bytes_written: u64 = 0;
    let mut chunks: u32 = 0;

    while let Some(range) = cursor.next() {
        debug!(%range, url, "GET chunk");
        let response = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(bytes_written, url, "download cancelled");
                return Ok(DownloadOutcome::Cancelled { bytes_written });
            }

            result = client.send(Method::GET, url, range, None) => result?,
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransferError::BadRequest { status, range });
        }

        if cursor.is_sizing() {
            let total = parse_total_size(response.headers())?;
            match cursor.discover(total) {
                Sizing::Empty => {
                    info!(url, "remote file is empty");
                    return Ok(DownloadOutcome::Empty);
                }
                Sizing::Clamped => {
                    debug!(total, window = %cursor.window(), "file smaller than one chunk");
                }
                Sizing::Ready => {}
            }
            info!(total, url, "sized remote file");
            // The sizing payload was requested with an unknown size; drop it.
            continue;
        }

        let (received, finished) = write_body(response, writer, range, cancel).await?;
        bytes_written += received;
        if !finished {
            info!(bytes_written, url, "download cancelled mid-chunk");
            return Ok(DownloadOutcome::Cancelled { bytes_written });
        }
        if received != range.len() {
            warn!(%range, received, "chunk length differs from requested window");
        }

        chunks += 1;

        if let Some(ref cb) = progress_callback {
            cb(bytes_written, cursor.total().unwrap_or_default());
        }
    }

    info!(bytes_written, chunks, url, "download complete");
    Ok(DownloadOutcome::Complete {
        bytes_written,
        chunks,
    })
}

/// Streams one response body into `writer`. Returns the byte count and
/// whether the body was read to the end (`false` when cancelled).
async fn write_body<W>(
    response: Response,
    writer: &mut W,
    range: TransferRange,
    cancel: &CancellationToken,
) -> Result<(u64, bool), TransferError>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok((received, false)),
            next = stream.next() => next,
        };
        let Some(chunk_result) = next else { break };

        let data = chunk_result.map_err(|e| TransferError::from_request(e, range))?;
        writer.write_all(&data).await.map_err(|e| {
            TransferError::io(format!("Write failed at offset {}", range.start + received), e)
        })?;
        received += data.len() as u64;
    }

    Ok((received, true))
}

/// Reads the total file size from the trailing `/<size>` of a `Content-Range`
/// response header.
pub fn parse_total_size(headers: &HeaderMap) -> Result<u64, TransferError> {
    let value = headers
        .get(CONTENT_RANGE)
        .ok_or_else(|| TransferError::MalformedRangeHeader("missing from response".into()))?
        .to_str()
        .map_err(|_| TransferError::MalformedRangeHeader("not valid UTF-8".into()))?;

    let size = value.rsplit_once('/').map_or(value, |(_, size)| size).trim();

    size.parse::<u64>().map_err(|_| {
        TransferError::MalformedRangeHeader(format!("cannot read total size from '{}'", value))
    })
}
