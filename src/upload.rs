use std::path::Path;

use reqwest::{Method, StatusCode};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ApplianceClient;
use crate::endpoint::{self, Direction, Mode};
use crate::error::TransferError;
use crate::range::UploadCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub bytes_sent: u64,
    pub chunks: u32,
    /// Chunks answered with a non-200 status. Always zero in strict mode,
    /// which aborts on the first one instead.
    pub rejected_chunks: u32,
    /// The cancel token fired before the source was exhausted.
    pub cancelled: bool,
}

/// Uploads `local_path` in fixed-size slices, one POST per slice.
///
/// The size comes from the local file, so every request carries the real
/// total. Unless [`strict_upload`](crate::TransferSettings::strict_upload) is
/// set, the response status is only logged: the loop always runs until the
/// source is exhausted. Transport failures abort in both modes.
pub async fn upload<F>(
    client: &ApplianceClient,
    mode: Mode,
    local_path: &Path,
    progress_callback: Option<F>,
) -> Result<UploadOutcome, TransferError>
where
    F: Fn(u64, u64),
{
    let never = CancellationToken::new();
    upload_with_cancel(client, mode, local_path, progress_callback, &never).await
}

/// Same as [`upload`], but sends no further slice once `cancel` fires.
pub async fn upload_with_cancel<F>(
    client: &ApplianceClient,
    mode: Mode,
    local_path: &Path,
    progress_callback: Option<F>,
    cancel: &CancellationToken,
) -> Result<UploadOutcome, TransferError>
where
    F: Fn(u64, u64),
{
    let file_name = endpoint::remote_file_name(local_path)?;
    let endpoint_path = endpoint::resolve(Direction::Upload, mode, file_name)?;
    let url = client.url(endpoint_path, file_name);

    let mut file = fs::File::open(local_path)
        .await
        .map_err(|e| TransferError::io(format!("Failed to open {}", local_path.display()), e))?;
    let total = file
        .metadata()
        .await
        .map_err(|e| TransferError::io(format!("Failed to stat {}", local_path.display()), e))?
        .len();

    let settings = client.settings();
    let chunk_size = settings.chunk_size.max(1);
    let mut cursor = UploadCursor::new(total, chunk_size);
    let mut outcome = UploadOutcome {
        bytes_sent: 0,
        chunks: 0,
        rejected_chunks: 0,
        cancelled: false,
    };

    info!(total, url = %url, "starting upload");

    loop {
        if cancel.is_cancelled() {
            info!(bytes_sent = outcome.bytes_sent, url = %url, "upload cancelled");
            outcome.cancelled = true;
            return Ok(outcome);
        }

        // Never reserve more than what is left of the source.
        let remaining = total.saturating_sub(cursor.position());
        let capacity = usize::try_from(chunk_size.min(remaining)).unwrap_or(0);
        let mut slice = Vec::with_capacity(capacity);
        let n = (&mut file)
            .take(chunk_size)
            .read_to_end(&mut slice)
            .await
            .map_err(|e| {
                TransferError::io(format!("Read failed at offset {}", cursor.position()), e)
            })?;

        let Some(range) = cursor.next_range(n as u64) else {
            break;
        };

        debug!(%range, url = %url, "POST chunk");
        let response = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(bytes_sent = outcome.bytes_sent, url = %url, "upload cancelled");
                outcome.cancelled = true;
                return Ok(outcome);
            }

            result = client.send(Method::POST, &url, range, Some(slice)) => result?,
        };

        let status = response.status();
        if status != StatusCode::OK {
            if settings.strict_upload {
                return Err(TransferError::BadRequest { status, range });
            }
            warn!(%range, %status, "appliance rejected chunk, continuing");
            outcome.rejected_chunks += 1;
        }

        outcome.bytes_sent += n as u64;
        outcome.chunks += 1;

        if let Some(ref cb) = progress_callback {
            cb(outcome.bytes_sent, total);
        }
    }

    info!(
        bytes_sent = outcome.bytes_sent,
        chunks = outcome.chunks,
        rejected = outcome.rejected_chunks,
        url = %url,
        "upload finished"
    );
    Ok(outcome)
}
