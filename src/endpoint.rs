use std::fmt;
use std::path::Path;

use crate::error::TransferError;

const IMAGE_DOWNLOADS: &str = "/mgmt/cm/autodeploy/sotfware-image-downloads/";
const UCS_DOWNLOADS: &str = "/mgmt/shared/file-transfer/ucs-downloads/";

const IMAGE_UPLOADS: &str = "/mgmt/cm/autodeploy/sotfware-image-uploads/";
const UCS_UPLOADS: &str = "/mgmt/shared/file-transfer/ucs-uploads/";
const GENERAL_UPLOADS: &str = "/mgmt/shared/file-transfer/uploads/";

// Used when the `.iso` extension picks the path, spelled differently from IMAGE_UPLOADS.
const ISO_UPLOADS: &str = "/mgmt/cm/autodeploy/software-image-uploads/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => f.write_str("upload"),
            Direction::Download => f.write_str("download"),
        }
    }
}

/// Remote storage category a transfer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Software images and their `.md5` files (`/shared/images/`).
    Image,
    /// UCS archives (`/var/local/ucs/`).
    Ucs,
    /// Anything else (`/var/config/rest/downloads/`). Upload only.
    General,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Image => f.write_str("image"),
            Mode::Ucs => f.write_str("ucs"),
            Mode::General => f.write_str("general"),
        }
    }
}

/// Resolves the URL path prefix for a transfer of `file_name`.
///
/// Uploads let the file extension override `mode`: `.iso` always goes to the
/// software-image path, `.ucs` and `.md5` always go to the generic upload path.
/// Downloads are selected by `mode` alone.
pub fn resolve(
    direction: Direction,
    mode: Mode,
    file_name: &str,
) -> Result<&'static str, TransferError> {
    match direction {
        Direction::Download => match mode {
            Mode::Image => Ok(IMAGE_DOWNLOADS),
            Mode::Ucs => Ok(UCS_DOWNLOADS),
            Mode::General => Err(TransferError::UnsupportedMode { direction, mode }),
        },
        Direction::Upload => {
            let extension = Path::new(file_name).extension().and_then(|e| e.to_str());
            Ok(match (extension, mode) {
                (Some("iso"), _) => ISO_UPLOADS,
                (Some("ucs" | "md5"), _) => GENERAL_UPLOADS,
                (_, Mode::Image) => IMAGE_UPLOADS,
                (_, Mode::Ucs) => UCS_UPLOADS,
                (_, Mode::General) => GENERAL_UPLOADS,
            })
        }
    }
}

/// Final path component of `path`, used as the remote file name.
pub fn remote_file_name(path: &Path) -> Result<&str, TransferError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| TransferError::InvalidFilename(path.to_path_buf()))
}
