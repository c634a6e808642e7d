//! Upload acceptance and staging.
//!
//! Accepted uploads are written to a fresh temporary file; the orchestrator
//! removes it once the attempt ends.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::UploadError;

/// An upload written to the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    /// Temporary file holding the message bytes.
    pub path: PathBuf,
    /// Name the file was uploaded under.
    pub filename: String,
}

/// Accept only non-empty `.eml` files (extension is case-insensitive).
pub fn validate_upload(filename: &str, content: &[u8]) -> Result<(), UploadError> {
    if filename.trim().is_empty() {
        return Err(UploadError::MissingFilename);
    }
    let is_eml = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
    if !is_eml {
        return Err(UploadError::InvalidExtension {
            filename: filename.to_string(),
        });
    }
    if content.is_empty() {
        return Err(UploadError::Empty {
            filename: filename.to_string(),
        });
    }
    Ok(())
}

/// Validate an upload and write it to a new temp file under `dir`.
pub fn stage_upload(
    dir: &Path,
    filename: &str,
    content: &[u8],
) -> Result<StagedUpload, UploadError> {
    validate_upload(filename, content)?;
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::Builder::new()
        .prefix("email_")
        .suffix(".eml")
        .tempfile_in(dir)?;
    file.write_all(content)?;
    file.flush()?;

    let (_, path) = file.keep().map_err(|e| UploadError::Io(e.error))?;
    debug!(filename = %filename, path = %path.display(), "Upload staged");

    Ok(StagedUpload {
        path,
        filename: filename.to_string(),
    })
}
