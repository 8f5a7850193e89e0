//! Download attachments and write them to disk.

use std::path::{Path, PathBuf};

use crate::error::{DownloadError, Result};
use crate::gmail::api::MailApi;
use crate::parser::body::decode_base64url;

/// Write `data` to `output_dir/relative`, creating missing directories.
///
/// An existing file at the destination is overwritten, so repeated runs
/// converge on the same tree.
pub fn write_artifact(output_dir: &Path, relative: &Path, data: &[u8]) -> Result<PathBuf> {
    let path = output_dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
    }
    std::fs::write(&path, data).map_err(|e| DownloadError::io(&path, e))?;
    Ok(path)
}

/// Fetch one attachment, decode it, and store it at `output_dir/relative`.
///
/// Returns the written path and the decoded size in bytes.
pub fn materialize_attachment<A: MailApi + ?Sized>(
    api: &A,
    message_id: &str,
    attachment_id: &str,
    output_dir: &Path,
    relative: &Path,
) -> Result<(PathBuf, u64)> {
    let encoded = api.get_attachment(message_id, attachment_id)?;
    let data = decode_base64url(&encoded)?;
    let path = write_artifact(output_dir, relative, &data)?;
    Ok((path, data.len() as u64))
}
