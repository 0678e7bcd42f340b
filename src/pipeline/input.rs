//! Input handling: upload storage, source-kind detection and template lookup.
//!
//! Uploads are written under the uploads directory with a random name so
//! concurrent requests never collide, keeping the original extension because
//! the rest of the pipeline dispatches on it.

use crate::error::FormFillError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// What kind of document a stored file is, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Self {
        if has_pdf_extension(path) {
            SourceKind::Pdf
        } else {
            SourceKind::Image
        }
    }
}

/// `true` when the file name ends in `.pdf`, case-insensitively.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Random `<32 hex chars><.ext>` file name keeping the extension of `original`.
pub fn random_file_name(original: Option<&str>) -> String {
    let suffix = original
        .map(Path::new)
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{}{}", Uuid::new_v4().simple(), suffix)
}

/// Store uploaded bytes under `dir` with a random name; returns the new path.
pub async fn save_upload(
    dir: &Path,
    original_name: Option<&str>,
    data: &[u8],
) -> Result<PathBuf, FormFillError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| FormFillError::WriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let dest = dir.join(random_file_name(original_name));
    tokio::fs::write(&dest, data)
        .await
        .map_err(|e| FormFillError::WriteFailed {
            path: dest.clone(),
            source: e,
        })?;

    debug!(
        "Stored upload {:?} ({} bytes) as {}",
        original_name.unwrap_or("file"),
        data.len(),
        dest.display()
    );
    Ok(dest)
}

/// Validate a local file exists and is readable.
pub fn resolve_local(path: &Path) -> Result<(), FormFillError> {
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(FormFillError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(FormFillError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Check the `%PDF` magic bytes of an existing file.
pub fn verify_pdf_magic(path: &Path) -> Result<(), FormFillError> {
    let mut f = std::fs::File::open(path).map_err(|_| FormFillError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(FormFillError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// `true` when `path` is an existing `.pdf` file that starts with `%PDF`.
pub fn is_usable_template(path: &Path) -> bool {
    path.is_file() && has_pdf_extension(path) && verify_pdf_magic(path).is_ok()
}

/// Resolve a client-supplied template file name inside `uploads_dir`.
///
/// Anything other than a plain file name (separators, `..`, absolute paths)
/// or a name that does not exist resolves to `None`.
pub fn resolve_template(uploads_dir: &Path, file_name: Option<&str>) -> Option<PathBuf> {
    let name = file_name?.trim();
    if name.is_empty() {
        return None;
    }
    let plain = Path::new(name).file_name().and_then(|n| n.to_str());
    if plain != Some(name) || name == ".." {
        debug!("Rejecting template name {:?}", name);
        return None;
    }
    let candidate = uploads_dir.join(name);
    candidate.is_file().then_some(candidate)
}
