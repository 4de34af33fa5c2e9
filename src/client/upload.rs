use super::QueryError;
use std::path::Path;

/// Largest document the upload endpoint accepts.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Accepted extensions and the content type sent for each.
pub const SUPPORTED_EXTENSIONS: [(&str, &str); 4] = [
    ("txt", "text/plain"),
    ("pdf", "application/pdf"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("md", "text/markdown"),
];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("cannot read {0}")]
    Read(String),
    #[error("file type not supported: {0} (expected .txt, .pdf, .docx or .md)")]
    UnsupportedType(String),
    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("upload failed: {0}")]
    Request(#[from] QueryError),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Request(e) => match e {
                QueryError::Server {
                    message: Some(m), ..
                } if !m.trim().is_empty() => m.clone(),
                _ => "Upload failed".to_string(),
            },
            other => other.to_string(),
        }
    }
}

/// Server acknowledgement of an indexed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub filename: String,
    pub size_bytes: u64,
    pub chunks: u64,
}

#[derive(Debug)]
pub(crate) struct CheckedUpload {
    pub filename: String,
    pub size_bytes: u64,
    pub mime: &'static str,
}

/// Validate a file against the upload limits before anything is sent.
pub fn check_upload(path: &Path) -> Result<(), UploadError> {
    inspect(path).map(|_| ())
}

pub(crate) fn inspect(path: &Path) -> Result<CheckedUpload, UploadError> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| UploadError::Read(path.display().to_string()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = SUPPORTED_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, m)| *m)
        .ok_or_else(|| UploadError::UnsupportedType(filename.clone()))?;

    let size_bytes = std::fs::metadata(path)
        .map_err(|e| UploadError::Read(format!("{}: {e}", path.display())))?
        .len();
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size: size_bytes,
            limit: MAX_UPLOAD_BYTES,
        });
    }

    Ok(CheckedUpload {
        filename,
        size_bytes,
        mime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accepts_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Notes.MD");
        std::fs::write(&path, "# refund policy").unwrap();
        let checked = inspect(&path).unwrap();
        assert_eq!(checked.mime, "text/markdown");
        assert_eq!(checked.size_bytes, 15);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b").unwrap();
        assert!(matches!(
            check_upload(&path),
            Err(UploadError::UnsupportedType(_))
        ));
    }

    #[test]
    fn rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![b'a'; (MAX_UPLOAD_BYTES + 1) as usize])
            .unwrap();
        assert!(matches!(
            check_upload(&path),
            Err(UploadError::TooLarge { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.pdf");
        assert!(matches!(check_upload(&path), Err(UploadError::Read(_))));
    }
}
