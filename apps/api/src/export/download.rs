use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::export::ExportError;

/// A finished PDF ready to hand to the user.
#[derive(Debug, Clone)]
pub struct PdfDownload {
    pub filename: String,
    pub bytes: Bytes,
}

/// `<slug(title)>-resume.pdf`, or `resume.pdf` when the title has nothing usable.
pub fn download_filename(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        "resume.pdf".to_string()
    } else {
        format!("{slug}-resume.pdf")
    }
}

/// Receives finished exports. Returns a human-readable location.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, download: &PdfDownload) -> Result<String, ExportError>;
}

/// Keeps a copy of every export under a directory. Files appear atomically:
/// they are written to a temp file in the same directory and then renamed.
pub struct FsDownloadSink {
    dir: PathBuf,
}

impl FsDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DownloadSink for FsDownloadSink {
    async fn deliver(&self, download: &PdfDownload) -> Result<String, ExportError> {
        let dir = self.dir.clone();
        let download = download.clone();

        let path = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
            std::fs::create_dir_all(&dir)?;
            let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
            staged.write_all(&download.bytes)?;
            staged.flush()?;
            let target = dir.join(&download.filename);
            staged.persist(&target).map_err(|e| e.error)?;
            Ok(target)
        })
        .await
        .map_err(|e| ExportError::Task(e.to_string()))?
        .map_err(|e| ExportError::Delivery(e.to_string()))?;

        info!(path = %path.display(), "Export saved");
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_filename() {
        assert_eq!(download_filename("Jane Doe"), "jane-doe-resume.pdf");
        assert_eq!(download_filename("  Senior  Engineer (2024)!"), "senior-engineer-2024-resume.pdf");
        assert_eq!(download_filename(""), "resume.pdf");
        assert_eq!(download_filename("日本語"), "resume.pdf");
        assert_eq!(download_filename("../../etc/passwd"), "etc-passwd-resume.pdf");
    }

    #[tokio::test]
    async fn test_fs_sink_persists_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsDownloadSink::new(dir.path().join("exports"));
        let download = PdfDownload {
            filename: "jane-doe-resume.pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF-1.7 test"),
        };

        let location = sink.deliver(&download).await.unwrap();
        assert!(location.ends_with("jane-doe-resume.pdf"));

        let saved = std::fs::read(dir.path().join("exports/jane-doe-resume.pdf")).unwrap();
        assert_eq!(saved, b"%PDF-1.7 test");

        let leftovers = std::fs::read_dir(dir.path().join("exports")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_fs_sink_overwrites_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsDownloadSink::new(dir.path());
        for body in [&b"%PDF-1 first"[..], &b"%PDF-1 second"[..]] {
            sink.deliver(&PdfDownload {
                filename: "resume.pdf".to_string(),
                bytes: Bytes::copy_from_slice(body),
            })
            .await
            .unwrap();
        }
        let saved = std::fs::read(dir.path().join("resume.pdf")).unwrap();
        assert_eq!(saved, b"%PDF-1 second");
    }
}
