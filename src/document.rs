//! Documents supplied by the user.

use clap::ValueEnum;

use crate::prelude::*;

/// What kind of file are we submitting?
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// PDF documents.
    #[default]
    Pdf,

    /// JPEG or PNG images.
    Image,
}

impl FileType {
    /// File extensions we accept for local uploads of this type.
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            FileType::Pdf => &["pdf"],
            FileType::Image => &["jpg", "jpeg", "png"],
        }
    }

    /// Does `path` have an extension we accept for this type?
    pub fn accepts_path(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.allowed_extensions()
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
    }
}

/// A local file, read into memory.
#[derive(Clone, Debug)]
pub struct Upload {
    /// The file name, without any directory. Used as the result key.
    pub name: String,

    /// The declared MIME type, based on the file extension.
    pub mime_type: String,

    /// The raw file contents.
    pub data: Vec<u8>,
}

impl Upload {
    /// Read a local file, checking that its extension matches `file_type`.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn from_path(path: &Path, file_type: FileType) -> Result<Self> {
        if !file_type.accepts_path(path) {
            return Err(anyhow!(
                "{:?} is not a supported {:?} file (expected one of: {})",
                path.display(),
                file_type,
                file_type.allowed_extensions().join(", ")
            ));
        }
        let name = path
            .file_name()
            .with_context(|| format!("no file name in {:?}", path.display()))?
            .to_string_lossy()
            .into_owned();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {:?}", path.display()))?;
        debug!(%name, %mime_type, bytes = data.len(), "Read upload");
        Ok(Self {
            name,
            mime_type,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_depend_on_file_type() {
        assert!(FileType::Pdf.accepts_path(Path::new("a/report.pdf")));
        assert!(FileType::Pdf.accepts_path(Path::new("REPORT.PDF")));
        assert!(!FileType::Pdf.accepts_path(Path::new("scan.png")));
        assert!(FileType::Image.accepts_path(Path::new("scan.jpeg")));
        assert!(FileType::Image.accepts_path(Path::new("scan.JPG")));
        assert!(!FileType::Image.accepts_path(Path::new("scan.gif")));
        assert!(!FileType::Image.accepts_path(Path::new("no_extension")));
    }

    #[tokio::test]
    async fn upload_reads_name_mime_type_and_bytes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"not really a png")?;
        let upload = Upload::from_path(&path, FileType::Image).await?;
        assert_eq!(upload.name, "scan.png");
        assert_eq!(upload.mime_type, "image/png");
        assert_eq!(upload.data, b"not really a png");
        Ok(())
    }

    #[tokio::test]
    async fn upload_rejects_wrong_extension() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"png")?;
        let err = Upload::from_path(&path, FileType::Pdf).await.unwrap_err();
        assert!(err.to_string().contains("expected one of: pdf"));
        Ok(())
    }
}
