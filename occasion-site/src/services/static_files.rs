//! Static asset responder.
//!
//! Request paths are decoded and normalised lexically against the content
//! root; nothing outside the root is ever opened.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum StaticError {
    #[error("Not Found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Failed to read asset: {0}")]
    Read(#[from] io::Error),
}

impl StaticError {
    pub fn status(&self) -> StatusCode {
        match self {
            StaticError::NotFound => StatusCode::NOT_FOUND,
            StaticError::Forbidden => StatusCode::FORBIDDEN,
            StaticError::Read(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StaticError {
    fn into_response(self) -> Response {
        let body = match self {
            StaticError::NotFound => "Not Found",
            StaticError::Forbidden => "Forbidden",
            StaticError::Read(ref e) => {
                tracing::error!(error = %e, "Failed to read static asset");
                "Server Error"
            }
        };
        (self.status(), body).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct StaticAsset {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_document: String,
}

impl StaticFiles {
    /// Fails when the content root does not exist.
    pub fn new(root: impl AsRef<Path>, index_document: impl Into<String>) -> io::Result<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
            index_document: index_document.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto a file below the content root.
    pub fn resolve(&self, request_path: &str) -> Result<PathBuf, StaticError> {
        let decoded = urlencoding::decode(request_path).map_err(|_| StaticError::NotFound)?;
        let requested = if decoded == "/" {
            self.index_document.as_str()
        } else {
            decoded.as_ref()
        };

        let mut resolved = self.root.clone();
        for component in Path::new(requested).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        if !resolved.starts_with(&self.root) {
            return Err(StaticError::Forbidden);
        }

        // Dotfiles such as the settings file are never served.
        let hidden = resolved
            .strip_prefix(&self.root)
            .map(|rel| {
                rel.components().any(|c| {
                    matches!(c, Component::Normal(s) if s.to_string_lossy().starts_with('.'))
                })
            })
            .unwrap_or(true);
        if hidden {
            return Err(StaticError::NotFound);
        }

        Ok(resolved)
    }

    pub async fn serve(&self, request_path: &str) -> Result<StaticAsset, StaticError> {
        let path = self.resolve(request_path)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StaticError::NotFound),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(StaticError::NotFound);
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StaticError::NotFound),
            Err(e) => return Err(e.into()),
        };

        Ok(StaticAsset {
            content_type: content_type(&path),
            bytes,
        })
    }
}

pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> (tempfile::TempDir, StaticFiles) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::create_dir(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js").join("main.js"), "console.log(1)").unwrap();
        std::fs::write(dir.path().join(".env"), "SENDGRID_API_KEY=secret").unwrap();
        let files = StaticFiles::new(dir.path(), "index.html").unwrap();
        (dir, files)
    }

    #[test]
    fn root_maps_to_index_document() {
        let (_dir, files) = site();
        assert_eq!(files.resolve("/").unwrap(), files.root().join("index.html"));
    }

    #[test]
    fn escaping_the_root_is_forbidden() {
        let (_dir, files) = site();
        assert!(matches!(
            files.resolve("/../../etc/passwd"),
            Err(StaticError::Forbidden)
        ));
        assert!(matches!(
            files.resolve("/js/%2e%2e/%2e%2e/etc/passwd"),
            Err(StaticError::Forbidden)
        ));
    }

    #[test]
    fn parent_segments_inside_the_root_are_allowed() {
        let (_dir, files) = site();
        assert_eq!(
            files.resolve("/js/../index.html").unwrap(),
            files.root().join("index.html")
        );
    }

    #[test]
    fn percent_encoded_paths_are_decoded() {
        let (_dir, files) = site();
        assert_eq!(
            files.resolve("/js/main%2Ejs").unwrap(),
            files.root().join("js").join("main.js")
        );
    }

    #[test]
    fn dotfiles_are_hidden() {
        let (_dir, files) = site();
        assert!(matches!(files.resolve("/.env"), Err(StaticError::NotFound)));
    }

    #[tokio::test]
    async fn serves_file_with_inferred_type() {
        let (_dir, files) = site();
        let asset = files.serve("/js/main.js").await.unwrap();
        assert_eq!(asset.content_type, "application/javascript; charset=utf-8");
        assert_eq!(asset.bytes, b"console.log(1)");
    }

    #[tokio::test]
    async fn missing_files_and_directories_are_not_found() {
        let (_dir, files) = site();
        assert!(matches!(
            files.serve("/nope.css").await,
            Err(StaticError::NotFound)
        ));
        assert!(matches!(files.serve("/js/").await, Err(StaticError::NotFound)));
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type(Path::new("a.HTML")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(content_type(Path::new("favicon.ico")), "image/x-icon");
        assert_eq!(content_type(Path::new("archive.tar.gz")), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type(Path::new("LICENSE")), DEFAULT_CONTENT_TYPE);
    }
}
