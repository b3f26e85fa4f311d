use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

/// A file as the job will see it
///
/// Server files have a `server_path` and a `relative_uri` (relative to the server base href).
/// External files carry their `url`; once downloaded they also get a `server_path`. Pass-by-reference
/// files never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub server_path: Option<PathBuf>,
    pub relative_uri: Option<String>,
    pub url: Option<Url>,
    /// User whose upload directory holds the file
    pub owner: Option<String>,
}

impl FileHandle {
    pub fn external(url: Url) -> FileHandle {
        FileHandle { server_path: None, relative_uri: None, url: Some(url), owner: None }
    }

    pub fn is_local(&self) -> bool {
        self.server_path.is_some()
    }

    pub fn exists(&self) -> bool {
        self.server_path.as_deref().map_or(false, Path::exists)
    }

    pub fn is_directory(&self) -> bool {
        self.server_path.as_deref().map_or(false, Path::is_dir)
    }

    /// Last path component of the server path, or of the URL path
    pub fn name(&self) -> Option<String> {
        if let Some(name) = self.server_path.as_deref().and_then(Path::file_name) {
            return Some(name.to_string_lossy().to_string());
        }
        let url = self.url.as_ref()?;
        url.path_segments()?.filter(|s| !s.is_empty()).last().map(|s| s.to_string())
    }

    pub fn extension(&self) -> String {
        let name = match self.name() {
            Some(name) => name,
            None => return String::new(),
        };
        match name.rfind('.') {
            Some(idx) if idx + 1 < name.len() => name[idx + 1..].to_string(),
            _ => String::new(),
        }
    }

    /// The file type used to match declared file formats
    pub fn kind(&self) -> String {
        if self.is_directory() {
            return "directory".to_string();
        }
        self.extension().to_lowercase()
    }

    /// Name without the final extension, used to pair up batch files
    pub fn base_name(&self) -> String {
        let name = self.name().unwrap_or_default();
        match name.rfind('.') {
            Some(idx) if idx > 0 => name[..idx].to_string(),
            _ => name,
        }
    }

    pub fn file_length(&self) -> u64 {
        self.server_path.as_deref().and_then(|p| fs::metadata(p).ok()).map_or(0, |m| m.len())
    }

    /// Absolute URL of the file: the server href for server files, the source URL otherwise
    pub fn href(&self, base_href: &str) -> Option<String> {
        match (&self.relative_uri, &self.url) {
            (Some(relative), _) => Some(format!("{}{}", base_href.trim_end_matches('/'), relative)),
            (None, Some(url)) => Some(url.to_string()),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_from_url_when_not_local() {
        let handle = FileHandle::external(Url::parse("ftp://ftp.example.org/pub/all_aml_test.gct").unwrap());
        assert_eq!(handle.name().as_deref(), Some("all_aml_test.gct"));
        assert_eq!(handle.kind(), "gct");
        assert_eq!(handle.base_name(), "all_aml_test");
        assert!(!handle.is_local());
        assert_eq!(handle.href("http://gp").as_deref(), Some("ftp://ftp.example.org/pub/all_aml_test.gct"));
    }

    #[test]
    fn extension_edge_cases() {
        let mut handle = FileHandle::external(Url::parse("http://example.org/README").unwrap());
        assert_eq!(handle.extension(), "");
        handle.server_path = Some(PathBuf::from("/tmp/ends.with."));
        assert_eq!(handle.extension(), "");
        handle.server_path = Some(PathBuf::from("/tmp/.hidden"));
        assert_eq!(handle.base_name(), ".hidden");
    }

    #[test]
    fn href_prefers_relative_uri() {
        let handle = FileHandle {
            server_path: Some(PathBuf::from("/gp/users/alice/uploads/a.gct")),
            relative_uri: Some("/users/alice/a.gct".to_string()),
            url: None,
            owner: Some("alice".to_string()),
        };
        assert_eq!(handle.href("http://127.0.0.1:8080/gp/").as_deref(), Some("http://127.0.0.1:8080/gp/users/alice/a.gct"));
    }
}
