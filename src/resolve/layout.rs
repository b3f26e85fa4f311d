use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::config::ServerConfig;
use crate::resolve::handle::FileHandle;

const USERS_PREFIX: &str = "/users/";
const CACHE_PREFIX: &str = "/cache/";
const DATA_PREFIX: &str = "/data/";

/// Maps server files to relative URIs and back
///
/// | location                       | relative URI                 |
/// | ------------------------------ | ---------------------------- |
/// | `<user_root>/<user>/uploads/x` | `/users/<user>/x`            |
/// | `<cache_root>/<host>/x`        | `/cache/<host>/x`            |
/// | any other absolute path `/p`   | `/data//p`                   |
#[derive(Debug, Clone)]
pub struct StorageLayout {
    user_root: PathBuf,
    cache_root: PathBuf,
}

impl StorageLayout {
    pub fn new(user_root: &Path, cache_root: &Path) -> StorageLayout {
        StorageLayout { user_root: user_root.to_path_buf(), cache_root: cache_root.to_path_buf() }
    }

    pub fn from_config(config: &ServerConfig) -> StorageLayout {
        StorageLayout::new(&config.user_root, &config.cache_root)
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn user_uploads(&self, user_id: &str) -> PathBuf {
        self.user_root.join(user_id).join("uploads")
    }

    /// A file in the user's upload directory, `relative` is relative to that directory
    pub fn upload_file(&self, user_id: &str, relative: &Path) -> FileHandle {
        let server_path = self.user_uploads(user_id).join(relative);
        let relative_uri = encode_path(&Path::new("/").join(relative))
            .map(|encoded| format!("{USERS_PREFIX}{user_id}{encoded}"));
        FileHandle { server_path: Some(server_path), relative_uri, url: None, owner: Some(user_id.to_string()) }
    }

    /// Handle for an absolute server path, whichever area it lives in
    pub fn server_file(&self, path: &Path) -> FileHandle {
        if let Ok(rest) = path.strip_prefix(&self.user_root) {
            let mut components = rest.components();
            if let (Some(Component::Normal(user)), Some(Component::Normal(uploads))) =
                (components.next(), components.next())
            {
                if uploads == "uploads" {
                    return self.upload_file(&user.to_string_lossy(), components.as_path());
                }
            }
        }
        if let Ok(rest) = path.strip_prefix(&self.cache_root) {
            let relative_uri = encode_path(&Path::new("/").join(rest))
                .map(|encoded| format!("{}{}", CACHE_PREFIX.trim_end_matches('/'), encoded));
            return FileHandle { server_path: Some(path.to_path_buf()), relative_uri, url: None, owner: None };
        }
        let relative_uri = encode_path(path).map(|encoded| format!("{DATA_PREFIX}{encoded}"));
        FileHandle { server_path: Some(path.to_path_buf()), relative_uri, url: None, owner: None }
    }

    /// Inverse of the relative URI mapping, `None` for unknown areas or paths escaping their root
    pub fn from_relative_uri(&self, relative_uri: &str) -> Option<FileHandle> {
        let relative_uri = relative_uri.split(['?', '#']).next().unwrap_or_default();
        if let Some(rest) = relative_uri.strip_prefix(USERS_PREFIX) {
            let (user, path) = rest.split_once('/').unwrap_or((rest, ""));
            if !is_user_segment(user) {
                return None;
            }
            let decoded = decode_path(&format!("/{path}"))?;
            let relative = decoded.strip_prefix("/").ok()?;
            return Some(self.upload_file(user, relative));
        }
        if let Some(rest) = relative_uri.strip_prefix(CACHE_PREFIX) {
            let decoded = decode_path(&format!("/{rest}"))?;
            return Some(self.server_file(&self.cache_root.join(decoded.strip_prefix("/").ok()?)));
        }
        if let Some(rest) = relative_uri.strip_prefix(DATA_PREFIX) {
            let decoded = decode_path(rest)?;
            return Some(self.server_file(&decoded));
        }
        None
    }

    /// Shared cache location for a globally cached URL
    pub fn cached_file(&self, url: &Url) -> FileHandle {
        let path = self.cache_root.join(url_relative_path(url));
        let mut handle = self.server_file(&path);
        handle.url = Some(url.clone());
        handle
    }

    /// Per-user download location for an external URL; the same URL always maps to the same file
    pub fn distinct_external_file(&self, user_id: &str, url: &Url) -> FileHandle {
        let relative = Path::new("tmp").join("external").join(url_relative_path(url));
        let mut handle = self.upload_file(user_id, &relative);
        handle.url = Some(url.clone());
        handle
    }
}

/// `<authority>/<decoded url path>`, with "index" standing in for a directory URL
///
/// The authority is the host, prefixed with the scheme unless it is https and suffixed with an
/// explicit port. A query string becomes a `query-<form encoded query>` directory in front of the
/// file name, so the file keeps its name and extension.
fn url_relative_path(url: &Url) -> PathBuf {
    let host = url.host_str().unwrap_or("localhost");
    let mut authority = match url.scheme() {
        "https" => host.to_string(),
        scheme => format!("{scheme}_{host}"),
    };
    if let Some(port) = url.port() {
        authority.push_str(&format!("_{port}"));
    }

    let mut parts: Vec<String> = Vec::new();
    if let Some(decoded) = decode_path(url.path()) {
        for component in decoded.components() {
            if let Component::Normal(part) = component {
                parts.push(part.to_string_lossy().to_string());
            }
        }
    }
    if url.path().ends_with('/') || parts.is_empty() {
        parts.push("index".to_string());
    }
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        parts.insert(parts.len() - 1, format!("query-{encoded}"));
    }

    let mut path = PathBuf::from(authority);
    path.extend(parts);
    path
}

/// A user id taken from a relative URI: not empty, not a dot segment, no escapes or separators
fn is_user_segment(user: &str) -> bool {
    !user.is_empty() && user != "." && user != ".." && !user.contains(['%', '\\', '/'])
}

/// Percent-encode an absolute path for use in a URL path
pub fn encode_path(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(|url| url.path().to_string())
}

/// Percent-decode an absolute URL path; rejects paths with `..` components
pub fn decode_path(encoded: &str) -> Option<PathBuf> {
    // set_path would silently collapse dot segments
    let dot_segment = |s: &str| matches!(s.to_ascii_lowercase().as_str(), ".." | ".%2e" | "%2e." | "%2e%2e");
    if encoded.split('/').any(dot_segment) {
        return None;
    }
    let mut url = Url::parse("file:///").ok()?;
    url.set_path(encoded);
    let path = url.to_file_path().ok()?;
    if path.components().any(|c| c == Component::ParentDir) {
        return None;
    }
    Some(path)
}
