//! Interfaces to the parts of the server this crate doesn't own
//!
//! Permission checks, the upload catalog, the transfer of external files, the external
//! collaboration service, the module registry and the job queue are all injected, so the
//! pipeline can be driven with in-memory stand-ins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::ServerConfig;
use crate::error::JobInputError;
use crate::lsid::Lsid;
use crate::param::spec::ModuleSpec;
use crate::param::value::{JobContext, JobInputSet};
use crate::resolve::handle::FileHandle;
use crate::assemble::helper::AssembledValue;

pub trait PermissionCheck: Send + Sync {
    fn can_read(&self, ctx: &JobContext, handle: &FileHandle) -> bool;
}

/// Records files created on behalf of a user, so they show up in the user's uploads
pub trait UploadCatalog: Send + Sync {
    /// Returns false when the file was already registered
    fn register_upload(&self, user_id: &str, handle: &FileHandle) -> anyhow::Result<bool>;
}

/// Copies the content of a URL into an open file
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, dest: &mut File) -> anyhow::Result<u64>;
}

/// External collaboration service (GenomeSpace); files can only be read with an active session
#[async_trait]
pub trait ExternalService: Send + Sync {
    fn is_enabled(&self, ctx: &JobContext) -> bool;
    async fn fetch(&self, ctx: &JobContext, url: &Url, dest: &mut File) -> anyhow::Result<u64>;
}

/// Read-only view of the installed modules
pub trait ModuleRepository: Send + Sync {
    fn get(&self, lsid: &Lsid) -> Option<Arc<ModuleSpec>>;
}

/// A job whose inputs are resolved and validated, ready for the queue
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub input: JobInputSet,
    pub values: Vec<AssembledValue>,
    /// Module command line with the parameter args substituted
    pub command: Vec<String>,
    pub batch_id: Option<String>,
}

/// Hands a prepared job to the queue and returns its job id
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn post_job(&self, ctx: &JobContext, job: &PreparedJob) -> Result<String, JobInputError>;
}

/// Default read policy for server files
///
/// Admins may read any existing file. Other users may read their own uploads, the shared download
/// cache and anything under the configured server roots.
#[derive(Debug, Clone)]
pub struct ServerFilePermissions {
    user_root: PathBuf,
    cache_root: PathBuf,
    allowed_roots: Vec<PathBuf>,
}

impl ServerFilePermissions {
    pub fn from_config(config: &ServerConfig) -> ServerFilePermissions {
        ServerFilePermissions {
            user_root: config.user_root.clone(),
            cache_root: config.cache_root.clone(),
            allowed_roots: config.allowed_server_roots.clone(),
        }
    }

    fn readable_by(&self, user_id: &str, path: &Path) -> bool {
        path.starts_with(self.user_root.join(user_id).join("uploads"))
            || path.starts_with(&self.cache_root)
            || self.allowed_roots.iter().any(|root| path.starts_with(root))
    }
}

impl PermissionCheck for ServerFilePermissions {
    fn can_read(&self, ctx: &JobContext, handle: &FileHandle) -> bool {
        let path = match handle.server_path.as_deref() {
            Some(path) => path,
            None => return false,
        };
        if !path.exists() {
            debug!("Permission check on a missing file");
            return false;
        }
        ctx.is_admin || self.readable_by(&ctx.user_id, path)
    }
}

/// Fetches http(s) URLs; other schemes are reported as unsupported
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> HttpFetcher {
        HttpFetcher { client: reqwest::Client::new() }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        HttpFetcher::new()
    }
}

#[async_trait]
impl UrlFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, dest: &mut File) -> anyhow::Result<u64> {
        anyhow::ensure!(matches!(url.scheme(), "http" | "https"), "unsupported url scheme: {}", url.scheme());
        let mut response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let mut written = 0;
        while let Some(chunk) = response.chunk().await? {
            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        dest.flush().await?;
        Ok(written)
    }
}

/// Stand-in used when the server has no external collaboration service configured
pub struct NoExternalService;

#[async_trait]
impl ExternalService for NoExternalService {
    fn is_enabled(&self, _ctx: &JobContext) -> bool {
        false
    }

    async fn fetch(&self, _ctx: &JobContext, url: &Url, _dest: &mut File) -> anyhow::Result<u64> {
        anyhow::bail!("external service not enabled, can't read {url}")
    }
}
