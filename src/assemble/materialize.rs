use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::fs::{self, File};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::collab::{ExternalService, UploadCatalog, UrlFetcher};
use crate::error::{JobInputError, Result};
use crate::param::value::JobContext;
use crate::resolve::handle::FileHandle;
use crate::resolve::record::ResolvedReference;

/// Copies external files to their server location
///
/// Downloads of one parameter run concurrently, bounded by `download_parallelism`, and results
/// come back in submission order. Two downloads of the same destination never run at the same
/// time; the second one finds the file in place and does nothing. A download goes to a `.part`
/// file which is renamed when complete, so a failed or cancelled download leaves nothing behind.
#[derive(Clone)]
pub struct Materializer {
    fetcher: Arc<dyn UrlFetcher>,
    service: Arc<dyn ExternalService>,
    catalog: Arc<dyn UploadCatalog>,
    limit: Arc<Semaphore>,
    locks: Arc<DestinationLocks>,
}

#[derive(Clone, Copy)]
enum Source<'a> {
    Fetcher(&'a Url),
    Service(&'a Url),
}

impl Materializer {
    pub fn new(
        fetcher: Arc<dyn UrlFetcher>,
        service: Arc<dyn ExternalService>,
        catalog: Arc<dyn UploadCatalog>,
        parallelism: usize,
    ) -> Materializer {
        Materializer {
            fetcher,
            service,
            catalog,
            limit: Arc::new(Semaphore::new(parallelism.max(1))),
            locks: Arc::new(DestinationLocks::default()),
        }
    }

    /// Download every record which needs it; other records pass through unchanged
    pub async fn materialize_all(
        &self,
        ctx: &JobContext,
        param: &str,
        records: Vec<ResolvedReference>,
    ) -> Vec<Result<ResolvedReference>> {
        let mut results: Vec<Option<Result<ResolvedReference>>> = Vec::with_capacity(records.len());
        let mut downloads = JoinSet::new();
        for (idx, record) in records.into_iter().enumerate() {
            if !record.needs_download() {
                results.push(Some(Ok(record)));
                continue;
            }
            results.push(None);
            let this = self.clone();
            let ctx = ctx.clone();
            let param = param.to_string();
            downloads.spawn(async move {
                let result = this.materialize(&ctx, &param, &record).await;
                (idx, result.map(|_| record))
            });
        }

        while let Some(joined) = downloads.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => warn!("Download task for {param} did not complete: {e}"),
            }
        }

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| {
                    Err(JobInputError::storage(param, "download", io::Error::new(io::ErrorKind::Other, "download task failed")))
                })
            })
            .collect()
    }

    /// Download one record to its server path; returns false when the file was already there
    pub async fn materialize(&self, ctx: &JobContext, param: &str, record: &ResolvedReference) -> Result<bool> {
        let _permit = self
            .limit
            .acquire()
            .await
            .map_err(|e| JobInputError::storage(param, "download", io::Error::new(io::ErrorKind::Other, e)))?;
        match record {
            ResolvedReference::ExternalServiceUrl { handle, url } => {
                if !self.service.is_enabled(ctx) {
                    return Err(JobInputError::ExternalServiceUnavailable { param: param.to_string(), url: url.to_string() });
                }
                let created = self.copy(ctx, param, handle, Source::Service(url)).await?;
                if created {
                    self.register(ctx, param, handle)?;
                }
                Ok(created)
            }
            ResolvedReference::ExternalUrl { handle, url, cached, pass_by_reference: false } => {
                let created = self.copy(ctx, param, handle, Source::Fetcher(url)).await?;
                // the shared cache belongs to no user
                if created && !cached {
                    self.register(ctx, param, handle)?;
                }
                Ok(created)
            }
            _ => Ok(false),
        }
    }

    async fn copy(&self, ctx: &JobContext, param: &str, handle: &FileHandle, source: Source<'_>) -> Result<bool> {
        let url = match source {
            Source::Fetcher(url) | Source::Service(url) => url,
        };
        let dest = handle.server_path.as_deref().ok_or_else(|| {
            JobInputError::storage(param, url, io::Error::new(io::ErrorKind::InvalidInput, "no server path"))
        })?;

        let lock = self.locks.lock_for(dest);
        let _guard = lock.lock().await;
        if fs::try_exists(dest).await.unwrap_or(false) {
            debug!("{} is already downloaded", dest.display());
            return Ok(false);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(|e| JobInputError::storage(param, parent.display(), e))?;
        }

        let mut partial = PartialFile::create(dest).await.map_err(|e| JobInputError::storage(param, dest.display(), e))?;
        let fetched = match source {
            Source::Fetcher(url) => self.fetcher.fetch(url, partial.file()).await,
            Source::Service(url) => self.service.fetch(ctx, url, partial.file()).await,
        };
        let bytes = fetched.map_err(|e| JobInputError::storage(param, url, io::Error::new(io::ErrorKind::Other, e.to_string())))?;
        partial.commit().await.map_err(|e| JobInputError::storage(param, dest.display(), e))?;
        info!("Downloaded {url} to {} ({bytes} bytes)", dest.display());
        Ok(true)
    }

    fn register(&self, ctx: &JobContext, param: &str, handle: &FileHandle) -> Result<()> {
        let target = handle.relative_uri.as_deref().unwrap_or_default();
        match self.catalog.register_upload(&ctx.user_id, handle) {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!("{target} was already in the upload catalog");
                Ok(())
            }
            Err(e) => Err(JobInputError::storage(param, target, io::Error::new(io::ErrorKind::Other, e.to_string()))),
        }
    }
}

/// One async lock per destination path
#[derive(Default)]
struct DestinationLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl DestinationLocks {
    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

/// A download in progress; removed on drop unless committed
struct PartialFile {
    part: PathBuf,
    dest: PathBuf,
    file: File,
    committed: bool,
}

impl PartialFile {
    async fn create(dest: &Path) -> io::Result<PartialFile> {
        let mut name = dest.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        let part = dest.with_file_name(name);
        let file = File::create(&part).await?;
        Ok(PartialFile { part, dest: dest.to_path_buf(), file, committed: false })
    }

    fn file(&mut self) -> &mut File {
        &mut self.file
    }

    async fn commit(mut self) -> io::Result<()> {
        self.file.sync_all().await?;
        fs::rename(&self.part, &self.dest).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.part);
        }
    }
}
