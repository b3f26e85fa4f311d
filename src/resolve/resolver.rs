use std::path::{Component, PathBuf};

use log::{debug, warn};
use url::Url;

use crate::config::ServerConfig;
use crate::error::{JobInputError, Result};
use crate::param::spec::ParameterSpec;
use crate::param::value::{JobContext, ParamValue};
use crate::policy::ListPolicy;
use crate::resolve::handle::FileHandle;
use crate::resolve::href::server_relative_uri;
use crate::resolve::layout::{decode_path, StorageLayout};
use crate::resolve::record::ResolvedReference;

/// Turns raw values into [ResolvedReference]s. First match wins:
///
/// 1. a placeholder reference or URL under the server base href
/// 2. an absolute URL on another host
/// 3. a `file://` URL, treated as a literal server path
/// 4. a literal server path
/// 5. when the path can't be resolved, a handle built from the string alone (unverified)
#[derive(Debug, Clone)]
pub struct ValueResolver {
    base_href: String,
    layout: StorageLayout,
    cache_prefixes: Vec<String>,
    service_hosts: Vec<String>,
}

impl ValueResolver {
    pub fn new(config: &ServerConfig, policy: &ListPolicy, base_href: Option<&str>) -> ValueResolver {
        let base_href = base_href.filter(|b| !b.is_empty()).unwrap_or(config.base_href());
        let service_hosts = if policy.external_service { config.external_service_hosts.clone() } else { Vec::new() };
        ValueResolver {
            base_href: base_href.trim_end_matches('/').to_string(),
            layout: StorageLayout::from_config(config),
            cache_prefixes: config.cache_external_url_dirs.clone(),
            service_hosts,
        }
    }

    /// The same resolver for a job submitted through another host name
    pub fn with_base_href(&self, base_href: Option<&str>) -> ValueResolver {
        let mut resolver = self.clone();
        if let Some(base_href) = base_href.filter(|b| !b.is_empty()) {
            resolver.base_href = base_href.trim_end_matches('/').to_string();
        }
        resolver
    }

    pub fn base_href(&self) -> &str {
        &self.base_href
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// The value as a URL on another server, `None` for anything else
    pub fn external_url(&self, value: &str) -> Option<Url> {
        if server_relative_uri(value, &self.base_href).is_some() {
            return None;
        }
        let url = Url::parse(value).ok()?;
        // a single letter scheme is a windows drive, not a URL
        if url.scheme() == "file" || url.scheme().len() < 2 || url.host_str().is_none() {
            return None;
        }
        Some(url)
    }

    /// Matches one of the `cache_external_url_dirs` prefixes
    pub fn is_cached_url(&self, url: &Url) -> bool {
        let url = url.as_str();
        self.cache_prefixes.iter().any(|prefix| !prefix.is_empty() && url.starts_with(prefix.as_str()))
    }

    pub fn is_external_service_url(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return false,
        };
        self.service_hosts.iter().any(|service| {
            let service = service.to_lowercase();
            host == service || host.ends_with(&format!(".{service}"))
        })
    }

    pub fn resolve(&self, ctx: &JobContext, spec: &ParameterSpec, value: &ParamValue) -> Result<ResolvedReference> {
        let raw = value.value.as_str();
        if raw.is_empty() {
            return Err(JobInputError::resolution(&spec.name, raw, Some("value not set")));
        }

        if let Some(relative_uri) = server_relative_uri(raw, &self.base_href) {
            let handle = self
                .layout
                .from_relative_uri(relative_uri)
                .ok_or_else(|| JobInputError::resolution(&spec.name, raw, Some("not a server file")))?;
            return Ok(ResolvedReference::ServerUrl { handle });
        }

        if let Some(url) = self.external_url(raw) {
            return Ok(self.resolve_external(ctx, spec, url));
        }

        let path = match Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => {
                if url.host_str().map_or(false, |h| !h.is_empty()) {
                    warn!("Ignoring host part of file url: {raw}");
                }
                decode_path(url.path()).ok_or_else(|| JobInputError::resolution(&spec.name, raw, Some("invalid file url")))?
            }
            _ => PathBuf::from(raw),
        };
        if !path.is_absolute() {
            return Err(JobInputError::resolution(&spec.name, raw, Some("not an absolute path")));
        }

        let handle = self.layout.server_file(&path);
        let escapes = path.components().any(|c| c == Component::ParentDir);
        if escapes || !path.exists() {
            debug!("Can't resolve server path for {}, keeping the literal value", spec.name);
            return Ok(ResolvedReference::ServerPath { handle, verified: false });
        }
        Ok(ResolvedReference::ServerPath { handle, verified: true })
    }

    fn resolve_external(&self, ctx: &JobContext, spec: &ParameterSpec, url: Url) -> ResolvedReference {
        let cached = self.is_cached_url(&url);
        if spec.pass_by_reference {
            return ResolvedReference::ExternalUrl {
                handle: FileHandle::external(url.clone()),
                url,
                cached,
                pass_by_reference: true,
            };
        }
        if cached {
            return ResolvedReference::ExternalUrl {
                handle: self.layout.cached_file(&url),
                url,
                cached: true,
                pass_by_reference: false,
            };
        }
        let handle = self.layout.distinct_external_file(&ctx.user_id, &url);
        if self.is_external_service_url(&url) {
            return ResolvedReference::ExternalServiceUrl { handle, url };
        }
        ResolvedReference::ExternalUrl { handle, url, cached: false, pass_by_reference: false }
    }
}
