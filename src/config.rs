//! Server configuration, read once at start up from a JSON file

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::policy::PolicyProfile;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Externally visible base URL of the server, e.g. `http://127.0.0.1:8080/gp`
    pub base_href: String,
    /// Root of the per-user upload directories (`<user_root>/<user>/uploads`)
    pub user_root: PathBuf,
    /// Shared download cache for globally cached external URLs
    pub cache_root: PathBuf,
    /// Parent directory of job working directories
    pub jobs_root: PathBuf,
    /// Server directories any user may read from (server.browse.file.system.root)
    #[serde(default)]
    pub allowed_server_roots: Vec<PathBuf>,
    /// External URL prefixes which are downloaded once into the shared cache
    #[serde(default)]
    pub cache_external_url_dirs: Vec<String>,
    /// Hosts of the external collaboration service (GenomeSpace)
    #[serde(default = "default_external_service_hosts")]
    pub external_service_hosts: Vec<String>,
    #[serde(default = "default_download_parallelism")]
    pub download_parallelism: usize,
    #[serde(default)]
    pub list_policy: PolicyProfile,
    /// Fail the job instead of logging when a choice parameter gets a value outside its choices
    #[serde(default)]
    pub strict_choice_values: bool,
    #[serde(default)]
    pub lsf: LsfConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LsfConfig {
    #[serde(default = "default_bsub")]
    pub executable: String,
    pub project: Option<String>,
    pub queue: Option<String>,
    /// Memory reservation in GB, used for both `-R rusage[mem=N]` and `-M N`
    #[serde(default = "default_max_memory")]
    pub max_memory: String,
    pub host_os: Option<String>,
    pub job_report_file: Option<String>,
}

impl Default for LsfConfig {
    fn default() -> Self {
        LsfConfig {
            executable: default_bsub(),
            project: None,
            queue: None,
            max_memory: default_max_memory(),
            host_os: None,
            job_report_file: None,
        }
    }
}

fn default_external_service_hosts() -> Vec<String> {
    vec!["genomespace.org".to_string()]
}

fn default_download_parallelism() -> usize {
    4
}

fn default_bsub() -> String {
    "bsub".to_string()
}

fn default_max_memory() -> String {
    "2".to_string()
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<ServerConfig> {
        info!("Reading server configuration {}", path.display());
        let json = fs::read_to_string(path)
            .with_context(|| format!("Can't read server configuration at {}", path.display()))?;
        let config: ServerConfig = serde_json::from_str(&json)
            .with_context(|| format!("Invalid server configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.base_href).with_context(|| format!("base_href is not a URL: {}", self.base_href))?;
        anyhow::ensure!(self.download_parallelism > 0, "download_parallelism must be at least 1");
        Ok(())
    }

    /// The base href without a trailing slash
    pub fn base_href(&self) -> &str {
        self.base_href.trim_end_matches('/')
    }

    pub fn user_upload_dir(&self, user_id: &str) -> PathBuf {
        self.user_root.join(user_id).join("uploads")
    }

    /// Shortcut for tests and embedding: every directory under one root
    pub fn with_root(base_href: &str, root: &Path) -> ServerConfig {
        ServerConfig {
            base_href: base_href.to_string(),
            user_root: root.join("users"),
            cache_root: root.join("cache"),
            jobs_root: root.join("jobResults"),
            allowed_server_roots: Vec::new(),
            cache_external_url_dirs: Vec::new(),
            external_service_hosts: default_external_service_hosts(),
            download_parallelism: default_download_parallelism(),
            list_policy: PolicyProfile::default(),
            strict_choice_values: false,
            lsf: LsfConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"base_href": "http://127.0.0.1:8080/gp/", "user_root": "/gp/users",
                "cache_root": "/gp/cache", "jobs_root": "/gp/jobResults"}"#,
        )
        .unwrap();
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.base_href(), "http://127.0.0.1:8080/gp");
        assert_eq!(config.download_parallelism, 4);
        assert_eq!(config.list_policy, PolicyProfile::Current);
        assert_eq!(config.lsf.executable, "bsub");
        assert_eq!(config.external_service_hosts, vec!["genomespace.org"]);
        assert_eq!(config.user_upload_dir("alice"), PathBuf::from("/gp/users/alice/uploads"));
    }

    #[test]
    fn rejects_bad_base_href() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"base_href": "not a url", "user_root": "/u", "cache_root": "/c", "jobs_root": "/j",
                "list_policy": "legacy"}"#,
        )
        .unwrap();
        assert!(ServerConfig::load(&path).is_err());
    }
}
