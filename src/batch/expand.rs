use std::fs;

use log::{debug, info};

use crate::collab::PermissionCheck;
use crate::error::{JobInputError, Result};
use crate::param::spec::ParameterSpec;
use crate::param::value::{JobContext, ParamValue};
use crate::resolve::handle::FileHandle;
use crate::resolve::record::ResolvedReference;
use crate::resolve::resolver::ValueResolver;

/// Version control metadata is never a batch input
const IGNORED_ENTRIES: [&str; 3] = [".svn", ".git", "CVS"];

pub struct BatchExpander<'a> {
    resolver: &'a ValueResolver,
    permissions: &'a dyn PermissionCheck,
}

impl<'a> BatchExpander<'a> {
    pub fn new(resolver: &'a ValueResolver, permissions: &'a dyn PermissionCheck) -> BatchExpander<'a> {
        BatchExpander { resolver, permissions }
    }

    /// The batch inputs named by one value, sorted by name
    ///
    /// An external URL is a batch of one. A server file is a batch of one. A server directory
    /// contributes each child accepted by the parameter; no accepted child is an error.
    pub fn expand(&self, ctx: &JobContext, spec: &ParameterSpec, value: &str) -> Result<Vec<FileHandle>> {
        if let Some(url) = self.resolver.external_url(value) {
            debug!("Batch value for {} is a url, not expanded", spec.name);
            return Ok(vec![FileHandle::external(url)]);
        }

        let record = self.resolver.resolve(ctx, spec, &ParamValue::new(value))?;
        let readable = match &record {
            ResolvedReference::ServerPath { verified: false, .. } => false,
            record => self.permissions.can_read(ctx, record.handle()),
        };
        if !readable {
            return Err(JobInputError::PermissionDenied { param: spec.name.clone(), value: value.to_string() });
        }

        let source = record.into_handle();
        if !source.is_directory() {
            return Ok(vec![source]);
        }
        let dir = source.server_path.as_deref().unwrap_or_else(|| std::path::Path::new("/"));
        let entries = fs::read_dir(dir).map_err(|e| JobInputError::storage(&spec.name, value, e))?;
        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| JobInputError::storage(&spec.name, value, e))?;
            let name = entry.file_name();
            if IGNORED_ENTRIES.iter().any(|ignored| name == *ignored) {
                continue;
            }
            children.push(entry.path());
        }
        children.sort();

        let layout = self.resolver.layout();
        let matched: Vec<FileHandle> =
            children.iter().map(|child| layout.server_file(child)).filter(|handle| accepts(spec, handle)).collect();
        if matched.is_empty() {
            return Err(JobInputError::EmptyBatch { param: spec.name.clone(), directory: value.to_string() });
        }
        info!("Batch parameter {} matched {} of {} files in {value}", spec.name, matched.len(), children.len());
        Ok(matched)
    }
}

/// Directories for directory parameters; for file parameters any file, or only the declared formats
pub fn accepts(spec: &ParameterSpec, handle: &FileHandle) -> bool {
    if spec.is_directory() {
        return handle.is_directory();
    }
    if handle.is_directory() {
        return false;
    }
    if spec.file_formats.is_empty() {
        return true;
    }
    let kind = handle.kind();
    let extension = handle.extension().to_lowercase();
    spec.file_formats.iter().any(|format| {
        let format = format.to_lowercase();
        format == kind || format == extension
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::collab::ServerFilePermissions;
    use crate::config::ServerConfig;
    use crate::param::spec::ParamKind;
    use crate::policy::PolicyProfile;

    fn setup(root: &Path) -> (ServerConfig, ValueResolver, ServerFilePermissions, JobContext) {
        let config = ServerConfig::with_root("http://127.0.0.1:8080/gp", root);
        let resolver = ValueResolver::new(&config, &PolicyProfile::Current.policy(), None);
        let permissions = ServerFilePermissions::from_config(&config);
        let ctx = JobContext::new("alice", false, "urn:lsid:example.org:module:00001:1".parse().unwrap());
        (config, resolver, permissions, ctx)
    }

    fn gct_spec() -> ParameterSpec {
        let mut spec = ParameterSpec::new("input.file", ParamKind::File);
        spec.file_formats = vec!["gct".to_string()];
        spec
    }

    #[test]
    fn keeps_declared_formats_only() {
        let dir = tempfile::tempdir().unwrap();
        let (config, resolver, permissions, ctx) = setup(dir.path());
        let batch = config.user_upload_dir("alice").join("batch");
        fs::create_dir_all(batch.join(".svn")).unwrap();
        fs::create_dir_all(batch.join("results.gct")).unwrap();
        for name in ["a.gct", "b.cls", "notes.txt"] {
            fs::write(batch.join(name), "x").unwrap();
        }

        let expander = BatchExpander::new(&resolver, &permissions);
        let matched = expander.expand(&ctx, &gct_spec(), batch.to_str().unwrap()).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name().as_deref(), Some("a.gct"));

        let any = ParameterSpec::new("any", ParamKind::File);
        let names: Vec<String> =
            expander.expand(&ctx, &any, batch.to_str().unwrap()).unwrap().iter().filter_map(|h| h.name()).collect();
        assert_eq!(names, vec!["a.gct", "b.cls", "notes.txt"]);

        let dirs = ParameterSpec::new("dirs", ParamKind::Directory);
        let names: Vec<String> =
            expander.expand(&ctx, &dirs, batch.to_str().unwrap()).unwrap().iter().filter_map(|h| h.name()).collect();
        assert_eq!(names, vec!["results.gct"]);
        fs::remove_dir(batch.join("results.gct")).unwrap();
        assert!(matches!(
            expander.expand(&ctx, &dirs, batch.to_str().unwrap()),
            Err(JobInputError::EmptyBatch { .. })
        ));
    }

    #[test]
    fn no_match_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, resolver, permissions, ctx) = setup(dir.path());
        let batch = config.user_upload_dir("alice").join("batch");
        fs::create_dir_all(&batch).unwrap();
        fs::write(batch.join("b.cls"), "x").unwrap();
        let expander = BatchExpander::new(&resolver, &permissions);
        let err = expander.expand(&ctx, &gct_spec(), "<GenePatternURL>/users/alice/batch").unwrap_err();
        assert!(matches!(err, JobInputError::EmptyBatch { .. }));
        assert!(err.to_string().contains("input.file"));
    }

    #[test]
    fn unreadable_directory_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let (config, resolver, permissions, ctx) = setup(dir.path());
        let batch = config.user_upload_dir("bob").join("batch");
        fs::create_dir_all(&batch).unwrap();
        fs::write(batch.join("a.gct"), "x").unwrap();
        let expander = BatchExpander::new(&resolver, &permissions);
        let err = expander.expand(&ctx, &gct_spec(), batch.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, JobInputError::PermissionDenied { .. }));
    }

    #[test]
    fn url_is_a_batch_of_one() {
        let dir = tempfile::tempdir().unwrap();
        let (_config, resolver, permissions, ctx) = setup(dir.path());
        let expander = BatchExpander::new(&resolver, &permissions);
        let matched = expander.expand(&ctx, &gct_spec(), "https://example.org/data/").unwrap();
        assert_eq!(matched.len(), 1);
        assert!(!matched[0].is_local());
    }
}
