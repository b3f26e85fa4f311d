use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::assemble::filelist::{filelist_line, write_filelist, write_group_file};
use crate::assemble::materialize::Materializer;
use crate::collab::{PermissionCheck, UploadCatalog};
use crate::error::{CardinalityKind, JobInputError, Result, SubmissionErrors};
use crate::param::list_mode::{self, ListMode};
use crate::param::num_values::NumValues;
use crate::param::range::RangeValues;
use crate::param::spec::ParameterSpec;
use crate::param::value::{JobContext, Param, ParamValue};
use crate::policy::ListPolicy;
use crate::resolve::handle::FileHandle;
use crate::resolve::href::{expand_server_url, replace_server_url};
use crate::resolve::record::ResolvedReference;
use crate::resolve::resolver::ValueResolver;

/// How the values of a parameter reach the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ValueShape {
    Empty,
    Single,
    FileList { path: PathBuf, group_file: Option<PathBuf> },
    CommandLine { tokens: Vec<String> },
}

/// What gets stored with the job for one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledValue {
    pub name: String,
    /// For file and directory parameters the server base href is replaced by the placeholder
    pub value: String,
    pub shape: ValueShape,
    /// `values_<i>` and `valuesGroup_<i>` for file lists, `mode=URL` for file parameters,
    /// `localCopy` for a downloaded external file
    pub attributes: BTreeMap<String, String>,
}

impl AssembledValue {
    /// The stored value with the placeholder expanded, for display or reload
    pub fn display_value(&self, base_href: &str) -> String {
        expand_server_url(&self.value, base_href)
    }

    /// Args for the module command line
    pub fn command_line(&self, base_href: &str) -> Vec<String> {
        match &self.shape {
            ValueShape::Empty => Vec::new(),
            ValueShape::CommandLine { tokens } => tokens.clone(),
            ValueShape::Single | ValueShape::FileList { .. } => vec![self.display_value(base_href)],
        }
    }
}

/// Shared state for assembling the parameters of a job
#[derive(Clone)]
pub struct Assembler {
    resolver: ValueResolver,
    permissions: Arc<dyn PermissionCheck>,
    catalog: Arc<dyn UploadCatalog>,
    materializer: Materializer,
    policy: ListPolicy,
    strict_choice_values: bool,
}

impl Assembler {
    pub fn new(
        resolver: ValueResolver,
        permissions: Arc<dyn PermissionCheck>,
        catalog: Arc<dyn UploadCatalog>,
        materializer: Materializer,
        policy: ListPolicy,
    ) -> Assembler {
        Assembler { resolver, permissions, catalog, materializer, policy, strict_choice_values: false }
    }

    pub fn strict_choice_values(mut self, strict: bool) -> Assembler {
        self.strict_choice_values = strict;
        self
    }

    /// The same assembler for a job submitted through another host name
    pub fn for_base_href(&self, base_href: Option<&str>) -> Assembler {
        Assembler { resolver: self.resolver.with_base_href(base_href), ..self.clone() }
    }

    pub fn resolver(&self) -> &ValueResolver {
        &self.resolver
    }

    pub fn permissions(&self) -> &dyn PermissionCheck {
        self.permissions.as_ref()
    }

    pub fn policy(&self) -> &ListPolicy {
        &self.policy
    }

    /// `actual` is `None` when the parameter was not submitted; the declared default applies
    pub fn helper<'a>(&'a self, spec: &'a ParameterSpec, actual: Option<&Param>) -> Result<ParamListHelper<'a>> {
        ParamListHelper::new(self, spec, actual)
    }

    /// Validate and resolve the values of one parameter
    ///
    /// External files are downloaded when `download_external` is set; all errors found for the
    /// parameter are reported together.
    pub async fn assemble(
        &self,
        ctx: &JobContext,
        spec: &ParameterSpec,
        actual: Option<&Param>,
        download_external: bool,
    ) -> std::result::Result<AssembledValue, SubmissionErrors> {
        self.helper(spec, actual)?.assemble(ctx, download_external).await
    }
}

/// Validation and assembly of one parameter of one job
pub struct ParamListHelper<'a> {
    assembler: &'a Assembler,
    spec: &'a ParameterSpec,
    actual: Param,
    allowed_num_values: NumValues,
    allowed_range: RangeValues<f64>,
    allowed_num_groups: Option<NumValues>,
    has_group_info: bool,
    list_mode: ListMode,
}

impl<'a> ParamListHelper<'a> {
    fn new(assembler: &'a Assembler, spec: &'a ParameterSpec, actual: Option<&Param>) -> Result<ParamListHelper<'a>> {
        let mut actual = match actual {
            Some(actual) => actual.clone(),
            None => Param::from_default(spec),
        };
        if spec.is_file_or_directory() {
            actual.values.retain(|v| !v.value.is_empty());
        }
        let has_group_info = assembler.policy.grouped_lists && spec.group_info.is_some();
        Ok(ParamListHelper {
            assembler,
            spec,
            actual,
            allowed_num_values: spec.allowed_num_values()?,
            allowed_range: spec.allowed_range()?,
            allowed_num_groups: if has_group_info { spec.allowed_num_groups()? } else { None },
            has_group_info,
            list_mode: spec.resolve_list_mode(&assembler.policy)?,
        })
    }

    pub fn list_mode(&self) -> ListMode {
        self.list_mode
    }

    pub fn num_values(&self) -> usize {
        self.actual.num_values()
    }

    pub fn is_create_filelist(&self) -> bool {
        list_mode::is_create_filelist(&self.allowed_num_values, self.num_values(), self.list_mode)
    }

    pub fn is_create_group_file(&self) -> bool {
        list_mode::is_create_group_file(self.is_create_filelist(), self.has_group_info)
    }

    pub fn is_cmd_line_list(&self) -> bool {
        list_mode::is_cmd_line_list(&self.allowed_num_values, self.list_mode)
    }

    pub fn validate_num_values(&self) -> Result<()> {
        let n = self.num_values();
        let error = |kind, bound: String| JobInputError::Cardinality {
            param: self.spec.name.clone(),
            kind,
            actual: n,
            bound,
        };
        if n == 0 && !self.spec.optional {
            return Err(error(CardinalityKind::MissingRequired, String::new()));
        }
        if let Some(min) = self.allowed_num_values.min {
            if n < min as usize && !(n == 0 && self.spec.optional) {
                return Err(error(CardinalityKind::NotEnough, format!(", min={min}")));
            }
        }
        if let Some(max) = self.allowed_num_values.max {
            if n > max as usize {
                return Err(error(CardinalityKind::TooMany, format!(", max={max}")));
            }
        }
        Ok(())
    }

    pub fn validate_num_groups(&self) -> Result<()> {
        let allowed = match &self.allowed_num_groups {
            Some(allowed) => allowed,
            None => return Ok(()),
        };
        let n = self.actual.groups().len();
        let below = allowed.min.map_or(false, |min| n < min as usize);
        let above = allowed.max.map_or(false, |max| n > max as usize);
        if self.num_values() > 0 && (below || above) {
            return Err(JobInputError::Cardinality {
                param: self.spec.name.clone(),
                kind: CardinalityKind::Groups,
                actual: n,
                bound: format!(", numGroups={allowed}"),
            });
        }
        Ok(())
    }

    /// Every value must be a number inside the declared range
    pub fn validate_range(&self) -> Result<()> {
        if !self.allowed_range.is_set() {
            return Ok(());
        }
        for value in self.actual.values.iter().filter(|v| !v.value.trim().is_empty()) {
            let in_range = value.value.trim().parse::<f64>().map_or(false, |n| self.allowed_range.contains(n));
            if !in_range {
                return Err(JobInputError::Range {
                    param: self.spec.name.clone(),
                    value: value.value.clone(),
                    bound: self.allowed_range.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Vec<JobInputError> {
        [self.validate_num_values(), self.validate_num_groups(), self.validate_range()]
            .into_iter()
            .filter_map(|r| r.err())
            .collect()
    }

    pub async fn assemble(&self, ctx: &JobContext, download_external: bool) -> std::result::Result<AssembledValue, SubmissionErrors> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(SubmissionErrors(errors));
        }

        let mut attributes = BTreeMap::new();
        if self.spec.is_file_or_directory() {
            attributes.insert("mode".to_string(), "URL".to_string());
        }
        let (value, shape) = if self.is_create_filelist() {
            self.assemble_filelist(ctx, download_external, &mut attributes).await?
        } else if self.is_cmd_line_list() {
            let (values, args) = self.cmd_line_values(ctx, download_external).await?;
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let tokens = self.spec.cmd_line_format().tokens(self.list_mode, &args);
            if tokens.is_empty() {
                (String::new(), ValueShape::Empty)
            } else {
                (format!("[{}]", values.join(", ")), ValueShape::CommandLine { tokens })
            }
        } else {
            match self.actual.values.as_slice() {
                [] => (String::new(), ValueShape::Empty),
                [single] => {
                    let (value, local_copy) = self.single_value(ctx, single, download_external).await?;
                    if let Some(local_copy) = local_copy {
                        let base_href = self.assembler.resolver.base_href();
                        attributes.insert("localCopy".to_string(), replace_server_url(&local_copy, base_href));
                    }
                    (value, ValueShape::Single)
                }
                values => {
                    // not a list parameter and no declared numValues to reject it earlier
                    return Err(JobInputError::Cardinality {
                        param: self.spec.name.clone(),
                        kind: CardinalityKind::TooMany,
                        actual: values.len(),
                        bound: ", max=1".to_string(),
                    }
                    .into());
                }
            }
        };

        let value = if self.spec.is_file_or_directory() {
            replace_server_url(&value, self.assembler.resolver.base_href())
        } else {
            value
        };
        debug!("{}={value} ({})", self.spec.name, self.list_mode);
        Ok(AssembledValue { name: self.spec.name.clone(), value, shape, attributes })
    }

    /// The stored value, and the server href of the local copy when an external file was downloaded
    async fn single_value(&self, ctx: &JobContext, value: &ParamValue, download_external: bool) -> Result<(String, Option<String>)> {
        let raw = self.substitute_choice(&value.value)?;
        if !self.spec.is_file_or_directory() {
            return Ok((raw, None));
        }
        let record = self.resolve_checked(ctx, &raw, &value.group_id)?;
        let mut local_copy = None;
        if download_external && record.needs_download() {
            self.assembler.materializer.materialize(ctx, &self.spec.name, &record).await?;
            local_copy = record.handle().href(self.assembler.resolver.base_href());
        }
        Ok((self.stored_href(&record, &raw), local_copy))
    }

    /// Stored values and command line args for CMD and CMD_OPT
    ///
    /// File values are stored as server URLs; their args are local paths, the local copy for a
    /// downloaded external file, or the URL itself when nothing was downloaded.
    async fn cmd_line_values(
        &self,
        ctx: &JobContext,
        download_external: bool,
    ) -> std::result::Result<(Vec<String>, Vec<String>), SubmissionErrors> {
        let mut errors = Vec::new();
        let mut raws = Vec::new();
        for value in &self.actual.values {
            match self.substitute_choice(&value.value) {
                Ok(raw) => raws.push(raw),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(SubmissionErrors(errors));
        }
        if !self.spec.is_file_or_directory() {
            return Ok((raws.clone(), raws));
        }

        let mut records = Vec::new();
        for (raw, value) in raws.iter().zip(&self.actual.values) {
            match self.resolve_checked(ctx, raw, &value.group_id) {
                Ok(record) => records.push(record),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(SubmissionErrors(errors));
        }
        if download_external {
            let downloaded = self.assembler.materializer.materialize_all(ctx, &self.spec.name, records).await;
            records = Vec::new();
            for result in downloaded {
                match result {
                    Ok(record) => records.push(record),
                    Err(e) => errors.push(e),
                }
            }
            if !errors.is_empty() {
                return Err(SubmissionErrors(errors));
            }
        }

        let mut values = Vec::with_capacity(records.len());
        let mut args = Vec::with_capacity(records.len());
        for (record, raw) in records.iter().zip(&raws) {
            values.push(self.stored_href(record, raw));
            let local = record.is_server_file() || (download_external && record.needs_download());
            let path = record.handle().server_path.as_deref().filter(|_| local);
            args.push(path.map(|p| p.to_string_lossy().to_string()).unwrap_or_else(|| raw.clone()));
        }
        Ok((values, args))
    }

    async fn assemble_filelist(
        &self,
        ctx: &JobContext,
        download_external: bool,
        attributes: &mut BTreeMap<String, String>,
    ) -> std::result::Result<(String, ValueShape), SubmissionErrors> {
        let name = &self.spec.name;
        let base_href = self.assembler.resolver.base_href();
        let lines = if self.spec.is_file_or_directory() {
            self.filelist_lines(ctx, download_external).await?
        } else {
            let mut lines = Vec::new();
            for value in &self.actual.values {
                lines.push(self.substitute_choice(&value.value)?);
            }
            lines
        };

        for (idx, (line, value)) in lines.iter().zip(&self.actual.values).enumerate() {
            attributes.insert(format!("values_{idx}"), line.clone());
            if self.has_group_info {
                attributes.insert(format!("valuesGroup_{idx}"), value.group_id.clone());
            }
        }

        let list = self.filelist_handle(ctx, "list");
        let path = list.server_path.clone().unwrap_or_default();
        write_filelist(&path, &lines).await.map_err(|e| JobInputError::storage(name, path.display(), e))?;

        let group_file = if self.is_create_group_file() {
            let group_path = self.filelist_handle(ctx, "group").server_path.unwrap_or_default();
            let groups: Vec<&str> = self.actual.values.iter().map(|v| v.group_id.as_str()).collect();
            write_group_file(&group_path, &groups)
                .await
                .map_err(|e| JobInputError::storage(name, group_path.display(), e))?;
            Some(group_path)
        } else {
            None
        };

        self.assembler.catalog.register_upload(&ctx.user_id, &list).map_err(|e| {
            JobInputError::storage(name, path.display(), std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        info!("Created file list for {name} with {} values", lines.len());

        let value = list.href(base_href).unwrap_or_else(|| path.display().to_string());
        Ok((value, ValueShape::FileList { path, group_file }))
    }

    /// One line per value: resolved, permission checked and downloaded as needed
    async fn filelist_lines(&self, ctx: &JobContext, download_external: bool) -> std::result::Result<Vec<String>, SubmissionErrors> {
        let mut errors = Vec::new();
        let mut records = Vec::new();
        for value in &self.actual.values {
            let record = self
                .substitute_choice(&value.value)
                .and_then(|raw| self.resolve_checked(ctx, &raw, &value.group_id));
            match record {
                Ok(record) => records.push(record),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(SubmissionErrors(errors));
        }

        if download_external {
            let downloaded = self.assembler.materializer.materialize_all(ctx, &self.spec.name, records).await;
            records = Vec::new();
            for result in downloaded {
                match result {
                    Ok(record) => records.push(record),
                    Err(e) => errors.push(e),
                }
            }
            if !errors.is_empty() {
                return Err(SubmissionErrors(errors));
            }
        }

        let base_href = self.assembler.resolver.base_href();
        Ok(records
            .iter()
            .zip(&self.actual.values)
            .map(|(record, value)| {
                let materialized = record.is_server_file() || (download_external && record.needs_download());
                filelist_line(record.handle(), materialized).unwrap_or_else(|| replace_server_url(&value.value, base_href))
            })
            .collect())
    }

    /// `tmp/run<submission>/<param>/<param>.<suffix>.txt` in the user's uploads
    fn filelist_handle(&self, ctx: &JobContext, suffix: &str) -> FileHandle {
        let name = &self.spec.name;
        let relative = Path::new("tmp")
            .join(format!("run{}", ctx.submission_id))
            .join(name)
            .join(format!("{name}.{suffix}.txt"));
        self.assembler.resolver.layout().upload_file(&ctx.user_id, &relative)
    }

    fn resolve_checked(&self, ctx: &JobContext, raw: &str, group_id: &str) -> Result<ResolvedReference> {
        let name = &self.spec.name;
        let record = self.assembler.resolver.resolve(ctx, self.spec, &ParamValue::grouped(raw, group_id))?;
        if !record.is_server_file() {
            if self.spec.is_directory() {
                return Err(JobInputError::resolution(name, raw, Some("external url not allowed for a directory")));
            }
            return Ok(record);
        }

        let readable = match &record {
            ResolvedReference::ServerPath { verified: false, .. } => false,
            _ => self.assembler.permissions.can_read(ctx, record.handle()),
        };
        if !readable {
            return Err(JobInputError::PermissionDenied { param: name.clone(), value: raw.to_string() });
        }
        if self.spec.is_directory() && !record.handle().is_directory() {
            return Err(JobInputError::resolution(name, raw, Some("not a directory")));
        }
        Ok(record)
    }

    /// Server files are stored as server URLs, external files keep their URL
    fn stored_href(&self, record: &ResolvedReference, raw: &str) -> String {
        if record.is_server_file() {
            return record.handle().href(self.assembler.resolver.base_href()).unwrap_or_else(|| raw.to_string());
        }
        raw.to_string()
    }

    /// Map a choice label to its value
    fn substitute_choice(&self, value: &str) -> Result<String> {
        if self.spec.choices.is_empty() || value.is_empty() || self.spec.is_choice_value(value) {
            return Ok(value.to_string());
        }
        if let Some(mapped) = self.spec.choice_value_for_label(value) {
            return Ok(mapped.to_string());
        }
        if self.assembler.strict_choice_values {
            return Err(JobInputError::resolution(&self.spec.name, value, Some("not one of the declared choices")));
        }
        warn!("Invalid choice value for {}: {value}", self.spec.name);
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::fs::File;
    use tokio::io::AsyncWriteExt;
    use url::Url;

    use super::*;
    use crate::collab::{NoExternalService, ServerFilePermissions, UrlFetcher};
    use crate::config::ServerConfig;
    use crate::param::spec::{Choice, GroupInfo, ParamKind};
    use crate::policy::PolicyProfile;

    const BASE: &str = "http://127.0.0.1:8080/gp";

    struct EchoFetcher;

    #[async_trait]
    impl UrlFetcher for EchoFetcher {
        async fn fetch(&self, url: &Url, dest: &mut File) -> anyhow::Result<u64> {
            dest.write_all(url.as_str().as_bytes()).await?;
            Ok(url.as_str().len() as u64)
        }
    }

    #[derive(Default)]
    struct MemoryCatalog {
        entries: Mutex<Vec<PathBuf>>,
    }

    impl UploadCatalog for MemoryCatalog {
        fn register_upload(&self, _user_id: &str, handle: &FileHandle) -> anyhow::Result<bool> {
            self.entries.lock().unwrap().push(handle.server_path.clone().unwrap());
            Ok(true)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: ServerConfig,
        catalog: Arc<MemoryCatalog>,
        assembler: Assembler,
        ctx: JobContext,
    }

    fn fixture(profile: PolicyProfile) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::with_root(BASE, dir.path());
        let policy = profile.policy();
        let catalog = Arc::new(MemoryCatalog::default());
        let materializer = Materializer::new(Arc::new(EchoFetcher), Arc::new(NoExternalService), catalog.clone(), 2);
        let assembler = Assembler::new(
            ValueResolver::new(&config, &policy, None),
            Arc::new(ServerFilePermissions::from_config(&config)),
            catalog.clone(),
            materializer,
            policy,
        );
        let ctx = JobContext::new("alice", false, "urn:lsid:example.org:module:00001:1".parse().unwrap());
        Fixture { _dir: dir, config, catalog, assembler, ctx }
    }

    fn upload(config: &ServerConfig, user: &str, name: &str) -> PathBuf {
        let path = config.user_upload_dir(user).join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "data").unwrap();
        path
    }

    fn spec(name: &str, kind: ParamKind, num_values: &str, list_mode: Option<&str>) -> ParameterSpec {
        let mut spec = ParameterSpec::new(name, kind);
        spec.num_values = Some(num_values.to_string());
        spec.list_mode = list_mode.map(str::to_string);
        spec
    }

    #[tokio::test]
    async fn cmd_opt_prefix_is_a_separate_token() {
        let f = fixture(PolicyProfile::Current);
        let mut spec = spec("arg", ParamKind::Text, "0+", Some("CMD_OPT"));
        spec.prefix_when_specified = Some("-i ".to_string());
        let param = Param::with_values("arg", &["v1", "v2", "v3"]);
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();
        assert_eq!(
            value.shape,
            ValueShape::CommandLine {
                tokens: ["-i", "v1", "-i", "v2", "-i", "v3"].iter().map(|s| s.to_string()).collect()
            }
        );
        assert_eq!(value.value, "[v1, v2, v3]");
    }

    #[tokio::test]
    async fn cmd_opt_file_values_are_local_paths_on_the_command_line() {
        let f = fixture(PolicyProfile::Current);
        let a = upload(&f.config, "alice", "a.gct");
        let mut spec = spec("in", ParamKind::File, "1+", Some("CMD_OPT"));
        spec.prefix_when_specified = Some("-i ".to_string());
        let param = Param::with_values("in", &["<GenePatternURL>/users/alice/a.gct", "https://example.org/data/b.gct"]);
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();
        assert_eq!(value.value, "[<GenePatternURL>/users/alice/a.gct, https://example.org/data/b.gct]");

        let copy = f.config.user_upload_dir("alice").join("tmp/external/example.org/data/b.gct");
        assert_eq!(fs::read_to_string(&copy).unwrap(), "https://example.org/data/b.gct");
        let module = crate::param::spec::ModuleSpec {
            lsid: f.ctx.lsid.clone(),
            name: "run".to_string(),
            command_line: Some("run <in>".to_string()),
            params: vec![spec],
        };
        let command = crate::dispatch::command::command_line(&module, &[value], f.assembler.resolver());
        assert_eq!(command, vec!["run", "-i", a.to_str().unwrap(), "-i", copy.to_str().unwrap()]);
    }

    #[tokio::test]
    async fn cmd_joins_values() {
        let f = fixture(PolicyProfile::Current);
        let mut spec = spec("arg", ParamKind::Text, "0+", Some("cmd"));
        spec.prefix_when_specified = Some("-F".to_string());
        spec.list_mode_sep = Some(";".to_string());
        let param = Param::with_values("arg", &["a", "b"]);
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();
        assert_eq!(value.command_line(BASE), vec!["-Fa;b".to_string()]);
    }

    #[tokio::test]
    async fn cardinality_and_range_errors_are_collected() {
        let f = fixture(PolicyProfile::Current);
        let mut spec = spec("k", ParamKind::Integer, "1..2", None);
        spec.range = Some("1..10".to_string());
        let param = Param::with_values("k", &["1", "20", "5"]);
        let errors = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap_err();
        assert_eq!(errors.0.len(), 2);
        assert!(matches!(errors.0[0], JobInputError::Cardinality { kind: CardinalityKind::TooMany, .. }));
        assert!(matches!(errors.0[1], JobInputError::Range { .. }));

        let errors = f.assembler.assemble(&f.ctx, &spec, None, true).await.unwrap_err();
        assert!(matches!(errors.0[0], JobInputError::Cardinality { kind: CardinalityKind::MissingRequired, .. }));
    }

    #[tokio::test]
    async fn default_value_applies_when_not_submitted() {
        let f = fixture(PolicyProfile::Current);
        let mut spec = spec("k", ParamKind::Integer, "1", None);
        spec.default_value = Some("3".to_string());
        let value = f.assembler.assemble(&f.ctx, &spec, None, true).await.unwrap();
        assert_eq!(value.value, "3");
        assert_eq!(value.shape, ValueShape::Single);
    }

    #[tokio::test]
    async fn file_list_uses_placeholder_lines_and_groups() {
        let f = fixture(PolicyProfile::Current);
        let a = upload(&f.config, "alice", "a.gct");
        let b = upload(&f.config, "alice", "b.gct");
        let mut spec = spec("input.files", ParamKind::File, "1+", None);
        spec.group_info = Some(GroupInfo { num_groups: Some("1..2".to_string()), group_column_label: None, file_column_label: None });

        let mut param = Param::new("input.files");
        param.values.push(ParamValue::grouped(a.to_str().unwrap(), "tumor"));
        param.values.push(ParamValue::grouped("<GenePatternURL>/users/alice/b.gct", "normal"));
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();

        let (path, group_file) = match &value.shape {
            ValueShape::FileList { path, group_file } => (path.clone(), group_file.clone().unwrap()),
            other => panic!("expected a file list, got {other:?}"),
        };
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "<GenePatternURL>/users/alice/a.gct\n<GenePatternURL>/users/alice/b.gct\n"
        );
        assert_eq!(fs::read_to_string(group_file).unwrap(), "0\ttumor\n1\tnormal\n");
        assert!(value.value.starts_with("<GenePatternURL>/users/alice/tmp/run"));
        assert!(value.value.ends_with("/input.files/input.files.list.txt"));
        assert_eq!(value.attributes["values_1"], "<GenePatternURL>/users/alice/b.gct");
        assert_eq!(value.attributes["valuesGroup_0"], "tumor");
        assert_eq!(value.attributes["mode"], "URL");
        assert_eq!(*f.catalog.entries.lock().unwrap(), vec![path]);
        assert!(b.exists());
    }

    #[tokio::test]
    async fn other_users_files_are_denied_with_literal_value() {
        let f = fixture(PolicyProfile::Current);
        upload(&f.config, "alice", "a.gct");
        let bob = upload(&f.config, "bob", "secret.gct");
        let spec = spec("input.files", ParamKind::File, "1+", None);
        let param = Param::with_values("input.files", &["<GenePatternURL>/users/alice/a.gct", bob.to_str().unwrap()]);
        let errors = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap_err();
        assert_eq!(errors.0.len(), 1);
        match &errors.0[0] {
            JobInputError::PermissionDenied { value, .. } => assert_eq!(value, bob.to_str().unwrap()),
            other => panic!("unexpected error {other}"),
        }
        assert!(f.catalog.entries.lock().unwrap().is_empty());
        assert!(!f.config.user_upload_dir("alice").join("tmp").exists());
    }

    #[tokio::test]
    async fn pass_by_reference_keeps_url() {
        let f = fixture(PolicyProfile::Current);
        let mut spec = spec("input.file", ParamKind::File, "0..1", None);
        spec.pass_by_reference = true;
        let param = Param::with_values("input.file", &["https://example.org/data/a.gct"]);
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();
        assert_eq!(value.value, "https://example.org/data/a.gct");
        assert!(!f.config.user_upload_dir("alice").join("tmp").exists());
    }

    #[tokio::test]
    async fn external_list_values_are_downloaded() {
        let f = fixture(PolicyProfile::Current);
        let spec = spec("input.files", ParamKind::File, "1+", Some("LIST"));
        let param = Param::with_values("input.files", &["https://example.org/data/a.gct"]);
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();
        let local = f.config.user_upload_dir("alice").join("tmp/external/example.org/data/a.gct");
        assert_eq!(fs::read_to_string(&local).unwrap(), "https://example.org/data/a.gct");
        assert_eq!(value.attributes["values_0"], "<GenePatternURL>/users/alice/tmp/external/example.org/data/a.gct");
        // the download and the list
        assert_eq!(f.catalog.entries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn single_external_value_keeps_url_and_records_copy() {
        let f = fixture(PolicyProfile::Current);
        let spec = spec("input.file", ParamKind::File, "1", None);
        let param = Param::with_values("input.file", &["https://example.org/data/a.gct"]);
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();
        assert_eq!(value.value, "https://example.org/data/a.gct");
        assert_eq!(value.attributes["localCopy"], "<GenePatternURL>/users/alice/tmp/external/example.org/data/a.gct");
    }

    #[tokio::test]
    async fn legacy_single_file_is_stored_as_server_url() {
        let f = fixture(PolicyProfile::Legacy);
        upload(&f.config, "alice", "a.gct");
        let spec = spec("input.file", ParamKind::File, "0+", None);
        let param = Param::with_values("input.file", &["http://127.0.0.1:8080/gp/users/alice/a.gct"]);
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();
        assert_eq!(value.shape, ValueShape::Single);
        assert_eq!(value.value, "<GenePatternURL>/users/alice/a.gct");
        assert_eq!(value.display_value(BASE), "http://127.0.0.1:8080/gp/users/alice/a.gct");
    }

    #[tokio::test]
    async fn directory_params_need_a_directory() {
        let f = fixture(PolicyProfile::Current);
        let file = upload(&f.config, "alice", "a.gct");
        let spec = spec("dir", ParamKind::Directory, "1", None);
        let param = Param::with_values("dir", &[file.to_str().unwrap()]);
        let errors = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap_err();
        assert!(matches!(errors.0[0], JobInputError::Resolution { .. }));

        let param = Param::with_values("dir", &[file.parent().unwrap().to_str().unwrap()]);
        let value = f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap();
        assert_eq!(value.value, "<GenePatternURL>/users/alice/");
    }

    #[tokio::test]
    async fn choice_labels_map_to_values() {
        let f = fixture(PolicyProfile::Current);
        let mut spec = spec("metric", ParamKind::Text, "1", None);
        spec.choices = vec![Choice { label: "Pearson".to_string(), value: "-p".to_string() }];
        let param = Param::with_values("metric", &["Pearson"]);
        assert_eq!(f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap().value, "-p");

        let param = Param::with_values("metric", &["spearman"]);
        assert_eq!(f.assembler.assemble(&f.ctx, &spec, Some(&param), true).await.unwrap().value, "spearman");
        let strict = f.assembler.clone().strict_choice_values(true);
        assert!(strict.assemble(&f.ctx, &spec, Some(&param), true).await.is_err());
    }
}
