use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::collab::{JobDispatcher, PreparedJob};
use crate::config::{LsfConfig, ServerConfig};
use crate::db::job::update::{submitted, update_working_dir};
use crate::error::JobInputError;
use crate::param::value::JobContext;

/// included job script template
static JOB_SCRIPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/job.sh"));

/// LSF's default when no report file is configured
const DEFAULT_REPORT_FILE: &str = ".lsf.out";

/// Stages each job in the database and its own working directory, then pipes the job script to
/// bsub
///
/// With `dry_run` the job is left staged: the working directory and job script are written but
/// nothing is submitted.
pub struct LsfDispatcher {
    conn: Arc<Mutex<Connection>>,
    lsf: LsfConfig,
    jobs_root: PathBuf,
    dry_run: bool,
}

/// Rendering context for the job script
#[derive(Serialize)]
struct JobScriptContext {
    name: String,
    job_id: i64,
    user_id: String,
    work_dir: String,
    report_file: String,
    max_memory: String,
    project: Option<String>,
    queue: Option<String>,
    host_os: Option<String>,
    time_now: String,
    command: String,
}

impl LsfDispatcher {
    pub fn new(conn: Arc<Mutex<Connection>>, config: &ServerConfig) -> LsfDispatcher {
        LsfDispatcher {
            conn,
            lsf: config.lsf.clone(),
            jobs_root: config.jobs_root.clone(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> LsfDispatcher {
        self.dry_run = dry_run;
        self
    }

    /// The lock is released before returning, never held across an await
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, JobInputError> {
        let conn = self.conn.lock().map_err(|_| JobInputError::Dispatch("database connection lock poisoned".to_string()))?;
        f(&conn).map_err(|err| JobInputError::Dispatch(format!("database error: {err}")))
    }

    /// Working directory with params.json and job.sh
    fn create(&self, ctx: &JobContext, job_id: i64, job: &PreparedJob) -> Result<PathBuf, JobInputError> {
        let work_dir = self.jobs_root.join(job_id.to_string());
        info!("Creating job {job_id} in working directory {}", work_dir.display());
        if work_dir.exists() {
            warn!("Job directory already exists, files will be overwritten");
        }
        let io_error = |err: std::io::Error| JobInputError::Dispatch(format!("can't write job {job_id}: {err}"));
        fs::create_dir_all(&work_dir).map_err(io_error)?;

        let params = serde_json::to_string_pretty(&job.values)
            .map_err(|err| JobInputError::Dispatch(format!("can't serialise params of job {job_id}: {err}")))?;
        fs::write(work_dir.join("params.json"), params).map_err(io_error)?;

        let script = self.render(ctx, job_id, &work_dir, job)?;
        fs::write(work_dir.join("job.sh"), script).map_err(io_error)?;
        Ok(work_dir)
    }

    fn render(&self, ctx: &JobContext, job_id: i64, work_dir: &Path, job: &PreparedJob) -> Result<String, JobInputError> {
        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&format_unescaped);
        let template_error = |err: tinytemplate::error::Error| JobInputError::Dispatch(format!("can't render job script: {err}"));
        tt.add_template("job", JOB_SCRIPT).map_err(template_error)?;

        let context = JobScriptContext {
            name: format!("gp_job_{job_id}"),
            job_id,
            user_id: ctx.user_id.clone(),
            work_dir: work_dir.to_string_lossy().to_string(),
            report_file: self.lsf.job_report_file.clone().unwrap_or_else(|| DEFAULT_REPORT_FILE.to_string()),
            max_memory: self.lsf.max_memory.clone(),
            project: self.lsf.project.clone(),
            queue: self.lsf.queue.clone(),
            host_os: self.lsf.host_os.clone(),
            time_now: Utc::now().to_rfc3339(),
            command: job.command.iter().map(|arg| shell_quote(arg)).collect::<Vec<_>>().join(" "),
        };
        tt.render("job", &context).map_err(template_error)
    }

    async fn bsub(&self, work_dir: &Path) -> Result<String, JobInputError> {
        let script = fs::read(work_dir.join("job.sh"))
            .map_err(|err| JobInputError::Dispatch(format!("can't read job script: {err}")))?;
        let spawn_error = |err: std::io::Error| JobInputError::Dispatch(format!("can't run {}: {err}", self.lsf.executable));
        let mut child = Command::new(&self.lsf.executable)
            .current_dir(work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&script).await.map_err(spawn_error)?;
        }
        let output = child.wait_with_output().await.map_err(spawn_error)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(JobInputError::Dispatch(format!(
                "{} exited with {}: {}",
                self.lsf.executable,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_queue_id(&stdout)
            .ok_or_else(|| JobInputError::Dispatch(format!("unexpected {} output: {}", self.lsf.executable, stdout.trim())))
    }
}

#[async_trait]
impl JobDispatcher for LsfDispatcher {
    async fn post_job(&self, ctx: &JobContext, job: &PreparedJob) -> Result<String, JobInputError> {
        let job_id = self.with_conn(|conn| job.stage(conn, ctx))?;
        let work_dir = self.create(ctx, job_id, job)?;
        self.with_conn(|conn| update_working_dir(conn, job_id, &work_dir))?;

        if self.dry_run {
            info!("Dry run, job {job_id} stays staged");
            return Ok(job_id.to_string());
        }
        let queue_id = self.bsub(&work_dir).await?;
        self.with_conn(|conn| submitted(conn, job_id, &queue_id))?;
        Ok(job_id.to_string())
    }
}

/// The id in bsub's `Job <1234> is submitted to queue <normal>.`
fn parse_queue_id(stdout: &str) -> Option<String> {
    let rest = stdout.split("Job <").nth(1)?;
    let id = &rest[..rest.find('>')?];
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
}

fn shell_quote(arg: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "_-./:=,+@%".contains(c);
    if !arg.is_empty() && arg.chars().all(safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job::load::get_job;
    use crate::db::job::state::JobState;
    use crate::db::open::open_in_memory;
    use crate::param::value::JobInputSet;

    fn job() -> PreparedJob {
        let lsid = "urn:lsid:example.org:module:00001:1".parse().unwrap();
        PreparedJob {
            input: JobInputSet::new(lsid),
            values: Vec::new(),
            command: vec!["echo".to_string(), "it's".to_string(), "a.gct".to_string()],
            batch_id: Some("batch-1".to_string()),
        }
    }

    fn dispatcher(root: &Path) -> (Arc<Mutex<Connection>>, LsfDispatcher) {
        let mut config = ServerConfig::with_root("http://127.0.0.1:8080/gp", root);
        config.lsf.queue = Some("long".to_string());
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        (conn.clone(), LsfDispatcher::new(conn, &config))
    }

    #[test]
    fn reads_bsub_output() {
        assert_eq!(parse_queue_id("Job <1234> is submitted to queue <normal>.\n").as_deref(), Some("1234"));
        assert_eq!(parse_queue_id("Request aborted by esub"), None);
    }

    #[test]
    fn quotes_unsafe_args() {
        assert_eq!(shell_quote("/gp/users/a.gct"), "/gp/users/a.gct");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[tokio::test]
    async fn dry_run_stages_job() {
        let dir = tempfile::tempdir().unwrap();
        let (conn, dispatcher) = dispatcher(dir.path());
        let dispatcher = dispatcher.dry_run(true);
        let ctx = JobContext::new("alice", false, job().input.lsid);

        let job_id = dispatcher.post_job(&ctx, &job()).await.unwrap();
        let work_dir = dir.path().join("jobResults").join(&job_id);
        let script = fs::read_to_string(work_dir.join("job.sh")).unwrap();
        assert!(script.contains("#BSUB -J gp_job_1"));
        assert!(script.contains("#BSUB -q long"));
        assert!(script.contains("#BSUB -o .lsf.out"));
        assert!(!script.contains("#BSUB -P"));
        assert!(script.contains(r"echo 'it'\''s' a.gct > stdout.txt 2> stderr.txt"));
        assert_eq!(fs::read_to_string(work_dir.join("params.json")).unwrap(), "[]");

        let record = get_job(&conn.lock().unwrap(), 1).unwrap();
        assert_eq!(record.state, JobState::Staged);
        assert_eq!(record.batch_id.as_deref(), Some("batch-1"));
        assert_eq!(record.working_dir, Some(work_dir.to_string_lossy().to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn submits_to_bsub() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bsub = dir.path().join("bsub");
        fs::write(&bsub, "#!/bin/sh\ncat > /dev/null\necho 'Job <4321> is submitted to queue <long>.'\n").unwrap();
        fs::set_permissions(&bsub, fs::Permissions::from_mode(0o755)).unwrap();

        let (conn, mut dispatcher) = dispatcher(dir.path());
        dispatcher.lsf.executable = bsub.to_string_lossy().to_string();
        let ctx = JobContext::new("alice", false, job().input.lsid);
        assert_eq!(dispatcher.post_job(&ctx, &job()).await.unwrap(), "1");

        let record = get_job(&conn.lock().unwrap(), 1).unwrap();
        assert_eq!(record.state, JobState::Submitted);
        assert_eq!(record.queue_id.as_deref(), Some("4321"));
    }
}
