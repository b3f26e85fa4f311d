use std::fmt;
use std::sync::Arc;

use log::{error, info, warn};

use crate::assemble::helper::Assembler;
use crate::batch::expand::BatchExpander;
use crate::batch::generator::{BatchGenerator, BatchPlan, PositionalBatchGenerator};
use crate::collab::{JobDispatcher, ModuleRepository, PreparedJob};
use crate::dispatch::command::command_line;
use crate::error::{JobInputError, Result, SubmissionErrors};
use crate::param::spec::ModuleSpec;
use crate::param::value::{JobContext, JobInputSet};

/// Checks and resolves every parameter of a job, then hands it to the dispatcher
#[derive(Clone)]
pub struct JobInputApi {
    modules: Arc<dyn ModuleRepository>,
    assembler: Assembler,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl JobInputApi {
    pub fn new(modules: Arc<dyn ModuleRepository>, assembler: Assembler, dispatcher: Arc<dyn JobDispatcher>) -> JobInputApi {
        JobInputApi { modules, assembler, dispatcher }
    }

    pub fn module(&self, input: &JobInputSet) -> Result<Arc<ModuleSpec>> {
        self.modules.get(&input.lsid).ok_or_else(|| JobInputError::UnknownModule { lsid: input.lsid.to_string() })
    }

    /// Assemble all parameters; the errors of every parameter are reported together
    pub async fn prepare(&self, ctx: &JobContext, input: &JobInputSet) -> std::result::Result<PreparedJob, SubmissionErrors> {
        let module = self.module(input)?;
        let mut errors = Vec::new();
        for name in input.params.keys() {
            if module.param(name).is_none() {
                errors.push(JobInputError::UnknownParameter { param: name.clone(), lsid: module.lsid.to_string() });
            }
        }

        let assembler = self.assembler.for_base_href(input.base_href.as_deref());
        let mut values = Vec::with_capacity(module.params.len());
        for spec in &module.params {
            match assembler.assemble(ctx, spec, input.param(&spec.name), !spec.pass_by_reference).await {
                Ok(value) => values.push(value),
                Err(SubmissionErrors(errs)) => errors.extend(errs),
            }
        }
        if !errors.is_empty() {
            return Err(SubmissionErrors(errors));
        }
        let command = command_line(&module, &values, assembler.resolver());
        Ok(PreparedJob { input: input.clone(), values, command, batch_id: None })
    }

    /// Prepare and dispatch one job, returns the job id
    pub async fn post_job(
        &self,
        ctx: &JobContext,
        input: &JobInputSet,
        batch_id: Option<&str>,
    ) -> std::result::Result<String, SubmissionErrors> {
        let mut job = self.prepare(ctx, input).await?;
        job.batch_id = batch_id.map(str::to_string);
        let job_id = self.dispatcher.post_job(ctx, &job).await?;
        info!("Submitted job {job_id} for {} ({})", ctx.user_id, input.lsid);
        Ok(job_id)
    }
}

/// Outcome of one job of a submission
#[derive(Debug)]
pub struct ReceiptEntry {
    pub index: usize,
    pub outcome: std::result::Result<String, SubmissionErrors>,
}

/// Job ids (or errors) in submission order, and the batch id when there was more than one job
#[derive(Debug)]
pub struct Receipt {
    pub entries: Vec<ReceiptEntry>,
    pub batch_id: Option<String>,
}

impl Receipt {
    pub fn job_ids(&self) -> Vec<&str> {
        self.entries.iter().filter_map(|e| e.outcome.as_ref().ok()).map(String::as_str).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &SubmissionErrors)> {
        self.entries.iter().filter_map(|e| e.outcome.as_ref().err().map(|err| (e.index, err)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(batch_id) = &self.batch_id {
            writeln!(f, "batch {batch_id}")?;
        }
        for entry in &self.entries {
            match &entry.outcome {
                Ok(job_id) => writeln!(f, "{}: job {job_id}", entry.index)?,
                Err(errors) => writeln!(f, "{}: failed: {errors}", entry.index)?,
            }
        }
        Ok(())
    }
}

/// Expands a submission into its jobs and submits each of them
///
/// Jobs are submitted one after the other; a failed job does not undo the jobs before it, the
/// receipt says which ones failed.
pub struct BatchSubmitter {
    api: JobInputApi,
    generator: Box<dyn BatchGenerator>,
}

impl BatchSubmitter {
    pub fn new(api: JobInputApi) -> BatchSubmitter {
        BatchSubmitter { api, generator: Box::new(PositionalBatchGenerator) }
    }

    pub fn with_generator(mut self, generator: Box<dyn BatchGenerator>) -> BatchSubmitter {
        self.generator = generator;
        self
    }

    /// Enumerate the batch inputs; any expansion error fails the whole plan
    pub fn plan(&self, ctx: &JobContext, input: &JobInputSet) -> Result<BatchPlan> {
        let module = self.api.module(input)?;
        let assembler = self.api.assembler.for_base_href(input.base_href.as_deref());
        let expander = BatchExpander::new(assembler.resolver(), assembler.permissions());
        let mut plan = BatchPlan::new(input.clone());
        for param in input.batch_params() {
            let spec = module.param(&param.name).ok_or_else(|| JobInputError::UnknownParameter {
                param: param.name.clone(),
                lsid: input.lsid.to_string(),
            })?;
            if param.values.is_empty() {
                return Err(JobInputError::InvalidRequest(format!("batch parameter {} has no values", param.name)));
            }
            for value in &param.values {
                plan.add(&param.name, expander.expand(ctx, spec, &value.value)?);
            }
        }
        Ok(plan)
    }

    /// Expand and submit; fails only when the batch can't be expanded
    pub async fn submit(&self, ctx: &JobContext, input: &JobInputSet) -> Result<Receipt> {
        let plan = self.plan(ctx, input)?;
        let base_href = self.api.assembler.for_base_href(input.base_href.as_deref()).resolver().base_href().to_string();
        let jobs = self.generator.generate(&plan, &base_href)?;
        Ok(self.submit_batch(ctx, &jobs).await)
    }

    /// Submit each job independently
    pub async fn submit_batch(&self, ctx: &JobContext, jobs: &[JobInputSet]) -> Receipt {
        let batch_id = (jobs.len() > 1).then(|| format!("batch-{}", ctx.submission_id));
        if let Some(batch_id) = &batch_id {
            info!("Submitting {} jobs as {batch_id}", jobs.len());
        }

        let mut entries = Vec::with_capacity(jobs.len());
        for (index, job) in jobs.iter().enumerate() {
            let mut job_ctx = ctx.clone();
            if batch_id.is_some() {
                // keeps the generated file lists of the jobs apart
                job_ctx.submission_id = format!("{}_{index}", ctx.submission_id);
            }
            let outcome = self.api.post_job(&job_ctx, job, batch_id.as_deref()).await;
            if let Err(errors) = &outcome {
                error!("Job {index} of the submission failed: {errors}");
            }
            entries.push(ReceiptEntry { index, outcome });
        }
        let receipt = Receipt { entries, batch_id };
        if !receipt.is_success() {
            warn!("{} of {} jobs failed", receipt.failures().count(), jobs.len());
        }
        receipt
    }
}
