use std::collections::BTreeMap;

use log::info;

use crate::error::{JobInputError, Result};
use crate::param::value::{JobInputSet, Param, ParamValue};
use crate::resolve::handle::FileHandle;

/// A submission with its batch inputs enumerated
///
/// `template` holds the shared values; every batch parameter has its matched inputs in
/// `batch_values`, in expansion order.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub template: JobInputSet,
    pub batch_values: BTreeMap<String, Vec<FileHandle>>,
}

impl BatchPlan {
    pub fn new(template: JobInputSet) -> BatchPlan {
        BatchPlan { template, batch_values: BTreeMap::new() }
    }

    pub fn add(&mut self, param: &str, handles: Vec<FileHandle>) {
        self.batch_values.entry(param.to_string()).or_default().extend(handles);
    }

    /// One job from the template, with one input for each batch parameter
    fn job(&self, base_href: &str, inputs: &[(&str, &FileHandle)]) -> JobInputSet {
        let mut job = self.template.clone();
        for (param, handle) in inputs {
            let mut value = Param::new(param);
            let href = handle.href(base_href).unwrap_or_default();
            value.values.push(ParamValue::new(&href));
            job.set_param(value);
        }
        job
    }
}

/// Turns a plan into the input sets of the individual jobs
pub trait BatchGenerator: Send + Sync {
    fn generate(&self, plan: &BatchPlan, base_href: &str) -> Result<Vec<JobInputSet>>;
}

/// Job i gets input i of every batch parameter; all batch parameters need the same number of inputs
pub struct PositionalBatchGenerator;

impl BatchGenerator for PositionalBatchGenerator {
    fn generate(&self, plan: &BatchPlan, base_href: &str) -> Result<Vec<JobInputSet>> {
        let mut lengths = plan.batch_values.iter().map(|(name, handles)| (name, handles.len()));
        let (first, count) = match lengths.next() {
            Some(first) => first,
            None => return Ok(vec![plan.template.clone()]),
        };
        if let Some((other, other_count)) = lengths.find(|(_, n)| *n != count) {
            return Err(JobInputError::BatchMismatch {
                message: format!("{first} has {count} values but {other} has {other_count}"),
            });
        }

        let jobs: Vec<JobInputSet> = (0..count)
            .map(|idx| {
                let inputs: Vec<(&str, &FileHandle)> =
                    plan.batch_values.iter().map(|(name, handles)| (name.as_str(), &handles[idx])).collect();
                plan.job(base_href, &inputs)
            })
            .collect();
        info!("Batch of {} jobs", jobs.len());
        Ok(jobs)
    }
}

/// Pairs the inputs of several batch parameters by file name without extension, e.g.
/// `sample1.gct` with `sample1.cls`
pub struct FilenameBatchGenerator;

impl BatchGenerator for FilenameBatchGenerator {
    fn generate(&self, plan: &BatchPlan, base_href: &str) -> Result<Vec<JobInputSet>> {
        let mut by_name: BTreeMap<&str, BTreeMap<String, &FileHandle>> = BTreeMap::new();
        for (param, handles) in &plan.batch_values {
            let names = by_name.entry(param.as_str()).or_default();
            for handle in handles {
                let base_name = handle.base_name();
                if names.insert(base_name.clone(), handle).is_some() {
                    return Err(JobInputError::BatchMismatch {
                        message: format!("{param} has more than one input named {base_name}"),
                    });
                }
            }
        }

        let (first, first_names) = match by_name.iter().next() {
            Some(first) => first,
            None => return Ok(vec![plan.template.clone()]),
        };
        for (param, names) in &by_name {
            if let Some(unmatched) = names.keys().chain(first_names.keys()).find(|n| !names.contains_key(*n) || !first_names.contains_key(*n)) {
                return Err(JobInputError::BatchMismatch {
                    message: format!("no match for {unmatched} between {first} and {param}"),
                });
            }
        }

        // jobs follow the expansion order of the first batch parameter
        let order = &plan.batch_values[*first];
        let jobs: Vec<JobInputSet> = order
            .iter()
            .map(|handle| {
                let base_name = handle.base_name();
                let inputs: Vec<(&str, &FileHandle)> =
                    by_name.iter().map(|(param, names)| (*param, names[&base_name])).collect();
                plan.job(base_href, &inputs)
            })
            .collect();
        info!("Batch of {} jobs paired by file name", jobs.len());
        Ok(jobs)
    }
}
