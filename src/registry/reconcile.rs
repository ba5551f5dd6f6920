//! Pure merge of catalog scripts with remote job records.

use crate::catalog::{JobLink, Script, ScriptStatus};
use crate::store::Job;

/// Merge catalog scripts with remote job records into a fresh script list.
///
/// For each script the first job whose `script_id` textually equals the
/// script id wins; the store permits duplicate jobs per script, and
/// first-match is the resolution policy applied everywhere. A script with
/// no matching job keeps its catalog defaults. Inputs are never mutated and
/// the merge is idempotent.
pub fn reconcile(scripts: &[Script], jobs: &[Job]) -> Vec<Script> {
    scripts
        .iter()
        .map(|script| {
            match jobs
                .iter()
                .find(|job| job.script_id.to_string() == script.id)
            {
                Some(job) => Script {
                    id: script.id.clone(),
                    name: script.name.clone(),
                    status: if job.enabled {
                        ScriptStatus::Active
                    } else {
                        ScriptStatus::Paused
                    },
                    cron_expression: Some(job.cron_expression.clone()),
                    job: Some(JobLink {
                        id: job.id,
                        job_id: job.job_id.clone(),
                    }),
                },
                None => script.clone(),
            }
        })
        .collect()
}
