use super::{Job, JobStore, LogEntry, LogQuery, StoreError};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// HTTP/JSON client for the remote job store.
pub struct HttpJobStore {
    client: Client,
    base_url: String,
}

impl HttpJobStore {
    /// Build a client rooted at `base_url`, e.g. `http://127.0.0.1:8080/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StoreError::Status { status })
    }
}

#[async_trait::async_trait]
impl JobStore for HttpJobStore {
    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let response = self.client.get(self.url("/jobs")).send().await?;
        let jobs: Vec<Job> = checked(response)?.json().await?;
        debug!(count = jobs.len(), "fetched jobs");
        Ok(jobs)
    }

    async fn toggle_job(&self, job_id: i64) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{job_id}/toggle")))
            .send()
            .await?;
        checked(response)?;
        Ok(())
    }

    async fn run_now(&self, script_id: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.url(&format!("/run_now/{script_id}")))
            .send()
            .await?;
        checked(response)?;
        Ok(())
    }

    async fn update_schedule(&self, job_id: i64, cron_expression: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.url(&format!("/jobs/{job_id}")))
            .json(&serde_json::json!({ "cron_expression": cron_expression }))
            .send()
            .await?;
        checked(response)?;
        Ok(())
    }

    async fn fetch_logs(
        &self,
        script_id: &str,
        query: &LogQuery,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let mut request = self
            .client
            .get(self.url(&format!("/scripts/{script_id}/logs")));
        if let Some(hours) = query.hours {
            request = request.query(&[("hours", hours.to_string())]);
        }
        if let Some(level) = &query.level {
            request = request.query(&[("level", level.clone())]);
        }

        let response = request.send().await?;
        Ok(checked(response)?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let store = HttpJobStore::new("http://localhost:8080/api/");
        assert_eq!(store.url("/jobs"), "http://localhost:8080/api/jobs");
    }
}
