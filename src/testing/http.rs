//! HTTP test trigger

use super::{PendingTests, RunningTest, TestResult, render_body};
use crate::config::TestTriggerConfig;
use crate::error::{Error, Result};
use crate::types::SubmitRequest;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::debug;

/// Starts a test run by sending a templated HTTP request
pub struct HttpTestTrigger {
    client: Client,
    config: TestTriggerConfig,
    method: Method,
    pending: PendingTests,
}

impl HttpTestTrigger {
    /// Create a trigger; `timeout` bounds each request when set
    pub fn new(config: TestTriggerConfig, timeout: Option<Duration>) -> Result<Self> {
        let method = config
            .method
            .as_deref()
            .unwrap_or("POST")
            .to_ascii_uppercase()
            .parse::<Method>()
            .map_err(|e| Error::Config(format!("invalid test method: {e}")))?;

        let mut builder = Client::builder().user_agent("submit-queue");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::TestTrigger(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            method,
            pending: PendingTests::new(),
        })
    }

    /// Runs waiting for a result callback
    pub const fn pending(&self) -> &PendingTests {
        &self.pending
    }

    /// Send the test request for `request`
    ///
    /// A non-2xx response is a trigger error. A 2xx response carrying a
    /// JSON `{"passed": .., "error": ..}` body resolves the run with that
    /// result. Any other 2xx response leaves the run waiting for a callback
    /// when `callback` is enabled, and is a trigger error otherwise: a run
    /// never counts as passed without a result.
    pub async fn trigger(&self, request: &SubmitRequest) -> Result<RunningTest> {
        let (run_id, running) = self.pending.register(request);
        match self.send(request, &run_id).await {
            Ok(Some(result)) => {
                debug!(run_id = %run_id, passed = result.passed, "test run finished");
                self.pending.resolve(&run_id, result);
                Ok(running)
            }
            Ok(None) if self.config.callback => {
                debug!(run_id = %run_id, "waiting for test result callback");
                Ok(running)
            }
            Ok(None) => {
                self.pending.cancel(&run_id);
                Err(Error::TestTrigger(
                    "test endpoint accepted the run but returned no test result".to_string(),
                ))
            }
            Err(e) => {
                self.pending.cancel(&run_id);
                Err(e)
            }
        }
    }

    async fn send(&self, request: &SubmitRequest, run_id: &str) -> Result<Option<TestResult>> {
        let body = render_body(&self.config.body, request, run_id)?;

        debug!(
            url = %self.config.url,
            method = %self.method,
            pr = request.pull_request_number,
            run_id,
            "requesting tests"
        );

        let mut builder = self
            .client
            .request(self.method.clone(), &self.config.url)
            .body(body);
        for (name, value) in &self.config.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::TestTrigger(format!("test endpoint returned {status}")));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str::<TestResult>(&text).ok())
    }
}
