use crate::api_client::ApiClient;
use crate::errors::RelayError;
use crate::models::{FormType, TaskEnvelope};
use crate::pipeline;

/// Outcome of processing one relay task.
///
/// Only `RetryableFailure` is translated into the queue's retry mechanism;
/// terminal failures are fully handled here (logged) and the task completes
/// normally, since re-running them can never succeed.
#[derive(Debug)]
pub enum RelayOutcome {
    Success,
    TerminalFailure(String),
    RetryableFailure(RelayError),
}

/// Task-queue handler: decodes the envelope and dispatches to the pipeline
/// registered for the form type.
pub struct SubmissionRouter {
    api: ApiClient,
}

impl SubmissionRouter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Processes one serialized task envelope.
    ///
    /// Malformed envelopes and unknown form types are terminal: the payload
    /// will never decode better on a retry. Pipeline errors are classified
    /// by kind; which delivery branch ran is not visible to the caller.
    pub async fn process(&self, payload: &str) -> RelayOutcome {
        let envelope: TaskEnvelope = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!("Malformed task envelope, not retrying: {}", e);
                return RelayOutcome::TerminalFailure(format!("malformed task envelope: {}", e));
            }
        };

        let form_type: FormType = match envelope.form_type.parse() {
            Ok(form_type) => form_type,
            Err(e) => {
                tracing::error!("Cannot dispatch task: {}", e);
                return RelayOutcome::TerminalFailure(e);
            }
        };

        tracing::info!("Dispatching {} submission", form_type);
        let result = match form_type {
            FormType::FullCustomer => {
                pipeline::run_full_customer(&self.api, &envelope.form_submission_data).await
            }
            FormType::SimpleLoan => {
                pipeline::run_simple_loan(&self.api, &envelope.form_submission_data).await
            }
        };

        match result {
            Ok(()) => {
                tracing::info!("{} submission relayed successfully", form_type);
                RelayOutcome::Success
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!("{} submission failed, will retry: {}", form_type, e);
                RelayOutcome::RetryableFailure(e)
            }
            Err(e) => {
                tracing::error!("{} submission failed terminally: {}", form_type, e);
                RelayOutcome::TerminalFailure(e.to_string())
            }
        }
    }
}
