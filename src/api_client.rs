use crate::circuit_breaker::{create_api_circuit_breaker, ApiCircuitBreaker};
use crate::config::Config;
use crate::errors::RelayError;
use crate::models::ExistenceResult;
use crate::token::TokenManager;
use failsafe::futures::CircuitBreaker;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Client for the remote loan-origination API.
///
/// Owns the delivery engine (send + outcome classification) and the
/// existence resolver. Every call carries the current bearer token; a 401
/// invalidates the cached token before surfacing as retryable, so the next
/// queue attempt logs in afresh.
pub struct ApiClient {
    client: reqwest::Client,
    tokens: Arc<TokenManager>,
    breaker: ApiCircuitBreaker,
    check_url: String,
    create_url: String,
    update_url: String,
    simple_create_url: String,
    loan_create_url: String,
}

impl ApiClient {
    pub fn new(config: &Config, tokens: Arc<TokenManager>) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| {
                RelayError::Transport(format!("Failed to create API HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            tokens,
            breaker: create_api_circuit_breaker(),
            check_url: config.endpoint_url(&config.check_path),
            create_url: config.endpoint_url(&config.create_path),
            update_url: config.endpoint_url(&config.update_path),
            simple_create_url: config.endpoint_url(&config.simple_create_path),
            loan_create_url: config.endpoint_url(&config.loan_create_path),
        })
    }

    /// Checks whether a customer with the given cleaned NID already exists.
    ///
    /// An affirmative answer without a usable id is a contract violation on
    /// the remote side and fails the task loudly instead of looping.
    pub async fn check_nid(&self, nid: &str) -> Result<ExistenceResult, RelayError> {
        tracing::info!("Checking remote existence for NID {}", nid);
        let response = self
            .send(Method::POST, &self.check_url, &json!({ "NID": nid }))
            .await?;

        let status = response.status().as_u16();
        let body: Value = response.json().await.map_err(|e| {
            // A successful status with an unreadable body is treated as
            // transient; the check is safe to repeat.
            RelayError::RemoteRejection {
                status,
                body: format!("malformed existence-check response: {}", e),
            }
        })?;

        let exists = body.get("exists").and_then(|v| v.as_bool()).unwrap_or(false);
        if !exists {
            tracing::info!("NID {} not known to remote", nid);
            return Ok(ExistenceResult {
                exists: false,
                remote_id: None,
            });
        }

        match extract_id(&body, &["/customer/id", "/id"]) {
            Some(id) => {
                tracing::info!("NID {} exists remotely as customer {}", nid, id);
                Ok(ExistenceResult {
                    exists: true,
                    remote_id: Some(id),
                })
            }
            None => Err(RelayError::Integrity(format!(
                "existence check reported an existing customer without an id: {}",
                body
            ))),
        }
    }

    /// Creates a full customer record.
    pub async fn create_customer(&self, payload: &Value) -> Result<(), RelayError> {
        tracing::info!("Creating customer record");
        let response = self.send(Method::POST, &self.create_url, payload).await?;
        tracing::info!("Customer created (status {})", response.status());
        Ok(())
    }

    /// Replaces an existing customer record (idempotent update).
    ///
    /// A 404 here means the record vanished between the existence check and
    /// the update; retrying cannot bring it back, so it is terminal.
    pub async fn update_customer(&self, id: i64, payload: &Value) -> Result<(), RelayError> {
        let url = format!("{}/{}", self.update_url, id);
        tracing::info!("Updating customer {}", id);
        match self.send(Method::PUT, &url, payload).await {
            Ok(response) => {
                tracing::info!("Customer {} updated (status {})", id, response.status());
                Ok(())
            }
            Err(RelayError::RemoteRejection { status: 404, body }) => Err(RelayError::NotFound(
                format!("customer {} no longer exists: {}", id, body),
            )),
            Err(e) => Err(e),
        }
    }

    /// Creates a minimal customer record and returns its remote id.
    pub async fn create_simple_customer(&self, payload: &Value) -> Result<i64, RelayError> {
        tracing::info!("Creating minimal customer record");
        let response = self
            .send(Method::POST, &self.simple_create_url, payload)
            .await?;

        // The create succeeded; an unreadable body must not trigger a retry
        // that would duplicate the record.
        let body: Value = response.json().await.map_err(|e| {
            RelayError::Integrity(format!(
                "minimal customer created but response was unreadable: {}",
                e
            ))
        })?;

        match extract_id(&body, &["/customer/id", "/data/id", "/id"]) {
            Some(id) => {
                tracing::info!("Minimal customer created with id {}", id);
                Ok(id)
            }
            None => Err(RelayError::Integrity(format!(
                "minimal customer creation response missing an id: {}",
                body
            ))),
        }
    }

    /// Creates a loan-application record.
    pub async fn create_loan_application(&self, payload: &Value) -> Result<(), RelayError> {
        tracing::info!("Creating loan application");
        let response = self
            .send(Method::POST, &self.loan_create_url, payload)
            .await?;
        tracing::info!("Loan application created (status {})", response.status());
        Ok(())
    }

    /// Issues one authenticated call and classifies the outcome.
    ///
    /// | outcome | classification |
    /// |---|---|
    /// | transport failure / open circuit | `Transport` (retryable) |
    /// | 2xx | success, response returned |
    /// | 401 | token invalidated, `Auth` (retryable) |
    /// | 422 | `RemoteValidation` (terminal) |
    /// | other non-2xx | `RemoteRejection` (retryable) |
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Result<reqwest::Response, RelayError> {
        let token = self.tokens.get_token().await?;

        let request = self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body);

        let response = match self.breaker.call(request.send()).await {
            Ok(response) => response,
            Err(failsafe::Error::Rejected) => {
                return Err(RelayError::Transport(format!(
                    "circuit open, refusing call to {}",
                    url
                )));
            }
            Err(failsafe::Error::Inner(e)) => {
                return Err(RelayError::Transport(format!(
                    "request to {} failed: {}",
                    url, e
                )));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status.as_u16() {
            401 => {
                tracing::warn!("Remote returned 401, invalidating cached token");
                self.tokens.invalidate().await;
                Err(RelayError::Auth(format!(
                    "remote rejected token: {}",
                    body_text
                )))
            }
            422 => Err(RelayError::RemoteValidation { body: body_text }),
            code => Err(RelayError::RemoteRejection {
                status: code,
                body: body_text,
            }),
        }
    }
}

/// Extracts a numeric id from any of the given JSON pointer locations.
///
/// Remote responses have carried ids both as numbers and as numeric strings.
fn extract_id(body: &Value, pointers: &[&str]) -> Option<i64> {
    for pointer in pointers {
        if let Some(value) = body.pointer(pointer) {
            if let Some(id) = value.as_i64() {
                return Some(id);
            }
            if let Some(id) = value.as_str().and_then(|s| s.parse::<i64>().ok()) {
                return Some(id);
            }
        }
    }
    None
}
