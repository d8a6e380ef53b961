use crate::api_client::ApiClient;
use crate::errors::RelayError;
use crate::fields::FieldReader;
use crate::models::ExistenceResult;
use crate::payload;
use serde_json::{Map, Value};

/// Delivery pipelines, one per form type.
///
/// Within a task everything is strictly sequential: token, existence check,
/// mapped payload, create/update. Errors propagate untouched to the router,
/// which decides retryable vs. terminal; nothing here talks to the queue.

/// Relays a full-customer submission, updating the remote record when the
/// NID is already known and creating it otherwise.
pub async fn run_full_customer(
    api: &ApiClient,
    raw: &Map<String, Value>,
) -> Result<(), RelayError> {
    let reader = FieldReader::new(raw);
    let body = payload::build_customer_payload(&reader);

    // The NID is the natural key for the whole flow; without it there is
    // nothing to check or deliver, and a retry cannot supply it.
    let nid = body
        .pointer("/customer/NID")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RelayError::Validation(
                "customer NID (cedula) missing or empty after cleaning".to_string(),
            )
        })?;

    let existence = api.check_nid(&nid).await?;
    if let ExistenceResult {
        exists: true,
        remote_id: Some(id),
    } = existence
    {
        api.update_customer(id, &body).await?;
    } else {
        api.create_customer(&body).await?;
    }
    Ok(())
}

/// Relays a simple-loan submission.
///
/// Two stages: make sure the applicant exists as a minimal customer record
/// (creating one when the NID is unknown), then create a loan application
/// referencing the resolved remote id. Required loan figures are validated
/// before any call goes out, so bad input never causes remote side effects.
pub async fn run_simple_loan(api: &ApiClient, raw: &Map<String, Value>) -> Result<(), RelayError> {
    let reader = FieldReader::new(raw);

    let figures = payload::loan_figures(&reader)?;

    let simple_customer = payload::build_simple_customer_payload(&reader);
    let nid = simple_customer
        .pointer("/customer/NID")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RelayError::Validation(
                "applicant NID (cedula) missing or empty after cleaning".to_string(),
            )
        })?;

    let existence = api.check_nid(&nid).await?;
    let customer_id = if let ExistenceResult {
        exists: true,
        remote_id: Some(id),
    } = existence
    {
        id
    } else {
        api.create_simple_customer(&simple_customer).await?
    };

    let application = payload::build_loan_application_payload(customer_id, &figures, &reader);
    api.create_loan_application(&application).await?;
    Ok(())
}
