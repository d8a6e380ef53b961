use crate::config::Config;
use crate::errors::RelayError;
use crate::models::{canonical_form_id, FormType, IntakeResponse, IntakeSubmission, TaskEnvelope};
use crate::queue::{EnqueueOutcome, RelayQueue};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Producer half of the relay task queue.
    pub queue: RelayQueue,
}

/// Intake hook.
///
/// Receives a raw form submission from the capturing framework, filters by
/// the configured target form identifiers, and schedules a relay task. The
/// submitter gets no delivery feedback from this endpoint by design; all
/// outcomes surface in the logs.
///
/// Expected payload: `{ form_id, form_data, entry_meta? }`
/// Authentication: X-Intake-Token header must match INTAKE_SECRET when set.
pub async fn intake_submission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(submission): Json<IntakeSubmission>,
) -> Result<(StatusCode, Json<IntakeResponse>), RelayError> {
    validate_intake_secret(&state, &headers)?;

    let Some(form_type) = match_target_form(&state.config, &submission) else {
        tracing::debug!("Submission does not match any target form, ignoring");
        return Ok((StatusCode::OK, Json(IntakeResponse::ignored())));
    };

    tracing::info!("Received submission for {} form", form_type);

    let envelope = TaskEnvelope::new(form_type, submission.form_data);
    match state.queue.enqueue(&envelope).await? {
        EnqueueOutcome::Scheduled(task_id) => {
            Ok((StatusCode::ACCEPTED, Json(IntakeResponse::scheduled(task_id))))
        }
        EnqueueOutcome::Duplicate => Ok((StatusCode::OK, Json(IntakeResponse::duplicate()))),
    }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "intake-relay",
            "version": "0.1.0"
        })),
    )
}

/// Matches a submission against the configured target forms.
///
/// Both the form id and the `form_name` carried in the entry metadata are
/// canonicalized to strings and looked up; the first hit wins. Identifiers
/// in the map were canonicalized once at configuration load, so this never
/// compares loosely-typed values.
fn match_target_form(config: &Config, submission: &IntakeSubmission) -> Option<FormType> {
    if let Some(id) = canonical_form_id(&submission.form_id) {
        if let Some(form_type) = config.target_forms.get(&id) {
            return Some(*form_type);
        }
    }
    if let Some(name) = submission
        .entry_meta
        .get("form_name")
        .and_then(canonical_form_id)
    {
        if let Some(form_type) = config.target_forms.get(&name) {
            return Some(*form_type);
        }
    }
    None
}

/// Validates the shared intake secret from the X-Intake-Token header.
fn validate_intake_secret(state: &AppState, headers: &HeaderMap) -> Result<(), RelayError> {
    // If no secret is configured, skip validation (warned at startup).
    let Some(ref expected_secret) = state.config.intake_secret else {
        return Ok(());
    };

    let token = headers
        .get("X-Intake-Token")
        .or_else(|| headers.get("x-intake-token"))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RelayError::Auth("Missing X-Intake-Token header".to_string()))?;

    // Constant-time comparison to prevent timing attacks
    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid intake token received");
        return Err(RelayError::Auth("Invalid intake token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison (basic implementation)
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn config_with_targets(pairs: &[(&str, FormType)]) -> Config {
        Config {
            api_base_url: "https://api.example.com".to_string(),
            login_path: "login".to_string(),
            check_path: "customers/check-nid".to_string(),
            create_path: "customers".to_string(),
            update_path: "customers".to_string(),
            simple_create_path: "simple-customers".to_string(),
            loan_create_path: "loan-applications".to_string(),
            api_email: "svc@example.com".to_string(),
            api_password: "secret".to_string(),
            target_forms: pairs
                .iter()
                .map(|(id, ft)| (id.to_string(), *ft))
                .collect::<HashMap<_, _>>(),
            port: 8080,
            intake_secret: None,
            http_timeout_secs: 30,
            max_attempts: 5,
            retry_base_secs: 30,
        }
    }

    fn submission(value: serde_json::Value) -> IntakeSubmission {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn numeric_and_string_form_ids_match_the_same_target() {
        let config = config_with_targets(&[("2841", FormType::FullCustomer)]);

        let by_number = submission(json!({ "form_id": 2841, "form_data": {} }));
        assert_eq!(
            match_target_form(&config, &by_number),
            Some(FormType::FullCustomer)
        );

        let by_string = submission(json!({ "form_id": "2841", "form_data": {} }));
        assert_eq!(
            match_target_form(&config, &by_string),
            Some(FormType::FullCustomer)
        );
    }

    #[test]
    fn form_name_in_entry_meta_matches_too() {
        let config = config_with_targets(&[("solicitud-credito", FormType::SimpleLoan)]);

        let by_name = submission(json!({
            "form_id": 99,
            "form_data": {},
            "entry_meta": { "form_name": "solicitud-credito" }
        }));
        assert_eq!(
            match_target_form(&config, &by_name),
            Some(FormType::SimpleLoan)
        );
    }

    #[test]
    fn untargeted_forms_do_not_match() {
        let config = config_with_targets(&[("2841", FormType::FullCustomer)]);

        let other = submission(json!({ "form_id": 7, "form_data": {} }));
        assert_eq!(match_target_form(&config, &other), None);
    }

    #[test]
    fn constant_time_compare_behaves() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "secreT"));
        assert!(!constant_time_compare("secret", "secrets"));
        assert!(!constant_time_compare("", "x"));
    }
}
