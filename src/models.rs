use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Form types the relay knows how to deliver.
///
/// Each variant maps to exactly one pipeline in the submission router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormType {
    FullCustomer,
    SimpleLoan,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::FullCustomer => "full_customer",
            FormType::SimpleLoan => "simple_loan",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_customer" => Ok(FormType::FullCustomer),
            "simple_loan" => Ok(FormType::SimpleLoan),
            other => Err(format!("unknown form type '{}'", other)),
        }
    }
}

/// Canonical task envelope serialized into the queue.
///
/// `form_type` is carried as a plain string so a malformed or unknown value
/// surfaces as a logged terminal decode failure at the handler instead of a
/// queue-level deserialization error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub form_type: String,
    pub form_submission_data: Map<String, Value>,
}

impl TaskEnvelope {
    pub fn new(form_type: FormType, form_submission_data: Map<String, Value>) -> Self {
        Self {
            form_type: form_type.as_str().to_string(),
            form_submission_data,
        }
    }
}

/// Result of an existence check against the remote API.
///
/// Produced by one check call and consumed immediately to pick the
/// create-vs-update branch. `remote_id` is always Some when `exists` is true;
/// the resolver treats the other combination as a contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistenceResult {
    pub exists: bool,
    pub remote_id: Option<i64>,
}

/// Raw submission as delivered by the form framework.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeSubmission {
    /// Form identifier; frameworks send either a string or an integer.
    pub form_id: Value,
    /// Raw field key/value map.
    #[serde(default)]
    pub form_data: Map<String, Value>,
    /// Entry metadata; may carry a `form_name` used as a secondary match key.
    #[serde(default)]
    pub entry_meta: Map<String, Value>,
}

/// Response returned to the intake caller.
#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
}

impl IntakeResponse {
    pub fn ignored() -> Self {
        Self {
            status: "ignored".to_string(),
            task_id: None,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            status: "duplicate".to_string(),
            task_id: None,
        }
    }

    pub fn scheduled(task_id: Uuid) -> Self {
        Self {
            status: "scheduled".to_string(),
            task_id: Some(task_id),
        }
    }
}

/// Canonicalizes a form identifier to a string.
///
/// Form frameworks are loose about identifier types (integer ids, string
/// ids, form names); everything is compared in canonical string form, both
/// here and at configuration load.
pub fn canonical_form_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
