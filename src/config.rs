use crate::models::FormType;
use std::collections::HashMap;

/// Runtime configuration for the relay.
///
/// Everything is sourced from the environment. Required values are validated
/// at startup so a misconfigured deployment fails the bootstrap instead of
/// failing every task at delivery time.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub login_path: String,
    pub check_path: String,
    pub create_path: String,
    pub update_path: String,
    pub simple_create_path: String,
    pub loan_create_path: String,
    pub api_email: String,
    pub api_password: String,
    /// Target form identifiers (canonical strings) mapped to their pipeline.
    pub target_forms: HashMap<String, FormType>,
    pub port: u16,
    /// Optional shared secret for the intake endpoint.
    pub intake_secret: Option<String>,
    pub http_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            api_base_url: std::env::var("RELAY_API_BASE_URL")
                .map_err(|_| anyhow::anyhow!("RELAY_API_BASE_URL environment variable required"))
                .and_then(|raw| {
                    if raw.trim().is_empty() {
                        anyhow::bail!("RELAY_API_BASE_URL cannot be empty");
                    }
                    if !raw.starts_with("http://") && !raw.starts_with("https://") {
                        anyhow::bail!("RELAY_API_BASE_URL must start with http:// or https://");
                    }
                    url::Url::parse(&raw)
                        .map_err(|e| anyhow::anyhow!("RELAY_API_BASE_URL is not a valid URL: {}", e))?;
                    Ok(raw)
                })?,
            login_path: required_path("RELAY_API_LOGIN_PATH")?,
            check_path: required_path("RELAY_API_CHECK_PATH")?,
            create_path: required_path("RELAY_API_CREATE_PATH")?,
            update_path: required_path("RELAY_API_UPDATE_PATH")?,
            simple_create_path: required_path("RELAY_API_SIMPLE_CREATE_PATH")?,
            loan_create_path: required_path("RELAY_API_LOAN_CREATE_PATH")?,
            api_email: required_var("RELAY_API_EMAIL")?,
            api_password: required_var("RELAY_API_PASSWORD")?,
            target_forms: std::env::var("RELAY_TARGET_FORMS")
                .map_err(|_| anyhow::anyhow!("RELAY_TARGET_FORMS environment variable required"))
                .and_then(|raw| parse_target_forms(&raw))?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            intake_secret: std::env::var("INTAKE_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            http_timeout_secs: std::env::var("RELAY_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RELAY_HTTP_TIMEOUT_SECS must be a number"))?,
            max_attempts: std::env::var("RELAY_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RELAY_MAX_ATTEMPTS must be a number"))?,
            retry_base_secs: std::env::var("RELAY_RETRY_BASE_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RELAY_RETRY_BASE_SECS must be a number"))?,
        };

        if config.intake_secret.is_none() {
            tracing::warn!("INTAKE_SECRET not set; intake endpoint accepts unauthenticated posts");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Remote API base URL: {}", config.api_base_url);
        tracing::debug!(
            "Target forms: {:?}",
            config.target_forms.keys().collect::<Vec<_>>()
        );
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }

    /// Joins the base URL with an endpoint path, normalizing slashes.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn required_var(name: &'static str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

fn required_path(name: &'static str) -> anyhow::Result<String> {
    let value = required_var(name)?;
    Ok(value.trim().to_string())
}

/// Parses `RELAY_TARGET_FORMS`, a comma-separated list of
/// `<form-id>:<form-type>` pairs (e.g. `2841:full_customer,2907:simple_loan`).
///
/// Identifiers are canonicalized to trimmed strings once here, so the intake
/// hook compares canonical values only, never raw int-vs-string equality.
fn parse_target_forms(raw: &str) -> anyhow::Result<HashMap<String, FormType>> {
    let mut targets = HashMap::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (id, form_type) = pair.split_once(':').ok_or_else(|| {
            anyhow::anyhow!(
                "RELAY_TARGET_FORMS entries must look like '<form-id>:<form-type>', got '{}'",
                pair
            )
        })?;
        let id = id.trim();
        if id.is_empty() {
            anyhow::bail!("RELAY_TARGET_FORMS entry '{}' has an empty form id", pair);
        }
        let form_type: FormType = form_type
            .trim()
            .parse()
            .map_err(|e: String| anyhow::anyhow!("RELAY_TARGET_FORMS: {}", e))?;
        targets.insert(id.to_string(), form_type);
    }
    if targets.is_empty() {
        anyhow::bail!("RELAY_TARGET_FORMS must name at least one target form");
    }
    Ok(targets)
}
