use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_DOMAIN: &str = "api.sanity.io";
pub const DEFAULT_API_VERSION: &str = "v2024-02-21";

/// Everything needed to address a project's dataset on the hosted API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
	/// Either a bare domain (`api.example.com`, the project id gets prefixed as a subdomain)
	/// or a full base url (`http://127.0.0.1:3000`, used verbatim for every request)
	pub api_domain: String,
	pub api_version: String,
	pub project_id: String,
	pub dataset: String,
	#[serde(skip_serializing, default)]
	pub token: Option<String>,
}

impl ApiConfig {
	pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
		Self {
			api_domain: DEFAULT_API_DOMAIN.to_string(),
			api_version: DEFAULT_API_VERSION.to_string(),
			project_id: project_id.into(),
			dataset: dataset.into(),
			token: None,
		}
	}

	#[must_use]
	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}

	/// Url on the project scoped host, used by the data endpoints (listen, doc)
	pub fn project_url(&self, path: &str) -> String {
		if has_scheme(&self.api_domain) {
			return self.global_url(path);
		}

		format!(
			"https://{}.{}/{}/{}",
			self.project_id,
			self.api_domain,
			self.api_version,
			path.trim_start_matches('/')
		)
	}

	/// Url on the global host, used by the management endpoints (backups)
	pub fn global_url(&self, path: &str) -> String {
		let base = if has_scheme(&self.api_domain) {
			self.api_domain.trim_end_matches('/').to_string()
		} else {
			format!("https://{}", self.api_domain)
		};

		format!(
			"{base}/{}/{}",
			self.api_version,
			path.trim_start_matches('/')
		)
	}

	pub fn require_token(&self) -> Result<&str, ApiError> {
		self.token
			.as_deref()
			.filter(|token| !token.is_empty())
			.ok_or(ApiError::MissingToken)
	}
}

fn has_scheme(domain: &str) -> bool {
	domain.starts_with("http://") || domain.starts_with("https://")
}

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("{message} (status {status})")]
	Status { status: StatusCode, message: String },
	#[error(transparent)]
	Request(#[from] reqwest::Error),
	#[error("token is missing")]
	MissingToken,
}

impl ApiError {
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Status { status, .. } => Some(*status),
			Self::Request(e) => e.status(),
			Self::MissingToken => None,
		}
	}
}

pub trait WithAuth {
	fn with_auth(self, token: &str) -> Self;

	fn with_optional_auth(self, token: Option<&str>) -> Self;
}

impl WithAuth for RequestBuilder {
	fn with_auth(self, token: &str) -> Self {
		self.bearer_auth(token)
	}

	fn with_optional_auth(self, token: Option<&str>) -> Self {
		match token {
			Some(token) => self.with_auth(token),
			None => self,
		}
	}
}

/// Turns non-success responses into [`ApiError::Status`], carrying the message the server put
/// in the body when there is one
pub async fn check_response(response: Response) -> Result<Response, ApiError> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();

	Err(ApiError::Status {
		status,
		message: extract_message(status, &body),
	})
}

#[derive(Deserialize)]
struct ErrorBody {
	message: Option<String>,
	error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
	Text(String),
	Described { description: String },
}

pub fn extract_message(status: StatusCode, body: &str) -> String {
	if let Ok(ErrorBody { message, error }) = serde_json::from_str::<ErrorBody>(body) {
		if let Some(message) = message {
			return message;
		}

		match error {
			Some(ErrorDetail::Text(text)) => return text,
			Some(ErrorDetail::Described { description }) => return description,
			None => {}
		}
	}

	let body = body.trim();
	if body.is_empty() {
		status
			.canonical_reason()
			.map_or_else(|| status.to_string(), ToString::to_string)
	} else {
		body.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn project_and_global_urls() {
		let config = ApiConfig::new("abc123", "production");

		assert_eq!(
			config.project_url("/data/doc/production/x"),
			"https://abc123.api.sanity.io/v2024-02-21/data/doc/production/x"
		);
		assert_eq!(
			config.global_url("projects/abc123/datasets/production/backups"),
			"https://api.sanity.io/v2024-02-21/projects/abc123/datasets/production/backups"
		);
	}

	#[test]
	fn full_base_url_is_used_verbatim() {
		let mut config = ApiConfig::new("abc123", "production");
		config.api_domain = "http://127.0.0.1:4000/".to_string();

		assert_eq!(
			config.project_url("data/listen/production"),
			"http://127.0.0.1:4000/v2024-02-21/data/listen/production"
		);
	}

	#[test]
	fn missing_or_empty_token() {
		let config = ApiConfig::new("abc123", "production");
		assert!(matches!(config.require_token(), Err(ApiError::MissingToken)));

		let config = config.with_token("");
		assert!(matches!(config.require_token(), Err(ApiError::MissingToken)));

		let config = config.with_token("secret");
		assert_eq!(config.require_token().ok(), Some("secret"));
	}

	#[test]
	fn message_extraction() {
		assert_eq!(
			extract_message(StatusCode::NOT_FOUND, r#"{"message":"Backup not found"}"#),
			"Backup not found"
		);
		assert_eq!(
			extract_message(
				StatusCode::BAD_REQUEST,
				r#"{"error":{"description":"invalid cursor"}}"#
			),
			"invalid cursor"
		);
		assert_eq!(
			extract_message(StatusCode::UNAUTHORIZED, r#"{"error":"Unauthorized"}"#),
			"Unauthorized"
		);
		assert_eq!(
			extract_message(StatusCode::BAD_GATEWAY, "upstream went away"),
			"upstream went away"
		);
		assert_eq!(
			extract_message(StatusCode::SERVICE_UNAVAILABLE, ""),
			"Service Unavailable"
		);
	}
}
