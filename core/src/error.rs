use thiserror::Error;

/// Failure of a single call against a server's HTTP API.
///
/// Cloneable so a session can keep the error in its published state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
	/// DNS, connect, timeout or malformed target URL.
	#[error("network error: {0}")]
	Network(String),
	/// The server answered with a non-2xx status.
	#[error("server error (HTTP {0})")]
	Status(u16),
	/// The body did not have the expected shape.
	#[error("failed to parse response: {0}")]
	Decode(String),
}

impl ApiError {
	pub fn status_code(&self) -> Option<u16> {
		match self {
			ApiError::Status(code) => Some(*code),
			_ => None,
		}
	}
}

impl From<reqwest::Error> for ApiError {
	fn from(err: reqwest::Error) -> Self {
		if let Some(status) = err.status() {
			return ApiError::Status(status.as_u16());
		}
		if err.is_decode() {
			return ApiError::Decode(err.to_string());
		}
		if err.is_timeout() {
			return ApiError::Network(format!("request timed out: {err}"));
		}
		ApiError::Network(err.to_string())
	}
}

impl From<serde_json::Error> for ApiError {
	fn from(err: serde_json::Error) -> Self {
		ApiError::Decode(err.to_string())
	}
}

impl From<url::ParseError> for ApiError {
	fn from(err: url::ParseError) -> Self {
		ApiError::Network(format!("invalid server url: {err}"))
	}
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("mDNS error: {0}")]
	Mdns(String),
	/// No advertised address accepted a connection. Never surfaced to users.
	#[error("could not resolve service {0}")]
	Unresolved(String),
}

impl From<mdns_sd::Error> for DiscoveryError {
	fn from(err: mdns_sd::Error) -> Self {
		DiscoveryError::Mdns(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn json_errors_classify_as_decode() {
		let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
		assert!(matches!(ApiError::from(err), ApiError::Decode(_)));
	}

	#[test]
	fn url_errors_classify_as_network() {
		let err = url::Url::parse("http://bad host:80").unwrap_err();
		assert!(matches!(ApiError::from(err), ApiError::Network(_)));
	}

	#[test]
	fn status_code_only_for_status_errors() {
		assert_eq!(ApiError::Status(404).status_code(), Some(404));
		assert_eq!(ApiError::Network("x".into()).status_code(), None);
		assert_eq!(ApiError::Status(500).to_string(), "server error (HTTP 500)");
	}
}
