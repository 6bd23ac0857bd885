use thiserror::Error;

/// 重試時視為暫時性錯誤的 HTTP 狀態碼
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Error, Debug)]
pub enum DataError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("{service} API error: {message}")]
    ExternalApiError { service: String, message: String },

    #[error("{service} temporarily unavailable: {message}")]
    TransientApiError { service: String, message: String },

    #[error("{entity} {id} not found")]
    NotFoundError { entity: String, id: String },

    #[error("Screenshot capture failed: {message}")]
    ScreenshotError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    External,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DataError {
    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalApiError {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientApiError {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFoundError {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) => ErrorCategory::Network,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::ValidationError { .. }
            | Self::ProcessingError { .. }
            | Self::NotFoundError { .. } => ErrorCategory::Data,
            Self::UrlError(_)
            | Self::TomlError(_)
            | Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::ExternalApiError { .. } | Self::TransientApiError { .. } => ErrorCategory::External,
            Self::IoError(_) | Self::ScreenshotError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFoundError { .. } => ErrorSeverity::Low,
            Self::HttpError(_)
            | Self::ExternalApiError { .. }
            | Self::TransientApiError { .. }
            | Self::ScreenshotError { .. } => ErrorSeverity::Medium,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::ValidationError { .. }
            | Self::ProcessingError { .. }
            | Self::UrlError(_)
            | Self::TomlError(_)
            | Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorSeverity::High,
            Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 是否值得重試：網路逾時、連線失敗、暫時性狀態碼
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                match e.status() {
                    Some(status) => RETRYABLE_STATUS_CODES.contains(&status.as_u16()),
                    None => e.is_request() || e.is_body(),
                }
            }
            Self::TransientApiError { .. } => true,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and that the remote host is reachable",
            ErrorCategory::Data => "Inspect the input data for missing or malformed fields",
            ErrorCategory::Configuration => {
                "Check the config file and environment variables (see diamond.example.toml)"
            }
            ErrorCategory::External => "Verify API keys and quotas, then retry later",
            ErrorCategory::System => "Check file permissions, disk space and that Chromium is installed",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingConfigError { field } => {
                format!("Required setting '{}' is not configured", field)
            }
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            Self::ExternalApiError { service, message } => {
                format!("{} rejected the request: {}", service, message)
            }
            Self::TransientApiError { service, .. } => {
                format!("{} is temporarily unavailable, try again later", service)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Low < ErrorSeverity::Critical);
        assert_eq!(
            DataError::not_found("listing", 3).severity(),
            ErrorSeverity::Low
        );
        assert_eq!(
            DataError::MissingConfigError {
                field: "google_places_api_key".to_string()
            }
            .category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DataError::transient("Places", "OVER_QUERY_LIMIT").is_retryable());
        assert!(!DataError::external("WordPress", "401 Unauthorized").is_retryable());
        assert!(!DataError::validation("bad row").is_retryable());
        assert!(!DataError::processing("oops").is_retryable());
    }

    #[test]
    fn test_user_friendly_message() {
        let err = DataError::MissingConfigError {
            field: "openai_api_key".to_string(),
        };
        assert_eq!(
            err.user_friendly_message(),
            "Required setting 'openai_api_key' is not configured"
        );
    }
}
