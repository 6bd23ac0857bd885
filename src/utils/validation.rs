use crate::utils::error::{DataError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(DataError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(DataError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(DataError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

/// 網址需同時具備 scheme 與 host 才算有效（不丟錯，只回傳布林）
pub fn is_valid_website(url_str: &str) -> bool {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        tracing::warn!("Empty URL provided");
        return false;
    }
    match Url::parse(trimmed) {
        Ok(url) => {
            let valid = url.host_str().is_some_and(|h| !h.is_empty());
            if !valid {
                tracing::warn!("Invalid URL structure: {}", trimmed);
            }
            valid
        }
        Err(e) => {
            tracing::warn!("Invalid URL structure: {} ({})", trimmed, e);
            false
        }
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(DataError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(DataError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(DataError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DataError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(DataError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    validate_range("latitude", latitude, -90.0, 90.0)?;
    validate_range("longitude", longitude, -180.0, 180.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("places_base_url", "https://example.com").is_ok());
        assert!(validate_url("places_base_url", "http://example.com").is_ok());
        assert!(validate_url("places_base_url", "").is_err());
        assert!(validate_url("places_base_url", "invalid-url").is_err());
        assert!(validate_url("places_base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_is_valid_website() {
        assert!(is_valid_website("https://www.smithjewellers.com.au/?ref=maps"));
        assert!(!is_valid_website(""));
        assert!(!is_valid_website("smithjewellers.com.au"));
        assert!(!is_valid_website("mailto:shop@example.com"));
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("enrich_batch_size", 5, 1).is_ok());
        assert!(validate_positive_number("enrich_batch_size", 0, 1).is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(-33.8688, 151.2093).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
    }
}
