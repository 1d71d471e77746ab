use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fetch exhausted for {url} after {attempts} attempts: {last_error}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_fetch_exhausted_display() {
        let err = AppError::FetchExhausted {
            url: "https://shop.example/p/1".to_string(),
            attempts: 3,
            last_error: "HTTP 500".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Fetch exhausted for https://shop.example/p/1 after 3 attempts: HTTP 500"
        );
    }

    #[test]
    fn test_validation_display() {
        let err = AppError::Validation("invalid URL 'x'".to_string());
        assert!(err.to_string().starts_with("Validation error"));
    }
}
