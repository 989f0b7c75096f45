use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("event {0} not found")]
    NotFound(i64),
    #[error("storage error: {0}")]
    Store(String),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_error_display() {
        let err = LedgerError::Validation("customer name is empty".to_string());
        assert!(format!("{err}").contains("validation error"));
        let err = LedgerError::NotFound(42);
        assert_eq!(format!("{err}"), "event 42 not found");
    }
}
