use thiserror::Error;

/// Errors raised while loading or querying results
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultsError {
    /// The text is not in the format the parser handles; another parser may accept it.
    #[error("wrong file format: {0}")]
    WrongFileFormat(String),
    /// The text is in a recognised format but its content is broken, or an
    /// argument was out of range.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl ResultsError {
    pub fn wrong_format(message: impl Into<String>) -> Self {
        ResultsError::WrongFileFormat(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ResultsError::InvalidData(message.into())
    }

    pub fn is_wrong_format(&self) -> bool {
        matches!(self, ResultsError::WrongFileFormat(_))
    }

    /// The message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            ResultsError::WrongFileFormat(message) | ResultsError::InvalidData(message) => message,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResultsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = ResultsError::wrong_format("not CSV");
        assert!(err.is_wrong_format());
        assert_eq!(err.message(), "not CSV");
        assert_eq!(err.to_string(), "wrong file format: not CSV");

        let err = ResultsError::invalid("bad row");
        assert!(!err.is_wrong_format());
        assert_eq!(err.to_string(), "invalid data: bad row");
    }
}
