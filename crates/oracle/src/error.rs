use thiserror::Error;

pub type Result<T> = std::result::Result<T, OracleError>;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {0}: {1}")]
    Http(u16, String),

    #[error("Malformed GraphQL response: {0}")]
    MalformedResponse(String),

    #[error("Expected errors in response to probe document: {document}")]
    MissingErrors { document: String },

    #[error("Unable to decode a type signature from any of: {}", documents.join(" | "))]
    NoTypeSignatureDecoded { documents: Vec<String> },

    #[error("Unable to find the enclosing typename in errors: {}", errors.join(" | "))]
    TypenameNotFound { errors: Vec<String> },

    #[error("Invalid query template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid seed schema: {0}")]
    InvalidSeed(String),
}

impl OracleError {
    /// Whether the error must abort the whole discovery run.
    ///
    /// A failed type decode only abandons the field or argument being
    /// described; everything else means the transport, the server or the
    /// query construction cannot be trusted any more.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NoTypeSignatureDecoded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_type_decode_failures_are_local() {
        assert!(!OracleError::NoTypeSignatureDecoded {
            documents: vec!["query { user }".into()]
        }
        .is_fatal());
        assert!(OracleError::Network("timeout".into()).is_fatal());
        assert!(OracleError::MissingErrors {
            document: "query { a }".into()
        }
        .is_fatal());
        assert!(OracleError::MalformedResponse("eof".into()).is_fatal());
    }

    #[test]
    fn test_messages_list_offending_inputs() {
        let err = OracleError::NoTypeSignatureDecoded {
            documents: vec!["query { a }".into(), "query { a { lol } }".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unable to decode a type signature from any of: query { a } | query { a { lol } }"
        );
    }
}
