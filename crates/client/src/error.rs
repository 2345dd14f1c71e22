/// Transport-level failures, before attribution to a specific entity.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request itself failed (connect, TLS, non-2xx status).
    #[error("http request failed: {0}")]
    Http(String),

    /// The service answered with a GraphQL error.
    #[error("graphql error{}: {message}", code_suffix(.code))]
    Graphql {
        code: Option<String>,
        message: String,
    },

    /// The response parsed but did not have the expected shape.
    #[error("unexpected response shape for {operation}")]
    Shape { operation: String },

    /// Fixture-mode filesystem or format problem.
    #[error("fixtures error: {0}")]
    Fixtures(String),
}

impl TransportError {
    /// Whether the error means "this id does not resolve" rather than a
    /// transport fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Graphql { code: Some(code), .. } if code == "NOT_FOUND")
    }
}

fn code_suffix(code: &Option<String>) -> String {
    match code {
        Some(code) => format!(" ({code})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphql_error_formats_with_and_without_code() {
        let with = TransportError::Graphql {
            code: Some("BAD_USER_INPUT".to_string()),
            message: "Value does not exist".to_string(),
        };
        assert_eq!(
            with.to_string(),
            "graphql error (BAD_USER_INPUT): Value does not exist"
        );

        let without = TransportError::Graphql {
            code: None,
            message: "nope".to_string(),
        };
        assert_eq!(without.to_string(), "graphql error: nope");
    }

    #[test]
    fn not_found_detection() {
        let nf = TransportError::Graphql {
            code: Some("NOT_FOUND".to_string()),
            message: "gone".to_string(),
        };
        assert!(nf.is_not_found());
        assert!(!TransportError::Http("500".to_string()).is_not_found());
    }
}
