//! WebSocket handshake helpers
//!
//! The credential extraction rule is fixed: the value of the first `token`
//! parameter in the request URI's query string, e.g.
//! `ws://host:3001/?token=eyJhbGci...`. No header fallback.

/// Extract the credential token from a request query string.
///
/// Returns `None` when the parameter is absent or empty.
pub fn extract_token(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_alone() {
        assert_eq!(extract_token("token=tok-A"), Some("tok-A"));
    }

    #[test]
    fn test_extract_token_among_params() {
        assert_eq!(extract_token("v=2&token=tok-A&debug=1"), Some("tok-A"));
    }

    #[test]
    fn test_extract_token_first_wins() {
        assert_eq!(extract_token("token=first&token=second"), Some("first"));
    }

    #[test]
    fn test_extract_token_empty_value() {
        assert_eq!(extract_token("token="), None);
    }

    #[test]
    fn test_extract_token_absent() {
        assert_eq!(extract_token("user=alice"), None);
        assert_eq!(extract_token(""), None);
    }
}
