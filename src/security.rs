use subtle::ConstantTimeEq;

/// Constant-time string comparison to prevent timing attacks on the API key
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Whether `header_value` carries the expected API key
pub fn is_authorized(header_value: Option<&str>, expected: &str) -> bool {
    header_value
        .and_then(bearer_token)
        .is_some_and(|token| constant_time_compare(token, expected))
}
