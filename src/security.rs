use subtle::ConstantTimeEq;

/// Constant-time string comparison for shared secrets such as the ingest token
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check a request token against the configured one.
///
/// No configured token means the endpoint is open. A configured token
/// requires an exact match; a missing header never matches.
pub fn ingest_token_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(expected), Some(provided)) => constant_time_compare(provided, expected),
    }
}
