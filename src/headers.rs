use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::{FetchError, Result};

/// Builds the header set for one request descriptor.
///
/// `Content-Type: application/json` is always present unless the caller
/// overrides it. `Authorization` is added only when `use_token` is set and a
/// non-empty token is available. Caller headers win over both defaults.
pub fn build_headers(
    token: Option<&str>,
    headers: &[(String, String)],
    use_token: bool,
    authorization_type: Option<&str>,
) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(token) = token.filter(|token| use_token && !token.is_empty()) {
        let value = authorization_value(token, authorization_type);
        let value = HeaderValue::from_str(&value)
            .map_err(|_| FetchError::InvalidHeader("authorization token".to_owned()))?;
        map.insert(AUTHORIZATION, value);
    }

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(format!("name '{name}'")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| FetchError::InvalidHeader(format!("value for '{name}'")))?;
        map.insert(header_name, header_value);
    }

    Ok(map)
}

fn authorization_value(token: &str, authorization_type: Option<&str>) -> String {
    match authorization_type.map(str::trim) {
        Some(scheme) if !scheme.is_empty() => format!("{scheme} {token}"),
        _ => token.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

    use super::build_headers;
    use crate::FetchError;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn adds_bearer_authorization() {
        let headers = build_headers(Some("abc"), &[], true, Some("Bearer")).expect("headers");
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn skips_authorization_when_opted_out_or_missing() {
        let headers = build_headers(Some("abc"), &[], false, Some("Bearer")).expect("headers");
        assert!(!headers.contains_key(AUTHORIZATION));

        let headers = build_headers(None, &[], true, Some("Bearer")).expect("headers");
        assert!(!headers.contains_key(AUTHORIZATION));

        let headers = build_headers(Some(""), &[], true, Some("Bearer")).expect("headers");
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn bare_token_without_authorization_type() {
        let headers = build_headers(Some("abc"), &[], true, None).expect("headers");
        assert_eq!(headers[AUTHORIZATION], "abc");

        let headers = build_headers(Some("abc"), &[], true, Some("")).expect("headers");
        assert_eq!(headers[AUTHORIZATION], "abc");
    }

    #[test]
    fn caller_headers_take_precedence() {
        let user = pairs(&[
            ("Content-Type", "text/plain"),
            ("Authorization", "Basic dXNlcg=="),
            ("X-Trace", "1"),
        ]);
        let headers = build_headers(Some("abc"), &user, true, Some("Bearer")).expect("headers");
        assert_eq!(headers[CONTENT_TYPE], "text/plain");
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcg==");
        assert_eq!(headers["x-trace"], "1");
    }

    #[test]
    fn rejects_invalid_header_name() {
        let user = pairs(&[("bad header", "x")]);
        let err = build_headers(None, &user, true, None).expect_err("must reject");
        assert!(matches!(err, FetchError::InvalidHeader(_)));
    }
}
