use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value as JsonValue};

/// Characters left as-is in query keys and values (RFC 3986 unreserved).
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query parameters attached to a request.
pub type Query = Map<String, JsonValue>;

/// Resolves `url` against `base_url` and appends `query`.
///
/// Example: `("/users/", base "https://api.test/v1/")` →
/// `"https://api.test/v1/users/"`
pub fn build_url(url: &str, query: Option<&Query>, base_url: &str) -> String {
    let full_url = if is_absolute(url) {
        url.to_owned()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    };

    let encoded = query.map(encode_query).unwrap_or_default();
    if encoded.is_empty() {
        return full_url;
    }

    let separator = if full_url.contains('?') { '&' } else { '?' };
    format!("{full_url}{separator}{encoded}")
}

/// Returns `true` for URLs that start with a `scheme://` prefix.
fn is_absolute(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Encodes query parameters with keys in sorted order.
///
/// `null` and empty-string values are omitted; arrays become repeated keys.
fn encode_query(query: &Query) -> String {
    let mut keys: Vec<&String> = query.keys().collect();
    keys.sort();

    let mut parts = Vec::new();
    for key in keys {
        match &query[key.as_str()] {
            JsonValue::Array(items) => {
                for item in items {
                    push_pair(&mut parts, key, item);
                }
            }
            value => push_pair(&mut parts, key, value),
        }
    }
    parts.join("&")
}

fn push_pair(parts: &mut Vec<String>, key: &str, value: &JsonValue) {
    let text = match value {
        JsonValue::Null => return,
        JsonValue::String(text) if text.is_empty() => return,
        JsonValue::String(text) => text.clone(),
        JsonValue::Bool(flag) => flag.to_string(),
        JsonValue::Number(number) => number.to_string(),
        // Nested structures have no canonical query form; send them as JSON.
        other => other.to_string(),
    };
    parts.push(format!(
        "{}={}",
        utf8_percent_encode(key, QUERY_COMPONENT),
        utf8_percent_encode(&text, QUERY_COMPONENT)
    ));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_url, Query};

    fn query(value: serde_json::Value) -> Query {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn absolute_url_passes_through() {
        assert_eq!(
            build_url("https://other.test/a", None, "https://api.test"),
            "https://other.test/a"
        );
    }

    #[test]
    fn relative_url_joins_with_single_slash() {
        assert_eq!(build_url("/users", None, "https://api.test/"), "https://api.test/users");
        assert_eq!(build_url("users", None, "https://api.test"), "https://api.test/users");
        assert_eq!(build_url("//users", None, "https://api.test//"), "https://api.test/users");
    }

    #[test]
    fn path_that_only_mentions_http_is_relative() {
        assert_eq!(build_url("http-status", None, "https://api.test"), "https://api.test/http-status");
    }

    #[test]
    fn query_skips_null_and_empty_and_sorts_keys() {
        let q = query(json!({"select": "*", "b": null, "a": "", "page": 2, "active": true}));
        assert_eq!(
            build_url("/items", Some(&q), "https://api.test"),
            "https://api.test/items?active=true&page=2&select=%2A"
        );
    }

    #[test]
    fn query_encodes_reserved_characters_and_arrays() {
        let q = query(json!({"q": "a b&c", "tag": ["x", null, "y"]}));
        assert_eq!(
            build_url("/search", Some(&q), "https://api.test"),
            "https://api.test/search?q=a%20b%26c&tag=x&tag=y"
        );
    }

    #[test]
    fn empty_query_adds_nothing_and_existing_query_is_extended() {
        let q = query(json!({"a": null}));
        assert_eq!(build_url("/x", Some(&q), "https://api.test"), "https://api.test/x");

        let q = query(json!({"b": 1}));
        assert_eq!(
            build_url("https://api.test/x?a=0", Some(&q), ""),
            "https://api.test/x?a=0&b=1"
        );
    }
}
