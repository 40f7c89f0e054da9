//! Where an upstream API key comes from, in priority order.

use axum::http::{HeaderMap, header};
use serde_json::Value as JsonValue;

use nbproxy_common::GlobalConfig;

fn header_str<'a>(headers: &'a HeaderMap, name: impl axum::http::header::AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, header::AUTHORIZATION)?;
    let prefix = "Bearer ";
    if value.len() <= prefix.len() || !value[..prefix.len()].eq_ignore_ascii_case(prefix) {
        return None;
    }
    let token = value[prefix.len()..].trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The browser UI has sent both spellings over time.
pub fn body_key(body: &JsonValue) -> Option<String> {
    ["apiKey", "apikey"].iter().find_map(|field| {
        body.get(*field)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

pub fn origin(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::ORIGIN).map(str::to_string)
}

/// `Authorization: Bearer`, then the body, then `OPENROUTER_API_KEY`.
pub fn openrouter_key(headers: &HeaderMap, body: &JsonValue, config: &GlobalConfig) -> Option<String> {
    bearer_token(headers)
        .or_else(|| body_key(body))
        .or_else(|| config.openrouter_api_key.clone())
}

/// `x-goog-api-key`, then `Authorization: Bearer`, then the body, then `GEMINI_API_KEY`.
pub fn gemini_key(headers: &HeaderMap, body: &JsonValue, config: &GlobalConfig) -> Option<String> {
    header_str(headers, "x-goog-api-key")
        .map(str::to_string)
        .or_else(|| bearer_token(headers))
        .or_else(|| body_key(body))
        .or_else(|| config.gemini_api_key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn bearer_beats_body_beats_env() {
        let config = GlobalConfig {
            openrouter_api_key: Some("env-key".to_string()),
            ..GlobalConfig::default()
        };
        let body = json!({"apiKey": " body-key "});
        assert_eq!(
            openrouter_key(&headers(&[("authorization", "bearer hdr-key")]), &body, &config).as_deref(),
            Some("hdr-key")
        );
        assert_eq!(openrouter_key(&HeaderMap::new(), &body, &config).as_deref(), Some("body-key"));
        assert_eq!(
            openrouter_key(&HeaderMap::new(), &json!({"apikey": ""}), &config).as_deref(),
            Some("env-key")
        );
        assert_eq!(openrouter_key(&HeaderMap::new(), &json!({}), &GlobalConfig::default()), None);
    }

    #[test]
    fn malformed_authorization_is_ignored() {
        assert_eq!(bearer_token(&headers(&[("authorization", "Basic abc")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer ")])), None);
    }

    #[test]
    fn gemini_prefers_goog_header() {
        let map = headers(&[("x-goog-api-key", "g-hdr"), ("authorization", "Bearer b")]);
        assert_eq!(gemini_key(&map, &json!({}), &GlobalConfig::default()).as_deref(), Some("g-hdr"));
        let map = headers(&[("authorization", "Bearer b")]);
        assert_eq!(gemini_key(&map, &json!({}), &GlobalConfig::default()).as_deref(), Some("b"));
    }
}
