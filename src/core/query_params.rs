use std::collections::HashMap;

/// Parse query parameters from a URI string.
///
/// Handles URL decoding and returns a HashMap of parameter key-value pairs.
/// Multiple values for the same key are not supported (only the last is kept).
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if let Some(query_start) = uri.find('?') {
        let query = &uri[query_start + 1..];
        for param in query.split('&') {
            if let Some(eq_idx) = param.find('=') {
                let key = &param[..eq_idx];
                let encoded_value = &param[eq_idx + 1..];
                let decoded = urlencoding::decode(encoded_value)
                    .unwrap_or(std::borrow::Cow::Borrowed(encoded_value))
                    .to_string();
                params.insert(key.to_string(), decoded);
            } else {
                // Flag parameter without value
                params.insert(param.to_string(), String::new());
            }
        }
    }

    params
}

/// Get a string parameter from parsed query params with optional default
pub fn get_string(params: &HashMap<String, String>, key: &str, default: Option<&str>) -> Option<String> {
    params.get(key)
        .map(|s| s.clone())
        .or_else(|| default.map(|d| d.to_string()))
}

/// Get an integer parameter with validation and default
pub fn get_int(params: &HashMap<String, String>, key: &str, default: usize) -> usize {
    params.get(key)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
        .max(1)
}

/// Get a float parameter (the notification `since` cursor), defaulting when
/// absent or unparsable.
pub fn get_float(params: &HashMap<String, String>, key: &str, default: f64) -> f64 {
    params.get(key)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_decodes() {
        let params = parse_query_params("/posts?user=john%20doe&page=2");
        assert_eq!(params.get("user"), Some(&"john doe".to_string()));
        assert_eq!(get_int(&params, "page", 1), 2);
    }

    #[test]
    fn missing_params_fall_back() {
        let params = parse_query_params("/notifications");
        assert_eq!(get_int(&params, "page", 1), 1);
        assert_eq!(get_float(&params, "since", 0.0), 0.0);
        assert_eq!(get_string(&params, "q", None), None);
    }

    #[test]
    fn since_cursor_parses_as_float() {
        let params = parse_query_params("/notifications?since=1714650000.25");
        assert_eq!(get_float(&params, "since", 0.0), 1714650000.25);
    }
}
