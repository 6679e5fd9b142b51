use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{info, warn};

/// Parse a header string in format "Name: Value" and add it to the HeaderMap
pub fn parse_and_add_header(headers: &mut HeaderMap, header_str: &str) {
    let Some((name, value)) = header_str.split_once(':') else {
        warn!(header = header_str, "Invalid header format, expected 'Name: Value'");
        return;
    };
    let (name, value) = (name.trim(), value.trim());

    let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
        warn!(name, "Invalid header name");
        return;
    };

    let Ok(header_value) = HeaderValue::from_str(value) else {
        warn!(value, "Invalid header value");
        return;
    };

    info!("Adding header: {}: {}", name, value);
    headers.append(header_name, header_value);
}

/// Parse a collection of header strings and return a HeaderMap
pub fn parse_headers(header_strings: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for header_str in header_strings {
        parse_and_add_header(&mut headers, header_str);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "Referer: http://example.com/".to_string(),
            "X-Token:abc:def".to_string(),
            "Cookie: a=1".to_string(),
            "Cookie: b=2".to_string(),
        ]);
        assert_eq!(headers.get("referer").unwrap(), "http://example.com/");
        assert_eq!(headers.get("x-token").unwrap(), "abc:def");
        assert_eq!(headers.get_all("cookie").iter().count(), 2);
    }

    #[test]
    fn test_invalid_headers_are_skipped() {
        let headers = parse_headers(&[
            "no colon here".to_string(),
            "Bad Name: value".to_string(),
            "X-Ok: fine".to_string(),
        ]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-ok").unwrap(), "fine");
    }
}
