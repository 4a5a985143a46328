//! Parsing the request line and the absolute URI it carries.
//!
//! Deliberately minimal: only `GET http://host[:port]/path?query HTTP/x.y`
//! is understood; that's all the cache key and the upstream connect need.

use crate::error::RequestError;

/// The default port used when the URI omits one, per RFC 2616 §3.2.2.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// The host, port, and path-and-query parsed out of an absolute-form URI.
/// Owned from the start, so parsed requests carry no lifetime back into
/// whatever buffer the request line was read into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// The request line, split into the exact key bytes used for cache lookups
/// and the method/URI/version already picked apart for the pipeline.
pub struct RequestLine {
    /// The request line exactly as received, including its trailing
    /// `\r\n`. This is the cache key (see `cache.rs` module docs): two
    /// distinct clients sending the identical GET line collide on the same
    /// cache entry, by design.
    pub raw: Vec<u8>,
    pub method: String,
    pub uri: Uri,
}

/// Parse one request line. `line` must not include the trailing `\r\n`;
/// `raw` is the caller's copy of the full line including it, kept verbatim
/// as the cache key.
pub fn parse_request_line(line: &str, raw: Vec<u8>) -> Result<RequestLine, RequestError> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(line.to_string()))?
        .to_string();
    let uri_str = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(line.to_string()))?;
    let _version = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(line.to_string()))?;

    if method != "GET" {
        return Err(RequestError::UnsupportedMethod(method));
    }

    let uri = parse_absolute_uri(uri_str)?;

    Ok(RequestLine {
        raw,
        method,
        uri,
    })
}

/// Parse `http://host[:port][/path[?query]]` into its parts. Missing path
/// defaults to `/`.
fn parse_absolute_uri(uri: &str) -> Result<Uri, RequestError> {
    let rest = uri
        .strip_prefix("http://")
        .ok_or_else(|| RequestError::Malformed(uri.to_string()))?;

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };

    if authority.is_empty() {
        return Err(RequestError::Malformed(uri.to_string()));
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port_str)) => {
            let port: u16 = port_str
                .parse()
                .map_err(|_| RequestError::Malformed(uri.to_string()))?;
            (host.to_string(), port)
        }
        None => (authority.to_string(), DEFAULT_HTTP_PORT),
    };

    if host.is_empty() {
        return Err(RequestError::Malformed(uri.to_string()));
    }

    Ok(Uri {
        host,
        port,
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<RequestLine, RequestError> {
        parse_request_line(line, line.as_bytes().to_vec())
    }

    #[test]
    fn parses_host_and_default_port_and_path() {
        let req = parse("GET http://example.com/foo/bar HTTP/1.0").unwrap();
        assert_eq!(req.uri.host, "example.com");
        assert_eq!(req.uri.port, DEFAULT_HTTP_PORT);
        assert_eq!(req.uri.path, "/foo/bar");
    }

    #[test]
    fn parses_explicit_port() {
        let req = parse("GET http://example.com:8080/ HTTP/1.0").unwrap();
        assert_eq!(req.uri.host, "example.com");
        assert_eq!(req.uri.port, 8080);
    }

    #[test]
    fn missing_path_defaults_to_root() {
        let req = parse("GET http://example.com HTTP/1.0").unwrap();
        assert_eq!(req.uri.path, "/");
    }

    #[test]
    fn preserves_query_string_in_path() {
        let req = parse("GET http://example.com/search?q=rust HTTP/1.0").unwrap();
        assert_eq!(req.uri.path, "/search?q=rust");
    }

    #[test]
    fn non_get_method_is_unsupported() {
        let err = parse("POST http://example.com/ HTTP/1.0").unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedMethod(m) if m == "POST"));
    }

    #[test]
    fn non_absolute_uri_is_malformed() {
        let err = parse("GET /foo HTTP/1.0").unwrap_err();
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[test]
    fn truncated_request_line_is_malformed() {
        let err = parse("GET").unwrap_err();
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[test]
    fn raw_key_preserves_original_bytes() {
        let raw = b"GET http://example.com/ HTTP/1.0\r\n".to_vec();
        let req = parse_request_line("GET http://example.com/ HTTP/1.0", raw.clone()).unwrap();
        assert_eq!(req.raw, raw);
    }
}
