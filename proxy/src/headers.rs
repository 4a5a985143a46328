//! Header forwarding: drop the handful of headers the proxy overrides,
//! forward everything else byte-for-byte, then append the five fixed
//! proxy headers.
//!
//! Splitting a header line on the first `:` and forwarding the remainder
//! verbatim keeps any internal whitespace in the value intact, rather than
//! truncating at the first run of whitespace the way a naive `scanf`-style
//! split would.

/// Header names the proxy always supplies itself; any client-sent value is
/// dropped during forwarding. Compared case-insensitively.
const OVERRIDDEN_HEADERS: &[&str] = &[
    "user-agent",
    "accept",
    "accept-encoding",
    "connection",
    "proxy-connection",
];

/// The five headers the proxy appends to every upstream request, in this
/// exact order.
pub const FIXED_PROXY_HEADERS: &[&str] = &[
    "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3",
    "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    "Accept-Encoding: gzip, deflate",
    "Connection: close",
    "Proxy-Connection: close",
];

/// Given the client's header lines (no trailing `\r\n`, the blank
/// terminator line already stripped), return the forwarded header lines:
/// everything except the overridden set, then the fixed proxy headers.
pub fn build_forwarded_headers(client_headers: &[String]) -> Vec<String> {
    let mut forwarded: Vec<String> = client_headers
        .iter()
        .filter(|line| !is_overridden(line))
        .cloned()
        .collect();

    forwarded.extend(FIXED_PROXY_HEADERS.iter().map(|s| s.to_string()));
    forwarded
}

fn is_overridden(line: &str) -> bool {
    match header_name(line) {
        Some(name) => OVERRIDDEN_HEADERS
            .iter()
            .any(|overridden| overridden.eq_ignore_ascii_case(name)),
        None => false,
    }
}

/// The header name, i.e. everything before the first `:`. `None` if the
/// line has no colon at all (malformed, forwarded as-is and left for the
/// upstream server to reject).
fn header_name(line: &str) -> Option<&str> {
    line.split_once(':').map(|(name, _)| name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_the_overridden_headers_case_insensitively() {
        let input = vec![
            "Host: example.com".to_string(),
            "User-Agent: curl/8.0".to_string(),
            "ACCEPT: */*".to_string(),
            "Connection: keep-alive".to_string(),
        ];
        let out = build_forwarded_headers(&input);
        assert!(out.iter().any(|h| h == "Host: example.com"));
        assert!(!out.iter().any(|h| h.to_ascii_lowercase().starts_with("user-agent")));
        assert!(!out.iter().any(|h| h.to_ascii_lowercase().starts_with("accept:")));
        assert!(!out.iter().any(|h| h.starts_with("Connection: keep-alive")));
    }

    #[test]
    fn appends_the_five_fixed_headers_in_order() {
        let out = build_forwarded_headers(&[]);
        assert_eq!(out, FIXED_PROXY_HEADERS.to_vec());
    }

    #[test]
    fn preserves_internal_whitespace_in_forwarded_values() {
        let input = vec!["Cookie: a=1;   b=2".to_string()];
        let out = build_forwarded_headers(&input);
        assert!(out.iter().any(|h| h == "Cookie: a=1;   b=2"));
    }

    #[test]
    fn retains_unrelated_headers_unchanged() {
        let input = vec!["X-Custom: value with spaces".to_string()];
        let out = build_forwarded_headers(&input);
        assert_eq!(out[0], "X-Custom: value with spaces");
    }
}
