//! The error-response envelope: a `400`/`404`/`501` status line plus the
//! small HTML body template.

/// Render a complete `HTTP/1.0 <code> <reason>` response, headers and body
/// included, ready to write to the client socket.
pub fn error_response(code: u16, reason: &str, cause: &str, long_msg: &str) -> Vec<u8> {
    let body = format!(
        "<html><title>Proxy Error</title>\r\n\
         <body bgcolor=\"ffffff\">\r\n\
         {code}: {reason}\r\n\
         <p>{long_msg}: {cause}\r\n\
         <hr><em>The proxy</em>\r\n\
         </body></html>\r\n"
    );

    let mut response = format!(
        "HTTP/1.0 {code} {reason}\r\n\
         Content-type: text/html\r\n\
         Content-length: {len}\r\n\
         \r\n",
        len = body.len(),
    );
    response.push_str(&body);
    response.into_bytes()
}

/// `GET`-only: anything else gets a `501`, the cause echoing the method
/// that was rejected.
pub fn not_implemented(method: &str) -> Vec<u8> {
    error_response(
        501,
        "Not Implemented",
        method,
        "Proxy only supports GET method",
    )
}

/// DNS resolution or TCP connect to the upstream failed.
pub fn not_found(host: &str) -> Vec<u8> {
    error_response(404, "Not Found", host, "Proxy couldn't reach upstream host")
}

/// The request line didn't parse.
pub fn bad_request(detail: &str) -> Vec<u8> {
    error_response(400, "Bad Request", detail, "Proxy couldn't parse request")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_implemented_has_the_right_status_line_and_cause() {
        let resp = not_implemented("POST");
        let text = String::from_utf8(resp).unwrap();
        assert!(text.starts_with("HTTP/1.0 501 Not Implemented\r\n"));
        assert!(text.contains("POST"));
        assert!(text.contains("Proxy only supports GET method"));
    }

    #[test]
    fn not_found_has_the_right_status_line() {
        let resp = not_found("nonexistent.invalid");
        let text = String::from_utf8(resp).unwrap();
        assert!(text.starts_with("HTTP/1.0 404 Not Found\r\n"));
        assert!(text.contains("nonexistent.invalid"));
    }

    #[test]
    fn content_length_header_matches_body_length() {
        let resp = bad_request("garbage");
        let text = String::from_utf8(resp).unwrap();
        let header_len: usize = text
            .lines()
            .find_map(|line| line.strip_prefix("Content-length: "))
            .unwrap()
            .parse()
            .unwrap();
        let body_start = text.find("\r\n\r\n").unwrap() + 4;
        assert_eq!(text.len() - body_start, header_len);
    }
}
