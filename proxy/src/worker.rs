//! The per-connection pipeline: parse the request, consult the cache,
//! fetch from upstream on a miss, stream the response back, and admit it
//! into the cache if it qualifies.
//!
//! One call to [`handle_connection`] owns exactly one accepted client
//! socket end to end; it never blocks on anything but that socket, the
//! upstream socket it opens, and (briefly) the cache's lock.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

use crate::cache::{Shared, MAX_OBJECT_SIZE};
use crate::error::RequestError;
use crate::headers::build_forwarded_headers;
use crate::request::{parse_request_line, Uri};
use crate::response;

/// How much of an upstream response to shuttle per read; chosen to be
/// larger than a typical TCP segment so streaming doesn't dissolve into
/// tiny writes.
const STREAM_BUF_SIZE: usize = 8192;

/// Handle one accepted connection, logging (rather than propagating) any
/// error that isn't just the peer hanging up, and unconditionally closing
/// both sockets on the way out via `Drop`.
pub fn handle_connection(mut client: TcpStream, cache: Shared) {
    match serve(&mut client, &cache) {
        Ok(()) => {}
        Err(e) if e.is_peer_gone() => {
            log::debug!("peer went away mid-request: {e}");
        }
        Err(e) => {
            log::warn!("error handling connection: {e}");
        }
    }
}

fn serve(client: &mut TcpStream, cache: &Shared) -> Result<(), RequestError> {
    let mut reader = BufReader::new(client.try_clone()?);

    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        // Client connected and disconnected without sending anything.
        return Ok(());
    }
    let raw_request_line = line.clone().into_bytes();
    let trimmed = line.trim_end_matches(['\r', '\n']);

    let request = match parse_request_line(trimmed, raw_request_line) {
        Ok(request) => request,
        Err(RequestError::UnsupportedMethod(method)) => {
            client.write_all(&response::not_implemented(&method))?;
            return Ok(());
        }
        Err(RequestError::Malformed(detail)) => {
            client.write_all(&response::bad_request(&detail))?;
            return Ok(());
        }
        Err(other) => return Err(other),
    };

    let client_headers = read_header_lines(&mut reader)?;

    if let Some(hit) = {
        let guard = cache.read().expect("cache lock poisoned");
        guard.find(&request.raw)
    } {
        // The read lock is already released: `hit` is an `Arc` clone, so
        // the (possibly slow) write to the client happens lock-free.
        client.write_all(&hit.body)?;
        log::trace!("cache hit for {:?}", request.uri.path);
        return Ok(());
    }

    let forwarded_headers = build_forwarded_headers(&client_headers);
    let mut upstream = match connect_upstream(&request.uri) {
        Ok(stream) => stream,
        Err(e) => {
            client.write_all(&response::not_found(&request.uri.host))?;
            log::info!("upstream unreachable: {e}");
            return Ok(());
        }
    };

    upstream.write_all(&build_upstream_request(&request.uri.path, &forwarded_headers))?;

    let body = stream_response(&mut upstream, client)?;

    if let Some(body) = body {
        let mut guard = cache.write().expect("cache lock poisoned");
        guard.insert(request.raw, body);
    }

    Ok(())
}

fn connect_upstream(uri: &Uri) -> Result<TcpStream, RequestError> {
    TcpStream::connect((uri.host.as_str(), uri.port)).map_err(|source| {
        RequestError::UpstreamUnreachable {
            host: uri.host.clone(),
            port: uri.port,
            source,
        }
    })
}

/// Read header lines up to (and including consuming, but not returning)
/// the blank terminator line.
fn read_header_lines<R: BufRead>(reader: &mut R) -> Result<Vec<String>, RequestError> {
    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        headers.push(trimmed.to_string());
    }
    Ok(headers)
}

fn build_upstream_request(path: &str, headers: &[String]) -> Vec<u8> {
    let mut request = format!("GET {path} HTTP/1.0\r\n");
    for header in headers {
        request.push_str(header);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    request.into_bytes()
}

/// Stream `upstream`'s response to `client` while accumulating up to
/// `MAX_OBJECT_SIZE` bytes into a scratch buffer. Returns `Some(bytes)` if
/// the whole response fit and qualifies for caching, `None` if it
/// overflowed the limit (streaming to the client continues regardless).
fn stream_response(upstream: &mut TcpStream, client: &mut TcpStream) -> Result<Option<Vec<u8>>, RequestError> {
    let mut buf = [0u8; STREAM_BUF_SIZE];
    let mut scratch: Option<Vec<u8>> = Some(Vec::new());

    loop {
        let n = match upstream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(e.into()),
        };

        client.write_all(&buf[..n])?;

        if let Some(acc) = scratch.as_mut() {
            if acc.len() + n <= MAX_OBJECT_SIZE {
                acc.extend_from_slice(&buf[..n]);
            } else {
                scratch = None;
            }
        }
    }

    Ok(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_request_has_get_line_headers_and_blank_terminator() {
        let headers = vec!["Host: example.com".to_string(), "Connection: close".to_string()];
        let req = build_upstream_request("/foo", &headers);
        let text = String::from_utf8(req).unwrap();
        assert_eq!(
            text,
            "GET /foo HTTP/1.0\r\nHost: example.com\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn empty_headers_still_terminate_with_a_blank_line() {
        let req = build_upstream_request("/", &[]);
        assert_eq!(req, b"GET / HTTP/1.0\r\n\r\n");
    }
}
