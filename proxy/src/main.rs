//! CLI entry point: `captive-proxy <port>`.

use std::env;
use std::net::TcpListener;
use std::process;

use captive_proxy::cache::{Cache, MAX_CACHE_SIZE};
use captive_proxy::error::CliError;
use captive_proxy::pool::WorkerPool;
use captive_proxy::worker;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let port = match parse_port(&args) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind port {port}: {e}");
            process::exit(1);
        }
    };

    log::info!("captive-proxy listening on port {port}");

    let cache = Cache::shared(MAX_CACHE_SIZE);
    let pool = WorkerPool::new(WorkerPool::default_size());

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("accept failed: {e}");
                continue;
            }
        };

        let cache = cache.clone();
        pool.execute(move || worker::handle_connection(stream, cache));
    }
}

fn parse_port(args: &[String]) -> Result<u16, CliError> {
    let port_str = args.get(1).ok_or(CliError::MissingPort)?;
    port_str
        .parse()
        .map_err(|e| CliError::InvalidPort(port_str.clone(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_port_is_an_error() {
        let args = vec!["captive-proxy".to_string()];
        assert!(matches!(parse_port(&args), Err(CliError::MissingPort)));
    }

    #[test]
    fn non_numeric_port_is_an_error() {
        let args = vec!["captive-proxy".to_string(), "not-a-port".to_string()];
        assert!(matches!(parse_port(&args), Err(CliError::InvalidPort(..))));
    }

    #[test]
    fn valid_port_parses() {
        let args = vec!["captive-proxy".to_string(), "8080".to_string()];
        assert_eq!(parse_port(&args).unwrap(), 8080);
    }
}
