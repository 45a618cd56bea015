//! NS-013: Arista eAPI transport: JSON-RPC `runCmds` over HTTP(S).
//!
//! All of a host's commands go out in one request with `format: text`, so
//! the device runs them in order within one session. The reply carries one
//! `{output}` object per command.

use super::{ConnectionSettings, DeviceError, TransportKind};
use crate::core::types::Target;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: String,
}

#[derive(Debug, Serialize)]
struct RpcParams<'a> {
    version: u32,
    cmds: &'a [String],
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<CommandResult>>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct CommandResult {
    #[serde(default)]
    output: String,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Command API URL for a host, e.g. `https://10.0.0.1/command-api`.
pub fn endpoint(host: &str, settings: &ConnectionSettings) -> String {
    let scheme = match settings.kind {
        TransportKind::Http => "http",
        _ => "https",
    };
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    match settings.port {
        Some(port) => format!("{}://{}:{}/command-api", scheme, host, port),
        None => format!("{}://{}/command-api", scheme, host),
    }
}

/// `Authorization` header value for HTTP basic auth.
pub fn basic_auth(username: &str, password: &str) -> String {
    let raw = format!("{}:{}", username, password);
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(raw.as_bytes())
    )
}

fn request_body<'a>(target: &'a Target) -> RpcRequest<'a> {
    RpcRequest {
        jsonrpc: "2.0",
        method: "runCmds",
        params: RpcParams {
            version: 1,
            cmds: &target.commands,
            format: "text",
        },
        id: format!("netsnap-{}", target.host),
    }
}

fn build_agent(settings: &ConnectionSettings) -> ureq::Agent {
    let tls = ureq::tls::TlsConfig::builder()
        .disable_verification(!settings.verify_tls)
        .build();
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(settings.timeout))
        .tls_config(tls)
        .build();
    config.into()
}

/// Turn a JSON-RPC reply into one output string per command.
fn outputs(reply: RpcResponse, expected: usize) -> Result<Vec<String>, DeviceError> {
    if let Some(err) = reply.error {
        return Err(DeviceError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    let results = reply.result.unwrap_or_default();
    if results.len() != expected {
        return Err(DeviceError::ResultCount {
            expected,
            got: results.len(),
        });
    }
    Ok(results.into_iter().map(|r| r.output).collect())
}

/// Run all of a target's commands in one `runCmds` call.
pub fn run_cmds(target: &Target, settings: &ConnectionSettings) -> Result<Vec<String>, DeviceError> {
    let url = endpoint(&target.host, settings);
    let agent = build_agent(settings);

    let mut response = agent
        .post(&url)
        .header("Authorization", basic_auth(&target.username, &target.password))
        .send_json(request_body(target))?;

    let reply: RpcResponse = response.body_mut().read_json()?;
    outputs(reply, target.commands.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml_ng::Mapping;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    fn target(host: &str, commands: &[&str]) -> Target {
        Target {
            host: host.into(),
            username: "admin".into(),
            password: "admin".into(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            connection: Mapping::new(),
        }
    }

    /// Serve one HTTP request with a canned JSON body; returns the request body.
    fn serve_once(listener: TcpListener, reply: &'static str) -> std::thread::JoinHandle<String> {
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.len(),
                reply
            )
            .unwrap();
            stream.flush().unwrap();
            String::from_utf8(body).unwrap()
        })
    }

    #[test]
    fn test_ns013_endpoint() {
        let https = ConnectionSettings::default();
        assert_eq!(endpoint("10.0.0.1", &https), "https://10.0.0.1/command-api");

        let http = ConnectionSettings {
            kind: TransportKind::Http,
            port: Some(8080),
            ..ConnectionSettings::default()
        };
        assert_eq!(endpoint("sw1", &http), "http://sw1:8080/command-api");
        assert_eq!(endpoint("fe80::1", &https), "https://[fe80::1]/command-api");
    }

    #[test]
    fn test_ns013_basic_auth() {
        assert_eq!(basic_auth("admin", "admin"), "Basic YWRtaW46YWRtaW4=");
    }

    #[test]
    fn test_ns013_request_body_shape() {
        let t = target("sw1", &["show version", "show clock"]);
        let json = serde_json::to_value(request_body(&t)).unwrap();
        assert_eq!(json["method"], "runCmds");
        assert_eq!(json["params"]["format"], "text");
        assert_eq!(json["params"]["version"], 1);
        assert_eq!(json["params"]["cmds"][1], "show clock");
    }

    #[test]
    fn test_ns013_outputs_ok() {
        let reply: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"x","result":[{"output":"v1\n"},{"output":"12:00\n"}]}"#,
        )
        .unwrap();
        assert_eq!(outputs(reply, 2).unwrap(), vec!["v1\n", "12:00\n"]);
    }

    #[test]
    fn test_ns013_outputs_rpc_error() {
        let reply: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"x","error":{"code":1002,"message":"invalid command"}}"#,
        )
        .unwrap();
        match outputs(reply, 1).unwrap_err() {
            DeviceError::Rpc { code, message } => {
                assert_eq!(code, 1002);
                assert_eq!(message, "invalid command");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ns013_outputs_count_mismatch() {
        let reply: RpcResponse =
            serde_json::from_str(r#"{"result":[{"output":"only one"}]}"#).unwrap();
        assert!(matches!(
            outputs(reply, 2),
            Err(DeviceError::ResultCount { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_ns013_run_cmds_over_http() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = serve_once(
            listener,
            r#"{"jsonrpc":"2.0","id":"netsnap-127.0.0.1","result":[{"output":"EOS 4.30\n"}]}"#,
        );

        let settings = ConnectionSettings {
            kind: TransportKind::Http,
            port: Some(port),
            timeout: Duration::from_secs(5),
            ..ConnectionSettings::default()
        };
        let out = run_cmds(&target("127.0.0.1", &["show version"]), &settings).unwrap();
        assert_eq!(out, vec!["EOS 4.30\n"]);

        let body = server.join().unwrap();
        assert!(body.contains("\"runCmds\""));
        assert!(body.contains("show version"));
    }

    #[test]
    fn test_ns013_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let settings = ConnectionSettings {
            kind: TransportKind::Http,
            port: Some(port),
            timeout: Duration::from_secs(2),
            ..ConnectionSettings::default()
        };
        let err = run_cmds(&target("127.0.0.1", &["show version"]), &settings).unwrap_err();
        assert!(matches!(err, DeviceError::Http { status: None, .. }));
    }
}
