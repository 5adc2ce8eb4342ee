//! Server side of the upgrade handshake.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, warn};

use crate::connection::{Connection, Hooks};
use crate::error::{Error, Result};
use crate::handshake::{compute_accept_key, protocol_tokens, split_header};
use crate::http::MAX_HTTP_LINE_LENGTH;
use crate::transport::Transport;

struct Accepted {
    key: String,
    protocol: Option<String>,
}

const fn bad_request() -> Error {
    Error::HandshakeRejected {
        status: 400,
        reason: "Bad request",
    }
}

/// Read the client's upgrade request and answer it. A valid request gets
/// `101 Switching Protocols`; anything else gets the matching HTTP error
/// response before the transport is closed.
pub(crate) fn server_handshake<T: Transport, H: Hooks>(conn: &mut Connection<T, H>) -> Result<()> {
    match negotiate(conn) {
        Ok(Accepted { key, protocol }) => {
            let mut response = format!(
                "HTTP/1.1 101 Switching Protocols\r\n\
                 Upgrade: websocket\r\n\
                 Connection: Upgrade\r\n\
                 Sec-WebSocket-Accept: {}\r\n",
                compute_accept_key(&key)
            );
            if let Some(protocol) = &protocol {
                response.push_str(&format!("Sec-WebSocket-Protocol: {protocol}\r\n"));
            }
            response.push_str("\r\n");

            conn.write_all(response.as_bytes())?;
            conn.set_accepted_protocol(protocol);
            conn.set_open();
            debug!("handshake complete");
            Ok(())
        }
        Err(Error::ConnectionLost) => {
            // Nobody left to answer.
            conn.set_closed();
            Err(Error::ConnectionLost)
        }
        Err(err) => {
            let (status, reason) = match err {
                Error::Timeout(_) => (408, "Request timeout"),
                Error::LineTooLong(_) => (414, "HTTP line too long"),
                Error::HandshakeRejected { status, reason } => (status, reason),
                _ => (400, "Bad request"),
            };
            warn!(status, reason, "refusing upgrade request");

            conn.discard_incoming();
            let response = format!("HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\n\r\n");
            let _ = conn.write_all(response.as_bytes());
            conn.transport_mut().close();
            conn.set_closed();
            Err(Error::HandshakeRejected { status, reason })
        }
    }
}

fn negotiate<T: Transport, H: Hooks>(conn: &mut Connection<T, H>) -> Result<Accepted> {
    let mut line_buf = [0u8; MAX_HTTP_LINE_LENGTH];

    // Request line: METHOD SP URL SP VERSION.
    let (method, url, version) = {
        let line = conn.read_http_line(&mut line_buf)?;
        let mut parts = line.splitn(3, ' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(url), Some(version))
                if !method.is_empty() && !url.is_empty() && !version.is_empty() =>
            {
                (method.to_string(), url.to_string(), version.to_string())
            }
            _ => return Err(Error::HttpViolation("malformed request line")),
        }
    };

    if version != "HTTP/1.1" {
        return Err(Error::HandshakeRejected {
            status: 505,
            reason: "HTTP Version Not Supported",
        });
    }
    if method != "GET" {
        return Err(Error::HandshakeRejected {
            status: 405,
            reason: "Method Not Allowed",
        });
    }
    if !conn.hooks_mut().check_url(&url) {
        return Err(Error::HandshakeRejected {
            status: 404,
            reason: "Not Found",
        });
    }

    let required = conn.config().protocol.clone();
    let mut connection_upgrade = false;
    let mut upgrade_websocket = false;
    let mut headers_valid = true;
    let mut key: Option<String> = None;
    let mut subprotocol_ok = required.is_none();
    let mut chosen: Option<String> = None;

    loop {
        let line = conn.read_http_line(&mut line_buf)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = split_header(line)?;
        if !conn.hooks_mut().check_header(&name, &value) {
            return Err(bad_request());
        }

        match name.as_str() {
            "connection" => {
                if value.eq_ignore_ascii_case("upgrade") {
                    connection_upgrade = true;
                } else {
                    headers_valid = false;
                }
            }
            "upgrade" => {
                if value.eq_ignore_ascii_case("websocket") {
                    upgrade_websocket = true;
                } else {
                    headers_valid = false;
                }
            }
            "sec-websocket-key" => key = Some(value),
            "sec-websocket-protocol" => {
                for token in protocol_tokens(&value) {
                    match &required {
                        Some(wanted) if token == wanted => {
                            subprotocol_ok = true;
                            chosen = Some(wanted.clone());
                        }
                        None => {
                            subprotocol_ok = true;
                            if chosen.is_none() {
                                chosen = Some(token.to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let Some(key) = key else {
        return Err(bad_request());
    };
    // Base64 of 16 bytes is exactly 24 characters.
    if key.len() != 24 || !BASE64.decode(&key).map_or(false, |raw| raw.len() == 16) {
        return Err(bad_request());
    }
    if !headers_valid || !connection_upgrade || !upgrade_websocket || !subprotocol_ok {
        return Err(bad_request());
    }

    Ok(Accepted {
        key,
        protocol: chosen,
    })
}
