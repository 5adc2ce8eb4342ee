//! Client side of the upgrade handshake.

use tracing::{debug, warn};

use crate::connection::{Connection, Hooks};
use crate::error::{Error, Result};
use crate::handshake::{compute_accept_key, protocol_tokens, split_header};
use crate::http::MAX_HTTP_LINE_LENGTH;
use crate::transport::Transport;

/// Send the upgrade request and validate the server's response. On any
/// failure, buffered input is discarded and the transport closed.
pub(crate) fn client_handshake<T: Transport, H: Hooks>(
    conn: &mut Connection<T, H>,
    host: &str,
) -> Result<()> {
    let path = conn.config().path.clone();
    let protocol = conn.config().protocol.clone();
    let nonce = conn.next_nonce();

    let mut request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Key: {nonce}\r\n\
         Sec-WebSocket-Version: 13\r\n"
    );
    if let Some(protocol) = &protocol {
        request.push_str(&format!("Sec-WebSocket-Protocol: {protocol}\r\n"));
    }
    request.push_str("\r\n");

    debug!(path = %path, host = %host, "sending upgrade request");
    conn.write_all(request.as_bytes())?;

    match read_response(conn, &nonce, protocol.as_deref()) {
        Ok(()) => {
            conn.set_open();
            debug!("handshake complete");
            Ok(())
        }
        Err(err) => {
            warn!(%err, "upgrade refused");
            conn.discard_incoming();
            conn.transport_mut().close();
            conn.set_closed();
            Err(err)
        }
    }
}

fn read_response<T: Transport, H: Hooks>(
    conn: &mut Connection<T, H>,
    nonce: &str,
    required_protocol: Option<&str>,
) -> Result<()> {
    let mut line_buf = [0u8; MAX_HTTP_LINE_LENGTH];

    {
        let status = conn.read_http_line(&mut line_buf)?;
        let mut parts = status.split(' ');
        if parts.next() != Some("HTTP/1.1") || parts.next() != Some("101") {
            return Err(Error::HandshakeFailed(format!(
                "unexpected status line: {status}"
            )));
        }
    }

    let mut connection_upgrade = false;
    let mut upgrade_websocket = false;
    let mut accept: Option<String> = None;
    let mut offered_protocol: Option<String> = None;

    loop {
        let line = conn.read_http_line(&mut line_buf)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = split_header(line)?;
        match name.as_str() {
            "connection" => connection_upgrade = value.eq_ignore_ascii_case("upgrade"),
            "upgrade" => upgrade_websocket = value.eq_ignore_ascii_case("websocket"),
            "sec-websocket-accept" => accept = Some(value),
            "sec-websocket-protocol" => offered_protocol = Some(value),
            _ => {}
        }
    }

    if !connection_upgrade {
        return Err(Error::HandshakeFailed(
            "missing or invalid Connection header".into(),
        ));
    }
    if !upgrade_websocket {
        return Err(Error::HandshakeFailed(
            "missing or invalid Upgrade header".into(),
        ));
    }

    // Byte-exact comparison against the key we actually sent.
    let expected = compute_accept_key(nonce);
    if accept.as_deref() != Some(expected.as_str()) {
        return Err(Error::HandshakeFailed(
            "Sec-WebSocket-Accept mismatch".into(),
        ));
    }

    if let Some(required) = required_protocol {
        let granted = offered_protocol
            .as_deref()
            .is_some_and(|value| protocol_tokens(value).any(|token| token == required));
        if !granted {
            return Err(Error::HandshakeFailed(format!(
                "server did not grant subprotocol {required}"
            )));
        }
    }

    Ok(())
}
