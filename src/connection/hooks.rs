//! Host policy hooks.

/// Upper-layer policy for a connection.
///
/// Every method has a permissive default, so most embedders pass
/// [`DefaultHooks`]. Servers override `check_url`/`check_header` to gate
/// the upgrade; either role can override `on_pong` to observe keepalive
/// responses.
pub trait Hooks {
    /// Accept or reject the request target of an inbound upgrade. A
    /// rejection answers `404 Not Found`.
    fn check_url(&mut self, _url: &str) -> bool {
        true
    }

    /// Per-header policy check during the inbound upgrade. `name` is
    /// lowercased, `value` is trimmed. A rejection answers
    /// `400 Bad request`.
    fn check_header(&mut self, _name: &str, _value: &str) -> bool {
        true
    }

    /// Called with the payload of every PONG frame received.
    fn on_pong(&mut self, _payload: &[u8]) {}
}

/// Accept-everything, observe-nothing hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl Hooks for DefaultHooks {}
