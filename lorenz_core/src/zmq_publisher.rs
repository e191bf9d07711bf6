//! ZMQ Publisher - frame broadcast to external subscribers
//!
//! ZeroMQ PUB socket behind the `PublishSocket` contract:
//! - Bind once per Processor, `EADDRINUSE` surfaces as `AddressInUse`
//! - `DONTWAIT` sends; slow subscribers lose frames at the high-water mark
//! - Linger 0 so `close()` frees the port immediately

use lorenz_env::{PublishSocket, TransportError};

/// Default per-subscriber queue depth before frames are dropped.
pub const DEFAULT_SEND_HWM: i32 = 1000;

/// ZMQ-based frame publisher.
///
/// External subscribers connect with a SUB socket, subscribe to `""`, and
/// parse each message with a `FrameLayout` of the agreed dimension.
#[cfg(feature = "zmq")]
pub struct ZmqPublisher {
    context: zmq::Context,
    socket: Option<zmq::Socket>,
    send_hwm: i32,
}

#[cfg(feature = "zmq")]
impl ZmqPublisher {
    /// Creates an unbound publisher with its own ZMQ context.
    pub fn new() -> Self {
        Self::with_send_hwm(DEFAULT_SEND_HWM)
    }

    pub fn with_send_hwm(send_hwm: i32) -> Self {
        Self {
            context: zmq::Context::new(),
            socket: None,
            send_hwm,
        }
    }

    /// Endpoint actually bound (resolves wildcard ports).
    pub fn endpoint(&self) -> Option<String> {
        self.socket
            .as_ref()
            .and_then(|s| s.get_last_endpoint().ok())
            .and_then(|e| e.ok())
    }
}

#[cfg(feature = "zmq")]
impl Default for ZmqPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "zmq")]
impl PublishSocket for ZmqPublisher {
    fn bind(&mut self, address: &str) -> Result<(), TransportError> {
        if self.socket.is_some() {
            return Err(TransportError::bind(address, "publisher already bound"));
        }

        let socket = self.context.socket(zmq::PUB)
            .map_err(|e| TransportError::bind(address, e))?;
        socket.set_linger(0)
            .map_err(|e| TransportError::bind(address, e))?;
        socket.set_sndhwm(self.send_hwm)
            .map_err(|e| TransportError::bind(address, e))?;

        socket.bind(address).map_err(|e| match e {
            zmq::Error::EADDRINUSE => TransportError::AddressInUse(address.to_string()),
            other => TransportError::bind(address, other),
        })?;

        self.socket = Some(socket);
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotBound)?;
        match socket.send(payload, zmq::DONTWAIT) {
            Ok(()) => Ok(()),
            Err(zmq::Error::EAGAIN) => Ok(()),  // Dropped at the high-water mark
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }

    fn close(&mut self) {
        // Dropping the socket closes it; linger 0 releases the port at once
        self.socket.take();
    }

    fn is_bound(&self) -> bool {
        self.socket.is_some()
    }
}

// ============================================================================
// NON-ZMQ FALLBACK (when zmq feature is disabled)
// ============================================================================

/// Placeholder publisher when built without ZMQ. Every bind fails.
#[cfg(not(feature = "zmq"))]
#[derive(Default)]
pub struct ZmqPublisher;

#[cfg(not(feature = "zmq"))]
impl ZmqPublisher {
    pub fn new() -> Self {
        Self
    }

    pub fn endpoint(&self) -> Option<String> {
        None
    }
}

#[cfg(not(feature = "zmq"))]
impl PublishSocket for ZmqPublisher {
    fn bind(&mut self, address: &str) -> Result<(), TransportError> {
        Err(TransportError::bind(address, "built without the `zmq` feature"))
    }

    fn send(&mut self, _payload: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NotBound)
    }

    fn close(&mut self) {}

    fn is_bound(&self) -> bool {
        false
    }
}
