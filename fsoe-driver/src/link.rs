//! Black channel and platform services consumed by the FSoE stack

use fsoe_core::ParameterVerdict;

/// Black-channel access for one FSoE endpoint
///
/// A safety PDU starts with the command byte and ends with the connection ID.
/// Its size is `MAX (3 + 2 * data_size, 6)` bytes and is constant per
/// direction, see [ETG.5100 ch. 8.1.1].
///
/// The stack calls into the link once per synchronisation cycle at most for
/// each direction. Both channel methods must be non-blocking; the endpoint is
/// driven cooperatively and never waits inside a call.
pub trait Link {
    /// Makes an attempt to send one complete safety PDU.
    ///
    /// Best effort: the stack ignores whether transmission succeeded. A lost
    /// frame surfaces as a watchdog expiry on whichever endpoint stops
    /// hearing the other.
    fn send(&mut self, frame: &[u8]);

    /// Tries to receive one complete safety PDU into `frame`.
    ///
    /// Returns the number of bytes received: `frame.len()` when a frame is
    /// present, `0` when none is. Returning `frame.len()` with the previously
    /// delivered frame still in the buffer is allowed (an EtherCAT process
    /// data image behaves exactly like that); the stack detects and discards
    /// re-deliveries.
    fn recv(&mut self, frame: &mut [u8]) -> usize;

    /// Generates a random 16 bit session ID [ETG.5100 ch. 8.1.3.7].
    ///
    /// Called at every connection establishment. The value distribution must
    /// be wide enough that restarts of the device produce different IDs with
    /// high probability; a pseudo-random generator with a fixed seed is not
    /// sufficient, since the session IDs are all that binds a connection to
    /// one particular power-up.
    fn generate_session_id(&mut self) -> u16;
}

/// Additional platform services required by a slave endpoint
pub trait SlaveLink: Link {
    /// Verifies the parameter set received from the master [ETG.5100 ch. 7.1].
    ///
    /// Called once per connection establishment, after the complete parameter
    /// transfer. `app_parameters` is the application-specific blob; its length
    /// always equals the configured expected size. Returning anything but
    /// [`ParameterVerdict::Ok`] makes the slave refuse the connection and
    /// report the corresponding reason code to the master.
    fn verify_parameters(&mut self, watchdog_timeout_ms: u16, app_parameters: &[u8])
        -> ParameterVerdict;
}
