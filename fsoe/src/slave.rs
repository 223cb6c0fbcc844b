//! FSoE slave state machine
//!
//! An FSoE slave handles the connection with a single FSoE master. It is the
//! responder: apart from falling back to Reset on a detected error it never
//! changes state on its own, it follows the master's commands. After power-on
//! it listens for a Session frame; during establishment it validates what the
//! master sends and echoes it back; in Data state it answers every received
//! outputs frame with its own inputs frame [ETG.5100 ch. 8.5].
//!
//! Beyond the checks both endpoints share, the slave enforces its own
//! identity and parameter rules: the slave address carried in the connection
//! data must match its configuration, the communication parameters must be
//! well-formed, and the application parameters must pass the platform's
//! [`verify_parameters`](fsoe_driver::link::SlaveLink::verify_parameters)
//! callback. A refusal is reported to the master as the matching reason code.
//!
//! The slave is advanced by one [`Slave::sync_with_master`] call per tick.
//! Call it at least twice per watchdog timeout.

use heapless::Vec;

use crate::channel::Channel;
use crate::codec;
use crate::core::{
    Command, ConfigError, DataSize, ResetEvent, ResetInitiator, ResetReason, SlaveAddress, State,
    SyncStatus, UsageError, APPLICATION_PARAMETERS_MAX_SIZE, PROCESS_DATA_MAX_SIZE,
};
use crate::master::SAFE_PARA_MAX;
use crate::watchdog::Watchdog;
use fsoe_driver::link::SlaveLink;
use fsoe_driver::time::Duration;

/// Configuration of an FSoE slave endpoint
#[derive(Debug, Clone, Copy)]
pub struct SlaveConfig {
    /// Address of this slave; the connection is refused unless the master
    /// sends the same value
    pub slave_address: SlaveAddress,
    /// Expected size in bytes of the application parameters; a parameter
    /// transfer of any other size is refused
    pub application_parameters_size: usize,
    /// Size of the safe inputs sent to the master
    pub inputs_size: DataSize,
    /// Size of the safe outputs received from the master
    pub outputs_size: DataSize,
}

/// FSoE slave endpoint
///
/// Multiple slaves are supported, each with its own slave address; instances
/// are fully independent and hold no shared state.
pub struct Slave<L> {
    channel: Channel<L>,
    slave_address: SlaveAddress,
    inputs_size: DataSize,
    outputs_size: DataSize,
    expected_para_len: usize,

    state: State,
    watchdog: Watchdog,
    /// Learned from the parameter data; 0 while unknown, and the watchdog is
    /// only armed once it is known
    watchdog_timeout_ms: u16,
    reset_request: bool,

    /// Connection ID adopted from the session-opening frame; 0 while none
    connection_id: u16,

    // rolling authentication variables [ETG.5100 table 32]
    local_seqno: u16,
    peer_seqno: u16,
    last_crc: u16,
    old_local_crc: u16,

    // handshake bookkeeping
    session_id: u16,
    session_sent: usize,
    master_session_got: usize,
    collected: Vec<u8, SAFE_PARA_MAX>,
    expected_len: usize,
    parameters_verified: bool,

    // data exchange
    process_data_enabled: bool,
    data_command: Command,
    is_process_data_received: bool,
    safe_outputs: [u8; PROCESS_DATA_MAX_SIZE],
}

impl<L: SlaveLink> Slave<L> {
    /// Creates a slave endpoint over the given black channel.
    pub fn new(cfg: &SlaveConfig, link: L) -> Result<Self, ConfigError> {
        if cfg.application_parameters_size > APPLICATION_PARAMETERS_MAX_SIZE {
            return Err(ConfigError::ApplicationParametersTooLong);
        }

        Ok(Self {
            channel: Channel::new(link, cfg.inputs_size, cfg.outputs_size),
            slave_address: cfg.slave_address,
            inputs_size: cfg.inputs_size,
            outputs_size: cfg.outputs_size,
            expected_para_len: 6 + cfg.application_parameters_size,
            state: State::Reset,
            watchdog: Watchdog::new(Duration::from_millis(0)),
            watchdog_timeout_ms: 0,
            reset_request: false,
            connection_id: 0,
            local_seqno: 0,
            peer_seqno: 0,
            last_crc: 0,
            old_local_crc: 0,
            session_id: 0,
            session_sent: 0,
            master_session_got: 0,
            collected: Vec::new(),
            expected_len: 0,
            parameters_verified: false,
            process_data_enabled: false,
            data_command: Command::FailSafeData,
            is_process_data_received: false,
            safe_outputs: [0; PROCESS_DATA_MAX_SIZE],
        })
    }

    /// Current state of the slave state machine
    pub fn state(&self) -> State {
        self.state
    }

    /// Time remaining until watchdog expiry in milliseconds, `u32::MAX` while
    /// the watchdog timer is not started
    pub fn time_until_timeout_ms(&self) -> u32 {
        self.watchdog.remaining_ms()
    }

    /// Whether the application currently allows valid process data to be sent
    pub fn is_sending_process_data_enabled(&self) -> bool {
        self.process_data_enabled
    }

    /// Allows valid process data to be sent once (and while) the connection
    /// is in Data state. Cleared again by any connection reset.
    pub fn enable_sending_process_data(&mut self) {
        self.process_data_enabled = true;
    }

    /// Only fail-safe data (zeroes) will be sent from the next cycle on. This
    /// is the default after power-on and after any connection reset.
    pub fn disable_sending_process_data(&mut self) {
        self.process_data_enabled = false;
    }

    /// Requests a connection reset; it is performed by the next
    /// [`Self::sync_with_master`] call.
    pub fn reset_connection(&mut self) {
        self.reset_request = true;
    }

    /// Runs one cycle of the slave state machine.
    ///
    /// Non-blocking. Receives at most one frame and answers it, and evaluates
    /// the watchdog. `inputs` is sent to the master when process data sending
    /// is enabled and the connection is established; `outputs` is filled with
    /// the master's latest process data, or zeroes unless the returned status
    /// has `is_process_data_received` set.
    pub fn sync_with_master(
        &mut self,
        inputs: &[u8],
        outputs: &mut [u8],
    ) -> Result<SyncStatus, UsageError> {
        if inputs.len() != self.inputs_size.as_usize() {
            return Err(UsageError::InputsLength);
        }
        if outputs.len() != self.outputs_size.as_usize() {
            return Err(UsageError::OutputsLength);
        }

        let mut event = None;

        if core::mem::take(&mut self.reset_request) {
            self.reset_local(ResetReason::LocalReset, &mut event);
        } else if self.watchdog.expired() {
            self.reset_local(ResetReason::WatchdogExpired, &mut event);
        } else if self.channel.poll() {
            self.handle_frame(inputs, &mut event);
        }

        if self.is_process_data_received {
            outputs.copy_from_slice(&self.safe_outputs[..outputs.len()]);
        } else {
            outputs.fill(0);
        }

        Ok(SyncStatus {
            state: self.state,
            is_process_data_received: self.is_process_data_received,
            reset_event: event,
        })
    }

    fn handshake_chunk(&self) -> usize {
        if self.outputs_size.as_usize() == 1 || self.inputs_size.as_usize() == 1 {
            1
        } else {
            2
        }
    }

    fn session_complete(&self) -> bool {
        self.session_sent == 2 && self.master_session_got == 2
    }

    fn handle_frame(&mut self, inputs: &[u8], event: &mut Option<ResetEvent>) {
        let frame = *self.channel.received_frame();
        let view = codec::decode(&frame);

        let Some(command) = Command::try_from_u8(view.raw_command()) else {
            self.reset_local(ResetReason::UnknownCommand, event);
            return;
        };
        if command == Command::Reset {
            if self.state == State::Reset {
                // already there, do not answer (avoids reset ping-pong)
                return;
            }
            let reason = ResetReason::from_u8(view.data_byte(0));
            self.reset_by_master(reason, event);
            return;
        }
        if self.state == State::Reset {
            if command != Command::Session {
                // tell a master that lost us to start over
                self.reset_local(ResetReason::InvalidCommand, event);
                return;
            }
            self.open_session(&view, event);
            return;
        }
        if view.connection_id() != self.connection_id {
            self.reset_local(ResetReason::InvalidConnectionId, event);
            return;
        }
        let command_ok = match (self.state, command) {
            (State::Session, Command::Session) => self.master_session_got < 2,
            (State::Session, Command::Connection) => self.session_complete(),
            (State::Connection, Command::Connection) => self.collected.len() < self.expected_len,
            (State::Connection, Command::Parameter) => self.collected.len() == self.expected_len,
            (State::Parameter, Command::Parameter) => self.collected.len() < self.expected_len,
            (State::Parameter, command) => {
                command.is_data()
                    && self.collected.len() == self.expected_len
                    && self.parameters_verified
            }
            (State::Data, command) => command.is_data(),
            _ => false,
        };
        if !command_ok {
            self.reset_local(ResetReason::InvalidCommand, event);
            return;
        }
        let seqno = codec::next_seqno(self.peer_seqno);
        let Some(crc0) = codec::check_crcs(&view, self.old_local_crc, seqno) else {
            self.reset_local(ResetReason::InvalidCrc, event);
            return;
        };
        self.peer_seqno = seqno;
        self.last_crc = crc0;

        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        let size = self.outputs_size.as_usize();
        view.copy_data(&mut data[..size]);

        match command {
            Command::Session => {
                let n = (2 - self.master_session_got).min(self.handshake_chunk());
                self.master_session_got += n;
                self.respond_session_chunk();
            }
            Command::Connection | Command::Parameter => {
                if self.state == State::Session {
                    self.state = State::Connection;
                    trace!("slave: connection state");
                    self.collected.clear();
                    self.expected_len = 4;
                } else if self.state == State::Connection && command == Command::Parameter {
                    self.state = State::Parameter;
                    trace!("slave: parameter state");
                    self.collected.clear();
                    self.expected_len = self.expected_para_len;
                }
                let n = (self.expected_len - self.collected.len()).min(self.handshake_chunk());
                // capacity covers the largest state payload
                let _ = self.collected.extend_from_slice(&data[..n]);
                if self.collected.len() == self.expected_len && !self.validate_collected(event) {
                    return;
                }
                self.respond_echo(command, &data[..n]);
            }
            Command::ProcessData | Command::FailSafeData => {
                if self.state != State::Data {
                    self.state = State::Data;
                    trace!("slave: data state");
                }
                if command == Command::ProcessData {
                    self.safe_outputs[..size].copy_from_slice(&data[..size]);
                    self.is_process_data_received = true;
                } else {
                    self.safe_outputs = [0; PROCESS_DATA_MAX_SIZE];
                    self.is_process_data_received = false;
                }
                self.respond_data_frame(inputs);
            }
            Command::Reset => {}
        }
    }

    /// Handles the session-opening frame received in Reset state.
    fn open_session(&mut self, view: &codec::FrameView, event: &mut Option<ResetEvent>) {
        let connection_id = view.connection_id();
        if connection_id == 0 {
            self.reset_local(ResetReason::InvalidConnectionId, event);
            return;
        }
        // fresh CRC chain: zero seed, first sequence number of the session
        let Some(crc0) = codec::check_crcs(view, 0, codec::next_seqno(0)) else {
            self.reset_local(ResetReason::InvalidCrc, event);
            return;
        };

        self.connection_id = connection_id;
        self.local_seqno = 0;
        self.peer_seqno = codec::next_seqno(0);
        self.last_crc = crc0;
        self.old_local_crc = 0;
        self.session_id = self.channel.generate_session_id();
        self.session_sent = 0;
        self.master_session_got = 0;
        self.collected.clear();
        self.expected_len = 0;
        self.parameters_verified = false;
        self.state = State::Session;
        trace!("slave: session state");

        self.master_session_got = 2usize.min(self.handshake_chunk());
        self.respond_session_chunk();
    }

    fn respond_session_chunk(&mut self) {
        let n = (2 - self.session_sent).min(self.handshake_chunk());
        let session_bytes = self.session_id.to_le_bytes();
        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        data[..n].copy_from_slice(&session_bytes[self.session_sent..self.session_sent + n]);
        self.session_sent += n;
        let size = self.inputs_size.as_usize();
        self.send_frame(Command::Session, &data[..size]);
    }

    fn respond_echo(&mut self, command: Command, chunk: &[u8]) {
        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        data[..chunk.len()].copy_from_slice(chunk);
        let size = self.inputs_size.as_usize();
        self.send_frame(command, &data[..size]);
    }

    fn respond_data_frame(&mut self, inputs: &[u8]) {
        self.data_command = if self.process_data_enabled {
            Command::ProcessData
        } else {
            Command::FailSafeData
        };
        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        let size = self.inputs_size.as_usize();
        if self.data_command == Command::ProcessData {
            data[..size].copy_from_slice(inputs);
        }
        let command = self.data_command;
        self.send_frame(command, &data[..size]);
    }

    /// Validates a completed ConnData or SafePara payload. On refusal the
    /// connection is reset with the matching reason instead of acknowledging
    /// the final chunk.
    fn validate_collected(&mut self, event: &mut Option<ResetEvent>) -> bool {
        if self.state == State::Connection {
            let connection_id = u16::from_le_bytes([self.collected[0], self.collected[1]]);
            let slave_address = u16::from_le_bytes([self.collected[2], self.collected[3]]);
            if connection_id != self.connection_id {
                self.reset_local(ResetReason::InvalidData, event);
                return false;
            }
            if slave_address != self.slave_address.into_u16() {
                self.reset_local(ResetReason::InvalidAddress, event);
                return false;
            }
            return true;
        }

        let watchdog_size = u16::from_le_bytes([self.collected[0], self.collected[1]]);
        if watchdog_size != 2 {
            self.reset_local(ResetReason::InvalidCommParameterLength, event);
            return false;
        }
        let timeout_ms = u16::from_le_bytes([self.collected[2], self.collected[3]]);
        if timeout_ms == 0 {
            self.reset_local(ResetReason::InvalidCommParameter, event);
            return false;
        }
        let app_len = u16::from_le_bytes([self.collected[4], self.collected[5]]) as usize;
        if app_len != self.expected_para_len - 6 {
            self.reset_local(ResetReason::InvalidUserParameterLength, event);
            return false;
        }
        let verdict = self
            .channel
            .link_mut()
            .verify_parameters(timeout_ms, &self.collected[6..]);
        if let Some(reason) = verdict.reset_reason() {
            self.reset_local(reason, event);
            return false;
        }
        self.watchdog_timeout_ms = timeout_ms;
        self.watchdog
            .set_timeout(Duration::from_millis(timeout_ms as u64));
        self.parameters_verified = true;
        true
    }

    fn send_frame(&mut self, command: Command, data: &[u8]) {
        let seqno = codec::next_seqno(self.local_seqno);
        let crc0 = codec::encode(
            self.channel.sent_frame_mut(),
            command,
            self.connection_id,
            seqno,
            data,
            self.last_crc,
        );
        self.local_seqno = seqno;
        self.old_local_crc = crc0;
        self.last_crc = crc0;
        self.channel.transmit();
        // the timeout is only known once the parameter transfer completed
        if self.watchdog_timeout_ms != 0 {
            self.watchdog.arm();
        }
    }

    fn send_reset_frame(&mut self, reason: ResetReason) {
        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        data[0] = reason.into_u8();
        let size = self.inputs_size.as_usize();
        codec::encode(
            self.channel.sent_frame_mut(),
            Command::Reset,
            self.connection_id,
            0,
            &data[..size],
            0,
        );
        self.channel.transmit();
    }

    /// Reset detected locally: announce it to the master, then fall back.
    fn reset_local(&mut self, reason: ResetReason, event: &mut Option<ResetEvent>) {
        warn!("slave: connection reset, reason {}", reason.into_u8());
        self.send_reset_frame(reason);
        self.fall_back_to_reset();
        *event = Some(ResetEvent {
            initiator: ResetInitiator::BySlave,
            reason,
        });
    }

    /// Reset commanded by the master: fall back without answering.
    fn reset_by_master(&mut self, reason: ResetReason, event: &mut Option<ResetEvent>) {
        warn!("slave: reset by master, reason {}", reason.into_u8());
        self.fall_back_to_reset();
        *event = Some(ResetEvent {
            initiator: ResetInitiator::ByMaster,
            reason,
        });
    }

    fn fall_back_to_reset(&mut self) {
        self.watchdog.disarm();
        self.watchdog_timeout_ms = 0;
        self.state = State::Reset;
        self.connection_id = 0;
        self.session_sent = 0;
        self.master_session_got = 0;
        self.collected.clear();
        self.expected_len = 0;
        self.parameters_verified = false;
        self.process_data_enabled = false;
        self.is_process_data_received = false;
        self.safe_outputs = [0; PROCESS_DATA_MAX_SIZE];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ParameterVerdict, UsageError};
    use fsoe_driver::link::Link;

    struct NullLink;

    impl Link for NullLink {
        fn send(&mut self, _frame: &[u8]) {}

        fn recv(&mut self, _frame: &mut [u8]) -> usize {
            0
        }

        fn generate_session_id(&mut self) -> u16 {
            0xBEEF
        }
    }

    impl SlaveLink for NullLink {
        fn verify_parameters(
            &mut self,
            _watchdog_timeout_ms: u16,
            _app_parameters: &[u8],
        ) -> ParameterVerdict {
            ParameterVerdict::Ok
        }
    }

    fn config() -> SlaveConfig {
        SlaveConfig {
            slave_address: SlaveAddress::new(0x0304),
            application_parameters_size: 0,
            inputs_size: DataSize::new(2).unwrap(),
            outputs_size: DataSize::new(2).unwrap(),
        }
    }

    #[test]
    fn test_rejects_oversized_expected_parameters() {
        let mut cfg = config();
        cfg.application_parameters_size = APPLICATION_PARAMETERS_MAX_SIZE + 1;
        assert!(matches!(
            Slave::new(&cfg, NullLink),
            Err(ConfigError::ApplicationParametersTooLong)
        ));
    }

    #[test]
    fn test_buffer_length_misuse_reported_without_state_change() {
        let mut slave = Slave::new(&config(), NullLink).unwrap();
        let mut outputs = [0u8; 2];

        assert_eq!(
            slave.sync_with_master(&[0; 1], &mut outputs),
            Err(UsageError::InputsLength)
        );
        assert_eq!(
            slave.sync_with_master(&[0; 2], &mut [0u8; 3]),
            Err(UsageError::OutputsLength)
        );
        assert_eq!(slave.state(), State::Reset);

        // a correct call runs a cycle; with a silent master nothing changes
        let status = slave.sync_with_master(&[0; 2], &mut outputs).unwrap();
        assert_eq!(status.state, State::Reset);
        assert_eq!(status.reset_event, None);
        assert_eq!(slave.time_until_timeout_ms(), u32::MAX);
    }
}
