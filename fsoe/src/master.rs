//! FSoE master state machine
//!
//! An FSoE master handles the connection with a single FSoE slave. After
//! power-on it tries to establish the connection; once established, it
//! periodically sends outputs to the slave and the slave answers with its
//! inputs. Either direction carries valid process data only while the
//! respective sender considers operation safe; the default is fail-safe data
//! (all zeroes).
//!
//! ```text
//!     ----------            ---------
//!     |        |  outputs   |       |   Arrows denote
//!     | FSoE   | ---------> | FSoE  |   data flow
//!     | master |            | slave |
//!     |        | <--------- |       |
//!     ----------   inputs   ---------
//! ```
//!
//! Connection establishment walks the states Session (random session IDs),
//! Connection (connection ID and slave address) and Parameter (watchdog
//! timeout and application parameters) before reaching Data. The handshake
//! payloads are streamed one word per frame and acknowledged by echo; the
//! master validates every echo against what it sent. Any validation failure
//! or watchdog expiry resets the connection, sends the reason code to the
//! slave and starts over [ETG.5100 ch. 8.4].
//!
//! The master is advanced by one [`Master::sync_with_slave`] call per tick.
//! Call it at least twice per watchdog timeout.

use heapless::Vec;

use crate::channel::Channel;
use crate::codec;
use crate::core::{
    Command, ConfigError, ConnectionId, DataSize, ResetEvent, ResetInitiator, ResetReason,
    SlaveAddress, State, SyncStatus, UsageError, APPLICATION_PARAMETERS_MAX_SIZE,
    PROCESS_DATA_MAX_SIZE,
};
use crate::watchdog::Watchdog;
use fsoe_driver::link::Link;
use fsoe_driver::time::Duration;

/// Largest handshake payload: watchdog size, watchdog timeout, application
/// parameter size, application parameters.
pub(crate) const SAFE_PARA_MAX: usize = 6 + APPLICATION_PARAMETERS_MAX_SIZE;

/// Configuration of an FSoE master endpoint
///
/// See ETG.5100 ch. 8.2.2.4 (connection state) and ch. 8.2.2.5 (parameter
/// state) for the roles of the individual fields.
#[derive(Debug, Clone, Copy)]
pub struct MasterConfig<'a> {
    /// Address of the slave this master connects to; the slave refuses the
    /// connection unless it agrees
    pub slave_address: SlaveAddress,
    /// Identity of this master, stamped into every frame. No other master in
    /// the communication system may use the same value.
    pub connection_id: ConnectionId,
    /// Watchdog timeout in milliseconds (1..=65535), also sent to the slave
    /// in Parameter state
    pub watchdog_timeout_ms: u16,
    /// Device-specific parameters sent to the slave in Parameter state;
    /// may be empty
    pub application_parameters: &'a [u8],
    /// Size of the safe outputs sent to the slave
    pub outputs_size: DataSize,
    /// Size of the safe inputs received from the slave
    pub inputs_size: DataSize,
}

/// FSoE master endpoint
///
/// Multiple masters are supported, each with its own connection ID; instances
/// are fully independent and hold no shared state.
pub struct Master<L> {
    channel: Channel<L>,
    slave_address: SlaveAddress,
    connection_id: ConnectionId,
    outputs_size: DataSize,
    inputs_size: DataSize,
    safe_para: Vec<u8, SAFE_PARA_MAX>,

    state: State,
    watchdog: Watchdog,
    initial_reset_sent: bool,
    reset_request: bool,

    // rolling authentication variables [ETG.5100 table 32]
    local_seqno: u16,
    peer_seqno: u16,
    last_crc: u16,
    old_local_crc: u16,

    // handshake payload streaming
    stream: Vec<u8, SAFE_PARA_MAX>,
    stream_acked: usize,
    inflight: usize,
    awaiting: bool,
    slave_session_bytes: [u8; 2],
    slave_session: Option<u16>,

    // data exchange
    process_data_enabled: bool,
    data_command: Command,
    is_process_data_received: bool,
    safe_inputs: [u8; PROCESS_DATA_MAX_SIZE],
}

impl<L: Link> Master<L> {
    /// Creates a master endpoint over the given black channel.
    pub fn new(cfg: &MasterConfig, link: L) -> Result<Self, ConfigError> {
        if cfg.watchdog_timeout_ms == 0 {
            return Err(ConfigError::ZeroWatchdogTimeout);
        }
        if cfg.application_parameters.len() > APPLICATION_PARAMETERS_MAX_SIZE {
            return Err(ConfigError::ApplicationParametersTooLong);
        }

        let mut header = [0u8; 6];
        header[0..2].copy_from_slice(&2u16.to_le_bytes());
        header[2..4].copy_from_slice(&cfg.watchdog_timeout_ms.to_le_bytes());
        header[4..6].copy_from_slice(&(cfg.application_parameters.len() as u16).to_le_bytes());
        let mut safe_para = Vec::new();
        if safe_para.extend_from_slice(&header).is_err()
            || safe_para.extend_from_slice(cfg.application_parameters).is_err()
        {
            return Err(ConfigError::ApplicationParametersTooLong);
        }

        Ok(Self {
            channel: Channel::new(link, cfg.outputs_size, cfg.inputs_size),
            slave_address: cfg.slave_address,
            connection_id: cfg.connection_id,
            outputs_size: cfg.outputs_size,
            inputs_size: cfg.inputs_size,
            safe_para,
            state: State::Reset,
            watchdog: Watchdog::new(Duration::from_millis(cfg.watchdog_timeout_ms as u64)),
            initial_reset_sent: false,
            reset_request: false,
            local_seqno: 0,
            peer_seqno: 0,
            last_crc: 0,
            old_local_crc: 0,
            stream: Vec::new(),
            stream_acked: 0,
            inflight: 0,
            awaiting: false,
            slave_session_bytes: [0; 2],
            slave_session: None,
            process_data_enabled: false,
            data_command: Command::FailSafeData,
            is_process_data_received: false,
            safe_inputs: [0; PROCESS_DATA_MAX_SIZE],
        })
    }

    /// Current state of the master state machine
    pub fn state(&self) -> State {
        self.state
    }

    /// Time remaining until watchdog expiry in milliseconds, `u32::MAX` while
    /// the watchdog timer is not started
    pub fn time_until_timeout_ms(&self) -> u32 {
        self.watchdog.remaining_ms()
    }

    /// The slave's session ID for the current connection, known from
    /// Connection state onwards
    pub fn slave_session_id(&self) -> Option<u16> {
        self.slave_session
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
    /// [`Self::sync_with_slave`] call.
    pub fn reset_connection(&mut self) {
        self.reset_request = true;
    }

    /// Runs one cycle of the master state machine.
    ///
    /// Non-blocking. Sends at most one frame, receives at most one frame and
    /// evaluates the watchdog. `outputs` is sent to the slave when process
    /// data sending is enabled and the connection is established; `inputs` is
    /// filled with the slave's latest process data, or zeroes unless the
    /// returned status has `is_process_data_received` set.
    pub fn sync_with_slave(
        &mut self,
        outputs: &[u8],
        inputs: &mut [u8],
    ) -> Result<SyncStatus, UsageError> {
        if outputs.len() != self.outputs_size.as_usize() {
            return Err(UsageError::OutputsLength);
        }
        if inputs.len() != self.inputs_size.as_usize() {
            return Err(UsageError::InputsLength);
        }

        let mut event = None;

        if !self.initial_reset_sent {
            // power-on announcement: one Reset frame, watchdog not started
            self.send_reset_frame(ResetReason::LocalReset);
            self.initial_reset_sent = true;
        } else if core::mem::take(&mut self.reset_request) {
            self.enter_reset(ResetReason::LocalReset, ResetInitiator::ByMaster, &mut event);
        } else if self.watchdog.expired() {
            self.enter_reset(
                ResetReason::WatchdogExpired,
                ResetInitiator::ByMaster,
                &mut event,
            );
        } else {
            if self.channel.poll() {
                self.handle_frame(&mut event);
            }
            if event.is_none() {
                if self.state == State::Reset {
                    self.begin_session();
                } else if !self.awaiting {
                    self.transmit(outputs);
                }
            }
        }

        if self.is_process_data_received {
            inputs.copy_from_slice(&self.safe_inputs[..inputs.len()]);
        } else {
            inputs.fill(0);
        }

        Ok(SyncStatus {
            state: self.state,
            is_process_data_received: self.is_process_data_received,
            reset_event: event,
        })
    }

    /// Bytes of handshake payload carried per frame: one word, or a single
    /// byte when either direction cannot fit a word
    fn handshake_chunk(&self) -> usize {
        if self.outputs_size.as_usize() == 1 || self.inputs_size.as_usize() == 1 {
            1
        } else {
            2
        }
    }

    fn set_stream(&mut self, payload: &[u8]) {
        self.stream.clear();
        // capacity covers the largest state payload
        let _ = self.stream.extend_from_slice(payload);
        self.stream_acked = 0;
        self.inflight = 0;
        self.awaiting = false;
    }

    fn begin_session(&mut self) {
        let session_id = self.channel.generate_session_id();
        self.local_seqno = 0;
        self.peer_seqno = 0;
        self.last_crc = 0;
        self.old_local_crc = 0;
        self.slave_session_bytes = [0; 2];
        self.slave_session = None;
        self.set_stream(&session_id.to_le_bytes());
        self.state = State::Session;
        trace!("master: session state");
        self.send_stream_chunk();
    }

    fn transmit(&mut self, outputs: &[u8]) {
        match self.state {
            State::Session | State::Connection | State::Parameter => self.send_stream_chunk(),
            State::Data => self.send_data_frame(outputs),
            State::Reset => {}
        }
    }

    fn send_stream_chunk(&mut self) {
        let remaining = self.stream.len() - self.stream_acked;
        let n = remaining.min(self.handshake_chunk());
        self.inflight = n;

        let command = match self.state {
            State::Session => Command::Session,
            State::Connection => Command::Connection,
            _ => Command::Parameter,
        };
        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        data[..n].copy_from_slice(&self.stream[self.stream_acked..self.stream_acked + n]);
        let size = self.outputs_size.as_usize();
        self.send_frame(command, &data[..size]);
        self.awaiting = true;
    }

    fn send_data_frame(&mut self, outputs: &[u8]) {
        self.data_command = if self.process_data_enabled {
            Command::ProcessData
        } else {
            Command::FailSafeData
        };
        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        let size = self.outputs_size.as_usize();
        if self.data_command == Command::ProcessData {
            data[..size].copy_from_slice(outputs);
        }
        let command = self.data_command;
        self.send_frame(command, &data[..size]);
        self.awaiting = true;
    }

    fn send_frame(&mut self, command: Command, data: &[u8]) {
        let seqno = codec::next_seqno(self.local_seqno);
        let crc0 = codec::encode(
            self.channel.sent_frame_mut(),
            command,
            self.connection_id.into_u16(),
            seqno,
            data,
            self.last_crc,
        );
        self.local_seqno = seqno;
        self.old_local_crc = crc0;
        self.last_crc = crc0;
        self.channel.transmit();
        self.watchdog.arm();
    }

    fn send_reset_frame(&mut self, reason: ResetReason) {
        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        data[0] = reason.into_u8();
        let size = self.outputs_size.as_usize();
        codec::encode(
            self.channel.sent_frame_mut(),
            Command::Reset,
            self.connection_id.into_u16(),
            0,
            &data[..size],
            0,
        );
        self.channel.transmit();
    }

    fn handle_frame(&mut self, event: &mut Option<ResetEvent>) {
        if self.state == State::Reset {
            // nothing is expected here; a fresh session opens next
            return;
        }

        let frame = *self.channel.received_frame();
        let view = codec::decode(&frame);

        let Some(command) = Command::try_from_u8(view.raw_command()) else {
            self.enter_reset(ResetReason::UnknownCommand, ResetInitiator::ByMaster, event);
            return;
        };
        if command == Command::Reset {
            // the slave announced a reset; propagate its reason
            let reason = ResetReason::from_u8(view.data_byte(0));
            self.enter_reset(reason, ResetInitiator::BySlave, event);
            return;
        }
        if view.connection_id() != self.connection_id.into_u16() {
            self.enter_reset(
                ResetReason::InvalidConnectionId,
                ResetInitiator::ByMaster,
                event,
            );
            return;
        }
        let command_ok = match self.state {
            State::Session => command == Command::Session,
            State::Connection => command == Command::Connection,
            State::Parameter => command == Command::Parameter,
            State::Data => command.is_data(),
            State::Reset => false,
        };
        if !command_ok {
            self.enter_reset(ResetReason::InvalidCommand, ResetInitiator::ByMaster, event);
            return;
        }
        let seqno = codec::next_seqno(self.peer_seqno);
        let Some(crc0) = codec::check_crcs(&view, self.old_local_crc, seqno) else {
            self.enter_reset(ResetReason::InvalidCrc, ResetInitiator::ByMaster, event);
            return;
        };
        self.peer_seqno = seqno;
        self.last_crc = crc0;

        let mut data = [0u8; PROCESS_DATA_MAX_SIZE];
        let size = self.inputs_size.as_usize();
        view.copy_data(&mut data[..size]);

        match self.state {
            State::Session => {
                // the response carries the slave's session ID, not an echo
                let n = self.inflight;
                self.slave_session_bytes[self.stream_acked..self.stream_acked + n]
                    .copy_from_slice(&data[..n]);
                self.stream_acked += n;
                self.awaiting = false;
                if self.stream_acked == self.stream.len() {
                    self.slave_session = Some(u16::from_le_bytes(self.slave_session_bytes));
                    let mut conn_data = [0u8; 4];
                    conn_data[..2].copy_from_slice(&self.connection_id.into_u16().to_le_bytes());
                    conn_data[2..].copy_from_slice(&self.slave_address.into_u16().to_le_bytes());
                    self.set_stream(&conn_data);
                    self.state = State::Connection;
                    trace!("master: connection state");
                }
            }
            State::Connection | State::Parameter => {
                let n = self.inflight;
                if data[..n] != self.stream[self.stream_acked..self.stream_acked + n] {
                    self.enter_reset(ResetReason::InvalidData, ResetInitiator::ByMaster, event);
                    return;
                }
                self.stream_acked += n;
                self.awaiting = false;
                if self.stream_acked == self.stream.len() {
                    if self.state == State::Connection {
                        let safe_para = self.safe_para.clone();
                        self.set_stream(&safe_para);
                        self.state = State::Parameter;
                        trace!("master: parameter state");
                    } else {
                        self.state = State::Data;
                        trace!("master: data state");
                    }
                }
            }
            State::Data => {
                if command == Command::ProcessData {
                    self.safe_inputs[..size].copy_from_slice(&data[..size]);
                    self.is_process_data_received = true;
                } else {
                    self.safe_inputs = [0; PROCESS_DATA_MAX_SIZE];
                    self.is_process_data_received = false;
                }
                self.awaiting = false;
            }
            State::Reset => {}
        }
    }

    fn enter_reset(
        &mut self,
        reason: ResetReason,
        initiator: ResetInitiator,
        event: &mut Option<ResetEvent>,
    ) {
        warn!("master: connection reset, reason {}", reason.into_u8());
        self.send_reset_frame(reason);
        self.watchdog.disarm();
        self.state = State::Reset;
        self.stream.clear();
        self.stream_acked = 0;
        self.inflight = 0;
        self.awaiting = false;
        self.slave_session = None;
        self.process_data_enabled = false;
        self.is_process_data_received = false;
        self.safe_inputs = [0; PROCESS_DATA_MAX_SIZE];
        *event = Some(ResetEvent { initiator, reason });
    }
}
