//! FSoE protocol core data types
//!
//! This crate provides basic data type definitions used by other FSoE crates.
//! FSoE users should not depend on this crate directly. Use the `fsoe::core` reexport instead.
#![no_std]

/// Maximum size in bytes of the application parameters transferred in Parameter state
pub const APPLICATION_PARAMETERS_MAX_SIZE: usize = 256;

/// Maximum size in bytes of the safe process data in either direction
pub const PROCESS_DATA_MAX_SIZE: usize = 126;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

/// FSoE connection state [ETG.5100 ch. 8.4.1.1, 8.5.1.1]
///
/// After power-on an endpoint is in Reset state. Process data is interchanged
/// only in Data state. Before Data state is entered, the master configures the
/// slave in the intermediate states Session, Connection and Parameter.
/// The master drives all forward transitions; both endpoints fall back to
/// Reset on any detected error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum State {
    /// Connection is reset
    Reset = 0,
    /// The session IDs are being transferred
    Session = 1,
    /// The connection ID is being transferred
    Connection = 2,
    /// The parameters are being transferred
    Parameter = 3,
    /// Process or fail-safe data is being transferred
    Data = 4,
}

/// Safety PDU command byte [ETG.5100 ch. 8.1.1]
///
/// The values are far apart in hamming distance so that a corrupted command
/// byte is unlikely to alias another valid command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Carries a reset reason code, forces both endpoints to Reset state
    Reset = 0x2A,
    /// Carries a session ID
    Session = 0x4E,
    /// Carries connection data (connection ID and slave address)
    Connection = 0x64,
    /// Carries the safety parameters (watchdog timeout, application parameters)
    Parameter = 0x52,
    /// Carries valid process data
    ProcessData = 0x36,
    /// Carries fail-safe (all zero) data
    FailSafeData = 0x2E,
}

impl Command {
    pub const fn try_from_u8(code: u8) -> Option<Command> {
        match code {
            0x2A => Some(Command::Reset),
            0x4E => Some(Command::Session),
            0x64 => Some(Command::Connection),
            0x52 => Some(Command::Parameter),
            0x36 => Some(Command::ProcessData),
            0x2E => Some(Command::FailSafeData),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }

    /// Whether this command carries Data-state payload
    pub const fn is_data(self) -> bool {
        matches!(self, Command::ProcessData | Command::FailSafeData)
    }
}

impl From<Command> for u8 {
    fn from(value: Command) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for Command {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

/// A non-zero 16 bit address uniquely identifying a master [ETG.5100 ch. 8.2.2.4]
///
/// No other master within the communication system may use the same value.
/// It is sent to the slave in Connection state and stamped into the trailing
/// two bytes of every safety PDU.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionId(u16);

impl ConnectionId {
    pub const fn new(value: u16) -> Option<Self> {
        if value != 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn into_u16(self) -> u16 {
        self.0
    }
}

impl From<ConnectionId> for u16 {
    fn from(value: ConnectionId) -> Self {
        value.into_u16()
    }
}

impl TryFrom<u16> for ConnectionId {
    type Error = InvalidValue;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// A 16 bit address uniquely identifying a slave [ETG.5100 ch. 8.2.2.4]
///
/// Master and slave must agree on this value at configuration time; the
/// master sends it in Connection state and the slave refuses the connection
/// on mismatch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveAddress(u16);

impl SlaveAddress {
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn into_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for SlaveAddress {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<SlaveAddress> for u16 {
    fn from(value: SlaveAddress) -> Self {
        value.into_u16()
    }
}

/// Size in bytes of the safe data in one direction
///
/// Only even values are allowed, except for 1, which is also allowed.
/// Maximum value is 126. See ETG.5100 ch. 4.1.2.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataSize(u8);

impl DataSize {
    pub const MAX: DataSize = DataSize(PROCESS_DATA_MAX_SIZE as u8);

    pub const fn new(value: usize) -> Option<Self> {
        if value == 1 || (value != 0 && value % 2 == 0 && value <= PROCESS_DATA_MAX_SIZE) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }

    /// Size in bytes of a safety PDU carrying this much safe data
    ///
    /// `MAX (3 + 2 * data_size, 6)`, see ETG.5100 ch. 8.1.1.
    pub const fn frame_size(&self) -> usize {
        if self.0 == 1 {
            6
        } else {
            3 + 2 * self.0 as usize
        }
    }

    /// Number of 16 bit data words (each followed by its CRC) in a safety PDU
    pub const fn word_count(&self) -> usize {
        if self.0 == 1 {
            1
        } else {
            self.0 as usize / 2
        }
    }
}

impl From<DataSize> for usize {
    fn from(value: DataSize) -> Self {
        value.as_usize()
    }
}

impl TryFrom<usize> for DataSize {
    type Error = InvalidValue;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// Reason code carried in a Reset frame [ETG.5100 ch. 8.3]
///
/// Values 0x80..=0xFF (and, so that every peer-sent byte stays representable,
/// any other value outside the named range) are device-specific application
/// parameter errors originating from the slave-side parameter verification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetReason {
    /// Reset requested locally by the application (or power-on)
    LocalReset,
    /// Command byte not valid in the current state
    InvalidCommand,
    /// Command byte is not a known command
    UnknownCommand,
    /// Connection ID differs from the established one
    InvalidConnectionId,
    /// CRC verification failed
    InvalidCrc,
    /// Watchdog timer expired while waiting for a frame
    WatchdogExpired,
    /// Slave address in the connection data does not match the slave
    InvalidAddress,
    /// Echoed handshake data does not match what was sent
    InvalidData,
    /// Watchdog size field in the parameter data is not 2
    InvalidCommParameterLength,
    /// Watchdog timeout value rejected
    InvalidCommParameter,
    /// Application parameter size does not match the slave's expectation
    InvalidUserParameterLength,
    /// Application parameter value rejected
    InvalidUserParameter,
    /// Device-specific application parameter error
    Device(u8),
}

impl ResetReason {
    pub const fn from_u8(code: u8) -> ResetReason {
        match code {
            0 => ResetReason::LocalReset,
            1 => ResetReason::InvalidCommand,
            2 => ResetReason::UnknownCommand,
            3 => ResetReason::InvalidConnectionId,
            4 => ResetReason::InvalidCrc,
            5 => ResetReason::WatchdogExpired,
            6 => ResetReason::InvalidAddress,
            7 => ResetReason::InvalidData,
            8 => ResetReason::InvalidCommParameterLength,
            9 => ResetReason::InvalidCommParameter,
            10 => ResetReason::InvalidUserParameterLength,
            11 => ResetReason::InvalidUserParameter,
            other => ResetReason::Device(other),
        }
    }

    pub const fn into_u8(self) -> u8 {
        match self {
            ResetReason::LocalReset => 0,
            ResetReason::InvalidCommand => 1,
            ResetReason::UnknownCommand => 2,
            ResetReason::InvalidConnectionId => 3,
            ResetReason::InvalidCrc => 4,
            ResetReason::WatchdogExpired => 5,
            ResetReason::InvalidAddress => 6,
            ResetReason::InvalidData => 7,
            ResetReason::InvalidCommParameterLength => 8,
            ResetReason::InvalidCommParameter => 9,
            ResetReason::InvalidUserParameterLength => 10,
            ResetReason::InvalidUserParameter => 11,
            ResetReason::Device(other) => other,
        }
    }
}

impl From<ResetReason> for u8 {
    fn from(value: ResetReason) -> Self {
        value.into_u8()
    }
}

impl From<u8> for ResetReason {
    fn from(value: u8) -> Self {
        Self::from_u8(value)
    }
}

/// Result of the slave-side parameter verification [ETG.5100 ch. 7.1]
///
/// Returned by `SlaveLink::verify_parameters` once all parameters have been
/// received from the master. Anything but `Ok` makes the slave refuse the
/// connection and send the corresponding reason code to the master.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParameterVerdict {
    /// All parameters are acceptable
    Ok,
    /// The watchdog timeout is outside the supported range
    BadTimeout,
    /// An application-specific parameter has the wrong value
    BadApplicationParameter,
    /// An application-specific parameter is invalid, with a device-specific
    /// code in the range 0x80..=0xFF
    Device(u8),
}

impl ParameterVerdict {
    /// The reset reason sent to the master, `None` when the parameters passed
    pub const fn reset_reason(self) -> Option<ResetReason> {
        match self {
            ParameterVerdict::Ok => None,
            ParameterVerdict::BadTimeout => Some(ResetReason::InvalidCommParameter),
            ParameterVerdict::BadApplicationParameter => Some(ResetReason::InvalidUserParameter),
            ParameterVerdict::Device(code) => Some(ResetReason::Device(code)),
        }
    }
}

/// Which endpoint initiated a connection reset
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetInitiator {
    ByMaster,
    BySlave,
}

/// A connection reset observed during a synchronisation cycle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetEvent {
    pub initiator: ResetInitiator,
    pub reason: ResetReason,
}

/// Status after one synchronisation cycle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncStatus {
    /// State of the endpoint after the cycle
    pub state: State,
    /// true when the last safe data received from the peer was valid process
    /// data. The caller-supplied receive buffer holds that data; it holds
    /// zeroes otherwise.
    pub is_process_data_received: bool,
    /// A connection reset detected during this cycle, if any
    pub reset_event: Option<ResetEvent>,
}

/// Rejected endpoint configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The watchdog timeout must be in 1..=65535 milliseconds
    ZeroWatchdogTimeout,
    /// The application parameters exceed `APPLICATION_PARAMETERS_MAX_SIZE`
    ApplicationParametersTooLong,
}

/// API misuse detected by a synchronisation call
///
/// The call reports the misuse without mutating any endpoint state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsageError {
    /// The outputs buffer does not match the configured outputs size
    OutputsLength,
    /// The inputs buffer does not match the configured inputs size
    InputsLength,
}
