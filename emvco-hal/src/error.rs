// emvco-hal-rs/emvco-hal/src/error.rs

use std::fmt;

use thiserror::Error;

/// Common error type
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied argument is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The channel is not open.
    #[error("not initialized")]
    NotInitialized,

    /// The channel or framer is already running.
    #[error("already initialized")]
    AlreadyInitialized,

    /// The controller or build lacks the requested feature.
    #[error("feature not supported")]
    FeatureNotSupported,

    /// Another operation holds the window or the transition lock.
    #[error("busy: {0}")]
    Busy(String),

    /// No response or notification arrived in time.
    #[error("response timeout")]
    Timeout,

    /// The link refused an open, read or write.
    #[error("link error: {0}")]
    Link(String),

    /// OS-level I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame or payload length disagrees with the header.
    #[error("invalid packet length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Length the header or caller requires.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Malformed wire data.
    #[error("frame format error: {0}")]
    FrameFormat(String),

    /// A response arrived for a different opcode.
    #[error("unexpected response: expected {expected:#06x}, got {actual:#06x}")]
    UnexpectedResponse {
        /// Opcode of the command sent.
        expected: u16,
        /// Opcode that answered.
        actual: u16,
    },

    /// The controller answered with a non-OK status byte.
    #[error("controller status {0:#04x}")]
    ControllerStatus(u8),

    /// A segmented message outgrew the reassembly buffer.
    #[error("reassembly overflow: {needed} bytes exceeds capacity {capacity}")]
    ReassemblyOverflow {
        /// Bytes the message would have needed so far.
        needed: usize,
        /// Buffer capacity.
        capacity: usize,
    },

    /// The operation is illegal in the current state.
    #[error("invalid state: {0}")]
    State(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Status taxonomy reported across the control-plane boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation completed.
    Success,
    /// Bad argument.
    InvalidParameter,
    /// Channel not open.
    NotInitialized,
    /// Channel already open.
    AlreadyInitialized,
    /// Unsupported by controller or build.
    FeatureNotSupported,
    /// Resource held by another operation.
    Busy,
    /// No answer within the configured timeout.
    Timeout,
    /// Physical link failure.
    LinkError,
    /// Wire format or controller status error.
    ProtocolError,
    /// Rejected by a state machine.
    StateError,
}

impl Error {
    /// Map the error onto the control-plane status taxonomy.
    pub fn status(&self) -> Status {
        match self {
            Error::InvalidParameter(_) => Status::InvalidParameter,
            Error::NotInitialized => Status::NotInitialized,
            Error::AlreadyInitialized => Status::AlreadyInitialized,
            Error::FeatureNotSupported => Status::FeatureNotSupported,
            Error::Busy(_) => Status::Busy,
            Error::Timeout => Status::Timeout,
            Error::Link(_) | Error::Io(_) => Status::LinkError,
            Error::InvalidLength { .. }
            | Error::FrameFormat(_)
            | Error::UnexpectedResponse { .. }
            | Error::ControllerStatus(_)
            | Error::ReassemblyOverflow { .. } => Status::ProtocolError,
            Error::State(_) => Status::StateError,
        }
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }
}

impl Status {
    /// Collapse a result into its status code.
    pub fn of<T>(result: &Result<T>) -> Status {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }

    /// True for [`Status::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Success => "SUCCESS",
            Status::InvalidParameter => "INVALID_PARAMETER",
            Status::NotInitialized => "NOT_INITIALIZED",
            Status::AlreadyInitialized => "ALREADY_INITIALIZED",
            Status::FeatureNotSupported => "FEATURE_NOT_SUPPORTED",
            Status::Busy => "BUSY",
            Status::Timeout => "RESPONSE_TIMEOUT",
            Status::LinkError => "LINK_ERROR",
            Status::ProtocolError => "PROTOCOL_ERROR",
            Status::StateError => "STATE_ERROR",
        };
        f.write_str(s)
    }
}
