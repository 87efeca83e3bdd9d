//! Unified error types for rtmp-wire

use std::fmt;
use std::io;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all encoding operations
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying transport
    Io(io::Error),
    /// AMF encoding error
    Amf(AmfError),
    /// RTMP protocol violation
    Protocol(ProtocolError),
    /// Sync/buffered sink operation mismatch
    InvalidMode {
        /// The operation that was attempted
        operation: &'static str,
    },
    /// The outgoing queue's consumer is gone
    ConnectionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Amf(e) => write!(f, "AMF error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::InvalidMode { operation } => {
                write!(f, "Sink mode mismatch for operation: {}", operation)
            }
            Error::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<AmfError> for Error {
    fn from(err: AmfError) -> Self {
        Error::Amf(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

/// AMF encoding errors
#[derive(Debug)]
pub enum AmfError {
    /// A required argument was null or out of range
    InvalidArgument(String),
    /// UTF-8 byte length exceeds the 16-bit length prefix
    StringTooLong(usize),
    /// No class description for a named type under the Exception fallback,
    /// or a class flagged externalizable/dynamic lacks the required shape
    MissingClassDescription(String),
    /// A value's class is flagged externalizable but the value cannot
    /// emit its own body
    NotExternalizable(String),
    /// Object/array nesting exceeded the recursion limit
    NestingTooDeep,
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            AmfError::StringTooLong(len) => {
                write!(f, "String of {} bytes exceeds 16-bit length prefix", len)
            }
            AmfError::MissingClassDescription(name) => {
                write!(f, "No class description for type: {}", name)
            }
            AmfError::NotExternalizable(name) => {
                write!(f, "Type {} is flagged externalizable but cannot emit itself", name)
            }
            AmfError::NestingTooDeep => write!(f, "AMF nesting too deep"),
        }
    }
}

impl std::error::Error for AmfError {}

/// Protocol-level errors
#[derive(Debug)]
pub enum ProtocolError {
    /// The chunk writer received a message type it cannot serialize
    UnknownMessageType(u8),
    /// Message payload exceeds the 24-bit length field
    MessageTooLarge { size: usize, max: usize },
    /// Chunk stream id outside the encodable range
    InvalidChunkStreamId(u32),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownMessageType(t) => write!(f, "Unknown message type: {}", t),
            ProtocolError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max {})", size, max)
            }
            ProtocolError::InvalidChunkStreamId(id) => {
                write!(f, "Invalid chunk stream ID: {}", id)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::io;

    #[test]
    fn test_error_display() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error"));

        let err = Error::Amf(AmfError::StringTooLong(70000));
        assert!(err.to_string().contains("AMF error"));
        assert!(err.to_string().contains("70000"));

        let err = Error::Protocol(ProtocolError::UnknownMessageType(99));
        assert!(err.to_string().contains("Protocol error"));
        assert!(err.to_string().contains("99"));

        let err = Error::InvalidMode { operation: "take" };
        assert!(err.to_string().contains("take"));

        let err = Error::ConnectionClosed;
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_error_source() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = Error::Io(io_err);
        assert!(StdError::source(&err).is_some());

        let err = Error::Amf(AmfError::NestingTooDeep);
        assert!(StdError::source(&err).is_none());
    }

    #[test]
    fn test_from_conversions() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "timeout").into();
        assert!(matches!(err, Error::Io(_)));

        let err: Error = AmfError::InvalidArgument("null value".into()).into();
        assert!(matches!(err, Error::Amf(_)));

        let err: Error = ProtocolError::MessageTooLarge { size: 100, max: 50 }.into();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_amf_error_display() {
        assert!(AmfError::InvalidArgument("bad".into())
            .to_string()
            .contains("bad"));
        assert!(AmfError::MissingClassDescription("com.example.Foo".into())
            .to_string()
            .contains("com.example.Foo"));
        assert!(AmfError::NotExternalizable("Thing".into())
            .to_string()
            .contains("Thing"));
        assert!(AmfError::NestingTooDeep.to_string().contains("deep"));
    }
}
