/*!
error module defines the error types used throughout bgpstream.
*/
use crate::models::{Afi, Bgp4MpType, BgpState, EntryType, Origin, Safi, TableDumpV2Type};
use num_enum::TryFromPrimitiveError;
use oneio::OneIoError;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::{error::Error, fmt, io};

#[derive(Debug)]
pub enum ParserError {
    IoError(io::Error),
    EofError(io::Error),
    OneIoError(OneIoError),
    EofExpected,
    ParseError(String),
    TruncatedMsg(String),
    Unsupported(String),
    FilterError(String),

    /// Operation issued outside its permitted coordinator lifecycle state.
    InvalidState(String),
    /// `start()` called with no time interval configured in the filter set.
    NoInterval,
    /// Data interface backend name not recognized by `set_data_interface`.
    UnknownBackend(String),
    /// Backend option name not in the backend's published option list.
    UnknownOption(String),
    /// Backend option value failed to parse or is out of range.
    InvalidOptionValue(String),
    /// Data interface backend failed to start (I/O, connection, missing file).
    BackendStart(String),
    /// Data interface backend failed while answering a `poll`.
    BackendQuery(String),
    /// Cooperative cancellation requested during `next_record`.
    Interrupted,
}

impl Error for ParserError {}

/// implement Display trait for Error which satistifies the std::error::Error
/// trait's requirement (must implement Display and Debug traits, Debug already derived)
impl Display for ParserError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::IoError(e) => write!(f, "Error: {e}"),
            ParserError::EofError(e) => write!(f, "Error: {e}"),
            ParserError::ParseError(s) => write!(f, "Error: {s}"),
            ParserError::TruncatedMsg(s) => write!(f, "Error: {s}"),
            ParserError::Unsupported(s) => write!(f, "Error: {s}"),
            ParserError::EofExpected => write!(f, "Error: reach end of file"),
            ParserError::OneIoError(e) => write!(f, "Error: {e}"),
            ParserError::FilterError(e) => write!(f, "Error: {e}"),
            ParserError::InvalidState(s) => write!(f, "Error: invalid state: {s}"),
            ParserError::NoInterval => {
                write!(f, "Error: no time interval configured before start()")
            }
            ParserError::UnknownBackend(s) => write!(f, "Error: unknown data interface: {s}"),
            ParserError::UnknownOption(s) => write!(f, "Error: unknown backend option: {s}"),
            ParserError::InvalidOptionValue(s) => write!(f, "Error: invalid option value: {s}"),
            ParserError::BackendStart(s) => write!(f, "Error: backend failed to start: {s}"),
            ParserError::BackendQuery(s) => write!(f, "Error: backend query failed: {s}"),
            ParserError::Interrupted => write!(f, "Error: interrupted"),
        }
    }
}

impl From<OneIoError> for ParserError {
    fn from(error: OneIoError) -> Self {
        ParserError::OneIoError(error)
    }
}

impl From<io::Error> for ParserError {
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            ErrorKind::UnexpectedEof => ParserError::EofError(io_error),
            _ => ParserError::IoError(io_error),
        }
    }
}

impl From<TryFromPrimitiveError<Bgp4MpType>> for ParserError {
    fn from(value: TryFromPrimitiveError<Bgp4MpType>) -> Self {
        ParserError::ParseError(format!("cannot parse bgp4mp subtype: {}", value.number))
    }
}

impl From<TryFromPrimitiveError<BgpState>> for ParserError {
    fn from(value: TryFromPrimitiveError<BgpState>) -> Self {
        ParserError::ParseError(format!("cannot parse bgp4mp state: {}", value.number))
    }
}

impl From<TryFromPrimitiveError<TableDumpV2Type>> for ParserError {
    fn from(value: TryFromPrimitiveError<TableDumpV2Type>) -> Self {
        ParserError::ParseError(format!("cannot parse table dump v2 type: {}", value.number))
    }
}

impl From<TryFromPrimitiveError<EntryType>> for ParserError {
    fn from(value: TryFromPrimitiveError<EntryType>) -> Self {
        ParserError::ParseError(format!("cannot parse entry type: {}", value.number))
    }
}

impl From<TryFromPrimitiveError<Afi>> for ParserError {
    fn from(value: TryFromPrimitiveError<Afi>) -> Self {
        ParserError::ParseError(format!("Unknown AFI type: {}", value.number))
    }
}

impl From<TryFromPrimitiveError<Safi>> for ParserError {
    fn from(value: TryFromPrimitiveError<Safi>) -> Self {
        ParserError::ParseError(format!("Unknown SAFI type: {}", value.number))
    }
}

impl From<TryFromPrimitiveError<Origin>> for ParserError {
    fn from(value: TryFromPrimitiveError<Origin>) -> Self {
        ParserError::ParseError(format!("Unknown ORIGIN value: {}", value.number))
    }
}
