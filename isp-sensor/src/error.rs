// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

/// The kinds of failure a sensor operation can report.
///
/// Transport failures are never classified further: a bus NACK and a timeout both surface as
/// [`Failure`][ErrorKind::Failure].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A required resource (such as the register transport) could not be obtained.
    NullPointer,

    /// The handle does not refer to a live sensor instance.
    WrongHandle,

    /// The operation is not valid in the sensor's current state.
    WrongState,

    /// The request names a mode, index or feature this chip does not implement.
    NotSupported,

    /// An index is beyond the bounds of a table.
    OutOfRange,

    /// No room is left for another sensor instance.
    OutOfMemory,

    /// A value cannot be encoded for this chip.
    InvalidParameter,

    /// A generic failure, usually propagated from the register transport.
    Failure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorKind::NullPointer => "required resource missing",
            ErrorKind::WrongHandle => "invalid sensor handle",
            ErrorKind::WrongState => "operation not valid in the current sensor state",
            ErrorKind::NotSupported => "not supported by this sensor",
            ErrorKind::OutOfRange => "index out of range",
            ErrorKind::OutOfMemory => "no free sensor slots",
            ErrorKind::InvalidParameter => "parameter cannot be encoded",
            ErrorKind::Failure => "sensor operation failed",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorKind {}

#[derive(Clone, PartialEq)]
pub enum Error<E> {
    /// Errors originating from the register transport.
    Transport(E),

    /// Errors originating from within this library.
    Sensor(ErrorKind),
}

impl<E> Error<E> {
    /// Classify this error using the sensor error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Failure,
            Error::Sensor(kind) => *kind,
        }
    }
}

// Custom Debug implementation so that the transport error is the only thing that needs Debug.
impl<E> fmt::Debug for Error<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(err) => f.debug_tuple("Error::Transport").field(err).finish(),
            Error::Sensor(kind) => f.debug_tuple("Error::Sensor").field(kind).finish(),
        }
    }
}

impl<E> fmt::Display for Error<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(err) => write!(f, "Transport Error: {:?}", err),
            Error::Sensor(kind) => write!(f, "Sensor Error: {}", kind),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for Error<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            Error::Sensor(kind) => Some(kind),
        }
    }
}

impl<E> From<ErrorKind> for Error<E> {
    fn from(kind: ErrorKind) -> Self {
        Self::Sensor(kind)
    }
}

#[cfg(test)]
mod test {
    use super::{Error, ErrorKind};

    #[test]
    fn transport_errors_are_failures() {
        let err: Error<u8> = Error::Transport(3);
        assert_eq!(err.kind(), ErrorKind::Failure);
    }

    #[test]
    fn sensor_kind_passes_through() {
        let err: Error<u8> = ErrorKind::WrongState.into();
        assert_eq!(err.kind(), ErrorKind::WrongState);
        assert_eq!(err, Error::Sensor(ErrorKind::WrongState));
    }
}
