use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort [`Engine::start`](crate::Engine::start).
///
/// Once the sampling thread is running nothing can fail fatally anymore;
/// per-tick read failures degrade to zero-contribution ticks and, when a
/// whole window is unreadable, to a stalled snapshot.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StartError {
    /// The configuration was rejected before touching any hardware
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    /// No device matched the selector
    #[error("GPU device not found: {selector}")]
    DeviceNotFound {
        selector: String,
    },

    /// Insufficient rights to open the register access path
    #[error("access denied: {}: {source}. Run as root or install setuid root.", path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The register aperture could not be mapped
    #[error("failed to map the register aperture: {message}")]
    MapFailed {
        message: String,
    },
}

impl StartError {
    pub fn is_permission_error(&self) -> bool {
        matches!(self, StartError::AccessDenied { .. })
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        StartError::InvalidConfig { message: message.into() }
    }

    pub(crate) fn map_failed(message: impl Into<String>) -> Self {
        StartError::MapFailed { message: message.into() }
    }

    /// Classify an I/O error raised while opening a device access path.
    pub(crate) fn from_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();

        match source.kind() {
            io::ErrorKind::PermissionDenied => StartError::AccessDenied { path, source },
            io::ErrorKind::NotFound => StartError::DeviceNotFound {
                selector: path.display().to_string(),
            },
            _ => StartError::MapFailed {
                message: format!("{}: {source}", path.display()),
            },
        }
    }
}

/// Failure of a single register read.
///
/// Never fatal. The sampling loop records the tick as a zero contribution
/// and keeps going; consumers see a stalled snapshot only when every tick
/// of a window failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterReadError {
    #[error("register offset {offset:#x} is outside the mapped aperture")]
    OutOfRange { offset: u64 },

    #[error("register offset {offset:#x} is not dword-aligned")]
    Misaligned { offset: u64 },

    /// The read completed with an all-ones pattern, which the bus returns
    /// when the device is hung, powered down or no longer present.
    #[error("device did not respond to the register read")]
    Unavailable,
}
