//! Adapter error types.
//!
//! Errors are grouped by how far they reach:
//!
//! | Class            | Example                           | Effect                         |
//! |------------------|-----------------------------------|--------------------------------|
//! | `Transient`      | one transfer failed, buffer wait  | logged, frame dropped          |
//! | `OperationFatal` | verify mismatch, unsupported mode | `set_display_mode` aborted     |
//! | `PipelineFatal`  | transport rejected a submission   | green light off until mode set |
//! | `DeviceFatal`    | adapter physically removed        | every later operation fails    |

use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Register access failure reported by the chip register primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// Control transfer failed with the given transport status.
    Io(i32),
    /// Control transfer did not finish in time.
    Timeout,
    /// Adapter no longer answers.
    NoDevice,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(code) => write!(f, "register I/O error {}", code),
            Self::Timeout => write!(f, "register access timed out"),
            Self::NoDevice => write!(f, "register access: no device"),
        }
    }
}

/// Bulk transport failure (immediate submission rejection or interface setup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Device was disconnected.
    NoDevice,
    /// Endpoint no longer exists.
    EndpointGone,
    /// Host controller queue is full.
    Busy,
    /// Any other host controller error.
    Io(i32),
}

impl TransportError {
    /// Errors after which the adapter is considered physically gone.
    pub fn is_device_gone(&self) -> bool {
        matches!(self, Self::NoDevice | Self::EndpointGone)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevice => write!(f, "device disconnected"),
            Self::EndpointGone => write!(f, "endpoint gone"),
            Self::Busy => write!(f, "host controller busy"),
            Self::Io(code) => write!(f, "transport error {}", code),
        }
    }
}

/// I2C (DDC) read failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cError {
    /// No acknowledge from the monitor.
    Nak,
    /// Bus transaction timed out.
    Timeout,
    /// Underlying register access failed.
    Register(RegisterError),
}

impl fmt::Display for I2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nak => write!(f, "I2C no acknowledge"),
            Self::Timeout => write!(f, "I2C timeout"),
            Self::Register(e) => write!(f, "I2C register access: {}", e),
        }
    }
}

/// HDMI companion chip failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdmiError {
    /// Chip did not respond.
    NotResponding,
    /// Chip rejected the requested configuration.
    Unsupported,
    /// Underlying I2C access failed.
    Bus(I2cError),
}

impl fmt::Display for HdmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotResponding => write!(f, "HDMI chip not responding"),
            Self::Unsupported => write!(f, "HDMI chip rejected configuration"),
            Self::Bus(e) => write!(f, "HDMI chip bus error: {}", e),
        }
    }
}

/// Transfer buffer pool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// No buffer came back within the bounded wait.
    Timeout,
    /// Adapter is gone; waiting is pointless.
    DeviceGone,
    /// Pool is being torn down.
    Closed,
    /// Payload does not fit a buffer.
    TooLarge {
        len: usize,
        capacity: usize,
    },
    /// Teardown gave up with buffers still in flight.
    Outstanding(usize),
    /// Transport refused the transfer.
    Submit(TransportError),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out waiting for a transfer buffer"),
            Self::DeviceGone => write!(f, "device gone"),
            Self::Closed => write!(f, "transfer pool closed"),
            Self::TooLarge { len, capacity } => {
                write!(f, "payload of {} bytes exceeds buffer capacity {}", len, capacity)
            }
            Self::Outstanding(n) => write!(f, "{} transfers still in flight", n),
            Self::Submit(e) => write!(f, "submit failed: {}", e),
        }
    }
}

/// Mode-setting step, used to tag register failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStep {
    Pll,
    SoftReset,
    InterruptControl,
    PixelFormat,
    Timing,
    IsoControl,
    BusControl,
}

impl fmt::Display for ModeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pll => "PLL",
            Self::SoftReset => "soft reset",
            Self::InterruptControl => "interrupt control",
            Self::PixelFormat => "pixel format",
            Self::Timing => "timing",
            Self::IsoControl => "iso control",
            Self::BusControl => "bus control",
        };
        f.write_str(name)
    }
}

/// `set_display_mode` failures. All of them leave the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeError {
    /// Adapter was removed.
    DeviceGone,
    /// No timing entry for the requested combination.
    UnsupportedMode {
        width: u32,
        height: u32,
        refresh: u32,
    },
    /// Register access failed during a step.
    Register {
        step: ModeStep,
        error: RegisterError,
    },
    /// PLL read back after the soft reset differs from the programmed value.
    PllMismatch {
        expected: u32,
        actual: u32,
    },
    /// A verified register read back a different value.
    VerifyMismatch {
        offset: u32,
        wrote: u32,
        read: u32,
    },
    /// Selecting the streaming interface failed.
    InterfaceSelect(TransportError),
}

impl fmt::Display for ModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceGone => write!(f, "device gone"),
            Self::UnsupportedMode { width, height, refresh } => {
                write!(f, "unsupported mode {}x{}@{}", width, height, refresh)
            }
            Self::Register { step, error } => write!(f, "{} step: {}", step, error),
            Self::PllMismatch { expected, actual } => {
                write!(f, "PLL mismatch: wrote {:#010x}, read {:#010x}", expected, actual)
            }
            Self::VerifyMismatch { offset, wrote, read } => write!(
                f,
                "register {:#06x} verify failed: wrote {:#010x}, read {:#010x}",
                offset, wrote, read
            ),
            Self::InterfaceSelect(e) => write!(f, "interface select failed: {}", e),
        }
    }
}

/// Invalid pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NoRenderContexts,
    NoTransferBuffers,
    ZeroBufferCapacity,
    ZeroBusyCap,
    /// Busy cap larger than the context pool.
    BusyCapTooLarge {
        busy_cap: usize,
        contexts: usize,
    },
    /// Pool larger than a buffer index can address.
    TooManyBuffers(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRenderContexts => write!(f, "render context count must be positive"),
            Self::NoTransferBuffers => write!(f, "transfer buffer count must be positive"),
            Self::ZeroBufferCapacity => write!(f, "transfer buffer capacity must be positive"),
            Self::ZeroBusyCap => write!(f, "busy cap must be positive"),
            Self::BusyCapTooLarge { busy_cap, contexts } => {
                write!(f, "busy cap {} exceeds {} render contexts", busy_cap, contexts)
            }
            Self::TooManyBuffers(n) => write!(f, "{} transfer buffers exceed the index range", n),
        }
    }
}

/// Top-level adapter error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Config(ConfigError),
    Register(RegisterError),
    Transport(TransportError),
    Hdmi(HdmiError),
    Pool(PoolError),
    Mode(ModeError),
    /// Adapter was removed; nothing else will succeed.
    DeviceGone,
}

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    OperationFatal,
    PipelineFatal,
    DeviceFatal,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::DeviceGone
            | Self::Mode(ModeError::DeviceGone)
            | Self::Pool(PoolError::DeviceGone) => ErrorClass::DeviceFatal,
            Self::Transport(e) | Self::Pool(PoolError::Submit(e)) if e.is_device_gone() => {
                ErrorClass::DeviceFatal
            }
            Self::Transport(_) | Self::Pool(PoolError::Submit(_)) => ErrorClass::PipelineFatal,
            Self::Mode(_) | Self::Config(_) => ErrorClass::OperationFatal,
            Self::Register(RegisterError::NoDevice) => ErrorClass::DeviceFatal,
            Self::Register(_) | Self::Hdmi(_) | Self::Pool(_) => ErrorClass::Transient,
        }
    }

    pub fn is_device_gone(&self) -> bool {
        self.class() == ErrorClass::DeviceFatal
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {}", e),
            Self::Register(e) => write!(f, "{}", e),
            Self::Transport(e) => write!(f, "{}", e),
            Self::Hdmi(e) => write!(f, "{}", e),
            Self::Pool(e) => write!(f, "{}", e),
            Self::Mode(e) => write!(f, "mode set failed: {}", e),
            Self::DeviceGone => write!(f, "device gone"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<RegisterError> for Error {
    fn from(e: RegisterError) -> Self {
        Self::Register(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<HdmiError> for Error {
    fn from(e: HdmiError) -> Self {
        Self::Hdmi(e)
    }
}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Self {
        Self::Pool(e)
    }
}

impl From<ModeError> for Error {
    fn from(e: ModeError) -> Self {
        Self::Mode(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::DeviceGone.class(), ErrorClass::DeviceFatal);
        assert_eq!(
            Error::Pool(PoolError::Submit(TransportError::NoDevice)).class(),
            ErrorClass::DeviceFatal
        );
        assert_eq!(
            Error::Pool(PoolError::Submit(TransportError::Busy)).class(),
            ErrorClass::PipelineFatal
        );
        assert_eq!(Error::Pool(PoolError::Timeout).class(), ErrorClass::Transient);
        assert_eq!(
            Error::Mode(ModeError::UnsupportedMode { width: 1, height: 1, refresh: 60 }).class(),
            ErrorClass::OperationFatal
        );
        assert!(Error::Register(RegisterError::NoDevice).is_device_gone());
    }

    #[test]
    fn test_transport_gone_errors() {
        assert!(TransportError::NoDevice.is_device_gone());
        assert!(TransportError::EndpointGone.is_device_gone());
        assert!(!TransportError::Busy.is_device_gone());
        assert!(!TransportError::Io(-71).is_device_gone());
    }

    #[test]
    fn test_display_messages() {
        use alloc::string::ToString;

        let e = ModeError::VerifyMismatch { offset: 0x8008, wrote: 1, read: 2 };
        assert_eq!(
            e.to_string(),
            "register 0x8008 verify failed: wrote 0x00000001, read 0x00000002"
        );
        assert_eq!(
            Error::from(e).to_string(),
            "mode set failed: register 0x8008 verify failed: wrote 0x00000001, read 0x00000002"
        );
    }
}
