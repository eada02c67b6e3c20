//! Unified error type for iot32-node.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Radio
    /// The radio stack rejected an advertising or initialisation request.
    Radio(RadioError),

    /// Radio initialisation failed; the node will not advertise.
    Halted,

    // Sensors
    /// The magnetometer read failed.
    Sensor(SensorError),

    // Notifications
    /// The characteristic update primitive failed.
    Transport(TransportError),

    // Scheduler
    /// The event queue has no free slot for new work.
    QueueFull,

    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Radio-stack failures surfaced by the `Radio` collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Raw error code from the stack.
    Raw(u32),
    /// Stack initialisation failed.
    InitFailed,
    /// Advertising parameters or payload were rejected.
    AdvertisingConfig,
    /// Advertising could not be started.
    AdvertisingStart,
}

/// Sensor driver failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Bus transaction failed.
    Bus,
    /// Device identity did not match the expected part.
    WrongDevice(u8),
    /// No new sample was ready.
    NotReady,
}

/// Characteristic update failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The stored value could not be updated.
    SetValue,
    /// The notification could not be queued for the peer.
    Notify,
    /// The payload length does not match the characteristic width.
    Length,
}

// Convenience conversions

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Error::Radio(e)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Error::Sensor(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}
