//! Notification publisher - pushes encoded signal values to the transport.
//!
//! The transport primitive (GATT "set value + notify") is owned by the
//! radio adapter. This layer only decides the channel and the payload.

use crate::error::{Error, TransportError};
use crate::sensors::{ChannelId, SensorSnapshot, Signal, SignalValue, MAX_PAYLOAD_WIDTH};

/// Characteristic update primitive.
///
/// Called whether or not a peer is connected; without a subscriber the
/// implementation stores the value and skips the notification.
pub trait Transport {
    fn update_characteristic(
        &mut self,
        channel: ChannelId,
        bytes: &[u8],
    ) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn update_characteristic(
        &mut self,
        channel: ChannelId,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        (**self).update_characteristic(channel, bytes)
    }
}

/// Maps signals to characteristics and forwards encoded payloads.
pub struct Publisher<T> {
    transport: T,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Encode `value` for `signal` and hand it to the transport.
    ///
    /// Every call reaches the transport; identical values are not
    /// de-duplicated.
    pub fn publish(&mut self, signal: Signal, value: SignalValue) -> Result<(), Error> {
        if !value.fits(signal) {
            return Err(TransportError::Length.into());
        }

        let mut buf = [0u8; MAX_PAYLOAD_WIDTH];
        let len = value.encode(&mut buf);
        if len != signal.width() {
            return Err(Error::BufferOverflow);
        }

        self.transport
            .update_characteristic(signal.channel(), &buf[..len])
            .map_err(Error::from)
    }

    /// Publish the cached value of each signal in `signals`.
    ///
    /// A failing signal is logged and does not stop the others. Returns the
    /// number of failures.
    pub fn publish_from(&mut self, snapshot: &SensorSnapshot, signals: &[Signal]) -> usize {
        let mut failures = 0;
        for &signal in signals {
            if let Err(e) = self.publish(signal, snapshot.value(signal)) {
                warn!("publish {} failed: {}", signal, e);
                failures += 1;
            }
        }
        failures
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
