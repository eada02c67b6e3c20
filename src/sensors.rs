//! Published signals and the cache of their latest values.
//!
//! Each [`Signal`] is bound to one GATT characteristic with a fixed payload
//! width. Payload layout per characteristic:
//! ```text
//! HeartRate (0x2A37): Byte 0 = flags (0x00: UINT8 format, no contact/energy/RR)
//!                     Byte 1 = beats per minute
//! MagnetoX/Y/Z (0xA003-0xA005): i16, little-endian
//! Button (0xA001): 0x00 released, 0x01 pressed
//! ```

use crate::config;

/// Characteristic identifier (16-bit UUID) used to address the transport.
pub type ChannelId = u16;

/// Widest payload of any signal (bytes).
pub const MAX_PAYLOAD_WIDTH: usize = 2;

/// A value published to the connected peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    HeartRate,
    MagnetoX,
    MagnetoY,
    MagnetoZ,
    Button,
}

impl Signal {
    /// Every signal, in characteristic declaration order.
    pub const ALL: [Signal; 5] = [
        Signal::HeartRate,
        Signal::MagnetoX,
        Signal::MagnetoY,
        Signal::MagnetoZ,
        Signal::Button,
    ];

    /// Signals refreshed and published by the sampling tick.
    pub const SAMPLED: [Signal; 4] = [
        Signal::HeartRate,
        Signal::MagnetoX,
        Signal::MagnetoY,
        Signal::MagnetoZ,
    ];

    /// Outbound characteristic for this signal.
    pub const fn channel(self) -> ChannelId {
        match self {
            Signal::HeartRate => config::HEART_RATE_MEASUREMENT_UUID,
            Signal::MagnetoX => config::MAGNETO_X_UUID,
            Signal::MagnetoY => config::MAGNETO_Y_UUID,
            Signal::MagnetoZ => config::MAGNETO_Z_UUID,
            Signal::Button => config::BUTTON_STATE_UUID,
        }
    }

    /// Encoded payload width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Signal::Button => 1,
            _ => 2,
        }
    }
}

/// Scalar value of one signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalValue {
    HeartRate(u8),
    Axis(i16),
    Button(bool),
}

impl SignalValue {
    /// Serialise into `buf`. Returns the number of bytes written,
    /// or 0 if the buffer is too small.
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        match *self {
            SignalValue::HeartRate(bpm) => {
                if buf.len() < 2 {
                    return 0;
                }
                buf[0] = 0x00;
                buf[1] = bpm;
                2
            }
            SignalValue::Axis(v) => {
                if buf.len() < 2 {
                    return 0;
                }
                buf[..2].copy_from_slice(&v.to_le_bytes());
                2
            }
            SignalValue::Button(pressed) => {
                if buf.is_empty() {
                    return 0;
                }
                buf[0] = pressed as u8;
                1
            }
        }
    }

    /// Whether this value has the right shape for `signal`.
    pub fn fits(&self, signal: Signal) -> bool {
        matches!(
            (signal, self),
            (Signal::HeartRate, SignalValue::HeartRate(_))
                | (Signal::MagnetoX, SignalValue::Axis(_))
                | (Signal::MagnetoY, SignalValue::Axis(_))
                | (Signal::MagnetoZ, SignalValue::Axis(_))
                | (Signal::Button, SignalValue::Button(_))
        )
    }
}

/// Latest value of every signal.
///
/// Always fully populated: constructed with defaults, then overwritten
/// field by field on the scheduler thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSnapshot {
    heart_rate: u8,
    magneto: [i16; 3],
    button: bool,
}

impl SensorSnapshot {
    pub const fn new() -> Self {
        Self {
            heart_rate: config::HEART_RATE_INITIAL,
            magneto: [0; 3],
            button: false,
        }
    }

    pub fn value(&self, signal: Signal) -> SignalValue {
        match signal {
            Signal::HeartRate => SignalValue::HeartRate(self.heart_rate),
            Signal::MagnetoX => SignalValue::Axis(self.magneto[0]),
            Signal::MagnetoY => SignalValue::Axis(self.magneto[1]),
            Signal::MagnetoZ => SignalValue::Axis(self.magneto[2]),
            Signal::Button => SignalValue::Button(self.button),
        }
    }

    pub fn heart_rate(&self) -> u8 {
        self.heart_rate
    }

    pub fn magneto(&self) -> [i16; 3] {
        self.magneto
    }

    pub fn button(&self) -> bool {
        self.button
    }

    pub fn set_heart_rate(&mut self, bpm: u8) {
        self.heart_rate = bpm;
    }

    pub fn set_magneto(&mut self, axes: [i16; 3]) {
        self.magneto = axes;
    }

    pub fn set_button(&mut self, pressed: bool) {
        self.button = pressed;
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_fully_populated() {
        let snap = SensorSnapshot::new();
        assert_eq!(snap.value(Signal::HeartRate), SignalValue::HeartRate(100));
        assert_eq!(snap.value(Signal::MagnetoX), SignalValue::Axis(0));
        assert_eq!(snap.value(Signal::MagnetoZ), SignalValue::Axis(0));
        assert_eq!(snap.value(Signal::Button), SignalValue::Button(false));
        for signal in Signal::ALL {
            assert!(snap.value(signal).fits(signal));
        }
    }

    #[test]
    fn channels_are_distinct() {
        for (i, a) in Signal::ALL.iter().enumerate() {
            for b in &Signal::ALL[i + 1..] {
                assert_ne!(a.channel(), b.channel());
            }
        }
        assert_eq!(Signal::HeartRate.channel(), 0x2A37);
        assert_eq!(Signal::Button.channel(), 0xA001);
    }

    #[test]
    fn heart_rate_uses_uint8_measurement_format() {
        let mut buf = [0xFFu8; 2];
        assert_eq!(SignalValue::HeartRate(72).encode(&mut buf), 2);
        assert_eq!(buf, [0x00, 72]);
    }

    #[test]
    fn axis_is_little_endian() {
        let mut buf = [0u8; 2];
        assert_eq!(SignalValue::Axis(-2).encode(&mut buf), 2);
        assert_eq!(buf, [0xFE, 0xFF]);
        SignalValue::Axis(0x1234).encode(&mut buf);
        assert_eq!(buf, [0x34, 0x12]);
    }

    #[test]
    fn button_is_one_byte() {
        let mut buf = [0u8; 2];
        assert_eq!(SignalValue::Button(true).encode(&mut buf), 1);
        assert_eq!(buf[0], 1);
        assert_eq!(SignalValue::Button(false).encode(&mut buf), 1);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn encode_buffer_too_small() {
        let mut one = [0u8; 1];
        assert_eq!(SignalValue::Axis(5).encode(&mut one), 0);
        assert_eq!(SignalValue::HeartRate(60).encode(&mut one), 0);
        assert_eq!(SignalValue::Button(true).encode(&mut []), 0);
    }

    #[test]
    fn encoded_width_matches_signal() {
        let snap = SensorSnapshot::new();
        let mut buf = [0u8; MAX_PAYLOAD_WIDTH];
        for signal in Signal::ALL {
            assert_eq!(snap.value(signal).encode(&mut buf), signal.width());
        }
    }

    #[test]
    fn value_shape_mismatch_detected() {
        assert!(!SignalValue::Axis(1).fits(Signal::HeartRate));
        assert!(!SignalValue::Button(true).fits(Signal::MagnetoY));
        assert!(SignalValue::Axis(1).fits(Signal::MagnetoY));
    }
}
