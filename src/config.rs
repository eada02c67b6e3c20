//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// BLE advertising

/// Complete local name carried in the advertising payload.
pub const DEVICE_NAME: &str = "IOT32";

/// GAP appearance: Generic Heart Rate Sensor (0x0340).
pub const APPEARANCE_HEART_RATE_SENSOR: u16 = 0x0340;

/// Advertising interval (ms). Connectable undirected.
pub const ADV_INTERVAL_MS: u32 = 100;

/// Advertising interval in SoftDevice units of 0.625 ms.
pub const ADV_INTERVAL_UNITS: u32 = ADV_INTERVAL_MS * 1000 / 625;

// GATT layout (16-bit UUIDs)

/// Heart Rate service.
pub const HEART_RATE_SERVICE_UUID: u16 = 0x180D;
/// Heart Rate Measurement characteristic.
pub const HEART_RATE_MEASUREMENT_UUID: u16 = 0x2A37;
/// Body Sensor Location characteristic.
pub const BODY_SENSOR_LOCATION_UUID: u16 = 0x2A38;
/// Body sensor location value: finger.
pub const BODY_SENSOR_LOCATION_FINGER: u8 = 3;

/// Button service and its state characteristic.
pub const BUTTON_SERVICE_UUID: u16 = 0xA000;
pub const BUTTON_STATE_UUID: u16 = 0xA001;

/// Magnetometer service and its per-axis characteristics.
pub const MAGNETO_SERVICE_UUID: u16 = 0xA002;
pub const MAGNETO_X_UUID: u16 = 0xA003;
pub const MAGNETO_Y_UUID: u16 = 0xA004;
pub const MAGNETO_Z_UUID: u16 = 0xA005;

// Sampling

/// Period of the sampling tick (ms).
pub const SAMPLE_INTERVAL_MS: u64 = 1000;

/// Simulated heart rate: first value, and the half-open range it cycles in.
pub const HEART_RATE_INITIAL: u8 = 100;
pub const HEART_RATE_MIN: u8 = 60;
pub const HEART_RATE_MAX: u8 = 110;

// Button

/// Debounce delay applied after each edge (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 20;

// Scheduler

/// Maximum number of queued work items (timers + posts).
pub const EVENT_QUEUE_CAPACITY: usize = 16;

// Magnetometer (LIS3MDL on I²C)

/// 7-bit I²C address with SDO/SA1 pulled high.
pub const MAGNETO_I2C_ADDR: u8 = 0x1E;

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   User button    → P0.11 (active-low, internal pull-up)
//   I²C SDA        → P0.26
//   I²C SCL        → P0.27
