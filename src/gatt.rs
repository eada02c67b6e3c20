//! GATT server exposed by the node, and the characteristic transport.
//!
//! Services:
//! - Heart Rate (0x180D): Measurement (0x2A37, notify), Body Sensor Location (0x2A38, read)
//! - Button (0xA000): State (0xA001, read/notify)
//! - Magneto (0xA002): X/Y/Z (0xA003-0xA005, read/notify)
//!
//! Values are always stored; a notification is sent only when a central is
//! connected and has enabled notifications on that characteristic.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU8, Ordering};

use defmt::{debug, info};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use iot32_node::config;
use iot32_node::{ChannelId, Transport, TransportError};
use nrf_softdevice::ble::Connection;

#[nrf_softdevice::gatt_service(uuid = "180d")]
pub struct HeartRateService {
    /// Heart Rate Measurement - `[flags, bpm]`.
    #[characteristic(uuid = "2a37", read, notify)]
    pub measurement: [u8; 2],

    #[characteristic(uuid = "2a38", read)]
    pub body_sensor_location: u8,
}

#[nrf_softdevice::gatt_service(uuid = "a000")]
pub struct ButtonService {
    #[characteristic(uuid = "a001", read, notify)]
    pub state: u8,
}

#[nrf_softdevice::gatt_service(uuid = "a002")]
pub struct MagnetoService {
    #[characteristic(uuid = "a003", read, notify)]
    pub x: [u8; 2],
    #[characteristic(uuid = "a004", read, notify)]
    pub y: [u8; 2],
    #[characteristic(uuid = "a005", read, notify)]
    pub z: [u8; 2],
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub hrs: HeartRateService,
    pub button: ButtonService,
    pub magneto: MagnetoService,
}

/// The connected central, if any.
pub static CONNECTION: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>> =
    Mutex::new(RefCell::new(None));

// Characteristics with notifications enabled by the current central.
static SUBSCRIBED: AtomicU8 = AtomicU8::new(0);

const SUB_HEART_RATE: u8 = 1 << 0;
const SUB_BUTTON: u8 = 1 << 1;
const SUB_MAGNETO_X: u8 = 1 << 2;
const SUB_MAGNETO_Y: u8 = 1 << 3;
const SUB_MAGNETO_Z: u8 = 1 << 4;

fn set_subscribed(bit: u8, enabled: bool) {
    if enabled {
        SUBSCRIBED.fetch_or(bit, Ordering::Relaxed);
    } else {
        SUBSCRIBED.fetch_and(!bit, Ordering::Relaxed);
    }
}

fn is_subscribed(bit: u8) -> bool {
    SUBSCRIBED.load(Ordering::Relaxed) & bit != 0
}

/// Track CCCD writes from the central.
pub fn on_server_event(event: ServerEvent) {
    match event {
        ServerEvent::Hrs(HeartRateServiceEvent::MeasurementCccdWrite { notifications }) => {
            info!("heart rate notifications: {}", notifications);
            set_subscribed(SUB_HEART_RATE, notifications);
        }
        ServerEvent::Button(ButtonServiceEvent::StateCccdWrite { notifications }) => {
            info!("button notifications: {}", notifications);
            set_subscribed(SUB_BUTTON, notifications);
        }
        ServerEvent::Magneto(MagnetoServiceEvent::XCccdWrite { notifications }) => {
            set_subscribed(SUB_MAGNETO_X, notifications);
        }
        ServerEvent::Magneto(MagnetoServiceEvent::YCccdWrite { notifications }) => {
            set_subscribed(SUB_MAGNETO_Y, notifications);
        }
        ServerEvent::Magneto(MagnetoServiceEvent::ZCccdWrite { notifications }) => {
            set_subscribed(SUB_MAGNETO_Z, notifications);
        }
    }
}

/// Forget subscriptions when the link goes down.
pub fn clear_subscriptions() {
    SUBSCRIBED.store(0, Ordering::Relaxed);
}

impl Server {
    /// Static values that never change after registration.
    pub fn init_values(&self) -> Result<(), TransportError> {
        self.hrs
            .body_sensor_location_set(&config::BODY_SENSOR_LOCATION_FINGER)
            .map_err(|_| TransportError::SetValue)
    }
}

/// `Transport` backed by the GATT server above. Without a registered
/// server every update fails.
pub struct GattTransport {
    server: Option<&'static Server>,
}

impl GattTransport {
    pub fn new(server: Option<&'static Server>) -> Self {
        Self { server }
    }
}

fn two(bytes: &[u8]) -> Result<[u8; 2], TransportError> {
    bytes.try_into().map_err(|_| TransportError::Length)
}

fn notify_result<E>(result: Result<(), E>) -> Result<(), TransportError> {
    result.map_err(|_| TransportError::Notify)
}

impl Transport for GattTransport {
    fn update_characteristic(
        &mut self,
        channel: ChannelId,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let server = self.server.ok_or(TransportError::SetValue)?;
        let conn = CONNECTION.lock(|c| c.borrow().clone());
        let hrs = &server.hrs;
        let mag = &server.magneto;

        match channel {
            config::HEART_RATE_MEASUREMENT_UUID => {
                let v = two(bytes)?;
                hrs.measurement_set(&v).map_err(|_| TransportError::SetValue)?;
                match conn {
                    Some(c) if is_subscribed(SUB_HEART_RATE) => {
                        notify_result(hrs.measurement_notify(&c, &v))
                    }
                    _ => Ok(()),
                }
            }
            config::BUTTON_STATE_UUID => {
                let v = *bytes.first().ok_or(TransportError::Length)?;
                server
                    .button
                    .state_set(&v)
                    .map_err(|_| TransportError::SetValue)?;
                match conn {
                    Some(c) if is_subscribed(SUB_BUTTON) => {
                        notify_result(server.button.state_notify(&c, &v))
                    }
                    _ => Ok(()),
                }
            }
            config::MAGNETO_X_UUID => {
                let v = two(bytes)?;
                mag.x_set(&v).map_err(|_| TransportError::SetValue)?;
                match conn {
                    Some(c) if is_subscribed(SUB_MAGNETO_X) => notify_result(mag.x_notify(&c, &v)),
                    _ => Ok(()),
                }
            }
            config::MAGNETO_Y_UUID => {
                let v = two(bytes)?;
                mag.y_set(&v).map_err(|_| TransportError::SetValue)?;
                match conn {
                    Some(c) if is_subscribed(SUB_MAGNETO_Y) => notify_result(mag.y_notify(&c, &v)),
                    _ => Ok(()),
                }
            }
            config::MAGNETO_Z_UUID => {
                let v = two(bytes)?;
                mag.z_set(&v).map_err(|_| TransportError::SetValue)?;
                match conn {
                    Some(c) if is_subscribed(SUB_MAGNETO_Z) => notify_result(mag.z_notify(&c, &v)),
                    _ => Ok(()),
                }
            }
            other => {
                debug!("no characteristic for channel {:04x}", other);
                Err(TransportError::SetValue)
            }
        }
    }
}
