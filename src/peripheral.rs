//! BLE peripheral role on the SoftDevice S140.
//!
//! The run loop never touches the SoftDevice directly. `SoftdeviceRadio`
//! turns `Radio` calls into commands for `peripheral_task`, which owns the
//! advertise / serve / disconnect cycle and reports every lifecycle change
//! back as a `RadioEvent`.

use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use iot32_node::ble::adv_builder::AdvertisingData;
use iot32_node::config;
use iot32_node::{Radio, RadioError, RadioEvent};
use nrf_softdevice::ble::{gatt_server, peripheral};
use nrf_softdevice::Softdevice;

use crate::gatt::{self, Server, CONNECTION};

#[derive(Clone)]
pub enum AdvCommand {
    /// Advertise with a new payload.
    Start(AdvertisingData),
    /// Advertise again with the last payload.
    Restart,
}

pub static ADV_COMMANDS: Channel<CriticalSectionRawMutex, AdvCommand, 2> = Channel::new();

/// Radio lifecycle events on their way to the run loop.
pub static RADIO_EVENTS: Channel<CriticalSectionRawMutex, RadioEvent, 4> = Channel::new();

/// Queue a radio event and wake the run loop.
pub async fn report(event: RadioEvent) {
    RADIO_EVENTS.send(event).await;
    crate::wake_run_loop();
}

/// `Radio` handle held by the node.
pub struct SoftdeviceRadio;

fn queue(cmd: AdvCommand) -> Result<(), RadioError> {
    ADV_COMMANDS.try_send(cmd).map_err(|TrySendError::Full(_)| {
        warn!("advertising command queue full");
        RadioError::AdvertisingStart
    })
}

impl Radio for SoftdeviceRadio {
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), RadioError> {
        if data.is_empty() || data.len() > iot32_node::ble::adv_builder::LEGACY_ADV_MAX {
            return Err(RadioError::AdvertisingConfig);
        }
        queue(AdvCommand::Start(data.clone()))
    }

    fn restart_advertising(&mut self) -> Result<(), RadioError> {
        queue(AdvCommand::Restart)
    }
}

pub async fn peripheral_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    let mut adv_data: Option<AdvertisingData> = None;

    loop {
        match ADV_COMMANDS.receive().await {
            AdvCommand::Start(data) => adv_data = Some(data),
            AdvCommand::Restart => {}
        }

        let Some(data) = &adv_data else {
            warn!("restart requested before any advertising payload");
            report(RadioEvent::AdvertisingFailed(RadioError::AdvertisingConfig)).await;
            continue;
        };

        let adv_config = peripheral::Config {
            interval: config::ADV_INTERVAL_UNITS,
            ..Default::default()
        };
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: data.as_bytes(),
            scan_data: &[],
        };

        info!("advertising as {}", config::DEVICE_NAME);
        let conn = match peripheral::advertise_connectable(sd, adv, &adv_config).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("advertising failed: {:?}", e);
                report(RadioEvent::AdvertisingFailed(RadioError::AdvertisingStart)).await;
                continue;
            }
        };

        info!("central connected");
        CONNECTION.lock(|c| c.replace(Some(conn.clone())));
        report(RadioEvent::Connected(Ok(()))).await;

        let reason = gatt_server::run(&conn, server, gatt::on_server_event).await;
        info!("central disconnected: {:?}", reason);

        CONNECTION.lock(|c| c.replace(None));
        gatt::clear_subscriptions();
        report(RadioEvent::Disconnected).await;
    }
}
