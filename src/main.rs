//! iot32-node firmware for the nRF52840 with SoftDevice S140.
//!
//! Tasks:
//! - `softdevice_task` runs the SoftDevice event loop.
//! - `ble_task` advertises, serves the GATT server and reports lifecycle
//!   changes as `RadioEvent`s.
//! - `button_task` turns GPIO edges into `ButtonIrq` calls.
//! - `run_loop_task` owns the `SensorNode` and the event queue; every
//!   sampling tick, button delivery and radio callback runs there.

#![no_std]
#![no_main]

mod button;
mod drivers;
mod gatt;
mod peripheral;

use core::mem;

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_futures::yield_now;
use embassy_nrf::gpio::{AnyPin, Pin as _};
use embassy_nrf::interrupt::{InterruptExt, Priority};
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, interrupt, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};
use iot32_node::config;
use iot32_node::{
    ButtonIrq, EventQueue, Inbox, IrqPost, Millis, PendingButton, RadioError, RadioEvent,
    SensorNode, Timebase, Work,
};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::drivers::lis3mdl::Lis3mdl;
use crate::gatt::{GattTransport, Server};
use crate::peripheral::SoftdeviceRadio;

bind_interrupts!(struct Irqs {
    TWISPI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

type Magneto = Lis3mdl<Twim<'static, TWISPI0>>;
type Node = SensorNode<'static, SoftdeviceRadio, GattTransport, Magneto>;

// Run-loop wakeup, signalled by interrupt posts and radio events.
static WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

pub(crate) fn wake_run_loop() {
    WAKE.signal(());
}

static IRQ: IrqPost = IrqPost::new(wake_run_loop);
static PENDING_BUTTON: PendingButton = PendingButton::new();
static BUTTON_EDGES: ButtonIrq<'static, Work> =
    ButtonIrq::new(&PENDING_BUTTON, &IRQ, Work::DeliverButton);

/// Embassy time driver as the run loop's clock.
struct EmbassyTime;

impl Timebase for EmbassyTime {
    fn now(&self) -> Millis {
        Instant::now().as_millis()
    }

    async fn wait_until(&mut self, deadline: Option<Millis>) {
        match deadline {
            Some(at) if at <= self.now() => yield_now().await,
            Some(at) => {
                select(Timer::at(Instant::from_millis(at)), WAKE.wait()).await;
            }
            None => WAKE.wait().await,
        }
    }
}

/// Radio events queued by `ble_task`.
struct RadioInbox;

impl Inbox<Work> for RadioInbox {
    fn try_next(&mut self) -> Option<Work> {
        peripheral::RADIO_EVENTS.try_receive().ok().map(Work::Radio)
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    peripheral::peripheral_task(sd, server).await
}

#[embassy_executor::task]
async fn button_task(pin: AnyPin) -> ! {
    button::button_task(pin, &BUTTON_EDGES).await
}

#[embassy_executor::task]
async fn run_loop_task(node: &'static mut Node) -> ! {
    let mut queue: EventQueue<Work, { config::EVENT_QUEUE_CAPACITY }> = EventQueue::new();
    queue
        .run_forever(&IRQ, &mut RadioInbox, node, &mut EmbassyTime)
        .await
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 64 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: config::DEVICE_NAME.as_ptr() as *const u8 as _,
            current_len: config::DEVICE_NAME.len() as u16,
            max_len: config::DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("iot32-node starting");

    // Priorities 0, 1 and 4 belong to the SoftDevice.
    let mut hal_config = embassy_nrf::config::Config::default();
    hal_config.gpiote_interrupt_priority = Priority::P2;
    hal_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(hal_config);

    interrupt::TWISPI0.set_priority(Priority::P3);
    let twim = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim::Config::default());
    let mut magneto = Lis3mdl::new(twim, config::MAGNETO_I2C_ADDR);
    if let Err(e) = magneto.init() {
        warn!("magnetometer init failed, axes will stay at zero: {}", e);
    }

    let sd = Softdevice::enable(&softdevice_config());

    static SERVER: StaticCell<Server> = StaticCell::new();
    let server: Option<&'static Server> = match Server::new(sd) {
        Ok(server) => Some(SERVER.init(server)),
        Err(e) => {
            warn!("GATT registration failed: {:?}", e);
            None
        }
    };
    let sd: &'static Softdevice = sd;
    if let Some(server) = server {
        if let Err(e) = server.init_values() {
            warn!("body sensor location not set: {}", e);
        }
    }

    unwrap!(spawner.spawn(softdevice_task(sd)));

    static NODE: StaticCell<Node> = StaticCell::new();
    let node = NODE.init(SensorNode::new(
        SoftdeviceRadio,
        GattTransport::new(server),
        magneto,
        &PENDING_BUTTON,
    ));
    unwrap!(spawner.spawn(run_loop_task(node)));
    unwrap!(spawner.spawn(button_task(p.P0_11.degrade())));

    let init = match server {
        Some(server) => {
            unwrap!(spawner.spawn(ble_task(sd, server)));
            Ok(())
        }
        None => Err(RadioError::InitFailed),
    };
    peripheral::report(RadioEvent::InitComplete(init)).await;
}
