//! User button input.
//!
//! The button is active-low with an internal pull-up, so a press is a
//! falling pin edge and a release is a rising one. Edges are debounced
//! here and then handed to the `ButtonIrq` marshaller, which only records
//! them and posts a delivery to the run loop.

use defmt::debug;
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_time::{Duration, Timer};
use iot32_node::config::BUTTON_DEBOUNCE_MS;
use iot32_node::{ButtonIrq, Work};

pub async fn button_task(pin: AnyPin, edges: &'static ButtonIrq<'static, Work>) -> ! {
    let mut btn = Input::new(pin, Pull::Up);

    loop {
        btn.wait_for_falling_edge().await;
        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
        if btn.is_high() {
            // Bounce.
            continue;
        }
        debug!("button pressed");
        edges.on_rising_edge();

        btn.wait_for_rising_edge().await;
        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
        debug!("button released");
        edges.on_falling_edge();
    }
}
