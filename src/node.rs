//! The sensor node: everything the run loop dispatches to.
//!
//! `SensorNode` owns the radio handle, the connection state machine, the
//! sensor cache, the sampler and the publisher. It is the only
//! [`Dispatch`] target, so all of that state is touched from the run-loop
//! thread alone.

use crate::config::SAMPLE_INTERVAL_MS;
use crate::connection::{ConnectionState, ConnectionStateMachine, Radio, RadioEvent};
use crate::error::Error;
use crate::marshal::PendingButton;
use crate::publisher::{Publisher, Transport};
use crate::sampler::{Magnetometer, Sampler};
use crate::scheduler::{Context, Dispatch, IrqWork};
use crate::sensors::{SensorSnapshot, Signal, SignalValue};

/// Work items understood by the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Work {
    /// Periodic sampling tick.
    Sample,
    /// Publish the button edges captured in interrupt context.
    DeliverButton,
    /// Try advertising again after advertising failed. Posted when the
    /// button is pressed while the node is ready but Idle.
    RetryAdvertising,
    /// Radio lifecycle callback.
    Radio(RadioEvent),
}

const DELIVER_BUTTON_SLOT: u8 = 0;

impl IrqWork for Work {
    fn irq_slot(self) -> Option<u8> {
        match self {
            Work::DeliverButton => Some(DELIVER_BUTTON_SLOT),
            _ => None,
        }
    }

    fn from_irq_slot(slot: u8) -> Option<Self> {
        match slot {
            DELIVER_BUTTON_SLOT => Some(Work::DeliverButton),
            _ => None,
        }
    }
}

pub struct SensorNode<'a, R, T, M> {
    radio: R,
    connection: ConnectionStateMachine,
    snapshot: SensorSnapshot,
    sampler: Sampler<M>,
    publisher: Publisher<T>,
    button: &'a PendingButton,
    button_armed: bool,
}

impl<'a, R, T, M> SensorNode<'a, R, T, M>
where
    R: Radio,
    T: Transport,
    M: Magnetometer,
{
    pub fn new(radio: R, transport: T, magnetometer: M, button: &'a PendingButton) -> Self {
        Self {
            radio,
            connection: ConnectionStateMachine::new(),
            snapshot: SensorSnapshot::new(),
            sampler: Sampler::new(magnetometer),
            publisher: Publisher::new(transport),
            button,
            button_armed: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionStateMachine {
        &self.connection
    }

    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn transport(&self) -> &T {
        self.publisher.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.publisher.transport_mut()
    }

    pub fn magnetometer_mut(&mut self) -> &mut M {
        self.sampler.magnetometer_mut()
    }

    fn on_radio_event<const N: usize>(
        &mut self,
        event: RadioEvent,
        cx: &mut Context<'_, Work, N>,
    ) -> Result<(), Error> {
        let was_ready = self.connection.is_ready();
        let result = self.connection.handle(event, &mut self.radio);

        // Sampling and button delivery start with the radio, whether or not
        // advertising came up.
        let armed = if !was_ready && self.connection.is_ready() {
            self.button_armed = true;
            cx.schedule_every(SAMPLE_INTERVAL_MS, Work::Sample)
        } else {
            Ok(())
        };

        result.and(armed)
    }

    fn deliver_button<const N: usize>(
        &mut self,
        cx: &mut Context<'_, Work, N>,
    ) -> Result<(), Error> {
        let mut result = Ok(());
        let mut retry_posted = false;
        for pressed in self.button.take() {
            if !self.button_armed {
                debug!("button edge before radio init dropped");
                continue;
            }
            if pressed && !retry_posted && self.awaiting_retry() {
                info!("button pressed while idle, retrying advertising");
                retry_posted = true;
                if let Err(e) = cx.post(Work::RetryAdvertising) {
                    result = Err(e);
                }
            }
            self.snapshot.set_button(pressed);
            if let Err(e) = self
                .publisher
                .publish(Signal::Button, SignalValue::Button(pressed))
            {
                result = Err(e);
            }
        }
        result
    }

    // Advertising failed and nothing will restart it on its own.
    fn awaiting_retry(&self) -> bool {
        self.connection.is_ready() && self.connection.state() == ConnectionState::Idle
    }
}

impl<'a, R, T, M> Dispatch<Work> for SensorNode<'a, R, T, M>
where
    R: Radio,
    T: Transport,
    M: Magnetometer,
{
    fn dispatch<const N: usize>(
        &mut self,
        work: Work,
        cx: &mut Context<'_, Work, N>,
    ) -> Result<(), Error> {
        match work {
            Work::Sample => {
                let report = self.sampler.tick(&mut self.snapshot, &mut self.publisher);
                if report.publish_failures > 0 {
                    warn!("{} publishes failed this tick", report.publish_failures);
                }
                Ok(())
            }
            Work::DeliverButton => self.deliver_button(cx),
            Work::RetryAdvertising => self.connection.retry_advertising(&mut self.radio),
            Work::Radio(event) => self.on_radio_event(event, cx),
        }
    }
}
