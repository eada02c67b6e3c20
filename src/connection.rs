//! Connection / advertising state machine.
//!
//! ```text
//!            InitComplete(Ok)              Connected(Ok)
//!   Idle ───────────────────► Advertising ──────────────► Connected
//!    ▲  (start_advertising)        ▲                          │
//!    │                             └──────────────────────────┤ Disconnected
//!    │                               restart_advertising Ok   │
//!    └────────────────────────────────────────────────────────┘
//!      restart_advertising Err, or AdvertisingFailed while Advertising
//!                  (retry_advertising to recover)
//! ```
//!
//! Radio lifecycle callbacks arrive as [`RadioEvent`] values dispatched by
//! the scheduler, so every transition runs on the run-loop thread.

use crate::ble::adv_builder::{node_advertising_data, AdvertisingData};
use crate::error::{Error, RadioError};

/// Link state of the single peripheral connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Idle,
    Advertising,
    Connected,
}

/// Lifecycle callbacks from the radio stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// Stack initialisation finished.
    InitComplete(Result<(), RadioError>),
    /// A central connected (or the attempt failed).
    Connected(Result<(), RadioError>),
    /// The central disconnected.
    Disconnected,
    /// Advertising that was accepted earlier stopped or never came up.
    AdvertisingFailed(RadioError),
}

/// Advertising control exposed by the radio stack.
pub trait Radio {
    /// Apply advertising parameters and `data`, then start advertising.
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), RadioError>;

    /// Start advertising again with the previously applied configuration.
    fn restart_advertising(&mut self) -> Result<(), RadioError>;
}

impl<R: Radio + ?Sized> Radio for &mut R {
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), RadioError> {
        (**self).start_advertising(data)
    }

    fn restart_advertising(&mut self) -> Result<(), RadioError> {
        (**self).restart_advertising()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Stack {
    Pending,
    Ready,
    Halted,
}

pub struct ConnectionStateMachine {
    state: ConnectionState,
    stack: Stack,
}

impl ConnectionStateMachine {
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            stack: Stack::Pending,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Radio initialisation succeeded.
    pub fn is_ready(&self) -> bool {
        self.stack == Stack::Ready
    }

    /// Radio initialisation failed; no further transitions happen.
    pub fn is_halted(&self) -> bool {
        self.stack == Stack::Halted
    }

    /// Apply one lifecycle event. Failures are returned for the caller to
    /// report; the resulting state is already settled when this returns.
    pub fn handle<R: Radio>(&mut self, event: RadioEvent, radio: &mut R) -> Result<(), Error> {
        if self.is_halted() {
            debug!("radio halted, ignoring {}", event);
            return Ok(());
        }

        match event {
            RadioEvent::InitComplete(Ok(())) => {
                if self.is_ready() {
                    warn!("duplicate init-complete ignored");
                    return Ok(());
                }
                self.stack = Stack::Ready;
                info!("radio ready");
                self.start_advertising(radio)
            }
            RadioEvent::InitComplete(Err(e)) => {
                self.stack = Stack::Halted;
                Err(e.into())
            }
            _ if !self.is_ready() => {
                warn!("{} before radio init, ignored", event);
                Ok(())
            }
            RadioEvent::Connected(Ok(())) => match self.state {
                ConnectionState::Advertising => {
                    info!("client connected, you may now subscribe to updates");
                    self.state = ConnectionState::Connected;
                    Ok(())
                }
                state => {
                    warn!("connection while {}, ignored", state);
                    Ok(())
                }
            },
            RadioEvent::Connected(Err(e)) => Err(e.into()),
            RadioEvent::Disconnected => match self.state {
                ConnectionState::Connected => {
                    info!("client disconnected, restarting advertising");
                    match radio.restart_advertising() {
                        Ok(()) => {
                            self.state = ConnectionState::Advertising;
                            Ok(())
                        }
                        Err(e) => {
                            self.state = ConnectionState::Idle;
                            Err(e.into())
                        }
                    }
                }
                state => {
                    warn!("disconnection while {}, ignored", state);
                    Ok(())
                }
            },
            RadioEvent::AdvertisingFailed(e) => match self.state {
                ConnectionState::Advertising => {
                    self.state = ConnectionState::Idle;
                    Err(e.into())
                }
                state => {
                    warn!("advertising failure while {}, ignored", state);
                    Ok(())
                }
            },
        }
    }

    /// Start advertising again after a failed (re)start left the node Idle.
    ///
    /// No-op unless the radio is ready and the node is Idle.
    pub fn retry_advertising<R: Radio>(&mut self, radio: &mut R) -> Result<(), Error> {
        if self.is_halted() {
            return Err(Error::Halted);
        }
        if !self.is_ready() || self.state != ConnectionState::Idle {
            return Ok(());
        }
        self.start_advertising(radio)
    }

    fn start_advertising<R: Radio>(&mut self, radio: &mut R) -> Result<(), Error> {
        let data = node_advertising_data()?;
        radio.start_advertising(&data)?;
        self.state = ConnectionState::Advertising;
        info!("start advertising, please connect");
        Ok(())
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
