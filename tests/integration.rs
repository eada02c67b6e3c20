//! Integration tests for iot32-node host-testable logic.
//!
//! Drives a `SensorNode` through the real event queue with a simulated
//! clock, scripted radio callbacks and button edges.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use iot32_node::ble::adv_builder::{find_field, AdvertisingData, AD_TYPE_COMPLETE_NAME};
use iot32_node::{
    ButtonIrq, ChannelId, ConnectionState, EventQueue, Inbox, IrqPost, Magnetometer, Millis,
    PendingButton, Radio, RadioError, RadioEvent, SensorError, SensorNode, Timebase, Transport,
    TransportError, Work,
};

// ═══════════════════════════════════════════════════════════════════════════
// Collaborators
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum RadioCall {
    Start(Vec<u8>),
    Restart,
}

#[derive(Default)]
struct ScriptedRadio {
    calls: Vec<RadioCall>,
    fail_restart: bool,
}

impl Radio for ScriptedRadio {
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Start(data.as_bytes().to_vec()));
        Ok(())
    }

    fn restart_advertising(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Restart);
        if self.fail_restart {
            Err(RadioError::AdvertisingStart)
        } else {
            Ok(())
        }
    }
}

/// Records every characteristic update with the simulated time it happened.
#[derive(Default)]
struct Recorder {
    clock: Rc<RefCell<Millis>>,
    updates: Vec<(Millis, ChannelId, Vec<u8>)>,
}

impl Recorder {
    fn on(&self, channel: ChannelId) -> Vec<(Millis, Vec<u8>)> {
        self.updates
            .iter()
            .filter(|(_, c, _)| *c == channel)
            .map(|(t, _, b)| (*t, b.clone()))
            .collect()
    }
}

impl Transport for Recorder {
    fn update_characteristic(
        &mut self,
        channel: ChannelId,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let now = *self.clock.borrow();
        self.updates.push((now, channel, bytes.to_vec()));
        Ok(())
    }
}

/// Reports a slowly drifting field.
struct DriftingMag {
    axes: [i16; 3],
}

impl Magnetometer for DriftingMag {
    fn read_axes(&mut self) -> Result<[i16; 3], SensorError> {
        for a in &mut self.axes {
            *a += 1;
        }
        Ok(self.axes)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Simulation harness
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy)]
enum Stimulus {
    Radio(RadioEvent),
    Press,
    Release,
}

const STOP: &str = "simulation finished";

/// Clock that jumps straight to the next deadline or stimulus, and panics
/// with `STOP` once `stop_at` is reached.
struct SimClock<'a> {
    now: Rc<RefCell<Millis>>,
    stop_at: Millis,
    script: VecDeque<(Millis, Stimulus)>,
    inbox: Rc<RefCell<VecDeque<RadioEvent>>>,
    edges: ButtonIrq<'a, Work>,
}

impl SimClock<'_> {
    fn apply_due(&mut self) {
        let now = *self.now.borrow();
        while let Some(&(at, stimulus)) = self.script.front() {
            if at > now {
                break;
            }
            self.script.pop_front();
            match stimulus {
                Stimulus::Radio(event) => self.inbox.borrow_mut().push_back(event),
                Stimulus::Press => self.edges.on_rising_edge(),
                Stimulus::Release => self.edges.on_falling_edge(),
            }
        }
    }
}

impl Timebase for SimClock<'_> {
    fn now(&self) -> Millis {
        *self.now.borrow()
    }

    async fn wait_until(&mut self, deadline: Option<Millis>) {
        let next_stimulus = self.script.front().map(|(at, _)| *at);
        let next = match (deadline, next_stimulus) {
            (Some(d), Some(s)) => d.min(s),
            (Some(d), None) => d,
            (None, Some(s)) => s,
            (None, None) => self.stop_at,
        };
        if next >= self.stop_at {
            panic!("{}", STOP);
        }
        let now = next.max(*self.now.borrow());
        *self.now.borrow_mut() = now;
        self.apply_due();
    }
}

struct SharedInbox(Rc<RefCell<VecDeque<RadioEvent>>>);

impl Inbox<Work> for SharedInbox {
    fn try_next(&mut self) -> Option<Work> {
        self.0.borrow_mut().pop_front().map(Work::Radio)
    }
}

fn noop_waker() -> Waker {
    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        |_| RawWaker::new(std::ptr::null(), &VTABLE),
        |_| {},
        |_| {},
        |_| {},
    );
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}

fn block_on<F: Future>(fut: F) -> F::Output {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    let mut fut = pin!(fut);
    loop {
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return out;
        }
    }
}

fn noop() {}

type Node<'a> = SensorNode<'a, ScriptedRadio, Recorder, DriftingMag>;

/// Boot with `InitComplete(init)` at t=0, play `script`, and stop the run
/// loop at `stop_at`.
fn simulate<'b>(
    button: &'b PendingButton,
    radio: ScriptedRadio,
    init: Result<(), RadioError>,
    script: Vec<(Millis, Stimulus)>,
    stop_at: Millis,
) -> Node<'b> {
    let irq = IrqPost::new(noop);
    let now = Rc::new(RefCell::new(0));
    let inbox = Rc::new(RefCell::new(VecDeque::from([RadioEvent::InitComplete(init)])));

    let recorder = Recorder {
        clock: now.clone(),
        ..Default::default()
    };
    let mut node = SensorNode::new(radio, recorder, DriftingMag { axes: [0; 3] }, button);

    let mut clock = SimClock {
        now,
        stop_at,
        script: script.into(),
        inbox: inbox.clone(),
        edges: ButtonIrq::new(button, &irq, Work::DeliverButton),
    };
    let mut queue: EventQueue<Work, 16> = EventQueue::new();
    let mut inbox = SharedInbox(inbox);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        block_on(queue.run_forever(&irq, &mut inbox, &mut node, &mut clock));
    }));
    let payload = outcome.expect_err("run loop never returns");
    assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some(STOP));

    node
}

const HR: ChannelId = 0x2A37;
const BUTTON: ChannelId = 0xA001;
const MAG_X: ChannelId = 0xA003;
const MAG_Z: ChannelId = 0xA005;

// ═══════════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn five_seconds_of_sampling() {
    let button = PendingButton::new();
    let node = simulate(&button, ScriptedRadio::default(), Ok(()), vec![], 5_500);

    let hr = node.transport().on(HR);
    assert_eq!(
        hr,
        vec![
            (1000, vec![0x00, 101]),
            (2000, vec![0x00, 102]),
            (3000, vec![0x00, 103]),
            (4000, vec![0x00, 104]),
            (5000, vec![0x00, 105]),
        ]
    );

    let x = node.transport().on(MAG_X);
    assert_eq!(x.len(), 5);
    assert_eq!(x[4].1, 5i16.to_le_bytes());
    assert_eq!(node.transport().on(MAG_Z).len(), 5);
    assert!(node.transport().on(BUTTON).is_empty());
}

#[test]
fn boot_advertises_once_with_node_payload() {
    let button = PendingButton::new();
    let node = simulate(&button, ScriptedRadio::default(), Ok(()), vec![], 500);

    assert_eq!(node.state(), ConnectionState::Advertising);
    let [RadioCall::Start(payload)] = node.radio().calls.as_slice() else {
        panic!("expected a single start, got {:?}", node.radio().calls);
    };
    assert_eq!(find_field(payload, AD_TYPE_COMPLETE_NAME), Some(&b"IOT32"[..]));
}

#[test]
fn press_and_release_publish_in_order() {
    let button = PendingButton::new();
    let script = vec![(1500, Stimulus::Press), (1700, Stimulus::Release)];
    let node = simulate(&button, ScriptedRadio::default(), Ok(()), script, 2_500);

    assert_eq!(
        node.transport().on(BUTTON),
        vec![(1500, vec![1]), (1700, vec![0])]
    );
    assert!(!node.snapshot().button());
    // Sampling cadence is unaffected by button traffic.
    assert_eq!(node.transport().on(HR).len(), 2);
}

#[test]
fn connect_disconnect_cycle_keeps_sampling() {
    let button = PendingButton::new();
    let script = vec![
        (1200, Stimulus::Radio(RadioEvent::Connected(Ok(())))),
        (3200, Stimulus::Radio(RadioEvent::Disconnected)),
    ];
    let node = simulate(&button, ScriptedRadio::default(), Ok(()), script, 4_500);

    assert_eq!(node.state(), ConnectionState::Advertising);
    assert_eq!(node.radio().calls.len(), 2);
    assert_eq!(node.radio().calls[1], RadioCall::Restart);
    assert_eq!(node.transport().on(HR).len(), 4);
}

#[test]
fn failed_restart_goes_idle() {
    let button = PendingButton::new();
    let radio = ScriptedRadio {
        fail_restart: true,
        ..Default::default()
    };
    let script = vec![
        (100, Stimulus::Radio(RadioEvent::Connected(Ok(())))),
        (200, Stimulus::Radio(RadioEvent::Disconnected)),
    ];
    let node = simulate(&button, radio, Ok(()), script, 2_500);

    assert_eq!(node.state(), ConnectionState::Idle);
    // No automatic retry.
    assert_eq!(node.radio().calls.len(), 2);
    // Sampling carries on while idle.
    assert_eq!(node.transport().on(HR).len(), 2);
}

#[test]
fn press_after_advertising_failure_advertises_again() {
    let button = PendingButton::new();
    let script = vec![
        (
            1500,
            Stimulus::Radio(RadioEvent::AdvertisingFailed(RadioError::AdvertisingStart)),
        ),
        (2500, Stimulus::Press),
        (2600, Stimulus::Release),
    ];
    let node = simulate(&button, ScriptedRadio::default(), Ok(()), script, 4_000);

    assert_eq!(node.state(), ConnectionState::Advertising);
    let calls = &node.radio().calls;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    assert!(matches!(calls[1], RadioCall::Start(_)));
    assert_eq!(
        node.transport().on(BUTTON),
        [(2500, vec![1]), (2600, vec![0])]
    );
    assert_eq!(node.transport().on(HR).len(), 3);
}

#[test]
fn press_after_failed_restart_advertises_again() {
    let button = PendingButton::new();
    let radio = ScriptedRadio {
        fail_restart: true,
        ..Default::default()
    };
    let script = vec![
        (100, Stimulus::Radio(RadioEvent::Connected(Ok(())))),
        (200, Stimulus::Radio(RadioEvent::Disconnected)),
        (300, Stimulus::Press),
        // Already advertising, so this press changes nothing on the radio.
        (900, Stimulus::Press),
    ];
    let node = simulate(&button, radio, Ok(()), script, 1_500);

    assert_eq!(node.state(), ConnectionState::Advertising);
    let calls = &node.radio().calls;
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1], RadioCall::Restart);
    assert!(matches!(calls[2], RadioCall::Start(_)));
}

#[test]
fn init_failure_leaves_node_silent() {
    let button = PendingButton::new();
    let script = vec![(1500, Stimulus::Press), (1600, Stimulus::Release)];
    let node = simulate(
        &button,
        ScriptedRadio::default(),
        Err(RadioError::InitFailed),
        script,
        5_000,
    );

    assert!(node.connection().is_halted());
    assert_eq!(node.state(), ConnectionState::Idle);
    assert!(node.radio().calls.is_empty());
    assert!(node.transport().updates.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Manual dispatch
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn retry_after_failed_restart_resumes_advertising() {
    let irq = IrqPost::new(noop);
    let button = PendingButton::new();
    let radio = ScriptedRadio {
        fail_restart: true,
        ..Default::default()
    };
    let mut node = SensorNode::new(
        radio,
        Recorder::default(),
        DriftingMag { axes: [0; 3] },
        &button,
    );
    let mut q: EventQueue<Work, 16> = EventQueue::new();

    for event in [
        RadioEvent::InitComplete(Ok(())),
        RadioEvent::Connected(Ok(())),
        RadioEvent::Disconnected,
    ] {
        q.post(0, Work::Radio(event)).unwrap();
        q.dispatch(0, &irq, &mut node);
    }
    assert_eq!(node.state(), ConnectionState::Idle);

    q.post(10, Work::RetryAdvertising).unwrap();
    q.dispatch(10, &irq, &mut node);

    assert_eq!(node.state(), ConnectionState::Advertising);
    assert!(matches!(node.radio().calls.last(), Some(RadioCall::Start(_))));
}

#[test]
fn many_presses_between_passes_publish_latest_state() {
    let irq = IrqPost::new(noop);
    let button = PendingButton::new();
    let mut node = SensorNode::new(
        ScriptedRadio::default(),
        Recorder::default(),
        DriftingMag { axes: [0; 3] },
        &button,
    );
    let mut q: EventQueue<Work, 16> = EventQueue::new();
    q.post(0, Work::Radio(RadioEvent::InitComplete(Ok(()))))
        .unwrap();
    q.dispatch(0, &irq, &mut node);

    let edges = ButtonIrq::new(&button, &irq, Work::DeliverButton);
    for _ in 0..10 {
        edges.on_rising_edge();
        edges.on_falling_edge();
    }
    edges.on_rising_edge();
    q.dispatch(5, &irq, &mut node);

    let published: Vec<Vec<u8>> = node
        .transport()
        .on(BUTTON)
        .into_iter()
        .map(|(_, b)| b)
        .collect();
    assert_eq!(published.last(), Some(&vec![1]));
    assert!(published.len() <= 2);
    assert!(node.snapshot().button());
}
