use core::ops::Add;
use core::time::Duration;
use std::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

use link_core::actuator::{
    ACTUATION_QUEUE_DEPTH, ActuationQueue, ActuatorCommand, ActuatorController, ActuatorState,
    NoIndicator, PulseWidth, ServoOutput,
};
use link_core::config::{ActuatorConfig, AdmissionPolicy, DebounceConfig};
use link_core::debounce::{BUTTON_COUNT, ButtonBank, ButtonId, DigitalInput, InputDebouncer};
use link_core::dispatch::{EventDispatcher, PressNotifier};
use link_core::gate::ReceiveGate;
use link_core::monitor::SignalMonitor;
use link_core::ranging::{
    MeasurementStatus, RangingLink, RangingMeasurement, RangingReport, SendError,
};
use link_core::session::{Role, SessionContext};
use link_core::time::LinkInstant;
use link_core::transmit::TransmitWorker;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct MockInstant(u64);

impl MockInstant {
    fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_micros() as u64)
    }
}

impl LinkInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

struct SharedInput<'a>(&'a Cell<[bool; BUTTON_COUNT]>);

impl DigitalInput for SharedInput<'_> {
    fn read_digital(&mut self, button: ButtonId) -> bool {
        self.0.get()[button.as_index()]
    }
}

/// Payloads queued for the ranging session. Each one rides along on the
/// next `repeats` exchanges unless the exchange is lost.
#[derive(Default)]
struct Airwaves {
    outbound: RefCell<Vec<Vec<u8>>>,
    in_flight: RefCell<Option<(Vec<u8>, u32)>>,
    drop_next: Cell<u32>,
}

struct AirLink<'a>(&'a Airwaves);

impl RangingLink for AirLink<'_> {
    fn send_opportunistic(&mut self, session_id: u32, payload: &[u8]) -> Result<(), SendError> {
        assert_eq!(session_id, 42);
        self.0.outbound.borrow_mut().push(payload.to_vec());
        Ok(())
    }
}

struct RecordingServo<'a>(&'a RefCell<Vec<u16>>);

impl ServoOutput for RecordingServo<'_> {
    fn drive_signal(&mut self, pulse: PulseWidth) {
        self.0.borrow_mut().push(pulse.as_micros());
    }
}

type Notifier<'a> = PressNotifier<'a, NoopRawMutex>;
type Gate<'a> =
    ReceiveGate<'a, Sender<'a, NoopRawMutex, ActuatorCommand, ACTUATION_QUEUE_DEPTH>, MockInstant>;
type Controller<'a> = ActuatorController<RecordingServo<'a>, NoIndicator, MockInstant>;

const REPEATS: u32 = 3;
const BLOCK_MS: u64 = 20;

struct Link<'a> {
    now_ms: u64,
    block: u32,
    levels: &'a Cell<[bool; BUTTON_COUNT]>,
    air: &'a Airwaves,
    debouncer: InputDebouncer<'a, SharedInput<'a>, Notifier<'a>>,
    worker: TransmitWorker<'a, AirLink<'a>, NoopRawMutex>,
    gate: Gate<'a>,
    receiver: Receiver<'a, NoopRawMutex, ActuatorCommand, ACTUATION_QUEUE_DEPTH>,
    controller: Controller<'a>,
}

impl Link<'_> {
    fn now(&self) -> MockInstant {
        MockInstant::millis(self.now_ms)
    }

    fn set(&self, button: ButtonId, pressed: bool) {
        let mut levels = self.levels.get();
        levels[button.as_index()] = pressed;
        self.levels.set(levels);
    }

    fn run_ms(&mut self, ms: u64) {
        for _ in 0..ms {
            self.now_ms += 1;
            if self.now_ms % 5 == 0 {
                self.debouncer.scan();
                while self.worker.poll().is_some() {}
            }
            if self.now_ms % BLOCK_MS == 0 {
                self.exchange();
            }
            let now = self.now();
            self.controller.service(&mut self.receiver, now);
        }
    }

    fn exchange(&mut self) {
        self.block += 1;
        {
            let mut in_flight = self.air.in_flight.borrow_mut();
            if in_flight.is_none() {
                let mut outbound = self.air.outbound.borrow_mut();
                if !outbound.is_empty() {
                    *in_flight = Some((outbound.remove(0), REPEATS));
                }
            }
        }

        let mut measurement = RangingMeasurement::new(
            SessionContext::initiator().short_addr,
            MeasurementStatus::Ok,
        )
        .with_distance(150);

        {
            let mut in_flight = self.air.in_flight.borrow_mut();
            if let Some((bytes, left)) = in_flight.as_mut() {
                measurement = measurement.with_payload(bytes);
                *left -= 1;
                if *left == 0 {
                    *in_flight = None;
                }
            }
        }

        if self.air.drop_next.get() > 0 {
            self.air.drop_next.set(self.air.drop_next.get() - 1);
            return;
        }

        let mut report = RangingReport::new(self.block);
        report.push(measurement).expect("report capacity");
        let now = self.now();
        self.gate.on_ranging_report(&report, now);
    }

    fn press(&mut self, button: ButtonId, hold_ms: u64) {
        self.set(button, true);
        self.run_ms(hold_ms);
        self.set(button, false);
        self.run_ms(100);
    }
}

struct Fixture {
    levels: Cell<[bool; BUTTON_COUNT]>,
    air: Airwaves,
    bank: ButtonBank,
    dispatcher: EventDispatcher<NoopRawMutex>,
    queue: ActuationQueue<NoopRawMutex>,
    tx_monitor: SignalMonitor,
    rx_monitor: SignalMonitor,
    pulses: RefCell<Vec<u16>>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            levels: Cell::new([false; BUTTON_COUNT]),
            air: Airwaves::default(),
            bank: ButtonBank::new(),
            dispatcher: EventDispatcher::new(),
            queue: Channel::new(),
            tx_monitor: SignalMonitor::new(Role::Initiator),
            rx_monitor: SignalMonitor::new(Role::Responder),
            pulses: RefCell::new(Vec::new()),
        }
    }

    fn link(&self, policy: AdmissionPolicy) -> Link<'_> {
        let mut debouncer = InputDebouncer::new(
            &self.bank,
            SharedInput(&self.levels),
            DebounceConfig::new(),
        );
        debouncer.register_observer(PressNotifier::new(&self.dispatcher, &self.tx_monitor));

        let worker = TransmitWorker::new(
            SessionContext::initiator(),
            AirLink(&self.air),
            &self.dispatcher,
            &self.tx_monitor,
        );
        let gate = ReceiveGate::new(
            SessionContext::responder(),
            policy,
            self.queue.sender(),
            &self.rx_monitor,
        );
        let mut controller = ActuatorController::new(
            RecordingServo(&self.pulses),
            NoIndicator,
            ActuatorConfig::new(),
        );
        controller.init().expect("servo init");

        Link {
            now_ms: 0,
            block: 0,
            levels: &self.levels,
            air: &self.air,
            debouncer,
            worker,
            gate,
            receiver: self.queue.receiver(),
            controller,
        }
    }
}

#[test]
fn single_press_swings_to_min_and_holds() {
    let fixture = Fixture::new();
    let mut link = fixture.link(AdmissionPolicy::Dedup);

    link.press(ButtonId::Sw1, 80);
    link.run_ms(5_000);

    assert_eq!(link.controller.state(), ActuatorState::AtMin);
    assert_eq!(fixture.pulses.borrow().as_slice(), &[1_500, 1_100]);

    let tx = fixture.tx_monitor.counters();
    assert_eq!(tx.tx_packets, 1);
    assert_eq!(tx.tx_success, 1);

    let rx = fixture.rx_monitor.counters();
    assert_eq!(rx.trigger_admitted, 1);
    assert_eq!(rx.payload_duplicate, REPEATS - 1);
}

#[test]
fn presses_alternate_between_ends_of_travel() {
    let fixture = Fixture::new();
    let mut link = fixture.link(AdmissionPolicy::Dedup);

    link.press(ButtonId::Sw1, 80);
    link.press(ButtonId::Sw2, 80);
    link.press(ButtonId::Sw1, 80);

    assert_eq!(fixture.pulses.borrow().as_slice(), &[1_500, 1_100, 1_650, 1_100]);
    assert_eq!(fixture.rx_monitor.counters().trigger_admitted, 3);
}

#[test]
fn bouncing_press_actuates_once() {
    let fixture = Fixture::new();
    let mut link = fixture.link(AdmissionPolicy::Dedup);

    for level in [true, false, true, false, true, false, true] {
        link.set(ButtonId::Sw1, level);
        fixture.bank.note_edge(ButtonId::Sw1);
        link.run_ms(3);
    }
    link.run_ms(100);
    link.set(ButtonId::Sw1, false);
    link.run_ms(200);

    assert_eq!(fixture.tx_monitor.counters().tx_packets, 1);
    assert_eq!(fixture.rx_monitor.counters().trigger_admitted, 1);
    assert_eq!(link.controller.state(), ActuatorState::AtMin);
}

#[test]
fn short_glitch_is_filtered() {
    let fixture = Fixture::new();
    let mut link = fixture.link(AdmissionPolicy::Dedup);

    link.set(ButtonId::Sw2, true);
    link.run_ms(30);
    link.set(ButtonId::Sw2, false);
    link.run_ms(500);

    assert_eq!(fixture.tx_monitor.counters().tx_packets, 0);
    assert_eq!(link.controller.state(), ActuatorState::Neutral);
}

#[test]
fn lost_exchanges_do_not_actuate() {
    let fixture = Fixture::new();
    let mut link = fixture.link(AdmissionPolicy::Dedup);

    link.set(ButtonId::Sw1, true);
    link.run_ms(55);
    assert_eq!(fixture.tx_monitor.counters().tx_packets, 1);
    fixture.air.drop_next.set(REPEATS);
    link.set(ButtonId::Sw1, false);
    link.run_ms(500);

    assert_eq!(fixture.rx_monitor.counters().trigger_admitted, 0);
    assert_eq!(link.controller.state(), ActuatorState::Neutral);
}

#[test]
fn partially_lost_retransmissions_still_actuate_once() {
    let fixture = Fixture::new();
    let mut link = fixture.link(AdmissionPolicy::Dedup);

    link.set(ButtonId::Sw1, true);
    link.run_ms(50);
    fixture.air.drop_next.set(1);
    link.run_ms(30);
    link.set(ButtonId::Sw1, false);
    link.run_ms(300);

    assert_eq!(fixture.rx_monitor.counters().trigger_admitted, 1);
    assert_eq!(link.controller.state(), ActuatorState::AtMin);
}

#[test]
fn simultaneous_presses_coalesce_into_one_send() {
    let fixture = Fixture::new();
    let mut link = fixture.link(AdmissionPolicy::Dedup);

    link.set(ButtonId::Sw1, true);
    link.set(ButtonId::Sw2, true);
    link.run_ms(100);

    let tx = fixture.tx_monitor.counters();
    assert_eq!(tx.press_coalesced, 1);
    assert_eq!(tx.tx_packets, 1);
    assert_eq!(fixture.dispatcher.coalesced_count(), 1);
    assert_eq!(link.worker.last_sent(), Some(2));
    assert_eq!(link.gate.last_counter(), Some(2));
}

#[test]
fn cooldown_policy_ignores_rapid_second_press() {
    let fixture = Fixture::new();
    let mut link = fixture.link(AdmissionPolicy::cooldown());

    link.press(ButtonId::Sw1, 60);
    link.press(ButtonId::Sw1, 60);
    assert_eq!(fixture.rx_monitor.counters().trigger_admitted, 1);
    assert!(fixture.rx_monitor.counters().payload_cooling_down >= 1);

    link.run_ms(2_000);
    link.press(ButtonId::Sw1, 60);
    assert_eq!(fixture.rx_monitor.counters().trigger_admitted, 2);
    assert_eq!(link.controller.state(), ActuatorState::AtMax);
}
