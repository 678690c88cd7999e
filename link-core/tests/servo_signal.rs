use core::ops::Add;
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;

use link_core::actuator::signal::{CommandedPulse, PulseTrain};
use link_core::actuator::{
    ActuationQueue, ActuationSink, ActuatorCommand, ActuatorController, ActuatorState, Indicator,
    PulseWidth,
};
use link_core::config::{ActuatorConfig, PULSE_CENTER};
use link_core::time::LinkInstant;

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

#[derive(Default)]
struct CountingIndicator {
    rising_edges: u32,
    lit: bool,
}

impl Indicator for &mut CountingIndicator {
    fn set_indicator(&mut self, lit: bool) {
        if lit && !self.lit {
            self.rising_edges += 1;
        }
        self.lit = lit;
    }
}

fn high_time(train: &mut PulseTrain<'_>) -> u128 {
    train.next_frame().high.as_micros()
}

#[test]
fn pulse_train_tracks_controller_through_a_full_cycle() {
    let commanded = CommandedPulse::new(PULSE_CENTER);
    let mut indicator = CountingIndicator::default();
    let queue: ActuationQueue<NoopRawMutex> = Channel::new();
    let mut sender = queue.sender();
    let mut receiver = queue.receiver();

    let mut controller =
        ActuatorController::new(&commanded, &mut indicator, ActuatorConfig::new());
    controller.init().expect("servo init");
    let mut train = PulseTrain::new(&commanded, ActuatorConfig::new());
    assert_eq!(high_time(&mut train), 1_500);

    sender
        .try_enqueue(ActuatorCommand::Toggle { counter: 1 })
        .expect("queue slot");
    controller.service(&mut receiver, MockInstant::millis(0));
    assert_eq!(high_time(&mut train), 1_100);

    for ms in (20..=3_000).step_by(20) {
        controller.service(&mut receiver, MockInstant::millis(ms));
        assert_eq!(high_time(&mut train), 1_100, "toggle must hold at {ms}ms");
    }

    sender
        .try_enqueue(ActuatorCommand::SetPosition(PulseWidth::from_micros(1_900)))
        .expect("queue slot");
    controller.service(&mut receiver, MockInstant::millis(3_000));
    assert_eq!(high_time(&mut train), 1_900);

    controller.service(&mut receiver, MockInstant::millis(4_999));
    assert_eq!(controller.state(), ActuatorState::Holding(PulseWidth::from_micros(1_900)));
    controller.service(&mut receiver, MockInstant::millis(5_000));
    assert_eq!(high_time(&mut train), 1_500);
    assert_eq!(controller.state(), ActuatorState::Neutral);

    drop(controller);
    assert_eq!(indicator.rising_edges, 3);
    assert!(!indicator.lit);
}

#[test]
fn neutral_timer_wakeups_follow_next_deadline() {
    let commanded = CommandedPulse::new(PULSE_CENTER);
    let mut indicator = CountingIndicator::default();
    let mut controller =
        ActuatorController::new(&commanded, &mut indicator, ActuatorConfig::new());
    controller.init().expect("servo init");

    assert_eq!(controller.next_deadline(), None);
    controller.set_position(PulseWidth::from_micros(1_250), MockInstant::millis(100));

    let mut wakeups = 0;
    let mut returned = 0;
    while let Some(deadline) = controller.next_deadline() {
        wakeups += 1;
        if controller.poll(deadline) {
            returned += 1;
        }
    }

    assert_eq!(wakeups, 1);
    assert_eq!(returned, 1);
    assert_eq!(commanded.load(), PULSE_CENTER);
}

#[test]
fn frames_keep_fixed_period() {
    let commanded = CommandedPulse::new(PulseWidth::from_micros(1_650));
    let mut train = PulseTrain::new(&commanded, ActuatorConfig::new());

    for _ in 0..120 {
        let frame = train.next_frame();
        assert_eq!(frame.high + frame.low, Duration::from_millis(20));
    }
    assert_eq!(train.frames(), 120);
}
