use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::{Path, PathBuf};
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use link_core::actuator::signal::{CommandedPulse, PulseFrame, PulseTrain};
use link_core::actuator::{
    ACTUATION_QUEUE_DEPTH, ActuationQueue, ActuationSink, ActuatorCommand, ActuatorController,
    ActuatorState, Indicator, PulseWidth,
};
use link_core::config::{AdmissionPolicy, LinkConfig, PULSE_CENTER};
use link_core::debounce::{
    ALL_BUTTONS, BUTTON_COUNT, ButtonBank, ButtonId, DigitalInput, InputDebouncer,
};
use link_core::dispatch::{EventDispatcher, PressNotifier};
use link_core::gate::{GateRejection, GateVerdict, ReceiveGate, ReportOutcome};
use link_core::monitor::SignalMonitor;
use link_core::monitor::status::{InitiatorStatus, ResponderStatus, RoleStatus, StatusSnapshot};
use link_core::ranging::{
    MeasurementStatus, RangingLink, RangingMeasurement, RangingReport, SendError,
};
use link_core::session::{Role, SessionContext};
use link_core::time::LinkInstant;
use link_core::transmit::{BurstWindow, TransmitWorker};

use crate::command::{self, Command};

/// Simulation step.
const TICK: Duration = Duration::from_millis(1);
/// Interval between ranging exchanges while a burst is active.
const EXCHANGE_INTERVAL: Duration = Duration::from_millis(20);
/// Exchanges each outbound payload is attached to.
const PAYLOAD_REPEATS: u32 = 3;
const SIM_DISTANCE_CM: i32 = 120;
/// How long `press` holds a button before releasing it.
const PRESS_HOLD: Duration = Duration::from_millis(80);
/// Quiet time simulated after every button command.
const SETTLE: Duration = Duration::from_millis(200);
/// Level changes of a bouncing contact, 2 ms apart.
const BOUNCE_EDGES: u32 = 6;
const BOUNCE_EDGE_INTERVAL: Duration = Duration::from_millis(2);
/// Longest `tick` accepted in one command.
const MAX_TICK: Duration = Duration::from_secs(600);

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "press",
        "press [sw1|sw2]          - press a button and release it after 80ms",
    ),
    (
        "bounce",
        "bounce [sw1|sw2]         - press with contact chatter before settling",
    ),
    (
        "tick",
        "tick <n>[ms|s]           - advance simulated time",
    ),
    (
        "loss",
        "loss <n>                 - drop every n-th ranging exchange (0 = none)",
    ),
    (
        "servo",
        "servo <us>               - move the responder servo to a pulse width",
    ),
    ("neutral", "neutral                  - return the servo to center"),
    (
        "status",
        "status [initiator|responder] - print the signal status report",
    ),
    ("help", "help [topic]             - show help for a command"),
];

/// Monotonic simulated time in microseconds.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    pub fn as_duration(self) -> Duration {
        Duration::from_micros(self.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl LinkInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// Start-up options taken from the command line.
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub policy: AdmissionPolicy,
    pub loss_every: u32,
    pub transcript_path: Option<PathBuf>,
}

/// State shared between the simulated devices.
pub struct Bench {
    buttons: ButtonBank,
    dispatcher: EventDispatcher<NoopRawMutex>,
    actuation: ActuationQueue<NoopRawMutex>,
    initiator_monitor: SignalMonitor,
    responder_monitor: SignalMonitor,
    commanded: CommandedPulse,
    indicator: Cell<bool>,
}

impl Bench {
    pub fn new() -> Self {
        Self {
            buttons: ButtonBank::new(),
            dispatcher: EventDispatcher::new(),
            actuation: Channel::new(),
            initiator_monitor: SignalMonitor::new(Role::Initiator),
            responder_monitor: SignalMonitor::new(Role::Responder),
            commanded: CommandedPulse::new(PULSE_CENTER),
            indicator: Cell::new(false),
        }
    }
}

impl Default for Bench {
    fn default() -> Self {
        Self::new()
    }
}

/// Button levels as seen by the initiator's debouncer.
#[derive(Default)]
struct SimButtons {
    levels: [bool; BUTTON_COUNT],
}

impl DigitalInput for SimButtons {
    fn read_digital(&mut self, button: ButtonId) -> bool {
        self.levels[button.as_index()]
    }
}

/// Opportunistic payload slot of the simulated ranging session.
#[derive(Default)]
struct SimRadio {
    outbound: VecDeque<Vec<u8>>,
    in_flight: Option<(Vec<u8>, u32)>,
}

impl SimRadio {
    /// Payload for the next exchange, if any.
    fn next_payload(&mut self) -> Option<Vec<u8>> {
        if self.in_flight.is_none() {
            self.in_flight = self
                .outbound
                .pop_front()
                .map(|bytes| (bytes, PAYLOAD_REPEATS));
        }

        let (bytes, left) = self.in_flight.as_mut()?;
        let payload = bytes.clone();
        *left -= 1;
        if *left == 0 {
            self.in_flight = None;
        }
        Some(payload)
    }
}

impl RangingLink for SimRadio {
    fn send_opportunistic(&mut self, _session_id: u32, payload: &[u8]) -> Result<(), SendError> {
        self.outbound.push_back(payload.to_vec());
        Ok(())
    }
}

struct SimIndicator<'a>(&'a Cell<bool>);

impl Indicator for SimIndicator<'_> {
    fn set_indicator(&mut self, on: bool) {
        self.0.set(on);
    }
}

type Debouncer<'a> = InputDebouncer<'a, SimButtons, PressNotifier<'a, NoopRawMutex>>;
type Worker<'a> = TransmitWorker<'a, SimRadio, NoopRawMutex>;
type Gate<'a> = ReceiveGate<
    'a,
    Sender<'a, NoopRawMutex, ActuatorCommand, ACTUATION_QUEUE_DEPTH>,
    SimInstant,
>;
type Controller<'a> = ActuatorController<&'a CommandedPulse, SimIndicator<'a>, SimInstant>;

/// An initiator and a responder joined by a simulated ranging link.
pub struct Session<'a> {
    bench: &'a Bench,
    config: LinkConfig,
    loss_every: u32,
    now: SimInstant,
    next_scan: SimInstant,
    next_exchange: SimInstant,
    next_frame: SimInstant,
    block: u32,
    debouncer: Debouncer<'a>,
    worker: Worker<'a>,
    burst: BurstWindow<SimInstant>,
    gate: Gate<'a>,
    commands: Receiver<'a, NoopRawMutex, ActuatorCommand, ACTUATION_QUEUE_DEPTH>,
    controller: Controller<'a>,
    train: PulseTrain<'a>,
    last_frame: Option<PulseFrame>,
    seen_pressed: [bool; BUTTON_COUNT],
    seen_state: ActuatorState,
    seen_indicator: bool,
    transcript: Transcript,
}

impl<'a> Session<'a> {
    pub fn new(bench: &'a Bench, options: &SessionOptions, transcript: Transcript) -> Self {
        let config = LinkConfig {
            admission: options.policy,
            ..LinkConfig::new()
        };

        let mut debouncer =
            InputDebouncer::new(&bench.buttons, SimButtons::default(), config.debounce);
        debouncer.register_observer(PressNotifier::new(
            &bench.dispatcher,
            &bench.initiator_monitor,
        ));

        let worker = TransmitWorker::new(
            SessionContext::initiator(),
            SimRadio::default(),
            &bench.dispatcher,
            &bench.initiator_monitor,
        );
        let gate = ReceiveGate::new(
            SessionContext::responder(),
            config.admission,
            bench.actuation.sender(),
            &bench.responder_monitor,
        );

        let mut controller = ActuatorController::new(
            &bench.commanded,
            SimIndicator(&bench.indicator),
            config.actuator,
        );
        let ready = controller.init().is_ok();

        let mut session = Self {
            bench,
            config,
            loss_every: options.loss_every,
            now: SimInstant::default(),
            next_scan: SimInstant::default() + config.debounce.scan_period,
            next_exchange: SimInstant::default(),
            next_frame: SimInstant::default(),
            block: 0,
            debouncer,
            worker,
            burst: BurstWindow::new(config.burst_window),
            gate,
            commands: bench.actuation.receiver(),
            controller,
            train: PulseTrain::new(&bench.commanded, config.actuator),
            last_frame: None,
            seen_pressed: [false; BUTTON_COUNT],
            seen_state: ActuatorState::Neutral,
            seen_indicator: false,
            transcript,
        };

        for context in [SessionContext::initiator(), SessionContext::responder()] {
            session.note(
                context.role,
                &format!(
                    "UWB session {} up as {} addr={:#06x} peer={:#06x}",
                    context.session_id,
                    context.role.title(),
                    context.short_addr,
                    context.peer_addr
                ),
            );
        }
        let servo = if ready { "servo centered" } else { "servo unavailable" };
        session.note(Role::Responder, &format!("{servo}, policy {}", config.admission.name()));
        session
    }

    /// Runs one console line and returns the reply lines, device narration included.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let at = self.now.as_duration();
        self.transcript.append(at, TranscriptSource::Host, trimmed);
        let mark = self.transcript.len();

        let command = match command::parse(trimmed) {
            Ok(command) => command,
            Err(err) => {
                return self.reply(vec![format!("ERR syntax {err}")]);
            }
        };

        match command {
            Command::Press { button } => {
                self.set_level(button, true);
                self.advance(PRESS_HOLD);
                self.set_level(button, false);
                self.advance(SETTLE);
            }
            Command::Bounce { button } => {
                for edge in 0..BOUNCE_EDGES {
                    self.set_level(button, edge % 2 == 0);
                    self.advance(BOUNCE_EDGE_INTERVAL);
                }
                self.set_level(button, true);
                self.advance(PRESS_HOLD);
                self.set_level(button, false);
                self.advance(SETTLE);
            }
            Command::Tick(duration) => {
                if duration > MAX_TICK {
                    return self.reply(vec![format!(
                        "ERR tick limited to {}s",
                        MAX_TICK.as_secs()
                    )]);
                }
                self.advance(duration);
            }
            Command::Loss(every) => {
                self.loss_every = every;
                let line = match every {
                    0 => "OK loss disabled".to_string(),
                    n => format!("OK dropping every {n} exchange(s)"),
                };
                return self.reply(vec![line]);
            }
            Command::Servo(micros) => {
                self.local_command(ActuatorCommand::SetPosition(PulseWidth::from_micros(micros)));
            }
            Command::Neutral => self.local_command(ActuatorCommand::ReturnToNeutral),
            Command::Status(role) => {
                let lines = self.status_lines(role);
                return self.reply(lines);
            }
            Command::Help { topic } => return self.reply(help_lines(topic)),
        }

        self.transcript.flush()?;
        Ok(self.transcript.since(mark).to_vec())
    }

    fn reply(&mut self, lines: Vec<String>) -> io::Result<Vec<String>> {
        let at = self.now.as_duration();
        for line in &lines {
            self.transcript.append(at, TranscriptSource::Emulator, line);
        }
        self.transcript.flush()?;
        Ok(lines)
    }

    /// Transcript line attributed to one of the simulated devices.
    fn note(&mut self, role: Role, text: &str) {
        let at = self.now.as_duration();
        self.transcript.append(at, TranscriptSource::Device(role), text);
    }

    fn set_level(&mut self, button: ButtonId, pressed: bool) {
        let levels = &mut self.debouncer.input_mut().levels;
        if levels[button.as_index()] != pressed {
            levels[button.as_index()] = pressed;
            self.bench.buttons.note_edge(button);
        }
    }

    fn local_command(&mut self, command: ActuatorCommand) {
        let mut sender = self.bench.actuation.sender();
        if let Err(err) = sender.try_enqueue(command) {
            self.note(Role::Responder, &format!("command refused: {err}"));
            return;
        }
        self.advance(TICK);
    }

    fn advance(&mut self, duration: Duration) {
        let until = self.now + duration;
        while self.now < until {
            self.now = self.now + TICK;
            self.step();
        }
    }

    fn step(&mut self) {
        let now = self.now;

        if now >= self.next_scan {
            self.next_scan = self.next_scan + self.config.debounce.scan_period;
            self.debouncer.scan();
            self.narrate_buttons();

            while let Some((event, result)) = self.worker.poll() {
                self.burst.open(now);
                let outcome = match result {
                    Ok(()) => "queued".to_string(),
                    Err(err) => format!("failed ({err})"),
                };
                self.note(
                    Role::Initiator,
                    &format!(
                        "press #{} from {} payload {:02x?} {outcome}",
                        event.counter,
                        event.button,
                        event.payload()
                    ),
                );
            }
        }

        if self.burst.is_open(now) && now >= self.next_exchange {
            self.next_exchange = now + EXCHANGE_INTERVAL;
            self.exchange();
        }

        self.controller.service(&mut self.commands, now);
        self.narrate_actuator();

        if now >= self.next_frame {
            let frame = self.train.next_frame();
            self.next_frame = self.next_frame + frame.high + frame.low;
            self.last_frame = Some(frame);
        }
    }

    fn exchange(&mut self) {
        self.block = self.block.wrapping_add(1);
        let lost = self.loss_every != 0 && self.block % self.loss_every == 0;
        let payload = self.worker.link_mut().next_payload();

        let initiator = SessionContext::initiator();
        let measurement = if lost {
            RangingMeasurement::new(initiator.short_addr, MeasurementStatus::RxTimeout)
        } else {
            let measurement = RangingMeasurement::new(initiator.short_addr, MeasurementStatus::Ok)
                .with_distance(SIM_DISTANCE_CM);
            match payload.as_deref() {
                Some(bytes) => measurement.with_payload(bytes),
                None => measurement,
            }
        };

        let mut report = RangingReport::new(self.block);
        if report.push(measurement).is_err() {
            return;
        }

        let outcome = self.gate.on_ranging_report(&report, self.now);
        if lost && payload.is_some() {
            self.note(
                Role::Responder,
                &format!("block {} lost with payload attached", self.block),
            );
        }
        if let ReportOutcome::Processed {
            verdict: Some(verdict),
            ..
        } = outcome
        {
            if let Some(line) = describe_verdict(verdict) {
                self.note(Role::Responder, &format!("block {} {line}", self.block));
            }
        }
    }

    fn narrate_buttons(&mut self) {
        for button in ALL_BUTTONS {
            let pressed = self.debouncer.is_pressed(button);
            if pressed != self.seen_pressed[button.as_index()] {
                self.seen_pressed[button.as_index()] = pressed;
                let edge = if pressed { "pressed" } else { "released" };
                self.note(Role::Initiator, &format!("{button} {edge}"));
            }
        }
    }

    fn narrate_actuator(&mut self) {
        let state = self.controller.state();
        if state != self.seen_state {
            self.seen_state = state;
            let pulse = self.controller.pulse();
            self.note(Role::Responder, &format!("servo {} {pulse}", state.label()));
        }

        let lit = self.bench.indicator.get();
        if lit != self.seen_indicator {
            self.seen_indicator = lit;
            let level = if lit { "on" } else { "off" };
            self.note(Role::Responder, &format!("indicator {level}"));
        }
    }

    fn status_lines(&self, role: Option<Role>) -> Vec<String> {
        let roles: &[Role] = match role {
            Some(Role::Initiator) => &[Role::Initiator],
            Some(Role::Responder) => &[Role::Responder],
            None => &[Role::Initiator, Role::Responder],
        };

        let mut text = String::new();
        for role in roles {
            // Writing into a String cannot fail.
            let _ = self.snapshot(*role).render(&mut text);
        }
        if let Some(frame) = self.last_frame {
            let _ = writeln!(
                text,
                "signal high={}us low={}us frames={}",
                frame.high.as_micros(),
                frame.low.as_micros(),
                self.train.frames()
            );
        }
        text.lines().map(str::to_string).collect()
    }

    fn snapshot(&self, role: Role) -> StatusSnapshot {
        match role {
            Role::Initiator => {
                let counters = self.bench.initiator_monitor.counters();
                let mut pressed = [false; BUTTON_COUNT];
                for button in ALL_BUTTONS {
                    pressed[button.as_index()] = self.debouncer.is_pressed(button);
                }
                StatusSnapshot::new(role, counters).with_detail(RoleStatus::Initiator(
                    InitiatorStatus {
                        input_inert: self.debouncer.is_inert(),
                        pressed,
                        press_counter: self.worker.last_sent().unwrap_or(0),
                        burst_remaining: self.burst.remaining(self.now),
                    },
                ))
            }
            Role::Responder => {
                let counters = self.bench.responder_monitor.counters();
                StatusSnapshot::new(role, counters).with_detail(RoleStatus::Responder(
                    ResponderStatus {
                        actuator: self.controller.status(self.now),
                        policy: self.gate.policy(),
                        last_counter: self.gate.last_counter(),
                    },
                ))
            }
        }
    }
}

fn describe_verdict(verdict: GateVerdict) -> Option<String> {
    let line = match verdict {
        GateVerdict::Admitted { counter } => format!("press #{counter} admitted"),
        GateVerdict::Rejected(GateRejection::Duplicate { counter }) => {
            format!("press #{counter} duplicate")
        }
        GateVerdict::Rejected(rejection) => format!("rejected: {rejection}"),
        GateVerdict::Dropped { counter } => format!("press #{counter} dropped, queue full"),
        GateVerdict::Discarded(err) => format!("payload discarded: {err}"),
        GateVerdict::PeerMismatch { peer_addr } => format!("ignored peer {peer_addr:#06x}"),
        GateVerdict::NoPayload => return None,
    };
    Some(line)
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone, Copy)]
enum TranscriptSource {
    Host,
    Emulator,
    Device(Role),
}

impl TranscriptSource {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptSource::Host => "HOST>",
            TranscriptSource::Emulator => "EMU <",
            TranscriptSource::Device(role) => role.tag(),
        }
    }
}

/// Timestamped session log, optionally mirrored to a writer.
///
/// The in-memory copy is always kept. The first mirror write error is held
/// back and returned by the next [`Transcript::flush`].
pub struct Transcript {
    lines: Vec<String>,
    writer: Option<Box<dyn Write>>,
    deferred: Option<io::Error>,
}

impl Transcript {
    pub fn in_memory() -> Self {
        Self {
            lines: Vec::new(),
            writer: None,
            deferred: None,
        }
    }

    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        Self {
            lines: Vec::new(),
            writer: Some(writer),
            deferred: None,
        }
    }

    pub fn with_file(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# UWB link emulator transcript")?;
        writeln!(writer, "# Timestamps are simulated milliseconds since reset")?;
        writeln!(writer)?;
        writer.flush()?;

        Ok(Self::with_writer(Box::new(writer)))
    }

    fn append(&mut self, at: Duration, source: TranscriptSource, text: &str) {
        let line = format!("[+{:>6} ms] {} {}", at.as_millis(), source.prefix(), text);
        let written = match self.writer.as_mut() {
            Some(writer) => writeln!(writer, "{line}"),
            None => Ok(()),
        };
        if let Err(err) = written {
            self.deferred.get_or_insert(err);
        }
        self.lines.push(line);
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    #[cfg(test)]
    fn lines(&self) -> &[String] {
        &self.lines
    }

    fn since(&self, mark: usize) -> &[String] {
        self.lines.get(mark..).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(session: &mut Session<'_>, line: &str) -> Vec<String> {
        session.handle_command(line).expect("command")
    }

    fn session<'a>(bench: &'a Bench, options: &SessionOptions) -> Session<'a> {
        Session::new(bench, options, Transcript::in_memory())
    }

    #[test]
    fn press_reaches_servo() {
        let bench = Bench::new();
        let mut session = session(&bench, &SessionOptions::default());

        let lines = run(&mut session, "press");
        assert!(lines.iter().any(|line| line.contains("SW1 pressed")));
        assert!(lines.iter().any(|line| line.contains("press #1 admitted")));
        assert!(lines.iter().any(|line| line.contains("servo at-min 1100us")));
        assert_eq!(session.controller.state(), ActuatorState::AtMin);

        run(&mut session, "press sw2");
        assert_eq!(session.controller.state(), ActuatorState::AtMax);
        assert_eq!(bench.commanded.load(), PulseWidth::from_micros(1_650));
    }

    #[test]
    fn bounce_counts_as_one_press() {
        let bench = Bench::new();
        let mut session = session(&bench, &SessionOptions::default());

        run(&mut session, "bounce");
        run(&mut session, "tick 1s");
        assert_eq!(bench.initiator_monitor.counters().tx_packets, 1);
        assert_eq!(bench.responder_monitor.counters().trigger_admitted, 1);
    }

    #[test]
    fn indicator_flashes_after_admission() {
        let bench = Bench::new();
        let mut session = session(&bench, &SessionOptions::default());

        run(&mut session, "press");
        run(&mut session, "tick 1s");
        let flashes = session
            .transcript
            .lines()
            .iter()
            .filter(|line| line.ends_with("indicator on"))
            .count();
        assert_eq!(flashes, 3);
        assert!(!bench.indicator.get());
    }

    #[test]
    fn lost_exchanges_are_reported() {
        let bench = Bench::new();
        let options = SessionOptions {
            loss_every: 2,
            ..SessionOptions::default()
        };
        let mut session = session(&bench, &options);

        run(&mut session, "press");
        run(&mut session, "tick 500ms");
        let rx = bench.responder_monitor.counters();
        assert!(rx.rx_timeout > 0);
        assert_eq!(rx.trigger_admitted, 1);
    }

    #[test]
    fn direct_position_times_out_to_neutral() {
        let bench = Bench::new();
        let mut session = session(&bench, &SessionOptions::default());

        run(&mut session, "servo 2500");
        assert_eq!(session.controller.pulse(), PulseWidth::from_micros(2_000));
        run(&mut session, "tick 2500ms");
        assert_eq!(session.controller.state(), ActuatorState::Neutral);
    }

    #[test]
    fn status_renders_both_roles() {
        let bench = Bench::new();
        let mut session = session(&bench, &SessionOptions::default());

        run(&mut session, "press");
        let lines = run(&mut session, "status");
        assert!(lines.iter().any(|line| line == "INITIATOR ROLE STATISTICS:"));
        assert!(lines.iter().any(|line| line == "RESPONDER ROLE STATISTICS:"));
        assert!(lines.iter().any(|line| line.starts_with("signal high=")));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let bench = Bench::new();
        let mut session = session(&bench, &SessionOptions::default());

        let lines = run(&mut session, "press sw9");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR syntax"));
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transcript_keeps_lines_when_mirror_fails() {
        let mut transcript = Transcript::with_writer(Box::new(FailingWriter));
        transcript.append(Duration::ZERO, TranscriptSource::Host, "press");
        transcript.append(
            Duration::from_millis(40),
            TranscriptSource::Device(Role::Initiator),
            "SW1 pressed",
        );

        assert_eq!(transcript.len(), 2);
        assert!(transcript.lines()[1].ends_with("SW1 pressed"));
        let err = transcript.flush().expect_err("deferred write error");
        assert_eq!(err.to_string(), "disk full");
        assert!(transcript.flush().is_ok());
    }

    #[test]
    fn mirror_failure_surfaces_from_command() {
        let bench = Bench::new();
        let mut session = Session::new(
            &bench,
            &SessionOptions::default(),
            Transcript::with_writer(Box::new(FailingWriter)),
        );

        assert!(session.handle_command("press").is_err());
        assert!(
            session
                .transcript
                .lines()
                .iter()
                .any(|line| line.contains("press #1 admitted"))
        );
    }
}
