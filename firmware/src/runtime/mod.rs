use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_sync::channel::Channel;

use link_core::config::LinkConfig;
use link_core::debounce::ButtonBank;
use link_core::monitor::SignalMonitor;
use link_core::session::SessionContext;

use crate::link::ROLE;
#[cfg(not(feature = "responder"))]
use crate::link::{Dispatcher, OutboundQueue};
#[cfg(feature = "responder")]
use {
    crate::link::{ActuationChannel, InboundQueue},
    link_core::actuator::signal::CommandedPulse,
    link_core::config::PULSE_CENTER,
};

#[cfg(feature = "responder")]
mod actuator_task;
#[cfg(not(feature = "responder"))]
mod button_task;
#[cfg(feature = "responder")]
mod ranging_task;
#[cfg(feature = "responder")]
mod servo_task;
mod status_task;
#[cfg(not(feature = "responder"))]
mod transmit_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

const CONFIG: LinkConfig = LinkConfig::new();

static SESSION: SessionContext = SessionContext::for_role(ROLE);
static MONITOR: SignalMonitor = SignalMonitor::new(ROLE);
static BUTTONS: ButtonBank = ButtonBank::new();

#[cfg(not(feature = "responder"))]
static DISPATCHER: Dispatcher = Dispatcher::new();
/// Payloads for the UWB session driver to attach to its next exchange.
#[cfg(not(feature = "responder"))]
pub static OUTBOUND: OutboundQueue = Channel::new();

#[cfg(feature = "responder")]
static ACTUATION: ActuationChannel = Channel::new();
#[cfg(feature = "responder")]
static COMMANDED_PULSE: CommandedPulse = CommandedPulse::new(PULSE_CENTER);
/// Ranging reports delivered by the UWB session driver.
#[cfg(feature = "responder")]
pub static INBOUND: InboundQueue = Channel::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let peripherals = hal::init(hal::Config::default());
    SESSION.log_startup();

    #[cfg(not(feature = "responder"))]
    start_initiator(spawner, peripherals);
    #[cfg(feature = "responder")]
    start_responder(spawner, peripherals);

    if spawner
        .spawn(status_task::run(&MONITOR, &BUTTONS, CONFIG.admission))
        .is_err()
    {
        defmt::error!("runtime: status task failed to start");
    }

    core::future::pending::<()>().await;
}

#[cfg(not(feature = "responder"))]
fn start_initiator(spawner: Spawner, peripherals: hal::Peripherals) {
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::Pull;
    use link_core::debounce::InputDebouncer;
    use link_core::dispatch::PressNotifier;
    use link_core::transmit::TransmitWorker;

    use crate::hw::buttons::ButtonPins;
    use crate::link::ChannelRangingLink;
    use crate::status;

    let hal::Peripherals {
        PA0, PA1, EXTI0, EXTI1, ..
    } = peripherals;

    let pins = ButtonPins::new(
        ExtiInput::new(PA0, EXTI0, Pull::Up),
        ExtiInput::new(PA1, EXTI1, Pull::Up),
    );
    let mut debouncer = InputDebouncer::new(&BUTTONS, pins, CONFIG.debounce);
    debouncer.register_observer(PressNotifier::new(&DISPATCHER, &MONITOR));
    status::record_input_inert(debouncer.is_inert());

    if spawner.spawn(button_task::run(debouncer, &BUTTONS)).is_err() {
        defmt::error!("runtime: button task failed to start, input inert");
        status::record_input_inert(true);
    }

    let worker = TransmitWorker::new(
        SESSION,
        ChannelRangingLink::new(OUTBOUND.sender()),
        &DISPATCHER,
        &MONITOR,
    );
    if spawner
        .spawn(transmit_task::run(worker, CONFIG.burst_window))
        .is_err()
    {
        defmt::error!("runtime: transmit task failed to start");
    }
}

#[cfg(feature = "responder")]
fn start_responder(spawner: Spawner, peripherals: hal::Peripherals) {
    use embassy_stm32::gpio::{Level, Output, Speed};
    use link_core::actuator::ActuatorController;
    use link_core::gate::ReceiveGate;

    use crate::hw::indicator::LedBank;
    use crate::link::FirmwareInstant;
    use crate::status;

    let hal::Peripherals {
        PA8, PB3, PB4, PB5, PB6, ..
    } = peripherals;

    let leds = LedBank::new([
        Output::new(PB3, Level::High, Speed::Low),
        Output::new(PB4, Level::High, Speed::Low),
        Output::new(PB5, Level::High, Speed::Low),
        Output::new(PB6, Level::High, Speed::Low),
    ]);
    let servo_pin = Output::new(PA8, Level::Low, Speed::High);

    let mut controller = ActuatorController::new(&COMMANDED_PULSE, leds, CONFIG.actuator);
    if controller.init().is_err() {
        defmt::error!("runtime: servo output unavailable");
    }

    if spawner
        .spawn(servo_task::run(servo_pin, &COMMANDED_PULSE, CONFIG.actuator))
        .is_err()
    {
        defmt::error!("runtime: servo signal task failed to start");
    }

    let now = FirmwareInstant::now();
    status::record_actuator(&controller.status(now), now);
    if spawner
        .spawn(actuator_task::run(controller, ACTUATION.receiver()))
        .is_err()
    {
        defmt::error!("runtime: actuator task failed to start");
    }

    let gate = ReceiveGate::new(SESSION, CONFIG.admission, ACTUATION.sender(), &MONITOR);
    if spawner
        .spawn(ranging_task::run(gate, INBOUND.receiver()))
        .is_err()
    {
        defmt::error!("runtime: ranging task failed to start, triggers ignored");
    }
}
