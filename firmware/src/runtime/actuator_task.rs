use embassy_futures::select::{Either, select};
use embassy_time::Timer;
use link_core::actuator::ActuatorController;
use link_core::actuator::signal::CommandedPulse;

use crate::hw::indicator::LedBank;
use crate::link::{ActuationReceiver, FirmwareInstant};
use crate::status;

pub type Controller =
    ActuatorController<&'static CommandedPulse, LedBank<'static>, FirmwareInstant>;

/// Applies admitted commands and drives the neutral and indicator timers.
#[embassy_executor::task]
pub async fn run(mut controller: Controller, commands: ActuationReceiver<'static>) -> ! {
    loop {
        let next = controller.next_deadline();
        let deadline = async move {
            match next {
                Some(at) => Timer::at(at.into_embassy()).await,
                None => core::future::pending::<()>().await,
            }
        };

        match select(commands.receive(), deadline).await {
            Either::First(command) => {
                controller.handle(command, FirmwareInstant::now());
            }
            Either::Second(()) => {
                controller.poll(FirmwareInstant::now());
            }
        }

        let now = FirmwareInstant::now();
        status::record_actuator(&controller.status(now), now);
    }
}
