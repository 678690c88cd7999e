use embassy_stm32::gpio::Output;
use embassy_time::{Instant, Timer};
use link_core::actuator::signal::{CommandedPulse, PulseTrain};
use link_core::config::ActuatorConfig;

use crate::link::to_embassy;

/// Generates the servo pulse train on `pin`.
///
/// Frame boundaries are scheduled from absolute instants so the period does
/// not drift with task latency.
#[embassy_executor::task]
pub async fn run(
    mut pin: Output<'static>,
    commanded: &'static CommandedPulse,
    config: ActuatorConfig,
) -> ! {
    let mut train = PulseTrain::new(commanded, config);
    let mut frame_start = Instant::now();

    loop {
        let frame = train.next_frame();
        pin.set_high();
        Timer::at(frame_start + to_embassy(frame.high)).await;
        pin.set_low();
        frame_start += to_embassy(frame.high + frame.low);
        Timer::at(frame_start).await;
    }
}
