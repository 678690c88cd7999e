use core::time::Duration;

use link_core::transmit::{BurstWindow, TransmitWorker};

use crate::link::{ChannelRangingLink, FirmwareInstant, LinkMutex};
use crate::status;

pub type Worker = TransmitWorker<'static, ChannelRangingLink<'static>, LinkMutex>;

#[embassy_executor::task]
pub async fn run(mut worker: Worker, burst_length: Duration) -> ! {
    let mut burst = BurstWindow::new(burst_length);

    loop {
        let (event, result) = worker.run_once().await;
        let now = FirmwareInstant::now();
        burst.open(now);
        status::record_press(event.counter, burst.closes_at());

        if result.is_err() {
            defmt::warn!(
                "tx: press {} from {} not queued for ranging",
                event.counter,
                event.button
            );
        }
    }
}
