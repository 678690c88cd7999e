use embassy_time::{Duration, Ticker};
use heapless::String;
use link_core::config::AdmissionPolicy;
use link_core::debounce::ButtonBank;
use link_core::monitor::SignalMonitor;

use crate::link::FirmwareInstant;
use crate::status;

const STATUS_PERIOD: Duration = Duration::from_secs(30);
const STATUS_TEXT_CAPACITY: usize = 640;

#[embassy_executor::task]
pub async fn run(
    monitor: &'static SignalMonitor,
    buttons: &'static ButtonBank,
    policy: AdmissionPolicy,
) -> ! {
    let mut ticker = Ticker::every(STATUS_PERIOD);

    loop {
        ticker.next().await;

        let snapshot = status::snapshot(FirmwareInstant::now(), monitor, buttons, policy);
        let mut text: String<STATUS_TEXT_CAPACITY> = String::new();
        if snapshot.render(&mut text).is_err() {
            defmt::warn!("status: report truncated");
        }
        for line in text.lines() {
            defmt::info!("{=str}", line);
        }
    }
}
