use link_core::gate::{ReceiveGate, ReportOutcome};

use crate::link::{ActuationSender, FirmwareInstant, InboundReceiver};
use crate::status;

pub type Gate = ReceiveGate<'static, ActuationSender<'static>, FirmwareInstant>;

/// Feeds ranging reports from the session driver through the gate.
#[embassy_executor::task]
pub async fn run(mut gate: Gate, inbound: InboundReceiver<'static>) -> ! {
    loop {
        let report = inbound.receive().await;
        if let ReportOutcome::Processed { .. } =
            gate.on_ranging_report(&report, FirmwareInstant::now())
        {
            status::record_gate_counter(gate.last_counter());
        }
    }
}
