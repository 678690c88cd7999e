use embassy_futures::select::{Either, select};
use embassy_time::Ticker;
use link_core::debounce::{ButtonBank, InputDebouncer};
use link_core::dispatch::PressNotifier;

use crate::hw::buttons::ButtonPins;
use crate::link::{LinkMutex, to_embassy};

pub type Debouncer =
    InputDebouncer<'static, ButtonPins<'static>, PressNotifier<'static, LinkMutex>>;

/// Scans the buttons on a fixed period. Edge interrupts restart the
/// stability count of the button that moved.
#[embassy_executor::task]
pub async fn run(mut debouncer: Debouncer, bank: &'static ButtonBank) -> ! {
    let mut ticker = Ticker::every(to_embassy(debouncer.config().scan_period));

    loop {
        match select(ticker.next(), debouncer.input_mut().wait_for_edge()).await {
            Either::First(()) => {
                debouncer.scan();
            }
            Either::Second(button) => bank.note_edge(button),
        }
    }
}
