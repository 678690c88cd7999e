use embassy_stm32::exti::ExtiInput;
use link_core::debounce::{ButtonId, DigitalInput};

/// The two push buttons, sampled by the debounce task.
pub struct ButtonPins<'d> {
    sw1: ExtiInput<'d>,
    sw2: ExtiInput<'d>,
}

impl<'d> ButtonPins<'d> {
    pub fn new(sw1: ExtiInput<'d>, sw2: ExtiInput<'d>) -> Self {
        Self { sw1, sw2 }
    }

    /// Waits for any edge on either button and reports which one moved.
    pub async fn wait_for_edge(&mut self) -> ButtonId {
        use embassy_futures::select::{Either, select};

        match select(self.sw1.wait_for_any_edge(), self.sw2.wait_for_any_edge()).await {
            Either::First(()) => ButtonId::Sw1,
            Either::Second(()) => ButtonId::Sw2,
        }
    }
}

impl DigitalInput for ButtonPins<'_> {
    fn read_digital(&mut self, button: ButtonId) -> bool {
        match button {
            ButtonId::Sw1 => self.sw1.is_low(),
            ButtonId::Sw2 => self.sw2.is_low(),
        }
    }
}
