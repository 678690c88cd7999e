use embassy_stm32::gpio::Output;
use link_core::actuator::Indicator;

/// Number of LEDs flashed together as the trigger indicator.
pub const LED_COUNT: usize = 4;

/// Active-low LED bank driven as a single indicator.
pub struct LedBank<'d> {
    leds: [Output<'d>; LED_COUNT],
}

impl<'d> LedBank<'d> {
    /// Wraps the outputs; callers initialise them high (off).
    pub fn new(leds: [Output<'d>; LED_COUNT]) -> Self {
        Self { leds }
    }
}

impl Indicator for LedBank<'_> {
    fn set_indicator(&mut self, lit: bool) {
        for led in &mut self.leds {
            if lit {
                led.set_low();
            } else {
                led.set_high();
            }
        }
    }
}
