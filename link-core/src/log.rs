//! Crate-private logging macros.
//!
//! With the `defmt` feature enabled the macros forward to the matching
//! `defmt` level. Host builds type-check the arguments and discard them;
//! host tools observe behaviour through return values and the
//! [`SignalMonitor`](crate::monitor::SignalMonitor) instead.
//!
//! Only `{}` and `{:#x}` placeholders are used so the same format strings
//! are valid for both `core::fmt` and `defmt`.

macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
