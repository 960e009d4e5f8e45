//! Crate-internal logging macros.
//!
//! With the `esp32-log` feature the messages go straight to the ESP console,
//! with `log` they go through the `log` facade. Otherwise the arguments are
//! only type-checked.
#![allow(unused_macros)]

#[cfg(all(feature = "esp32-log", feature = "log"))]
compile_error!("features `esp32-log` and `log` are mutually exclusive");

macro_rules! emit {
    ($level:ident, $tag:literal, $($arg:tt)*) => {{
        #[cfg(feature = "esp32-log")]
        ::esp_println::println!(concat!("[", $tag, "] {}"), ::core::format_args!($($arg)*));
        #[cfg(feature = "log")]
        ::log::$level!($($arg)*);
        #[cfg(not(any(feature = "esp32-log", feature = "log")))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

macro_rules! trace {
    ($($arg:tt)*) => { emit!(trace, "TRACE", $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { emit!(debug, "DEBUG", $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { emit!(info, "INFO", $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { emit!(warn, "WARN", $($arg)*) };
}
