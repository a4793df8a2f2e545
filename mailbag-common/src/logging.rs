use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    filter::FilterFn,
    fmt::{self, time::ChronoUtc},
    prelude::*,
};

#[doc(hidden)]
#[macro_export]
macro_rules! __flow {
    ($flow:literal, level = $level:ident, $($arg:tt)+) => {
        $crate::tracing::event!($crate::tracing::Level::$level, flow = $flow, $($arg)+)
    };

    ($flow:literal, $($arg:tt)+) => {
        $crate::__flow!($flow, level = TRACE, $($arg)+)
    };
}

/// A line sent from the server to the client, at `TRACE` unless `level = ..`
/// comes first
#[macro_export]
macro_rules! outgoing {
    ($($arg:tt)+) => { $crate::__flow!("outgoing", $($arg)+) };
}

/// A line received from the client
#[macro_export]
macro_rules! incoming {
    ($($arg:tt)+) => { $crate::__flow!("incoming", $($arg)+) };
}

/// Session lifecycle and other server-side happenings
#[macro_export]
macro_rules! internal {
    ($($arg:tt)+) => { $crate::__flow!("internal", $($arg)+) };
}

/// Resolve the level filter from a `LOG_LEVEL` style value
fn level(value: Option<&str>) -> LevelFilter {
    let default = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    value.map_or(default, |level| {
        LevelFilter::from_str(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    })
}

/// Install the global subscriber: compact RFC 3339 stamped lines on stdout,
/// filtered by `LOG_LEVEL` and limited to the mailbag crates
pub fn init() {
    let level = level(std::env::var("LOG_LEVEL").ok().as_deref());
    let ours = FilterFn::new(|metadata| metadata.target().starts_with("mailbag"));

    let layer = fmt::layer()
        .compact()
        .with_ansi(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(ChronoUtc::rfc_3339())
        .with_filter(level)
        .with_filter(ours);

    tracing_subscriber::registry().with(layer).init();
}
