//! ortex CLI library - diagnostics shared by the binary and its tests.

pub mod diagnostics;

/// Map `-v`/`-q` counts onto a log level; the default is `INFO`.
pub fn log_level(verbose: u8, quiet: u8) -> tracing::Level {
    match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-2 => tracing::Level::ERROR,
        -1 => tracing::Level::WARN,
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}
