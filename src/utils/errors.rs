use crate::cli::ColorMode;
use nu_ansi_term::Color;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_EXIT_CODE: i32 = 1;

/// Exit code of a process stopped by SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

static USE_COLOR: AtomicBool = AtomicBool::new(true);

pub(crate) fn configure_color(cmode: ColorMode) {
    USE_COLOR.store(cmode == ColorMode::On, Ordering::Relaxed);
}

fn use_color() -> ColorMode {
    match USE_COLOR.load(Ordering::Relaxed) {
        true => ColorMode::On,
        false => ColorMode::Off,
    }
}

fn format_diagnostic(label: &str, label_color: Color, text: &str, cmode: ColorMode) -> String {
    match cmode {
        ColorMode::On => {
            let style = label_color.bold();
            let text_style = Color::Default.bold();

            format!("{} {}", style.paint(label), text_style.paint(text))
        }
        ColorMode::Off => format!("{} {}", label, text),
    }
}

pub(crate) fn error_internal(text: &str) {
    eprintln!(
        "{}",
        format_diagnostic("error:", Color::Red, text, use_color())
    );
}

pub(crate) fn warn_internal(text: &str) {
    eprintln!(
        "{}",
        format_diagnostic("warning:", Color::Yellow, text, use_color())
    );
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::warn_internal(&formatted);
    })
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
    })
}

#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
        ::std::process::exit($crate::utils::errors::DEFAULT_EXIT_CODE);
    })
}
