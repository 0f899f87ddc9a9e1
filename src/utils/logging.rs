//! Logging and tracing utilities
//!
//! This module provides:
//! - Tracing subscriber initialization with JSON (production) or pretty
//!   (development) formatting
//! - Log sanitization for externally supplied strings (reasons, booking
//!   numbers) to prevent log injection
//!
//! Log injection occurs when attackers inject newlines or control
//! characters into logged data to forge log entries or corrupt log
//! analysis.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Environment, Settings};

/// Maximum length for sanitized log values to prevent log flooding
const MAX_LOG_LENGTH: usize = 500;

/// Sanitizes a string value for safe logging.
///
/// - Replaces CR/LF with spaces (prevents log forging)
/// - Strips ASCII and Unicode control characters
/// - Strips ANSI escape sequences
/// - Truncates to a maximum length
pub fn sanitize_log_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len().min(MAX_LOG_LENGTH));

    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if result.len() >= MAX_LOG_LENGTH {
            break;
        }
        // Skip ANSI escape sequences (ESC [ ... final byte)
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for seq in chars.by_ref() {
                    if seq.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        match c {
            '\r' | '\n' => {
                if !result.ends_with(' ') {
                    result.push(' ');
                }
            }
            c if c.is_control() => {}
            '\u{2028}' | '\u{2029}' => {}
            c if ('\u{0080}'..='\u{009f}').contains(&c) => {}
            c => result.push(c),
        }
    }

    result
}

/// Initialize the tracing subscriber from settings: JSON formatting in
/// production, pretty in development, level from configuration or
/// `RUST_LOG`.
pub fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));

    if settings.environment == Environment::Production {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
