// Colored console output for the sample walkthrough

use colored::{Color, Colorize};
use std::time::{Duration, Instant};

/// Print a line in one color
pub fn write_line(message: &str, color: Color) {
    println!("{}", message.color(color));
}

pub fn status(message: &str) {
    write_line(message, Color::Yellow);
}

pub fn success(message: &str) {
    write_line(message, Color::Green);
}

pub fn detail(message: &str) {
    write_line(message, Color::Blue);
}

/// Measures how long a step takes
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Run `f` and return its result with the time it took
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let stopwatch = Stopwatch::start();
    let result = f();
    (result, stopwatch.elapsed())
}

/// `12.3 ms`
pub fn format_duration(duration: Duration) -> String {
    format!("{:.1} ms", duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_returns_result() {
        let (value, elapsed) = timed(|| 6 * 7);
        assert_eq!(value, 42);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(12_340)), "12.3 ms");
        assert_eq!(format_duration(Duration::ZERO), "0.0 ms");
    }
}
