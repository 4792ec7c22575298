//! Shared utilities for CLI commands

use owo_colors::OwoColorize;

/// Render a byte count in a human-friendly unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Print collected per-file errors, truncated past the first ten.
pub fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!();
    println!("{}", "Errors:".red().bold());
    for error in errors.iter().take(10) {
        println!("  {}", error.red());
    }
    if errors.len() > 10 {
        println!("  ... and {} more", errors.len() - 10);
    }
}
