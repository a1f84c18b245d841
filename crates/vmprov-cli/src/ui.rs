//! Colored status lines. Everything goes to stderr so stdout stays
//! machine-readable.

use colored::Colorize;

fn prefix() -> String {
    "[vmprov]".bold().cyan().to_string()
}

/// [vmprov] message (in green)
pub fn success(msg: &str) {
    eprintln!("{} {}", prefix(), msg.green());
}

/// [vmprov] message (in red)
pub fn error(msg: &str) {
    eprintln!("{} {}", "[vmprov]".bold().red(), msg.red());
}

/// Indented `label: value` line under a previous message.
pub fn detail(label: &str, value: &str) {
    eprintln!("{}   {} {}", prefix(), format!("{}:", label).bold(), value);
}
