use std::io::Write;

use console::{style, Emoji, Term};

pub static CHECK: Emoji<'static, 'static> = Emoji("✓", "+");
pub static CROSS: Emoji<'static, 'static> = Emoji("✗", "x");
pub static ARROW: Emoji<'static, 'static> = Emoji("▶", ">");

pub fn check_icon() -> String {
    style(format!("{}", CHECK)).green().to_string()
}

pub fn cross_icon() -> String {
    style(format!("{}", CROSS)).red().to_string()
}

pub fn bold<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).bold().to_string()
}

pub fn error<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).red().to_string()
}

pub fn warning<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).color256(214).bold().to_string()
}

pub fn success<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).green().to_string()
}

pub fn highlight<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).blue().bold().to_string()
}

pub fn light<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).color256(245).to_string()
}

/// Rewrites the current terminal line with `label` and a percentage.
pub fn progress(label: &str, done: usize, total: usize) {
    let percent = if total == 0 {
        100.0
    } else {
        done as f32 / total as f32 * 100.0
    };
    let _ = Term::stdout().clear_line();
    print!("\r{}... {:.0}%", label, percent);
    let _ = std::io::stdout().flush();
}

/// Clears the progress line.
pub fn finish_progress() {
    let _ = Term::stdout().clear_line();
    print!("\r");
}
