//! Terminal output helpers
//!
//! Status lines go to stdout, warnings and errors to stderr so that
//! `get`/`list` output stays pipeable.

use colored::Colorize;

pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Muted, indented note
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Title underlined to its own width
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Heading for one stored instance, e.g. `# cluster.analytics`
pub fn resource(address: &str) {
    println!();
    match address.split_once('.') {
        Some((kind, name)) => println!("{} {}.{}", "#".dimmed(), kind.cyan(), name.bold()),
        None => println!("{} {}", "#".dimmed(), address.bold()),
    }
}

/// One attribute line, names padded to `width` so the `=` signs line up
pub fn attribute(name: &str, value: &str, width: usize) {
    println!("{}", attribute_line(name, value, width));
}

fn attribute_line(name: &str, value: &str, width: usize) -> String {
    format!("    {:<width$} {} {}", name, "=".dimmed(), value, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lines_align() {
        colored::control::set_override(false);
        assert_eq!(attribute_line("id", "c-1", 8), "    id       = c-1");
        assert_eq!(attribute_line("password", "x", 8), "    password = x");
    }
}
