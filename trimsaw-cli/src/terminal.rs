// trimsaw-cli/src/terminal.rs
//
// Terminal output styling: section headers, aligned status lines and
// result symbols. Kept separate from log records so piping stdout still
// yields a readable run summary.

use console::style;

const SECTION_PREFIX: &str = "===== ";
const SECTION_SUFFIX: &str = " =====";

/// Prints a section header for a major phase.
pub fn print_section(title: &str) {
    println!();
    println!(
        "{}{}{}",
        SECTION_PREFIX,
        style(title.to_uppercase()).cyan().bold(),
        SECTION_SUFFIX
    );
}

/// Prints an aligned label/value status line.
pub fn print_status(label: &str, value: &str) {
    // Pad before styling so ANSI codes don't skew the column.
    let label = format!("{:<16}", format!("{label}:"));
    println!("  {}{value}", style(label).bold());
}

/// Prints a success line.
pub fn print_success(message: &str) {
    println!("{} {message}", style("✓").green().bold());
}

/// Prints an error line to stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {message}", style("✗").red().bold());
}
