use owo_colors::OwoColorize;

use langfilter_core::{Action, FilterReport};

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "langfilter".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Hide feed items that are not in your languages\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print a labelled value under a step
pub fn print_detail(label: &str, value: &str) {
    eprintln!("  {} {}", format!("{}:", label).dimmed(), value.bright_white());
}

/// Print the per-item decisions of a finished run
pub fn print_decisions(report: &FilterReport<'_>) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Decisions".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());

    for item in &report.items {
        let title = item.title.as_deref().unwrap_or("(no title)");
        match item.action {
            Action::Hidden => eprintln!("  {} {} {}", "✗".red(), item.identifier.to_string().dimmed(), title.bright_red()),
            Action::Kept => eprintln!("  {} {} {}", "✓".green(), item.identifier.to_string().dimmed(), title),
            Action::NoTitle => eprintln!("  {} {} {}", "·".dimmed(), item.identifier.to_string().dimmed(), title.dimmed()),
        }
    }

    eprintln!(
        "\n  {} {}   {} {}\n",
        "Videos hidden:".dimmed(),
        report.counters.videos_hidden.to_string().bright_white(),
        "Channels hidden:".dimmed(),
        report.counters.channels_hidden.to_string().bright_white()
    );
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
