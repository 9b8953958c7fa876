// Output formatting for operator-facing status lines

use crate::backend::SelectedBackend;
use crate::config::Config;
use crate::process::{Outcome, RunReport, Supervisor};
use colored::*;
use std::time::Duration;

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print the resolved plan for `--check`
pub fn print_plan(config: &Config, backend: &SelectedBackend) {
    println!("\n{}", "Resolved configuration".bold().underline());
    println!();
    println!("  {:<12} {}", "Directory:".bold(), config.working_dir.display());
    println!("  {:<12} {}", "Port:".bold(), config.port);
    println!("  {:<12} {}", "Log file:".bold(), config.log_file.display());
    println!("  {:<12} {}", "Profile:".bold(), config.profile);
    println!(
        "  {:<12} {} ({})",
        "Backend:".bold(),
        backend.name().cyan(),
        backend.program.display()
    );
    if backend.is_fallback() {
        println!(
            "  {:<12} {}",
            "Skipped:".bold(),
            backend.skipped.join(", ").yellow()
        );
    }
    println!(
        "  {:<12} {}",
        "Wake-lock:".bold(),
        if config.wake_lock { "yes" } else { "no" }
    );
    println!(
        "  {:<12} {}",
        "Command:".bold(),
        backend
            .spec
            .render_args(config.port, &config.working_dir, &config.app)
            .join(" ")
            .dimmed()
    );
    println!();
}

/// Print the banner shown once the backend is up
pub fn print_running(supervisor: &Supervisor) {
    let config = supervisor.config();
    let process = supervisor.process();

    print_success_msg(&format!(
        "HTTP server is running at http://0.0.0.0:{}",
        config.port
    ));
    println!("  {}: {}", "Backend".bold(), process.backend.cyan());
    println!("  {}: {}", "PID".bold(), process.pid);
    println!("  {}: {}", "Logs".bold(), config.log_file.display());
    if supervisor.lock_held() {
        println!("  {}: {}", "Wake-lock".bold(), "held".green());
    }
    print_info("Press Ctrl+C to stop the server.");
}

/// Print the final status after cleanup
pub fn print_report(report: &RunReport) {
    let status = report
        .exit_status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match report.outcome {
        Outcome::Interrupted => {
            print_success_msg(&format!("Server {} stopped ({})", report.backend, status));
        }
        Outcome::BackendExited => {
            eprintln!(
                "{} {}",
                "✗".red().bold(),
                format!(
                    "Server {} stopped unexpectedly ({}), see {}",
                    report.backend,
                    status,
                    report.log_file.display()
                )
                .red()
            );
        }
    }

    println!("  {}: {}", "Uptime".bold(), format_uptime(report.uptime));
    if report.lock_released {
        println!("  {}: {}", "Wake-lock".bold(), "released");
    }
}

/// Uptime as `1h 02m 03s`, `2m 05s` or `42s`; sub-second runs show milliseconds
fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (hours, mins, secs) = (secs / 3600, secs % 3600 / 60, secs % 60);

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", uptime.as_millis())
    }
}
