//! Color-coded console output

use chrono::Local;
use crossterm::style::{Color, Stylize};
use std::path::Path;

const WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn label(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }

    fn color(&self) -> Color {
        match self {
            Level::Info => Color::Blue,
            Level::Success => Color::Green,
            Level::Warning => Color::Yellow,
            Level::Error => Color::Red,
        }
    }
}

/// Print `[time] [LEVEL] message` and record it in the operational log
pub fn report(level: Level, message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    println!(
        "{} {} {}",
        format!("[{timestamp}]").cyan(),
        format!("[{}]", level.label()).with(level.color()),
        message
    );

    match level {
        Level::Info | Level::Success => tracing::info!("{message}"),
        Level::Warning => tracing::warn!("{message}"),
        Level::Error => tracing::error!("{message}"),
    }
}

pub fn info(message: impl AsRef<str>) {
    report(Level::Info, message.as_ref());
}

pub fn success(message: impl AsRef<str>) {
    report(Level::Success, message.as_ref());
}

pub fn warning(message: impl AsRef<str>) {
    report(Level::Warning, message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    report(Level::Error, message.as_ref());
}

/// Section header for a command
pub fn header(title: &str) {
    let rule = "=".repeat(WIDTH);
    println!();
    println!("{}", rule.as_str().magenta().bold());
    println!("{}", format!("{title:^width$}", width = WIDTH).magenta().bold());
    println!("{}", rule.as_str().magenta().bold());
    println!();
}

/// Startup banner
pub fn banner() {
    let rule = "=".repeat(WIDTH);
    println!();
    println!("{}", rule.as_str().cyan().bold());
    println!("{}", format!("{:^width$}", "Dev Stack - Management Tool", width = WIDTH).cyan().bold());
    println!("{}", rule.as_str().cyan().bold());
    println!();
}

/// Plain separator before dumping file content
pub fn rule() {
    println!("\n{}\n", "=".repeat(WIDTH));
}

pub fn help(logs_dir: &Path, backend_url: &str, frontend_url: &str) {
    println!(
        r#"
{title}

{usage}
    devctl <command> [target]

{commands}
    {start} [backend|frontend|all]    Start services (default: all)
    {stop}  [backend|frontend|all]    Stop services (default: all)
    {restart} [backend|frontend|all] Restart services (default: all)
    {status}                         Show service status
    {install} [backend|frontend|all]  Install dependencies (default: all)
    {logs} [backend|frontend]         Show logs (default: backend)
    {clean}                           Clean build files and old logs
    {help}                            Show this help message

{examples}
    devctl start                # Start both backend and frontend
    devctl start backend        # Start only backend
    devctl stop all             # Stop all services
    devctl restart frontend     # Restart frontend only
    devctl status               # Check service status
    devctl install              # Install all dependencies
    devctl logs backend         # View backend logs
    devctl clean                # Clean all build files

{logs_title}
    Logs are stored in: {logs_dir}

{urls}
    Backend:  {backend_url}
    Frontend: {frontend_url}
"#,
        title = "Dev Stack - Management Tool".magenta().bold(),
        usage = "USAGE:".bold(),
        commands = "COMMANDS:".bold(),
        start = "start".green(),
        stop = "stop".red(),
        restart = "restart".yellow(),
        status = "status".blue(),
        install = "install".cyan(),
        logs = "logs".blue(),
        clean = "clean".red(),
        help = "help".yellow(),
        examples = "EXAMPLES:".bold(),
        logs_title = "LOGS:".bold(),
        logs_dir = logs_dir.display(),
        urls = "URLS:".bold(),
    );
}
