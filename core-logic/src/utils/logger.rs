use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target used for user-facing progress lines.
pub const PROGRESS_TARGET: &str = "task_result";

/// Installs the global subscriber: an hourly rolling file under `log_dir`
/// and a colorized console.
///
/// The console shows `task_result` lines at INFO and everything else at
/// WARN (DEBUG with `verbose`). Returns `None` when a subscriber is already
/// installed. The guard MUST be kept alive by the caller.
pub fn setup_logger(log_dir: &str, verbose: bool) -> Option<WorkerGuard> {
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::hourly(log_dir, "layeredge");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(PROGRESS_TARGET, Level::INFO)
        .with_default(Level::INFO);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_default = if verbose { Level::DEBUG } else { Level::WARN };
    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(PROGRESS_TARGET, Level::INFO)
        .with_default(console_default);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .ok()?;

    Some(guard)
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn event_message(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor {
        message: String::new(),
    };
    event.record(&mut visitor);
    visitor.message
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let msg = event_message(event);
        let time = Local::now().format("%H:%M:%S");
        let dimmed = Style::new().dimmed();

        let painted = match *event.metadata().level() {
            Level::ERROR => Color::LightRed.bold().paint(msg).to_string(),
            Level::WARN => Color::Yellow.paint(msg).to_string(),
            _ if msg.starts_with('✅') => Color::LightGreen.paint(msg).to_string(),
            _ if msg.starts_with('❌') => Color::LightRed.paint(msg).to_string(),
            _ if msg.starts_with('⚠') => Color::Yellow.paint(msg).to_string(),
            _ => msg,
        };

        writeln!(writer, "{} {}", dimmed.paint(time.to_string()), painted)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let meta = event.metadata();

        write!(writer, "{} [{}] {}: ", timestamp, meta.level(), meta.target())?;
        writeln!(writer, "{}", event_message(event))
    }
}
