use std::fmt::{Debug, Display};

use nu_ansi_term::Color as AnsiColor;
use prometheus::register_counter_vec;
use prometheus::CounterVec;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{Format, FmtSpan, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter};

use lazy_static::lazy_static;

lazy_static! {
    pub static ref REFRESH_CNTR: CounterVec = register_counter_vec!(
        "cache_refreshes_total",
        "Number of snapshot refreshes from the store",
        &["outcome"]
    )
    .unwrap();
    pub static ref EDIT_CNTR: CounterVec = register_counter_vec!(
        "mathematician_edits_total",
        "Number of submitted mathematician edits",
        &["outcome"]
    )
    .unwrap();
    pub static ref SIGNUP_CNTR: CounterVec = register_counter_vec!(
        "signups_total",
        "Number of signup attempts",
        &["outcome"]
    )
    .unwrap();
}

pub fn init_tracing() {
    let mut fmt_layer = fmt::layer().event_format(ComponentFormat::default());
    if std::env::var("INCLUDE_SPAN_EVENTS").is_ok_and(|value| value.eq_ignore_ascii_case("true")) {
        fmt_layer.set_span_events(FmtSpan::ENTER | FmtSpan::EXIT);
    }
    let filter_layer = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

/// Colors for component prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    const ALL: [Color; 7] = [
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::White,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Blue => "blue",
            Color::Magenta => "magenta",
            Color::Cyan => "cyan",
            Color::White => "white",
        }
    }

    fn from_name(name: &str) -> Option<Color> {
        Color::ALL.into_iter().find(|color| color.as_str() == name)
    }

    fn ansi(&self) -> AnsiColor {
        match self {
            Color::Red => AnsiColor::Red,
            Color::Green => AnsiColor::Green,
            Color::Yellow => AnsiColor::Yellow,
            Color::Blue => AnsiColor::Blue,
            Color::Magenta => AnsiColor::Purple,
            Color::Cyan => AnsiColor::Cyan,
            Color::White => AnsiColor::White,
        }
    }
}

/// Logs on behalf of a named component, e.g. `Database: connected`.
///
/// The component travels as the `component` and `color` fields of the event
/// and is painted by [ComponentFormat].
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    component: &'static str,
    color: Color,
}

impl Logger {
    pub const fn new(component: &'static str, color: Color) -> Self {
        Self { component, color }
    }

    fn color(&self, error: bool) -> &'static str {
        if error {
            Color::Red.as_str()
        } else {
            self.color.as_str()
        }
    }

    pub fn log(&self, message: impl Display) {
        tracing::info!(component = self.component, color = self.color(false), "{message}");
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!(component = self.component, color = self.color(false), "{message}");
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!(component = self.component, color = self.color(true), "{message}");
    }
}

#[derive(Default)]
struct ComponentFields {
    component: Option<String>,
    color: Option<Color>,
    message: String,
    rest: String,
}

impl Visit for ComponentFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "component" => self.component = Some(value.to_owned()),
            "color" => self.color = Color::from_name(value),
            _ => self.record_debug(field, &value),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.rest.push_str(&format!(" {}={value:?}", field.name()));
        }
    }
}

/// Event format that prints component events as `LEVEL Component: message`
/// with the component name in its color. Other events use the default format.
pub struct ComponentFormat {
    inner: Format,
}

impl Default for ComponentFormat {
    fn default() -> Self {
        Self {
            inner: fmt::format(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for ComponentFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut fields = ComponentFields::default();
        event.record(&mut fields);
        let Some(component) = fields.component else {
            return self.inner.format_event(ctx, writer, event);
        };

        SystemTime.format_time(&mut writer)?;
        write!(writer, " {:>5} ", event.metadata().level())?;
        match fields.color {
            Some(color) if writer.has_ansi_escapes() => {
                write!(writer, "{}", color.ansi().paint(component.as_str()))?
            }
            _ => write!(writer, "{component}")?,
        }
        writeln!(writer, ": {}{}", fields.message, fields.rest)
    }
}
