use crate::vm::VMEvent;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Render one VM event as a single output line
pub fn render(event: &VMEvent, format: LogFormat) -> String {
    match format {
        LogFormat::Pretty => render_pretty(event),
        LogFormat::Json => serde_json::to_string(event).unwrap_or_else(|_| render_plain(event)),
    }
}

fn render_pretty(event: &VMEvent) -> String {
    let category = format!("[{}]", event.category.to_uppercase());
    let category = match event.category.as_str() {
        "warn" | "error" => category.red(),
        "debug" => category.cyan(),
        _ => category.green(),
    };
    format!(
        "{} {} {}",
        event.timestamp.format("%H:%M:%S"),
        category,
        event.message
    )
}

fn render_plain(event: &VMEvent) -> String {
    format!(
        "{} [{}] {}",
        event.timestamp.to_rfc3339(),
        event.category.to_uppercase(),
        event.message
    )
}

/// Print every event to stdout in the given format
pub fn print_events(events: &[VMEvent], format: LogFormat) {
    for event in events {
        println!("{}", render(event, format));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_render_json_contains_fields() {
        let event = VMEvent::new("debug", "event.from = \"0x1\"");
        let line = render(&event, LogFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["category"], "debug");
        assert_eq!(parsed["message"], "event.from = \"0x1\"");
    }

    #[test]
    fn test_render_pretty_contains_message() {
        let event = VMEvent::new("log", "hello");
        assert!(render(&event, LogFormat::Pretty).contains("hello"));
    }
}
