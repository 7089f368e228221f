//! Output formatting: JSON, YAML, plain.
//!
//! Renders device payloads in the format selected by `--output`. Device
//! payloads are arbitrary JSON, so `plain` prints scalars bare and arrays
//! one element per line.

use std::io::{self, Write};

use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a serde-serializable item in the chosen format.
pub fn render<T>(format: OutputFormat, data: &T) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(render_plain(&serde_json::to_value(data)?)),
    }
}

/// Renders and prints command results in one chosen format.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Printer {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn print<T: serde::Serialize + ?Sized>(&self, data: &T) -> Result<(), CliError> {
        print_output(&render(self.format, data)?, self.quiet);
        Ok(())
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Resolve the effective format: the flag, then the config default, then JSON.
pub fn resolve_format(flag: Option<OutputFormat>, configured: &str) -> OutputFormat {
    use clap::ValueEnum;
    flag.or_else(|| OutputFormat::from_str(configured, true).ok())
        .unwrap_or(OutputFormat::Json)
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    let out = serde_yaml::to_string(data)?;
    Ok(out.trim_end().to_owned())
}

fn render_plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render_plain).collect::<Vec<_>>().join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::Object(_) | Value::Array(_) => format!("{k}={v}"),
                other => format!("{k}={}", render_plain(other)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_prints_scalars_bare() {
        assert_eq!(render(OutputFormat::Plain, &json!("ootb-7f3a")).unwrap(), "ootb-7f3a");
        assert_eq!(render(OutputFormat::Plain, &json!(42)).unwrap(), "42");
    }

    #[test]
    fn plain_prints_one_array_element_per_line() {
        let out = render(OutputFormat::Plain, &json!(["home", "office"])).unwrap();
        assert_eq!(out, "home\noffice");
    }

    #[test]
    fn plain_prints_objects_as_key_value_lines() {
        let out = render(OutputFormat::Plain, &json!({ "model": "ootb-1", "rev": 3 })).unwrap();
        assert_eq!(out, "model=ootb-1\nrev=3");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render(OutputFormat::JsonCompact, &json!({ "a": [1, 2] })).unwrap();
        assert_eq!(out, r#"{"a":[1,2]}"#);
    }

    #[test]
    fn configured_format_applies_without_flag() {
        assert_eq!(resolve_format(None, "yaml"), OutputFormat::Yaml);
        assert_eq!(resolve_format(None, "json-compact"), OutputFormat::JsonCompact);
        assert_eq!(resolve_format(None, "bogus"), OutputFormat::Json);
        assert_eq!(resolve_format(Some(OutputFormat::Plain), "yaml"), OutputFormat::Plain);
    }
}
