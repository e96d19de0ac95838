use chrono::{DateTime, NaiveDateTime};
use formwork_kernel::{FormworkConfig, RequestContext};
use std::fmt::Display;
use std::fs;

/// A submission came back with problems.
pub const EXIT_PROBLEMS: i32 = 1;
/// An input file could not be read or parsed.
pub const EXIT_INPUT: i32 = 2;

pub fn exit_input_error(message: impl Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(EXIT_INPUT);
}

pub fn read_json_file_or_exit<T>(path: &str, label: &str) -> T
where
    T: serde::de::DeserializeOwned,
{
    let bytes = fs::read(path).unwrap_or_else(|e| {
        exit_input_error(format!("failed to read {label} at {path}: {e}"));
    });
    serde_json::from_slice::<T>(&bytes).unwrap_or_else(|e| {
        exit_input_error(format!("failed to parse {label} JSON at {path}: {e}"));
    })
}

pub fn load_config_or_exit(path: Option<&str>) -> FormworkConfig {
    match path {
        Some(path) => FormworkConfig::load(path).unwrap_or_else(|e| exit_input_error(e)),
        None => FormworkConfig::default(),
    }
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM[:SS]` taken as local wall time.
pub fn request_context_or_exit(now: Option<&str>) -> RequestContext {
    let Some(text) = now else {
        return RequestContext::local();
    };
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return RequestContext::at(stamp.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(RequestContext::at)
        .unwrap_or_else(|| exit_input_error(format!("invalid --now value `{text}`")))
}

pub fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization")
    );
}

pub fn print_sample_block(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("  {title}:");
    for item in items {
        println!("    - {item}");
    }
}
