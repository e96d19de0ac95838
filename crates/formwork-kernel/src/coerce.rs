//! Value coercion primitives shared by every widget check.
//!
//! All functions are pure and idempotent on their own output: feeding a
//! normalized value back in returns it unchanged.

use regex::Regex;
use std::sync::OnceLock;

/// Whitespace handling applied before any other check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhitespacePolicy {
    pub trim: bool,
    pub whitespace_only_is_empty: bool,
}

impl Default for WhitespacePolicy {
    fn default() -> Self {
        Self {
            trim: true,
            whitespace_only_is_empty: true,
        }
    }
}

pub fn normalize_whitespace(value: &str, policy: WhitespacePolicy) -> String {
    if policy.whitespace_only_is_empty && value.trim().is_empty() {
        return String::new();
    }
    if policy.trim {
        value.trim().to_string()
    } else {
        value.to_string()
    }
}

pub fn contains_line_break(value: &str) -> bool {
    value.contains('\n') || value.contains('\r')
}

pub fn char_length(value: &str) -> usize {
    value.chars().count()
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("html tag regex must compile"))
}

/// Strip markup and decode the handful of entities rich-text editors emit,
/// leaving the text a reader would count.
pub fn strip_html(value: &str) -> String {
    let stripped = html_tag_re().replace_all(value, "");
    stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn canonical_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?$").expect("number regex must compile"))
}

/// Normalize a submitted number to `-?digits[.digits]`.
///
/// Whitespace is collapsed away, a leading `+` dropped, and separators
/// resolved: when both `,` and `.` appear the later one is the decimal mark;
/// a lone `,` is a thousands separator when it splits a short integer part
/// from exactly three digits (`1,234`), otherwise a decimal mark; repeated
/// `,` are thousands separators. Only ASCII digits count. Returns `None` when
/// the result is not a number.
pub fn normalize_numeric(value: &str) -> Option<String> {
    let mut compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(rest) = compact.strip_prefix('+') {
        compact = rest.to_string();
    }
    if compact.is_empty() {
        return None;
    }

    let last_comma = compact.rfind(',');
    let last_dot = compact.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(comma), None) if compact.matches(',').count() == 1 => {
            if is_single_grouping(&compact, comma) {
                compact.replace(',', "")
            } else {
                compact.replace(',', ".")
            }
        }
        (Some(_), None) => compact.replace(',', ""),
        (None, Some(_)) if compact.matches('.').count() > 1 => compact.replace('.', ""),
        _ => compact,
    };

    canonical_number_re()
        .is_match(&normalized)
        .then_some(normalized)
}

/// `1,234` or `-12,345`: one to three leading digits without a leading
/// zero, then exactly three.
fn is_single_grouping(compact: &str, comma: usize) -> bool {
    let head = compact[..comma].strip_prefix('-').unwrap_or(&compact[..comma]);
    let tail = &compact[comma + 1..];
    (1..=3).contains(&head.len())
        && !head.starts_with('0')
        && head.bytes().all(|b| b.is_ascii_digit())
        && tail.len() == 3
        && tail.bytes().all(|b| b.is_ascii_digit())
}

/// Normalized number and its value; `None` unless both exist.
pub fn parse_number(value: &str) -> Option<(String, f64)> {
    let normalized = normalize_numeric(value)?;
    let parsed = normalized.parse::<f64>().ok()?;
    Some((normalized, parsed))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:https?://|ftp://|www\.)").expect("link regex must compile")
    })
}

/// Number of hyperlinks a free-text value carries.
pub fn count_links(value: &str) -> usize {
    link_re().find_iter(value).count()
}

/// Split a multi-address e-mail value on `,` or `;`.
pub fn split_addresses(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("email regex must compile")
    })
}

pub fn is_valid_email(address: &str) -> bool {
    !address.contains("..") && email_re().is_match(address)
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?i)[a-z][a-z0-9+.-]*://[^\s/?#@]+(?:@[^\s/?#]+)?(?:[/?#]\S*)?$")
            .expect("url regex must compile")
    })
}

pub fn is_valid_url(url: &str) -> bool {
    url_re().is_match(url)
}

/// Lowercased extension after the last `.`, if any.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Render a value from the request tree as a scalar string.
pub fn scalar_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(true) => Some("1".to_string()),
        serde_json::Value::Bool(false) | serde_json::Value::Null => Some(String::new()),
        _ => None,
    }
}
