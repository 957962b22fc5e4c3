//! 样式表中的尺寸声明
//!
//! 只识别两类声明：
//! - `@page { size: ... }`
//! - 选择器中含有 `.slide` 的规则里的 `width` / `height`（px）

use std::sync::OnceLock;

use regex::Regex;

use super::{Dimensions, SizeSource};

/// CSS 像素与物理单位的换算（96 dpi）
const PX_PER_IN: f64 = 96.0;
const PX_PER_CM: f64 = PX_PER_IN / 2.54;
const PX_PER_MM: f64 = PX_PER_CM / 10.0;
const PX_PER_PT: f64 = PX_PER_IN / 72.0;

/// 编译并缓存固定的正则；编译失败时缓存 `None`
fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn comment_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?s)/\*.*?\*/")
}

fn page_rule_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)@page\b[^{]*\{([^}]*)\}")
}

fn page_size_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)(?:^|[;\s])size\s*:\s*([^;}]+)")
}

fn rule_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"([^{}@]+)\{([^{}]*)\}")
}

fn slide_selector_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)\.slide(?:$|[\s,:.#\[>+~])")
}

fn px_property_re(property: &str) -> Option<Regex> {
    Regex::new(&format!(
        r"(?i)(?:^|[;\s]){}\s*:\s*([0-9]+(?:\.[0-9]+)?)px",
        property
    ))
    .ok()
}

fn strip_comments(css: &str) -> String {
    match comment_re() {
        Some(re) => re.replace_all(css, "").into_owned(),
        None => css.to_string(),
    }
}

/// 按优先级推断静态尺寸：`@page` → `.slide` 规则 → 默认 1920×1080
pub fn static_slide_size(css: &str) -> (Dimensions, SizeSource) {
    if let Some(size) = declared_page_size(css) {
        return (size, SizeSource::PageRule);
    }
    if let Some(size) = declared_slide_size(css) {
        return (size, SizeSource::SlideRule);
    }
    (Dimensions::DEFAULT_SLIDE, SizeSource::Default)
}

/// 解析 `@page { size: ... }`，取最后一个有效声明
pub fn declared_page_size(css: &str) -> Option<Dimensions> {
    let css = strip_comments(css);
    let size_re = page_size_re()?;
    page_rule_re()?
        .captures_iter(&css)
        .filter_map(|rule| {
            let body = rule.get(1)?.as_str();
            let value = size_re.captures(body)?.get(1)?.as_str();
            parse_page_size(value)
        })
        .last()
}

/// 解析 `.slide { width: Npx; height: Mpx }`，取最后一个同时声明宽高的规则
pub fn declared_slide_size(css: &str) -> Option<Dimensions> {
    let css = strip_comments(css);
    let width_re = px_property_re("width")?;
    let height_re = px_property_re("height")?;
    let selector_re = slide_selector_re()?;

    rule_re()?
        .captures_iter(&css)
        .filter(|rule| selector_re.is_match(rule[1].trim()))
        .filter_map(|rule| {
            let body = &rule[2];
            let width: f64 = width_re.captures(body)?[1].parse().ok()?;
            let height: f64 = height_re.captures(body)?[1].parse().ok()?;
            Some(Dimensions::clamped(width, height))
        })
        .last()
}

/// 解析 `size` 的取值：两个长度、一个长度、纸张名、以及可选的方向关键字
pub fn parse_page_size(value: &str) -> Option<Dimensions> {
    let tokens: Vec<String> = value
        .split_whitespace()
        .map(|t| t.trim_end_matches("!important").to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let mut lengths = Vec::new();
    let mut paper = None;
    let mut orientation = None;
    for token in &tokens {
        match token.as_str() {
            "landscape" | "portrait" => orientation = Some(token.clone()),
            "auto" => return None,
            other => {
                if let Some(px) = parse_length(other) {
                    lengths.push(px);
                } else if let Some(size) = paper_size(other) {
                    paper = Some(size);
                } else {
                    return None;
                }
            }
        }
    }

    let (mut width, mut height) = match (lengths.as_slice(), paper) {
        ([w, h], None) => (*w, *h),
        ([side], None) => (*side, *side),
        ([], Some(size)) => size,
        _ => return None,
    };

    match orientation.as_deref() {
        Some("landscape") if height > width => std::mem::swap(&mut width, &mut height),
        Some("portrait") if width > height => std::mem::swap(&mut width, &mut height),
        _ => {}
    }

    Some(Dimensions::clamped(width, height))
}

fn parse_length(token: &str) -> Option<f64> {
    let split = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    let (number, unit) = token.split_at(split);
    let number: f64 = number.parse().ok()?;
    let factor = match unit {
        "px" => 1.0,
        "in" => PX_PER_IN,
        "cm" => PX_PER_CM,
        "mm" => PX_PER_MM,
        "pt" => PX_PER_PT,
        _ => return None,
    };
    Some(number * factor)
}

/// 常见纸张（纵向，px）
fn paper_size(name: &str) -> Option<(f64, f64)> {
    let (w_mm, h_mm) = match name {
        "a3" => (297.0, 420.0),
        "a4" => (210.0, 297.0),
        "a5" => (148.0, 210.0),
        "b4" => (250.0, 353.0),
        "b5" => (176.0, 250.0),
        "letter" => return Some((8.5 * PX_PER_IN, 11.0 * PX_PER_IN)),
        "legal" => return Some((8.5 * PX_PER_IN, 14.0 * PX_PER_IN)),
        "ledger" => return Some((11.0 * PX_PER_IN, 17.0 * PX_PER_IN)),
        _ => return None,
    };
    Some((w_mm * PX_PER_MM, h_mm * PX_PER_MM))
}
