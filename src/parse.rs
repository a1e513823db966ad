//! Typed extraction from documentation host pages.
//!
//! Only the handful of values the pipeline needs leave this module: the
//! crate version, function locators, the function name, its source locator
//! and the extracted source text. Markup selectors stay private here.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

use crate::error::ParseError;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(VERSION_SELECTOR, "span.version");
selector!(FUNCTION_LINK_SELECTOR, "a.fn[href]");
selector!(FUNCTION_NAME_SELECTOR, "span.fn");
selector!(SOURCE_LINK_SELECTOR, "a.src[href]");
selector!(CODE_SELECTOR, "code");

// `unsafe` anywhere before `fn`, both before the parameter list opens.
static UNSAFE_SIGNATURE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^(]*unsafe[^(]*fn").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrateIndex {
    pub version: String,
    pub function_locators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPage {
    pub name: String,
    pub source: SourceLocator,
}

/// Inclusive, 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub lower: usize,
    pub upper: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    pub href: String,
    pub range: LineRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceExtract {
    pub text: String,
    pub is_unsafe: bool,
}

impl LineRange {
    pub fn contains(&self, line: usize) -> bool {
        self.lower <= line && line <= self.upper
    }

    /// Parses `L{n}` or `L{lower}-{upper}` (the `L` is optional on either bound).
    pub fn from_fragment(fragment: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidFragment(fragment.to_string());
        let bound = |s: &str| -> Result<usize, ParseError> {
            let s = s.trim();
            let digits = s.strip_prefix('L').unwrap_or(s);
            digits.parse::<usize>().map_err(|_| invalid())
        };

        let (lower, upper) = match fragment.split_once('-') {
            Some((lower, upper)) => (bound(lower)?, bound(upper)?),
            None => {
                let line = bound(fragment)?;
                (line, line)
            }
        };
        if lower == 0 || lower > upper {
            return Err(invalid());
        }
        Ok(Self { lower, upper })
    }
}

impl SourceLocator {
    pub fn parse(href: &str) -> Result<Self, ParseError> {
        let fragment = href
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .ok_or_else(|| ParseError::InvalidFragment(href.to_string()))?;
        Ok(Self {
            href: href.to_string(),
            range: LineRange::from_fragment(fragment)?,
        })
    }
}

pub fn parse_crate_index(html: &str) -> Result<CrateIndex, ParseError> {
    let document = Html::parse_document(html);
    let version = document
        .select(&VERSION_SELECTOR)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|version| !version.is_empty())
        .ok_or(ParseError::MissingNode("crate version"))?;
    let function_locators = document
        .select(&FUNCTION_LINK_SELECTOR)
        .filter_map(|node| node.value().attr("href"))
        .map(str::to_string)
        .collect();

    Ok(CrateIndex {
        version,
        function_locators,
    })
}

pub fn parse_function_page(html: &str) -> Result<FunctionPage, ParseError> {
    let document = Html::parse_document(html);
    let name = document
        .select(&FUNCTION_NAME_SELECTOR)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(ParseError::MissingNode("function name"))?;
    let href = document
        .select(&SOURCE_LINK_SELECTOR)
        .next()
        .and_then(|node| node.value().attr("href"))
        .ok_or(ParseError::MissingNode("source link"))?;

    Ok(FunctionPage {
        name,
        source: SourceLocator::parse(href)?,
    })
}

pub fn parse_source_view(locator: &SourceLocator, html: &str) -> Result<SourceExtract, ParseError> {
    let document = Html::parse_document(html);
    let code = document
        .select(&CODE_SELECTOR)
        .next()
        .map(|node| node.text().collect::<String>())
        .ok_or(ParseError::MissingNode("source code block"))?;
    let raw_lines: Vec<&str> = code.split('\n').collect();

    let lines = extract_lines(locator.range, &raw_lines)?;
    // The first retained line is taken to be the signature; attributes or
    // doc comments at the start of the range are classified as safe.
    let is_unsafe = is_unsafe_signature(&lines[0]);

    Ok(SourceExtract {
        text: lines.join("\n"),
        is_unsafe,
    })
}

/// Keeps the lines inside `range` and strips each one's own line number.
pub fn extract_lines(range: LineRange, raw_lines: &[&str]) -> Result<Vec<String>, ParseError> {
    let mut lines = Vec::new();
    for (idx, raw_line) in raw_lines.iter().enumerate() {
        let line_number = idx + 1;
        if !range.contains(line_number) {
            continue;
        }
        let stripped = raw_line
            .strip_prefix(line_number.to_string().as_str())
            .ok_or(ParseError::LineNumberMismatch { line: line_number })?;
        lines.push(stripped.to_string());
    }

    if lines.is_empty() {
        return Err(ParseError::EmptySourceRange {
            lower: range.lower,
            upper: range.upper,
        });
    }
    Ok(lines)
}

pub fn is_unsafe_signature(line: &str) -> bool {
    UNSAFE_SIGNATURE_REGEX.is_match(line)
}
