use crate::error::RuleError;
use chrono::{DateTime, Datelike, Local, Timelike};

pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD_HH-mm-ss";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatePart {
    Literal(String),
    Token(DateToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    Year,
    ShortYear,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

// Longest first so `YYYY` wins over `YY`.
const TOKENS: &[(&str, DateToken)] = &[
    ("YYYY", DateToken::Year),
    ("YY", DateToken::ShortYear),
    ("MM", DateToken::Month),
    ("DD", DateToken::Day),
    ("HH", DateToken::Hour),
    ("mm", DateToken::Minute),
    ("ss", DateToken::Second),
];

pub fn parse_date_format(input: &str) -> Result<Vec<DatePart>, RuleError> {
    if input.is_empty() {
        return Err(RuleError::EmptyDateFormat);
    }

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    'outer: while !rest.is_empty() {
        for (pattern, token) in TOKENS {
            if let Some(tail) = rest.strip_prefix(pattern) {
                if !literal.is_empty() {
                    parts.push(DatePart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(DatePart::Token(*token));
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            literal.push(ch);
        }
        rest = chars.as_str();
    }

    if !literal.is_empty() {
        parts.push(DatePart::Literal(literal));
    }

    Ok(parts)
}

pub fn render_date(parts: &[DatePart], date: &DateTime<Local>) -> String {
    let mut output = String::new();
    for part in parts {
        match part {
            DatePart::Literal(s) => output.push_str(s),
            DatePart::Token(token) => {
                let value = match token {
                    DateToken::Year => format!("{:04}", date.year()),
                    DateToken::ShortYear => format!("{:02}", date.year().rem_euclid(100)),
                    DateToken::Month => format!("{:02}", date.month()),
                    DateToken::Day => format!("{:02}", date.day()),
                    DateToken::Hour => format!("{:02}", date.hour()),
                    DateToken::Minute => format!("{:02}", date.minute()),
                    DateToken::Second => format!("{:02}", date.second()),
                };
                output.push_str(&value);
            }
        }
    }
    output
}
