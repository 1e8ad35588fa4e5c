use crate::charset::CharSet;
use crate::date_format::{parse_date_format, DatePart};
use crate::error::RuleError;
use crate::sanitize::is_disallowed_char;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MAX_SEQUENTIAL_START: u64 = 10_000_000;
pub const MAX_PADDING: usize = 32;

/// The one transformation applied during a planning pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenameRule {
    StripReplace {
        bad_chars: String,
        replacement: Option<char>,
        #[serde(default)]
        collapse_whitespace: bool,
    },
    Sequential {
        prefix: String,
        start: u64,
        padding: usize,
    },
    Regex {
        pattern: String,
        replacement: String,
        /// Match against the full name instead of the base name.
        #[serde(default)]
        whole_name: bool,
    },
    MetadataDate {
        #[serde(default)]
        prefix: String,
        format: String,
    },
}

/// A validated rule, ready for the transformer.
#[derive(Debug, Clone)]
pub enum CompiledRule {
    StripReplace {
        bad: CharSet,
        replacement: Option<char>,
        collapse_whitespace: bool,
    },
    Sequential {
        prefix: String,
        start: u64,
        padding: usize,
    },
    Regex {
        regex: Regex,
        replacement: String,
        whole_name: bool,
    },
    MetadataDate {
        prefix: String,
        format: Vec<DatePart>,
    },
}

impl RenameRule {
    pub fn compile(&self) -> Result<CompiledRule, RuleError> {
        match self {
            RenameRule::StripReplace {
                bad_chars,
                replacement,
                collapse_whitespace,
            } => {
                let bad = CharSet::parse(bad_chars)?;
                if let Some(ch) = replacement {
                    if is_disallowed_char(*ch) {
                        return Err(RuleError::IllegalReplacement(*ch));
                    }
                }
                Ok(CompiledRule::StripReplace {
                    bad,
                    replacement: *replacement,
                    collapse_whitespace: *collapse_whitespace,
                })
            }
            RenameRule::Sequential {
                prefix,
                start,
                padding,
            } => {
                if *start > MAX_SEQUENTIAL_START {
                    return Err(RuleError::StartOutOfRange {
                        start: *start,
                        max: MAX_SEQUENTIAL_START,
                    });
                }
                if *padding > MAX_PADDING {
                    return Err(RuleError::PaddingOutOfRange {
                        width: *padding,
                        max: MAX_PADDING,
                    });
                }
                Ok(CompiledRule::Sequential {
                    prefix: prefix.clone(),
                    start: *start,
                    padding: *padding,
                })
            }
            RenameRule::Regex {
                pattern,
                replacement,
                whole_name,
            } => {
                if pattern.is_empty() {
                    return Err(RuleError::EmptyPattern);
                }
                let regex = Regex::new(pattern).map_err(|err| RuleError::Compile(err.to_string()))?;
                Ok(CompiledRule::Regex {
                    regex,
                    replacement: normalize_replacement(replacement),
                    whole_name: *whole_name,
                })
            }
            RenameRule::MetadataDate { prefix, format } => Ok(CompiledRule::MetadataDate {
                prefix: prefix.clone(),
                format: parse_date_format(format)?,
            }),
        }
    }

    pub fn needs_capture_date(&self) -> bool {
        matches!(self, RenameRule::MetadataDate { .. })
    }

    /// One-line description stored with each executed batch.
    pub fn summary(&self) -> String {
        match self {
            RenameRule::StripReplace {
                bad_chars,
                replacement,
                ..
            } => match replacement {
                Some(ch) => format!("strip [{bad_chars}] -> {ch:?}"),
                None => format!("strip [{bad_chars}]"),
            },
            RenameRule::Sequential {
                prefix,
                start,
                padding,
            } => format!("sequential {prefix:?} from {start} (pad {padding})"),
            RenameRule::Regex {
                pattern,
                replacement,
                ..
            } => format!("regex s/{pattern}/{replacement}/g"),
            RenameRule::MetadataDate { prefix, format } => {
                format!("date {prefix:?} + {format}")
            }
        }
    }
}

/// Parses the replacement field: empty means delete, otherwise exactly one character.
pub fn parse_replacement(input: &str) -> Result<Option<char>, RuleError> {
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(ch), None) => Ok(Some(ch)),
        _ => Err(RuleError::ReplacementTooLong(input.to_string())),
    }
}

/// Accepts `\1`-style group references next to the native `$1` / `${name}` forms.
fn normalize_replacement(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    group.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{group}}}"));
            }
            Some('\\') => {
                out.push('\\');
                chars.next();
            }
            _ => out.push('\\'),
        }
    }

    out
}
