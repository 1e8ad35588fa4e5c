use crate::error::RuleError;
use std::ops::RangeInclusive;

/// Membership set over Unicode code points, built from a user-typed string such as `A-Z#%`.
///
/// Syntax:
/// - any character stands for itself
/// - `a-z` is an inclusive range; a `-` at either end is literal
/// - `\` escapes the next character (`\-`, `\\`), `\t` is a tab
/// - `\u{1F600}` and `U+00E9` name a code point by its hex value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharSet {
    ranges: Vec<RangeInclusive<char>>,
}

#[derive(Debug, Clone, Copy)]
struct Atom {
    ch: char,
    literal: bool,
}

impl CharSet {
    pub fn parse(input: &str) -> Result<Self, RuleError> {
        let atoms = tokenize(input)?;
        let mut ranges = Vec::new();
        let mut i = 0usize;

        while i < atoms.len() {
            let start = atoms[i];
            let is_range = i + 2 < atoms.len() && atoms[i + 1].ch == '-' && !atoms[i + 1].literal;
            if is_range {
                let end = atoms[i + 2].ch;
                if start.ch > end {
                    return Err(RuleError::InvalidRange {
                        start: start.ch,
                        end,
                    });
                }
                ranges.push(start.ch..=end);
                i += 3;
            } else {
                ranges.push(start.ch..=start.ch);
                i += 1;
            }
        }

        if ranges.is_empty() {
            return Err(RuleError::EmptyCharSet);
        }

        ranges.sort_by_key(|r| (*r.start(), *r.end()));
        Ok(Self { ranges })
    }

    pub fn contains(&self, ch: char) -> bool {
        self.ranges.iter().any(|r| r.contains(&ch))
    }
}

fn tokenize(input: &str) -> Result<Vec<Atom>, RuleError> {
    let chars: Vec<char> = input.chars().collect();
    let mut atoms = Vec::with_capacity(chars.len());
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if next == 'u' && chars.get(i + 2) == Some(&'{') {
                let close = chars[i + 3..]
                    .iter()
                    .position(|c| *c == '}')
                    .map(|p| p + i + 3)
                    .ok_or_else(|| RuleError::InvalidCodePoint(chars[i..].iter().collect()))?;
                let hex: String = chars[i + 3..close].iter().collect();
                atoms.push(Atom {
                    ch: code_point(&hex)?,
                    literal: true,
                });
                i = close + 1;
                continue;
            }
            let ch = if next == 't' { '\t' } else { next };
            atoms.push(Atom { ch, literal: true });
            i += 2;
            continue;
        }

        if ch == 'U' && chars.get(i + 1) == Some(&'+') {
            let hex: String = chars[i + 2..]
                .iter()
                .take(6)
                .take_while(|c| c.is_ascii_hexdigit())
                .collect();
            if hex.len() >= 4 {
                atoms.push(Atom {
                    ch: code_point(&hex)?,
                    literal: true,
                });
                i += 2 + hex.len();
                continue;
            }
        }

        atoms.push(Atom { ch, literal: false });
        i += 1;
    }

    Ok(atoms)
}

fn code_point(hex: &str) -> Result<char, RuleError> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| RuleError::InvalidCodePoint(hex.to_string()))
}
