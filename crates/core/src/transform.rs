//! Name Transformer: maps one original name to a candidate name under a compiled rule.
//!
//! Everything here is pure. Dates come from the [`FileEntry`] snapshot, the sequence
//! number from the caller, so preview and execution always agree.

use crate::date_format::render_date;
use crate::entry::FileEntry;
use crate::error::RuleError;
use crate::rule::CompiledRule;
use crate::sanitize::{
    collapse_whitespace, guard_reserved, is_disallowed_char, is_valid_file_name,
    split_extension, trim_trailing_dots_and_spaces,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PLACEHOLDER: &str = "untitled";
pub const DEFAULT_RESERVED_SUFFIX: &str = "_";

/// Cross-platform legality knobs shared by every rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamingPolicy {
    pub reserved_suffix: String,
    pub placeholder: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            reserved_suffix: DEFAULT_RESERVED_SUFFIX.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl NamingPolicy {
    /// Both values end up inside generated names, so they must be legal there.
    pub fn validate(&self) -> Result<(), RuleError> {
        let suffix = &self.reserved_suffix;
        if suffix.is_empty()
            || suffix
                .chars()
                .any(|ch| is_disallowed_char(ch) || ch == '.' || ch.is_whitespace())
        {
            return Err(RuleError::InvalidReservedSuffix(suffix.clone()));
        }

        let placeholder = &self.placeholder;
        if !is_valid_file_name(placeholder)
            || placeholder.chars().any(is_disallowed_char)
            || trim_trailing_dots_and_spaces(placeholder) != placeholder
        {
            return Err(RuleError::InvalidPlaceholder(placeholder.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Zero-based position of the entry in plan order.
    pub sequence: u64,
    pub naming: &'a NamingPolicy,
}

pub fn transform(entry: &FileEntry, rule: &CompiledRule, ctx: &TransformContext<'_>) -> String {
    let (base, ext) = if entry.is_dir() {
        (entry.name.as_str(), "")
    } else {
        split_extension(&entry.name)
    };

    let (new_base, new_ext) = match rule {
        CompiledRule::StripReplace {
            bad,
            replacement,
            collapse_whitespace: collapse,
        } => {
            let strip = |s: &str| -> String {
                s.chars()
                    .filter_map(|ch| if bad.contains(ch) { *replacement } else { Some(ch) })
                    .collect()
            };
            let mut stripped = strip(base);
            if *collapse {
                stripped = collapse_whitespace(&stripped);
            }
            let ext_body = strip(ext.strip_prefix('.').unwrap_or(ext));
            let ext_body = ext_body.trim_matches([' ', '.']);
            let new_ext = if ext_body.is_empty() {
                String::new()
            } else {
                format!(".{ext_body}")
            };
            (stripped, new_ext)
        }
        CompiledRule::Sequential {
            prefix,
            start,
            padding,
        } => {
            let index = start.saturating_add(ctx.sequence);
            (
                format!("{prefix}{index:0width$}", width = *padding),
                ext.to_string(),
            )
        }
        CompiledRule::Regex {
            regex,
            replacement,
            whole_name,
        } => {
            if *whole_name {
                let replaced = regex.replace_all(&entry.name, replacement.as_str());
                return finish(replaced.into_owned(), String::new(), entry.is_dir(), ctx.naming);
            }
            (
                regex.replace_all(base, replacement.as_str()).into_owned(),
                ext.to_string(),
            )
        }
        CompiledRule::MetadataDate { prefix, format } => {
            match entry.captured_at.or(entry.modified) {
                Some(date) => (
                    format!("{prefix}{}", render_date(format, &date)),
                    ext.to_string(),
                ),
                None => return entry.name.clone(),
            }
        }
    };

    finish(new_base, new_ext, entry.is_dir(), ctx.naming)
}

fn finish(base: String, ext: String, is_dir: bool, naming: &NamingPolicy) -> String {
    let (base, ext) = settle(base, ext, is_dir);
    let base = if base.is_empty() {
        naming.placeholder.clone()
    } else {
        base
    };
    guard_reserved(base, &naming.reserved_suffix) + &ext
}

/// Trims trailing dots and spaces off the base until the base/extension split is stable,
/// so feeding the result back in splits the same way.
fn settle(base: String, ext: String, is_dir: bool) -> (String, String) {
    if base.is_empty() {
        return (base, ext);
    }

    let mut full = base + &ext;
    loop {
        let (b, e) = if is_dir {
            (full.as_str(), "")
        } else {
            split_extension(&full)
        };
        let trimmed = trim_trailing_dots_and_spaces(b);
        if trimmed.len() == b.len() || trimmed.is_empty() {
            return (trimmed.to_string(), e.to_string());
        }
        full = format!("{trimmed}{e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use crate::rule::RenameRule;
    use chrono::{Local, TimeZone};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn entry(name: &str, kind: EntryKind) -> FileEntry {
        FileEntry {
            path: PathBuf::from("/batch").join(name),
            name: name.to_string(),
            kind,
            depth: 1,
            size: None,
            modified: None,
            captured_at: None,
        }
    }

    fn file(name: &str) -> FileEntry {
        entry(name, EntryKind::File)
    }

    #[test]
    fn naming_policy_rejects_suffixes_that_leave_reserved_names_bare() {
        assert!(NamingPolicy::default().validate().is_ok());

        for suffix in ["", ".", " ", "?", "a/b"] {
            let naming = NamingPolicy {
                reserved_suffix: suffix.to_string(),
                ..NamingPolicy::default()
            };
            assert_eq!(
                naming.validate(),
                Err(RuleError::InvalidReservedSuffix(suffix.to_string()))
            );
        }

        for placeholder in ["", "..", "un:titled", "untitled."] {
            let naming = NamingPolicy {
                placeholder: placeholder.to_string(),
                ..NamingPolicy::default()
            };
            assert_eq!(
                naming.validate(),
                Err(RuleError::InvalidPlaceholder(placeholder.to_string()))
            );
        }
    }

    fn run(rule: RenameRule, e: &FileEntry, sequence: u64) -> String {
        let compiled = rule.compile().expect("rule must compile");
        let naming = NamingPolicy::default();
        transform(
            e,
            &compiled,
            &TransformContext {
                sequence,
                naming: &naming,
            },
        )
    }

    fn strip(bad: &str, replacement: Option<char>) -> RenameRule {
        RenameRule::StripReplace {
            bad_chars: bad.to_string(),
            replacement,
            collapse_whitespace: false,
        }
    }

    #[test]
    fn strip_deletes_bad_characters() {
        assert_eq!(run(strip("#%", None), &file("re#port%.txt"), 0), "report.txt");
    }

    #[test]
    fn strip_substitutes_single_character() {
        assert_eq!(run(strip("#%", Some('-')), &file("a#b%c.txt"), 0), "a-b-c.txt");
    }

    #[test]
    fn strip_keeps_the_extension_dot_even_when_dot_is_bad() {
        assert_eq!(run(strip(".", None), &file("v1.2.txt"), 0), "v12.txt");
    }

    #[test]
    fn strip_to_empty_uses_placeholder() {
        assert_eq!(run(strip("#", None), &file("###.txt"), 0), "untitled.txt");
        assert_eq!(
            run(strip("#", None), &entry("##", EntryKind::Directory), 0),
            "untitled"
        );
    }

    #[test]
    fn reserved_names_are_suffixed() {
        assert_eq!(run(strip("#", None), &file("CON#"), 0), "CON_");
        assert_eq!(run(strip("#", None), &file("nul#.txt"), 0), "nul_.txt");
    }

    #[test]
    fn strip_collapses_whitespace_when_asked() {
        let rule = RenameRule::StripReplace {
            bad_chars: "#".to_string(),
            replacement: None,
            collapse_whitespace: true,
        };
        assert_eq!(run(rule, &file("my  #file .txt"), 0), "my_file.txt");
    }

    #[test]
    fn strip_trims_trailing_dots_and_spaces() {
        assert_eq!(run(strip("#", None), &file("draft. #.md"), 0), "draft.md");
        assert_eq!(run(strip("#", None), &file("a .b.#"), 0), "a.b");
    }

    #[test]
    fn sequential_pads_and_keeps_extension() {
        let rule = RenameRule::Sequential {
            prefix: "img".to_string(),
            start: 1,
            padding: 3,
        };
        assert_eq!(run(rule.clone(), &file("a.txt"), 0), "img001.txt");
        assert_eq!(run(rule, &file("b.txt"), 1), "img002.txt");
    }

    #[test]
    fn sequential_without_padding_and_for_directories() {
        let rule = RenameRule::Sequential {
            prefix: "item".to_string(),
            start: 9,
            padding: 0,
        };
        assert_eq!(run(rule.clone(), &file("x.JPG"), 2), "item11.JPG");
        assert_eq!(
            run(rule, &entry("photos.2020", EntryKind::Directory), 0),
            "item9"
        );
    }

    #[test]
    fn regex_replaces_all_matches_in_base_only() {
        let rule = RenameRule::Regex {
            pattern: "a".to_string(),
            replacement: "o".to_string(),
            whole_name: false,
        };
        assert_eq!(run(rule, &file("banana.aac"), 0), "bonono.aac");
    }

    #[test]
    fn regex_supports_capture_groups() {
        let rule = RenameRule::Regex {
            pattern: r"(\w+)-(\d+)".to_string(),
            replacement: r"\2_\1".to_string(),
            whole_name: false,
        };
        assert_eq!(run(rule, &file("scan-042.pdf"), 0), "042_scan.pdf");
    }

    #[test]
    fn regex_can_target_the_whole_name() {
        let rule = RenameRule::Regex {
            pattern: r"\.jpeg$".to_string(),
            replacement: ".jpg".to_string(),
            whole_name: true,
        };
        assert_eq!(run(rule, &file("cat.jpeg"), 0), "cat.jpg");
    }

    #[test]
    fn metadata_prefers_capture_date() {
        let captured = Local
            .with_ymd_and_hms(2021, 6, 1, 12, 30, 0)
            .single()
            .expect("valid");
        let modified = Local
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid");
        let mut e = file("DSC0001.JPG");
        e.modified = Some(modified);
        let rule = RenameRule::MetadataDate {
            prefix: "IMG_".to_string(),
            format: "YYYY-MM-DD_HH-mm-ss".to_string(),
        };

        assert_eq!(run(rule.clone(), &e, 0), "IMG_2024-01-01_00-00-00.JPG");
        e.captured_at = Some(captured);
        assert_eq!(run(rule, &e, 0), "IMG_2021-06-01_12-30-00.JPG");
    }

    #[test]
    fn metadata_without_any_date_is_a_no_op() {
        let rule = RenameRule::MetadataDate {
            prefix: String::new(),
            format: "YYYY".to_string(),
        };
        assert_eq!(run(rule, &file("a.png"), 0), "a.png");
    }

    proptest! {
        #[test]
        fn strip_is_idempotent(
            name in "[a-zA-Z0-9 #%._-]{1,24}",
            replacement in proptest::option::of(prop_oneof![Just('_'), Just('-'), Just(' '), Just('#')]),
            collapse in any::<bool>(),
        ) {
            let rule = RenameRule::StripReplace {
                bad_chars: "#%".to_string(),
                replacement,
                collapse_whitespace: collapse,
            };
            let once = run(rule.clone(), &file(&name), 0);
            let twice = run(rule, &file(&once), 0);
            prop_assert_eq!(once, twice);
        }
    }
}
