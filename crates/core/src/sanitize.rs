const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Splits `name` into base and extension (with its leading dot).
///
/// A leading dot does not start an extension (`.bashrc` has none), and neither does a
/// trailing one (`notes.`).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => name.split_at(pos),
        _ => (name, ""),
    }
}

pub fn is_windows_reserved(base: &str) -> bool {
    let stem = base.split('.').next().unwrap_or(base).to_ascii_uppercase();
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| reserved == &stem)
}

/// Appends `suffix` to the first dot-separated segment of a reserved device name,
/// so `CON` becomes `CON_` and `aux.tar` becomes `aux_.tar`.
pub fn guard_reserved(base: String, suffix: &str) -> String {
    if !is_windows_reserved(&base) {
        return base;
    }
    let split_at = base.find('.').unwrap_or(base.len());
    let (head, tail) = base.split_at(split_at);
    format!("{head}{suffix}{tail}")
}

/// Turns runs of spaces and tabs into `_`, then folds repeated `_`.
pub fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_underscore = false;

    for ch in value.trim_matches([' ', '\t']).chars() {
        let ch = if ch == ' ' || ch == '\t' { '_' } else { ch };
        if ch == '_' {
            if prev_underscore {
                continue;
            }
            prev_underscore = true;
        } else {
            prev_underscore = false;
        }
        out.push(ch);
    }

    out
}

/// Windows silently drops trailing dots and spaces, so never produce them.
pub fn trim_trailing_dots_and_spaces(value: &str) -> &str {
    value.trim_end_matches([' ', '.'])
}

pub fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || ch.is_control()
}

/// A candidate must stay a single path component in the same folder.
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\0'])
        && !(cfg!(windows) && name.contains('\\'))
}

pub fn human_readable_size(num_bytes: u64) -> String {
    let mut value = num_bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} PB")
}
