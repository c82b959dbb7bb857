use std::sync::OnceLock;

use regex::Regex;

/// Returns true when `candidate` is a valid component machine name:
/// a leading ASCII letter or underscore followed by letters, digits or
/// underscores.
pub fn is_machine_name(candidate: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
    regex.is_match(candidate)
}

/// Strips `suffix` from a file name and returns the machine name if the
/// remainder satisfies the grammar.
pub fn machine_name_from_file(file_name: &str, suffix: &str) -> Option<String> {
    let stem = file_name.strip_suffix(suffix)?;
    is_machine_name(stem).then(|| stem.to_string())
}
