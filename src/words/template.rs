//! `{name}` substitution for the random word list

const PLACEHOLDER: &str = "{name}";

/// Fill `{name}` with the baby's name
///
/// Without a name the placeholder is dropped together with a possessive
/// suffix, so `"{name}'s ball"` becomes `"ball"`.
pub fn apply_name(template: &str, name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => template.replace(PLACEHOLDER, name),
        None => template
            .split_whitespace()
            .filter_map(strip_placeholder)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn strip_placeholder(token: &str) -> Option<String> {
    if !token.contains(PLACEHOLDER) {
        return Some(token.to_string());
    }

    let stripped = token
        .replace("{name}'s", "")
        .replace("{name}\u{2019}s", "")
        .replace(PLACEHOLDER, "");

    // Leftover punctuation such as the "," in "{name}," goes with the name
    if stripped.chars().all(|c| c.is_ascii_punctuation()) {
        None
    } else {
        Some(stripped)
    }
}
