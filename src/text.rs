//! Case classification and canonical keys for cell text

/// True when `s` has at least one cased character and none is lowercase
pub fn is_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

/// True when `s` has at least one cased character and none is uppercase
pub fn is_lower(s: &str) -> bool {
    s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)
}

/// First character uppercased, the rest lowercased
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Uppercase with punctuation, spaces, dashes and quotes removed.
///
/// Discipline names in the vocabulary and in title cells are compared on
/// this form.
pub fn canonical_key(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_ascii_punctuation() && !matches!(c, ' ' | '–' | '«' | '»'))
        .flat_map(char::to_uppercase)
        .collect()
}
