//! Slug and text helpers used by metadata resolution.

/// Extract the trailing numeric id from a slug (`utakmica-123` -> `123`).
pub fn extract_id(slug: &str) -> Option<u64> {
    let (_, tail) = slug.rsplit_once('-')?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

/// Fold Croatian diacritics to ASCII.
fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'č' | 'ć' => 'c',
            'Č' | 'Ć' => 'C',
            'ž' => 'z',
            'Ž' => 'Z',
            'š' => 's',
            'Š' => 'S',
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        })
        .collect()
}

/// Normalize a category name for comparison and keywords.
pub fn normalize_category(name: &str) -> String {
    fold_diacritics(name).to_lowercase().trim().to_string()
}

/// Upper-case the first character.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Collapse whitespace and cut to at most `max` characters on a word boundary.
///
/// Truncated text ends in `...`.
pub fn meta_description(text: &str, max: usize) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= max {
        return cleaned;
    }

    let head: String = cleaned.chars().take(max).collect();
    let mut words: Vec<&str> = head.split(' ').collect();
    words.pop();
    format!("{}...", words.join(" "))
}
