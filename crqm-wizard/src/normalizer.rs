//! Company name normalization
//!
//! Pure functions, no I/O. Three forms are produced from user text:
//! - **search key**: trimmed, whitespace-collapsed, lowercased; sent to providers
//! - **display name**: title-cased; shown when nothing richer resolves
//! - **match key**: search key without corporate suffixes and punctuation;
//!   used to compare names from different providers

/// Corporate suffixes ignored when comparing names. Longer forms first.
const CORPORATE_SUFFIXES: &[&str] = &[
    "private limited",
    "pvt ltd",
    "pvt. ltd.",
    "incorporated",
    "corporation",
    "limited",
    "company",
    "group",
    "holdings",
    "inc.",
    "inc",
    "llc",
    "ltd.",
    "ltd",
    "corp.",
    "corp",
    "co.",
    "plc",
    "gmbh",
    "ag",
    "sa",
];

/// Trim, collapse internal whitespace and lowercase. Never fails; empty in,
/// empty out.
pub fn search_key(raw: &str) -> String {
    collapse_whitespace(raw).to_lowercase()
}

/// Title-case each word: the first letter after any non-letter is
/// uppercased, the rest lowercased ("o'reilly media" -> "O'Reilly Media").
pub fn display_name(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw);
    let mut result = String::with_capacity(collapsed.len());
    let mut previous_is_letter = false;

    for c in collapsed.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(c);
            previous_is_letter = false;
        }
    }

    result
}

/// Comparison key: search key with punctuation, "the" prefix and trailing
/// corporate suffixes removed
pub fn match_key(raw: &str) -> String {
    let lowered = search_key(raw).replace('&', " and ");
    let mut key: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' { c } else { ' ' })
        .collect();
    key = collapse_whitespace(&key);

    if let Some(rest) = key.strip_prefix("the ") {
        key = rest.to_string();
    }

    // Strip repeatedly: "Foo Holdings Ltd." -> "foo"
    loop {
        let before = key.len();
        for suffix in CORPORATE_SUFFIXES {
            if let Some(rest) = key.strip_suffix(suffix) {
                if rest.ends_with(' ') {
                    key = rest.trim_end().to_string();
                    break;
                }
            }
        }
        if key.len() == before {
            break;
        }
    }

    key.replace('.', "")
}

/// Normalized Levenshtein similarity of two names' match keys (0.0-1.0)
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = match_key(a);
    let b = match_key(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
