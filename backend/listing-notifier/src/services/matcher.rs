use crate::models::{Posting, PreferenceSet};

/// Case-fold and collapse runs of whitespace to a single space
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalized_keywords<'a>(keywords: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| normalize(k))
        .filter(|k| !k.is_empty())
        .collect()
}

/// At least one location must contain at least one location keyword.
/// No keywords means no gate.
fn passes_location_gate(locations: &[String], prefs: &PreferenceSet) -> bool {
    let keywords = normalized_keywords(&prefs.location_keywords);
    if keywords.is_empty() {
        return true;
    }
    locations.iter().map(|l| normalize(l)).any(|location| {
        keywords
            .iter()
            .any(|keyword| location.contains(keyword.as_str()))
    })
}


/// Does `posting` satisfy `prefs`?
///
/// Checks run in a fixed order: `receive_all`, then the location gate, then
/// role and tech keywords against title, company and description. With no
/// role or tech keywords at all, passing the location gate is enough. Blank
/// keywords are ignored everywhere. Keyword containment is substring based.
pub fn matches(posting: &Posting, prefs: &PreferenceSet) -> bool {
    if prefs.receive_all {
        return true;
    }

    if !passes_location_gate(&posting.locations, prefs) {
        return false;
    }

    let blob = normalize(&format!(
        "{} {} {}",
        posting.title,
        posting.company_name,
        posting.description.as_deref().unwrap_or_default()
    ));

    let content = normalized_keywords(prefs.role_keywords.iter().chain(&prefs.tech_keywords));
    content.is_empty() || content.iter().any(|keyword| blob.contains(keyword.as_str()))
}
