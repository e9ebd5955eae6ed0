//! Category and free-text filtering of the place catalogue

use crate::domain::types::Establishment;

/// Filter `places` by exact category and case-insensitive text query
///
/// The query is matched as a substring of name, description, address and
/// category. Blank query and blank category return everything.
pub fn filter(places: &[Establishment], query: &str, category: &str) -> Vec<Establishment> {
    let query = query.trim().to_lowercase();
    let category = category.trim();

    places
        .iter()
        .filter(|est| category.is_empty() || est.category == category)
        .filter(|est| query.is_empty() || matches_query(est, &query))
        .cloned()
        .collect()
}

fn matches_query(est: &Establishment, query: &str) -> bool {
    [
        est.name.as_str(),
        est.description.as_deref().unwrap_or(""),
        est.address.as_deref().unwrap_or(""),
        est.category.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(query))
}
