//! query evaluation against repository attributes.

use tracing::debug;

use crate::model::{Query, QueryItem, Repository};

/// Decide whether a repository matches the supplied query groups.
///
/// With no groups at all the repository matches unconditionally; this is
/// the unconditional-bulk path. Otherwise items are walked in order
/// across all groups:
///
/// - an item that matches while `inclusive` is set accepts the
///   repository immediately
/// - an item that fails while `inclusive` is unset rejects it
///   immediately
/// - a completed walk rejects
///
/// The two modes are deliberately asymmetric. Inclusive mode behaves as
/// an OR over items; exclusive mode short-circuits on the first failure
/// and rejects even when every item matched. Callers relying on the
/// historical wire contract depend on exactly this shape, so it must not
/// be symmetrized.
pub fn matches_queries(repository: &Repository, inclusive: bool, queries: &[Query]) -> bool {
    if queries.is_empty() {
        return true;
    }
    for query in queries {
        for item in &query.items {
            let matched = matches_item(repository, item);
            if matched && inclusive {
                return true;
            }
            if !matched && !inclusive {
                return false;
            }
        }
    }
    false
}

/// evaluate one item against one repository
pub fn matches_item(repository: &Repository, item: &QueryItem) -> bool {
    match field_value(repository, &item.key) {
        Some(actual) => item.aggregator.matches(&actual, &item.value),
        None => {
            debug!(key = %item.key, "query references an unknown repository field");
            false
        }
    }
}

/// Render a queryable repository field as a string.
///
/// Numeric fields (state ordinal, collection counts) are rendered
/// through their decimal form and compared lexically by the operators;
/// `charts in "2,3"` is string membership, not a numeric range.
fn field_value(repository: &Repository, key: &str) -> Option<String> {
    match key {
        "name" => Some(repository.name.to_string()),
        "id" => Some(repository.id.to_string()),
        "state" => Some(repository.state.ordinal().to_string()),
        "charts" => Some(repository.charts.len().to_string()),
        "manifests" => Some(repository.manifests.len().to_string()),
        _ => None,
    }
}
