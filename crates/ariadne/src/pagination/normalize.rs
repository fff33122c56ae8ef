// ABOUTME: Canonical URL form for cycle and duplicate detection during pagination.
// ABOUTME: Drops the fragment, trims one trailing slash from non-root paths, and sorts query pairs.

use url::Url;

/// Returns the canonical form of `url` used to compare visited pages.
///
/// Only used as a comparison key; pages are always fetched at the URL as found.
pub fn normalize_url(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    let path = canonical.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path[..path.len() - 1].to_string();
        canonical.set_path(&trimmed);
    }

    if canonical.query().is_some() {
        let mut pairs: Vec<(String, String)> = canonical.query_pairs().into_owned().collect();
        if pairs.is_empty() {
            canonical.set_query(None);
        } else {
            pairs.sort();
            canonical.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    canonical.to_string()
}
