//! Tiered wildcard suffix matching of query names against services.
//!
//! A query is consumed from the right, one tier at a time: first the local
//! domain, then the service image, then the service name. Each tier has to
//! match label-wise at the tail of whatever is left of the query. A `*` label
//! in the query matches any single label. Running out of query labels at any
//! point counts as a match, so `docker.local` selects every service and
//! `bar.docker.local` every service of image `bar`.

use crate::domain::split_labels;
use crate::registry::Service;

/// Query-side wildcard label.
pub const WILDCARD: &str = "*";

/// Match the tail of `query` against `pattern`.
///
/// Returns the unmatched query prefix on success and `None` when some label
/// differs. When the query is shorter than the pattern, the overlapping labels
/// have to match and the remainder is empty.
pub fn match_tail<'q, S: AsRef<str>>(query: &'q [String], pattern: &[S]) -> Option<&'q [String]> {
    for k in 1..=pattern.len() {
        if query.len() < k {
            return Some(&[]);
        }
        let q = query[query.len() - k].as_str();
        let p = pattern[pattern.len() - k].as_ref();
        if q != p && q != WILDCARD {
            return None;
        }
    }
    Some(&query[..query.len() - pattern.len()])
}

/// Whether `query` (lowercased labels) addresses `service` under `domain`.
pub fn matches_query<S: AsRef<str>>(service: &Service, query: &[String], domain: &[S]) -> bool {
    let image = split_labels(&service.image);
    let name = split_labels(&service.name);
    let domain: Vec<&str> = domain.iter().map(AsRef::as_ref).collect();
    let image: Vec<&str> = image.iter().map(String::as_str).collect();
    let name: Vec<&str> = name.iter().map(String::as_str).collect();
    let tiers: [&[&str]; 3] = [&domain, &image, &name];

    let mut remaining = query;
    for tier in tiers {
        if remaining.is_empty() {
            return true;
        }
        match match_tail(remaining, tier) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }
    true
}
