//! Glob matching for cache keys. Only `*` is special; it matches any run of
//! characters, including none.

/// Checks if a cache key matches a glob pattern.
///
/// ```
/// use entityflow_core::cache::pattern_matches;
///
/// assert!(pattern_matches("query:store:*", "query:store:g1:get:{}"));
/// assert!(pattern_matches("query:*:g1:*", "query:user:g1:list:x"));
/// assert!(!pattern_matches("query:store:*", "query:user:g1:get:{}"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern = pattern.as_bytes();
    let key = key.as_bytes();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` seen and the key index it currently absorbs up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, k));
            p += 1;
        } else if p < pattern.len() && pattern[p] == key[k] {
            p += 1;
            k += 1;
        } else if let Some((star, absorbed)) = backtrack {
            p = star + 1;
            k = absorbed + 1;
            backtrack = Some((star, absorbed + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}
