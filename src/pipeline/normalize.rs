//! Name normalisation shared by the asset index and the record matcher.
//!
//! Both sides of a lookup must go through [`normalize`]; a key built any
//! other way silently misses.

use unicode_normalization::UnicodeNormalization;

/// Canonical, case-insensitive key for a display name.
///
/// Compatibility decomposition, then lower-casing, then decomposition again
/// (lower-casing can emit composed characters), so the result is a fixed
/// point: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.nfkd().collect::<String>().to_lowercase();
    lowered.nfkd().collect()
}

/// Spaces become underscores, matching how roster images are named
/// (`Jane Doe` → `Jane_Doe`).
pub fn delimit(name: &str) -> String {
    name.replace(' ', "_")
}
