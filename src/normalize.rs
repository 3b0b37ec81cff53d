//! Name normalization shared by artist matching, history deduplication and
//! catalog arbitration.
//!
//! Everything that compares free-text names goes through this module.

/// Canonicalize a free-text name for comparison.
///
/// Lowercases, drops every character that is not alphanumeric, whitespace or
/// `&`, and collapses whitespace runs into single spaces with no leading or
/// trailing space. Never fails; symbol-only input yields an empty string.
///
/// ```rust
/// use vibegen::normalize;
///
/// assert_eq!(normalize("  Daft   PUNK!! "), "daft punk");
/// assert_eq!(normalize("Simon & Garfunkel"), "simon & garfunkel");
/// assert_eq!(normalize("?!"), "");
/// ```
pub fn normalize(name: &str) -> String {
    collapse(name, |c| c.is_alphanumeric() || c.is_whitespace() || c == '&')
}

/// Stricter variant used when arbitrating catalog search candidates.
///
/// Same as [`normalize`] but `&` is dropped too, so "Tom & Jerry" and
/// "Tom Jerry" compare equal.
pub fn normalize_strict(name: &str) -> String {
    collapse(name, |c| c.is_alphanumeric() || c.is_whitespace())
}

fn collapse(name: &str, keep: impl Fn(char) -> bool) -> String {
    let filtered: String = name.to_lowercase().chars().filter(|&c| keep(c)).collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("Daft Punk"), "daft punk");
        assert_eq!(normalize("daft   PUNK!!"), "daft punk");
        assert_eq!(normalize("\tAC/DC\n"), "acdc");
        assert_eq!(normalize("Dimitri Vegas & Like Mike"), "dimitri vegas & like mike");
    }

    #[test]
    fn test_normalize_is_total() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!?#*"), "");
        assert_eq!(normalize("&"), "&");
    }

    #[test]
    fn test_normalize_keeps_unicode_letters() {
        assert_eq!(normalize("Björk"), "björk");
        assert_eq!(normalize("Sigur Rós"), "sigur rós");
        assert_eq!(normalize("坂本 龍一"), "坂本 龍一");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "  ",
            "Daft Punk",
            "daft   PUNK!!",
            "Guns N' Roses",
            "  Tom  &  Jerry ",
            "Ünïcödé — Dash",
            "a\u{00a0}b",
            "MØ",
            "#!&&!#",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
            let strict = normalize_strict(sample);
            assert_eq!(normalize_strict(&strict), strict, "strict not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_normalize_strict_drops_ampersand() {
        assert_eq!(normalize_strict("Tom & Jerry"), "tom jerry");
        assert_eq!(normalize_strict("Don't Stop Me Now"), "dont stop me now");
        assert_eq!(normalize_strict("&"), "");
    }
}
