//! Content-addressed keys for cached analysis reports.

/// Key for an analysis of `content` under `frameworks`.
///
/// Framework order and duplicates do not matter: `["A", "B"]`, `["B", "A"]`
/// and `["A", "B", "A"]` all produce the same key. Fields are length-prefixed
/// so that no two distinct inputs share a hash preimage.
pub fn analysis_key<S: AsRef<str>>(content: &str, frameworks: &[S]) -> String {
    let mut names: Vec<&str> = frameworks.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.dedup();

    let mut hasher = blake3::Hasher::new();
    hasher.update(b"huginn:analysis:v1");
    write_field(&mut hasher, content.as_bytes());
    hasher.update(&(names.len() as u64).to_le_bytes());
    for name in names {
        write_field(&mut hasher, name.as_bytes());
    }

    format!("analysis:{}", hasher.finalize().to_hex())
}

fn write_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_order_and_duplicates_ignored() {
        let a = analysis_key("text", &["STEPPS", "IDEAL"]);
        let b = analysis_key("text", &["IDEAL", "STEPPS", "IDEAL"]);
        assert_eq!(a, b);
    }

    #[test]
    fn content_changes_key() {
        assert_ne!(
            analysis_key("one", &["IDEAL"]),
            analysis_key("two", &["IDEAL"])
        );
    }

    #[test]
    fn framework_set_changes_key() {
        assert_ne!(
            analysis_key("text", &["IDEAL"]),
            analysis_key("text", &["IDEAL", "STEPPS"])
        );
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        assert_ne!(analysis_key("ab", &["c"]), analysis_key("a", &["bc"]));
    }

    #[test]
    fn key_is_prefixed_hex() {
        let key = analysis_key("text", &[String::from("IDEAL")]);
        let hex = key.strip_prefix("analysis:").unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
