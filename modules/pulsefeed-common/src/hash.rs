use sha2::{Digest, Sha256};

/// Hex-encoded sha256 of the input. Used for summary cache keys and
/// content-addressed summary lookups.
pub fn content_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_across_calls() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
    }

    #[test]
    fn differs_by_input() {
        assert_ne!(content_hash("hello"), content_hash("hello "));
    }

    #[test]
    fn hex_encoded_sha256_length() {
        assert_eq!(content_hash("").len(), 64);
    }
}
