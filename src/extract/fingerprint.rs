//! Page fingerprints for duplicate and near-duplicate detection

use sha2::{Digest, Sha256};

/// Accumulates the contextual and structural tag streams of a document
///
/// The contextual stream records `<tag attr1 attr2>...</tag>`; the structural
/// stream records only the shape, `<@@>...</>`, one `@` per attribute.
/// Attribute names are sorted so the streams do not depend on parser order.
#[derive(Default)]
pub struct FingerprintBuilder {
    contextual: Sha256,
    structural: Sha256,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an element start
    pub fn open(&mut self, tag: &str, attribute_names: &[&str]) {
        let mut names: Vec<&str> = attribute_names.to_vec();
        names.sort_unstable();

        self.contextual.update(b"<");
        self.contextual.update(tag.as_bytes());
        for name in &names {
            self.contextual.update(b" ");
            self.contextual.update(name.as_bytes());
        }
        self.contextual.update(b">");

        self.structural.update(b"<");
        for _ in &names {
            self.structural.update(b"@");
        }
        self.structural.update(b">");
    }

    /// Records an element end
    pub fn close(&mut self, tag: &str) {
        self.contextual.update(b"</");
        self.contextual.update(tag.as_bytes());
        self.contextual.update(b">");
        self.structural.update(b"</>");
    }

    /// Finishes both streams, returning hex-encoded (contextual, structural) digests
    pub fn finish(self) -> (String, String) {
        (
            hex::encode(self.contextual.finalize()),
            hex::encode(self.structural.finalize()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(stream: &str) -> String {
        hex::encode(Sha256::digest(stream.as_bytes()))
    }

    #[test]
    fn test_streams_match_expected_text() {
        let mut builder = FingerprintBuilder::new();
        builder.open("a", &["href", "class"]);
        builder.close("a");
        let (contextual, structural) = builder.finish();

        assert_eq!(contextual, digest("<a class href></a>"));
        assert_eq!(structural, digest("<@@></>"));
    }

    #[test]
    fn test_attribute_values_do_not_matter() {
        let mut one = FingerprintBuilder::new();
        one.open("p", &["id"]);
        one.close("p");

        let mut two = FingerprintBuilder::new();
        two.open("div", &["class"]);
        two.close("div");

        let (c1, s1) = one.finish();
        let (c2, s2) = two.finish();
        assert_ne!(c1, c2);
        assert_eq!(s1, s2);
    }
}
