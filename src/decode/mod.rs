use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("gzip decompression failed: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Content-encoding hint supplied by the trigger, usually derived from the
/// document name. The gzip magic bytes are authoritative; the hint is only
/// used to flag mislabeled documents in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingHint {
    Gzip,
    None,
}

impl EncodingHint {
    pub fn from_name(name: &str) -> Self {
        if name.ends_with(".gz") {
            EncodingHint::Gzip
        } else {
            EncodingHint::None
        }
    }
}

/// Check for the gzip magic header (0x1f 0x8b).
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Decompress the raw document if the gzip magic is present, otherwise pass
/// the bytes through unchanged. Either way the result must be valid UTF-8.
pub fn decode(bytes: &[u8], hint: EncodingHint) -> Result<String, DecodeError> {
    if is_gzip(bytes) {
        if hint == EncodingHint::None {
            tracing::debug!("document has gzip magic but no .gz name hint, decompressing anyway");
        }

        let mut decoder = flate2::read::GzDecoder::new(bytes);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(DecodeError::Gzip)?;
        Ok(String::from_utf8(decompressed)?)
    } else {
        if hint == EncodingHint::Gzip {
            tracing::warn!("document named .gz but gzip magic is missing, passing through");
        }
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip_bytes(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_plain_text_passes_through() {
        let text = decode(b"{\"records\": []}", EncodingHint::None).unwrap();
        assert_eq!(text, "{\"records\": []}");
    }

    #[test]
    fn test_gzip_decompresses() {
        let compressed = gzip_bytes("{\"records\": []}");
        let text = decode(&compressed, EncodingHint::Gzip).unwrap();
        assert_eq!(text, "{\"records\": []}");
    }

    #[test]
    fn test_magic_wins_over_missing_hint() {
        // Mislabeled document: compressed content but no .gz name
        let compressed = gzip_bytes("hello");
        let text = decode(&compressed, EncodingHint::None).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_hint_without_magic_passes_through() {
        // Mislabeled the other way: .gz name but plain content
        let text = decode(b"plain", EncodingHint::Gzip).unwrap();
        assert_eq!(text, "plain");
    }

    #[test]
    fn test_truncated_gzip_fails() {
        let mut compressed = gzip_bytes("{\"records\": []}");
        compressed.truncate(compressed.len() / 2);
        let result = decode(&compressed, EncodingHint::Gzip);
        assert!(matches!(result, Err(DecodeError::Gzip(_))));
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let result = decode(&[0xff, 0xfe, 0xfd], EncodingHint::None);
        assert!(matches!(result, Err(DecodeError::Utf8(_))));
    }

    #[test]
    fn test_hint_from_name() {
        assert_eq!(
            EncodingHint::from_name("flowlog-2023-08-01.json.gz"),
            EncodingHint::Gzip
        );
        assert_eq!(
            EncodingHint::from_name("flowlog-2023-08-01.json"),
            EncodingHint::None
        );
    }

    #[test]
    fn test_empty_input() {
        let text = decode(b"", EncodingHint::None).unwrap();
        assert_eq!(text, "");
    }
}
