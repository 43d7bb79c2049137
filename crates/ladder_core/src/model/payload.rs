//! Compressed raw payload storage.
//!
//! # Responsibility
//! - Keep imported source data (MARC, MODS) compact inside documents.
//!
//! # Invariants
//! - Encoded form is base64 of a gzip stream; decoding is lossless.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// Gzip-compressed, base64-encoded opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompressedPayload(String);

impl CompressedPayload {
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        let compressed = encoder.finish()?;
        Ok(Self(STANDARD.encode(compressed)))
    }

    pub fn from_text(text: &str) -> io::Result<Self> {
        Self::from_bytes(text.as_bytes())
    }

    /// Wraps an already-encoded payload, e.g. one read back from storage.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_encoded(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let compressed = STANDARD
            .decode(self.0.as_bytes())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn to_text(&self) -> io::Result<String> {
        String::from_utf8(self.to_bytes()?)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

/// Raw source payloads carried by a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPayloads {
    /// Binary MARC record as imported.
    pub marc: Option<CompressedPayload>,
    /// MODS XML derived from `marc`.
    pub mods: Option<CompressedPayload>,
}

impl RawPayloads {
    pub fn is_empty(&self) -> bool {
        self.marc.is_none() && self.mods.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::CompressedPayload;

    #[test]
    fn text_survives_compression() {
        let payload = CompressedPayload::from_text("<mods>Comet in Moominland</mods>")
            .expect("compress");
        assert_ne!(payload.as_encoded(), "<mods>Comet in Moominland</mods>");
        assert_eq!(
            payload.to_text().expect("decompress"),
            "<mods>Comet in Moominland</mods>"
        );
    }

    #[test]
    fn binary_survives_compression() {
        let bytes = [0x1d_u8, 0x1e, 0x1f, 0x00, 0xff];
        let payload = CompressedPayload::from_bytes(&bytes).expect("compress");
        let restored = CompressedPayload::from_encoded(payload.as_encoded().to_string());
        assert_eq!(restored.to_bytes().expect("decompress"), bytes);
    }

    #[test]
    fn garbage_encoding_is_reported() {
        let payload = CompressedPayload::from_encoded("not base64 at all!");
        assert!(payload.to_bytes().is_err());
    }
}
