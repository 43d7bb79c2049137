//! Legacy record mapping: MARC input to MODS payloads.
//!
//! # Responsibility
//! - Pick a mapper by content type.
//! - Turn a record's raw MARC payload into MODS XML and attach it.
//!
//! # Invariants
//! - Mapping is idempotent: rerunning a job rewrites the same MODS payload.
//! - The fixed transform is built once per process and shared.
//!
//! # See also
//! - `legacy::job` for the retry queue that runs mapper jobs.

pub mod job;
pub mod lift;
pub mod marc;
pub mod marcxml;
pub mod mods;
pub mod xml;

use crate::model::{CompressedPayload, Record};
use log::{debug, info, warn};
use marc::{MarcError, MarcReader, MarcRecord};
use mods::{Marc21SlimToMods, TransformError, XmlTransform};
use once_cell::sync::Lazy;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use job::{DeadLetter, DrainReport, JobHandler, JobQueue, JobResult, LegacyJob};
pub use lift::lift_mods;

static FIXED_TRANSFORM: Lazy<Arc<dyn XmlTransform>> = Lazy::new(|| {
    let transform: Arc<dyn XmlTransform> = Arc::new(Marc21SlimToMods);
    info!(
        "event=mods_transform_load module=legacy status=ok version={}",
        transform.version()
    );
    transform
});

/// Source format of a raw legacy payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyFormat {
    /// Binary ISO 2709 records.
    Marc21,
    /// MARC 21 slim XML.
    MarcXml,
}

impl LegacyFormat {
    pub const ALL: [LegacyFormat; 2] = [LegacyFormat::Marc21, LegacyFormat::MarcXml];

    pub fn content_types(self) -> &'static [&'static str] {
        match self {
            Self::Marc21 => &["application/marc"],
            Self::MarcXml => &["application/marc+xml", "application/marcxml+xml"],
        }
    }

    /// Matches the media type of `content_type`, ignoring parameters and
    /// case.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.content_types().contains(&media_type.as_str()))
    }
}

#[derive(Debug)]
pub enum MapperError {
    Marc(MarcError),
    Transform(TransformError),
    /// Raw payload could not be decompressed or recompressed.
    Payload(std::io::Error),
    /// Record has no raw MARC payload to map.
    MissingPayload,
    /// Input held no records.
    Empty,
    UnsupportedContentType(String),
}

impl MapperError {
    /// Whether a queued job failing with this error should run again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transform(_) | Self::Payload(_))
    }
}

impl Display for MapperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Marc(err) => write!(f, "{err}"),
            Self::Transform(err) => write!(f, "{err}"),
            Self::Payload(err) => write!(f, "raw payload: {err}"),
            Self::MissingPayload => write!(f, "record has no raw marc payload"),
            Self::Empty => write!(f, "input contains no marc records"),
            Self::UnsupportedContentType(content_type) => {
                write!(f, "no legacy mapper for content type `{content_type}`")
            }
        }
    }
}

impl Error for MapperError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Marc(err) => Some(err),
            Self::Transform(err) => Some(err),
            Self::Payload(err) => Some(err),
            Self::MissingPayload | Self::Empty | Self::UnsupportedContentType(_) => None,
        }
    }
}

impl From<MarcError> for MapperError {
    fn from(value: MarcError) -> Self {
        Self::Marc(value)
    }
}

impl From<TransformError> for MapperError {
    fn from(value: TransformError) -> Self {
        Self::Transform(value)
    }
}

impl From<std::io::Error> for MapperError {
    fn from(value: std::io::Error) -> Self {
        Self::Payload(value)
    }
}

/// Maps legacy payloads to MODS with a shared fixed transform.
#[derive(Clone)]
pub struct LegacyMapper {
    format: LegacyFormat,
    transform: Arc<dyn XmlTransform>,
}

impl std::fmt::Debug for LegacyMapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyMapper")
            .field("format", &self.format)
            .field("transform", &self.transform.version())
            .finish()
    }
}

impl LegacyMapper {
    pub fn new(format: LegacyFormat) -> Self {
        Self::with_transform(format, Arc::clone(&FIXED_TRANSFORM))
    }

    pub fn with_transform(format: LegacyFormat, transform: Arc<dyn XmlTransform>) -> Self {
        Self { format, transform }
    }

    pub fn for_content_type(content_type: &str) -> Result<Self, MapperError> {
        LegacyFormat::from_content_type(content_type)
            .map(Self::new)
            .ok_or_else(|| MapperError::UnsupportedContentType(content_type.to_string()))
    }

    pub fn format(&self) -> LegacyFormat {
        self.format
    }

    /// Parses `bytes` in this mapper's format.
    pub fn parse(&self, bytes: &[u8]) -> Result<Vec<MarcRecord>, MapperError> {
        let records = match self.format {
            LegacyFormat::Marc21 => {
                let mut records = Vec::new();
                for parsed in MarcReader::new(bytes) {
                    match parsed {
                        Ok(record) => records.push(record),
                        Err(err) => debug!(
                            "event=marc_parse module=legacy status=skip error={err}"
                        ),
                    }
                }
                records
            }
            LegacyFormat::MarcXml => {
                marcxml::parse_marcxml(&String::from_utf8_lossy(bytes))?
            }
        };
        if records.is_empty() {
            return Err(MapperError::Empty);
        }
        Ok(records)
    }

    /// MODS XML for the records in `bytes`.
    pub fn map_bytes(&self, bytes: &[u8]) -> Result<String, MapperError> {
        let records = self.parse(bytes)?;
        let intermediate = marcxml::to_marcxml(&records)?;
        Ok(self.transform.transform(&intermediate)?)
    }

    /// Reads the record's raw MARC payload, transforms it and stores the
    /// result as the record's MODS payload.
    pub fn map(&self, record: &mut Record) -> Result<(), MapperError> {
        let raw = record
            .raw_payloads()
            .marc
            .as_ref()
            .ok_or(MapperError::MissingPayload)?
            .to_bytes()?;
        let mods = match self.map_bytes(&raw) {
            Ok(mods) => mods,
            Err(err) => {
                warn!(
                    "event=legacy_map module=legacy status=error record_id={} error={err}",
                    record.id()
                );
                return Err(err);
            }
        };
        record.raw_payloads_mut().mods = Some(CompressedPayload::from_text(&mods)?);
        info!(
            "event=legacy_map module=legacy status=ok record_id={} transform={}",
            record.id(),
            self.transform.version()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::marc::{MarcField, MarcRecord, Subfield};
    use super::{LegacyFormat, LegacyMapper, MapperError};
    use crate::model::{CompressedPayload, ModelDefinition, ModelRegistry, Record};
    use crate::vocab::VocabularyRegistry;
    use std::sync::Arc;

    fn marc() -> Vec<u8> {
        MarcRecord::new("00000nam a2200000 a 4500")
            .with_field(MarcField::control("001", "ocm123"))
            .with_field(MarcField::data(
                "245",
                '1',
                '0',
                vec![Subfield::new('a', "Comet in Moominland.")],
            ))
            .to_iso2709()
            .unwrap()
    }

    fn record() -> Record {
        let registry = ModelRegistry::new(Arc::new(VocabularyRegistry::builtin()));
        let descriptor = registry
            .define_model(&ModelDefinition::new(
                "Resource",
                "Ltest",
                ["dc"],
                ["dc.BibliographicResource"],
            ))
            .unwrap();
        Record::new(descriptor)
    }

    #[test]
    fn content_types_select_formats() {
        assert_eq!(
            LegacyFormat::from_content_type("application/marc"),
            Some(LegacyFormat::Marc21)
        );
        assert_eq!(
            LegacyFormat::from_content_type("Application/MARC+XML; charset=utf-8"),
            Some(LegacyFormat::MarcXml)
        );
        assert!(matches!(
            LegacyMapper::for_content_type("text/plain"),
            Err(MapperError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn map_attaches_mods_and_is_idempotent() {
        let mut record = record();
        record.raw_payloads_mut().marc = Some(CompressedPayload::from_bytes(&marc()).unwrap());
        let mapper = LegacyMapper::new(LegacyFormat::Marc21);

        mapper.map(&mut record).unwrap();
        let first = record.raw_payloads().mods.clone().unwrap().to_text().unwrap();
        assert!(first.contains("<title>Comet in Moominland</title>"));

        mapper.map(&mut record).unwrap();
        let second = record.raw_payloads().mods.clone().unwrap().to_text().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_or_empty_input_is_not_retryable() {
        let mapper = LegacyMapper::new(LegacyFormat::Marc21);
        let err = mapper.map(&mut record()).unwrap_err();
        assert!(matches!(err, MapperError::MissingPayload));
        assert!(!err.is_retryable());

        let err = mapper.map_bytes(b"\x1d\x1d").unwrap_err();
        assert!(matches!(err, MapperError::Empty));
    }
}
