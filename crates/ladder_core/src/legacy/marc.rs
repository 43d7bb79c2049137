//! Permissive MARC 21 (ISO 2709) records.
//!
//! # Responsibility
//! - Parse binary MARC records without giving up on damaged input.
//! - Encode records back to ISO 2709.
//!
//! # Invariants
//! - Only a missing or short leader fails a parse. Bad directory entries
//!   and out-of-range offsets drop the affected field, empty subfields are
//!   skipped and invalid UTF-8 is replaced.

use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const LEADER_LEN: usize = 24;
const DIRECTORY_ENTRY_LEN: usize = 12;
pub const FIELD_TERMINATOR: u8 = 0x1e;
pub const RECORD_TERMINATOR: u8 = 0x1d;
pub const SUBFIELD_DELIMITER: u8 = 0x1f;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarcError {
    /// Fewer than 24 bytes before the record ends.
    ShortLeader(usize),
    /// Encoded record or field exceeds the ISO 2709 length fields.
    TooLong { what: &'static str, len: usize },
    Xml(String),
}

impl Display for MarcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortLeader(len) => write!(f, "marc leader needs 24 bytes, got {len}"),
            Self::TooLong { what, len } => write!(f, "marc {what} too long for iso 2709: {len}"),
            Self::Xml(message) => write!(f, "marcxml: {message}"),
        }
    }
}

impl Error for MarcError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    pub code: char,
    pub value: String,
}

impl Subfield {
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarcField {
    /// `001`-`009`: unstructured data.
    Control { tag: String, value: String },
    Data {
        tag: String,
        ind1: char,
        ind2: char,
        subfields: Vec<Subfield>,
    },
}

impl MarcField {
    pub fn control(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Control {
            tag: tag.into(),
            value: value.into(),
        }
    }

    pub fn data(tag: impl Into<String>, ind1: char, ind2: char, subfields: Vec<Subfield>) -> Self {
        Self::Data {
            tag: tag.into(),
            ind1,
            ind2,
            subfields,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Control { tag, .. } | Self::Data { tag, .. } => tag,
        }
    }

    pub fn subfields(&self) -> &[Subfield] {
        match self {
            Self::Control { .. } => &[],
            Self::Data { subfields, .. } => subfields,
        }
    }

    pub fn subfield(&self, code: char) -> Option<&str> {
        self.subfields()
            .iter()
            .find(|subfield| subfield.code == code)
            .map(|subfield| subfield.value.as_str())
    }

    pub fn indicators(&self) -> (char, char) {
        match self {
            Self::Control { .. } => (' ', ' '),
            Self::Data { ind1, ind2, .. } => (*ind1, *ind2),
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            Self::Control { value, .. } => bytes.extend_from_slice(value.as_bytes()),
            Self::Data {
                ind1,
                ind2,
                subfields,
                ..
            } => {
                push_char(&mut bytes, *ind1);
                push_char(&mut bytes, *ind2);
                for subfield in subfields {
                    bytes.push(SUBFIELD_DELIMITER);
                    push_char(&mut bytes, subfield.code);
                    bytes.extend_from_slice(subfield.value.as_bytes());
                }
            }
        }
        bytes.push(FIELD_TERMINATOR);
        bytes
    }
}

fn push_char(bytes: &mut Vec<u8>, ch: char) {
    let mut buffer = [0u8; 4];
    bytes.extend_from_slice(ch.encode_utf8(&mut buffer).as_bytes());
}

/// Whether `tag` names a control field (`00X`).
pub fn is_control_tag(tag: &str) -> bool {
    tag.starts_with("00")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarcRecord {
    pub leader: String,
    pub fields: Vec<MarcField>,
}

impl MarcRecord {
    pub fn new(leader: impl Into<String>) -> Self {
        Self {
            leader: leader.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: MarcField) -> Self {
        self.fields.push(field);
        self
    }

    /// Parses one ISO 2709 record, tolerating damage past the leader.
    pub fn parse(bytes: &[u8]) -> Result<Self, MarcError> {
        let bytes = match bytes.iter().position(|b| *b == RECORD_TERMINATOR) {
            Some(end) => &bytes[..end],
            None => bytes,
        };
        if bytes.len() < LEADER_LEN {
            return Err(MarcError::ShortLeader(bytes.len()));
        }

        let leader = String::from_utf8_lossy(&bytes[..LEADER_LEN]).into_owned();
        let directory_end = bytes[LEADER_LEN..]
            .iter()
            .position(|b| *b == FIELD_TERMINATOR)
            .map_or(bytes.len(), |offset| LEADER_LEN + offset);
        let base_address = parse_digits(&bytes[12..17])
            .filter(|base| *base > LEADER_LEN && *base <= bytes.len())
            .unwrap_or((directory_end + 1).min(bytes.len()));

        let mut record = Self::new(leader);
        for entry in bytes[LEADER_LEN..directory_end].chunks(DIRECTORY_ENTRY_LEN) {
            match read_entry(entry, bytes, base_address) {
                Some(field) => record.fields.push(field),
                None => debug!(
                    "event=marc_parse module=legacy status=skip reason=bad_directory_entry entry={}",
                    String::from_utf8_lossy(entry)
                ),
            }
        }
        Ok(record)
    }

    pub fn fields_with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a MarcField> {
        self.fields.iter().filter(move |field| field.tag() == tag)
    }

    pub fn control_value(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|field| field.tag() == tag)
            .find_map(|field| match field {
                MarcField::Control { value, .. } => Some(value.as_str()),
                MarcField::Data { .. } => None,
            })
    }

    /// Leader character at `position`, or a blank.
    pub fn leader_char(&self, position: usize) -> char {
        self.leader.chars().nth(position).unwrap_or(' ')
    }

    /// Encodes the record, recomputing lengths and the base address.
    pub fn to_iso2709(&self) -> Result<Vec<u8>, MarcError> {
        let mut directory = Vec::new();
        let mut data = Vec::new();
        for field in &self.fields {
            let encoded = field.encode();
            if encoded.len() > 9_999 {
                return Err(MarcError::TooLong {
                    what: "field",
                    len: encoded.len(),
                });
            }
            let tag: String = format!("{:0>3}", field.tag()).chars().take(3).collect();
            directory.extend_from_slice(
                format!("{tag}{:04}{:05}", encoded.len(), data.len()).as_bytes(),
            );
            data.extend_from_slice(&encoded);
        }
        directory.push(FIELD_TERMINATOR);

        let base_address = LEADER_LEN + directory.len();
        let total = base_address + data.len() + 1;
        if total > 99_999 {
            return Err(MarcError::TooLong {
                what: "record",
                len: total,
            });
        }

        let mut leader: Vec<char> = self.leader.chars().take(LEADER_LEN).collect();
        leader.resize(LEADER_LEN, ' ');
        overwrite(&mut leader, 0, &format!("{total:05}"));
        overwrite(&mut leader, 10, "22");
        overwrite(&mut leader, 12, &format!("{base_address:05}"));
        overwrite(&mut leader, 20, "4500");

        let mut bytes: Vec<u8> = leader
            .into_iter()
            .map(|ch| if ch.is_ascii() { ch as u8 } else { b' ' })
            .collect();
        bytes.extend_from_slice(&directory);
        bytes.extend_from_slice(&data);
        bytes.push(RECORD_TERMINATOR);
        Ok(bytes)
    }
}

fn overwrite(leader: &mut [char], start: usize, text: &str) {
    for (slot, ch) in leader.iter_mut().skip(start).zip(text.chars()) {
        *slot = ch;
    }
}

fn parse_digits(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn read_entry(entry: &[u8], record: &[u8], base_address: usize) -> Option<MarcField> {
    if entry.len() != DIRECTORY_ENTRY_LEN {
        return None;
    }
    let tag = String::from_utf8_lossy(&entry[..3]).into_owned();
    let length = parse_digits(&entry[3..7])?;
    let start = base_address + parse_digits(&entry[7..12])?;
    if start >= record.len() {
        return None;
    }
    let end = (start + length).min(record.len());
    let mut raw = &record[start..end];
    while let Some((last, rest)) = raw.split_last() {
        if *last == FIELD_TERMINATOR || *last == RECORD_TERMINATOR {
            raw = rest;
        } else {
            break;
        }
    }

    if is_control_tag(&tag) {
        return Some(MarcField::control(tag, String::from_utf8_lossy(raw)));
    }

    let indicator = |index: usize| match raw.get(index) {
        Some(byte) if *byte != SUBFIELD_DELIMITER && byte.is_ascii() => *byte as char,
        _ => ' ',
    };
    let (ind1, ind2) = (indicator(0), indicator(1));
    let subfields = raw
        .split(|byte| *byte == SUBFIELD_DELIMITER)
        .skip(1)
        .filter_map(|chunk| {
            let text = String::from_utf8_lossy(chunk);
            let mut chars = text.chars();
            let code = chars.next()?;
            Some(Subfield::new(code, chars.as_str()))
        })
        .collect();
    Some(MarcField::data(tag, ind1, ind2, subfields))
}

/// Iterator over the records of a MARC byte stream.
pub struct MarcReader<'a> {
    remaining: &'a [u8],
}

impl<'a> MarcReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes }
    }
}

impl Iterator for MarcReader<'_> {
    type Item = Result<MarcRecord, MarcError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining.is_empty() {
                return None;
            }
            let (chunk, rest) = match self.remaining.iter().position(|b| *b == RECORD_TERMINATOR) {
                Some(end) => (&self.remaining[..end], &self.remaining[end + 1..]),
                None => (self.remaining, &[][..]),
            };
            self.remaining = rest;
            if chunk.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(MarcRecord::parse(chunk));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MarcError, MarcField, MarcReader, MarcRecord, Subfield};

    pub(crate) fn sample() -> MarcRecord {
        MarcRecord::new("00000nam a2200000 a 4500")
            .with_field(MarcField::control("001", "ocm123"))
            .with_field(MarcField::control("008", "900101s1946    sw            000 1 swe d"))
            .with_field(MarcField::data(
                "100",
                '1',
                ' ',
                vec![Subfield::new('a', "Jansson, Tove,"), Subfield::new('e', "author.")],
            ))
            .with_field(MarcField::data(
                "245",
                '1',
                '0',
                vec![Subfield::new('a', "Kometjakten /"), Subfield::new('c', "Tove Jansson.")],
            ))
    }

    #[test]
    fn encoded_records_parse_back() {
        let record = sample();
        let bytes = record.to_iso2709().unwrap();
        assert_eq!(&bytes[..5], format!("{:05}", bytes.len()).as_bytes());

        let parsed = MarcRecord::parse(&bytes).unwrap();
        assert_eq!(parsed.fields, record.fields);
        assert_eq!(parsed.control_value("001"), Some("ocm123"));
        assert_eq!(parsed.leader_char(6), 'a');
    }

    #[test]
    fn short_leader_is_fatal() {
        assert_eq!(MarcRecord::parse(b"0001"), Err(MarcError::ShortLeader(4)));
    }

    #[test]
    fn damaged_directory_entries_are_skipped() {
        let mut bytes = sample().to_iso2709().unwrap();
        // Corrupt the length digits of the first directory entry (001).
        bytes[27] = b'x';
        let parsed = MarcRecord::parse(&bytes).unwrap();
        assert!(parsed.control_value("001").is_none());
        assert_eq!(parsed.fields.len(), 3);
    }

    #[test]
    fn invalid_utf8_and_empty_subfields_are_tolerated() {
        let record = MarcRecord::new("00000nam a2200000 a 4500").with_field(MarcField::data(
            "245",
            '0',
            '0',
            vec![
                Subfield::new('a', "Comet"),
                Subfield::new('b', "Z"),
                Subfield::new('q', "Q"),
            ],
        ));
        let mut bytes = record.to_iso2709().unwrap();
        // Invalid byte in $b, and an empty subfield in place of the `q` code.
        let z = bytes.iter().rposition(|b| *b == b'Z').unwrap();
        bytes[z] = 0xff;
        let q = bytes.iter().rposition(|b| *b == b'q').unwrap();
        bytes[q] = 0x1f;

        let parsed = MarcRecord::parse(&bytes).unwrap();
        let field = parsed.fields_with_tag("245").next().unwrap();
        assert_eq!(field.subfield('a'), Some("Comet"));
        assert_eq!(field.subfield('b'), Some("\u{fffd}"));
    }

    #[test]
    fn reader_splits_streams_on_terminators() {
        let mut stream = sample().to_iso2709().unwrap();
        stream.extend(sample().to_iso2709().unwrap());
        stream.extend_from_slice(b"\n");

        let records: Vec<_> = MarcReader::new(&stream).collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(Result::is_ok));
    }
}
