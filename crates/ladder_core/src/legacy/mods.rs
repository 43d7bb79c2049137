//! Fixed MARC 21 slim to MODS transform.
//!
//! # Responsibility
//! - Turn MARCXML into MODS 3.4 XML through one versioned transform.
//!
//! # Invariants
//! - The transform is pure: the same MARCXML always yields the same MODS.
//! - A single input record yields a `mods` root; several yield a
//!   `modsCollection`.

use super::marc::{MarcError, MarcField, MarcRecord};
use super::marcxml::parse_marcxml;
use super::xml::{XmlError, XmlOut};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MODS_NS: &str = "http://www.loc.gov/mods/v3";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const MODS_SCHEMA: &str =
    "http://www.loc.gov/mods/v3 http://www.loc.gov/standards/mods/v3/mods-3-4.xsd";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Input is not readable MARCXML.
    Input(MarcError),
    /// Output could not be written.
    Output(String),
}

impl Display for TransformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input(err) => write!(f, "transform input: {err}"),
            Self::Output(message) => write!(f, "transform output: {message}"),
        }
    }
}

impl Error for TransformError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Input(err) => Some(err),
            Self::Output(_) => None,
        }
    }
}

impl From<XmlError> for TransformError {
    fn from(value: XmlError) -> Self {
        Self::Output(value.0)
    }
}

/// XML-to-XML transform applied to intermediate MARCXML.
pub trait XmlTransform: Send + Sync {
    /// Version tag of the transform, e.g. `3.4`.
    fn version(&self) -> &str;

    fn transform(&self, xml: &str) -> Result<String, TransformError>;
}

/// MARC 21 slim to MODS 3.4 crosswalk.
#[derive(Debug, Clone, Copy, Default)]
pub struct Marc21SlimToMods;

impl XmlTransform for Marc21SlimToMods {
    fn version(&self) -> &str {
        "3.4"
    }

    fn transform(&self, xml: &str) -> Result<String, TransformError> {
        let records = parse_marcxml(xml).map_err(TransformError::Input)?;
        records_to_mods(&records)
    }
}

/// MODS document for already parsed records.
pub fn records_to_mods(records: &[MarcRecord]) -> Result<String, TransformError> {
    let mut out = XmlOut::new()?;
    let root_attributes = [
        ("xmlns", MODS_NS),
        ("xmlns:xlink", XLINK_NS),
        ("xmlns:xsi", XSI_NS),
        ("version", "3.4"),
        ("xsi:schemaLocation", MODS_SCHEMA),
    ];
    if let [record] = records {
        out.start("mods", &root_attributes)?;
        write_mods(&mut out, record)?;
        out.end("mods")?;
    } else {
        out.start("modsCollection", &root_attributes)?;
        for record in records {
            out.start("mods", &[("version", "3.4")])?;
            write_mods(&mut out, record)?;
            out.end("mods")?;
        }
        out.end("modsCollection")?;
    }
    Ok(out.finish()?)
}

/// Strips trailing ISBD punctuation (`.,:;/` and blanks).
pub fn chop_punctuation(value: &str) -> &str {
    value.trim_end_matches(|ch: char| ch.is_whitespace() || ".,:;/".contains(ch))
}

fn joined(field: &MarcField, codes: &str) -> String {
    field
        .subfields()
        .iter()
        .filter(|subfield| codes.contains(subfield.code))
        .map(|subfield| subfield.value.trim())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn values<'a>(field: &'a MarcField, code: char) -> impl Iterator<Item = &'a str> {
    field
        .subfields()
        .iter()
        .filter(move |subfield| subfield.code == code)
        .map(|subfield| chop_punctuation(&subfield.value))
        .filter(|value| !value.is_empty())
}

fn type_of_resource(leader6: char) -> Option<&'static str> {
    Some(match leader6 {
        'a' | 't' => "text",
        'c' | 'd' => "notated music",
        'e' | 'f' => "cartographic",
        'g' => "moving image",
        'i' => "sound recording-nonmusical",
        'j' => "sound recording-musical",
        'k' => "still image",
        'm' => "software, multimedia",
        'o' => "kit",
        'p' => "mixed material",
        'r' => "three dimensional object",
        _ => return None,
    })
}

fn fixed_field(record: &MarcRecord, start: usize, end: usize) -> Option<String> {
    let value: String = record
        .control_value("008")?
        .chars()
        .skip(start)
        .take(end - start)
        .collect();
    let value = value.trim();
    (!value.is_empty() && !value.chars().all(|ch| ch == '|' || ch == 'u'))
        .then(|| value.to_string())
}

fn write_mods(out: &mut XmlOut, record: &MarcRecord) -> Result<(), XmlError> {
    write_titles(out, record)?;
    write_names(out, record)?;

    if let Some(kind) = type_of_resource(record.leader_char(6)) {
        out.text("typeOfResource", &[], kind)?;
    }
    for field in record.fields_with_tag("655") {
        let authority = match field.indicators().1 {
            '7' => field.subfield('2').unwrap_or("local").to_string(),
            _ => "marcgt".to_string(),
        };
        let genre = joined(field, "avxyz");
        out.text("genre", &[("authority", authority.as_str())], chop_punctuation(&genre))?;
    }

    write_origin_info(out, record)?;
    write_language(out, record)?;

    for field in record.fields_with_tag("300") {
        out.start("physicalDescription", &[])?;
        out.text("extent", &[], chop_punctuation(&joined(field, "abcefg")))?;
        out.end("physicalDescription")?;
    }
    for field in record.fields_with_tag("520") {
        out.text("abstract", &[], &joined(field, "ab"))?;
    }
    for field in record.fields_with_tag("505") {
        out.text("tableOfContents", &[], &joined(field, "agrt"))?;
    }
    for field in record.fields_with_tag("500") {
        out.text("note", &[], &joined(field, "a"))?;
    }

    write_subjects(out, record)?;

    for field in record.fields_with_tag("050") {
        out.text("classification", &[("authority", "lcc")], &joined(field, "ab"))?;
    }
    for field in record.fields_with_tag("082") {
        out.text("classification", &[("authority", "ddc")], &joined(field, "a"))?;
    }

    for tag in ["440", "490", "830"] {
        for field in record.fields_with_tag(tag) {
            out.start("relatedItem", &[("type", "series")])?;
            out.start("titleInfo", &[])?;
            out.text("title", &[], chop_punctuation(&joined(field, "a")))?;
            out.text("partNumber", &[], chop_punctuation(&joined(field, "v")))?;
            out.end("titleInfo")?;
            out.end("relatedItem")?;
        }
    }

    for (tag, kind) in [("020", "isbn"), ("022", "issn"), ("010", "lccn")] {
        for field in record.fields_with_tag(tag) {
            for value in values(field, 'a') {
                out.text("identifier", &[("type", kind)], value)?;
            }
        }
    }

    for field in record.fields_with_tag("856") {
        for url in values(field, 'u') {
            out.start("location", &[])?;
            out.text("url", &[], url)?;
            out.end("location")?;
        }
    }

    write_record_info(out, record)
}

fn write_titles(out: &mut XmlOut, record: &MarcRecord) -> Result<(), XmlError> {
    for field in record.fields_with_tag("245") {
        let title = chop_punctuation(field.subfield('a').unwrap_or_default()).to_string();
        let skip = field.indicators().1.to_digit(10).unwrap_or(0) as usize;
        let (non_sort, title) = match title.char_indices().nth(skip) {
            Some((split, _)) if skip > 0 => (title[..split].to_string(), title[split..].to_string()),
            _ => (String::new(), title),
        };

        out.start("titleInfo", &[])?;
        out.text("nonSort", &[], &non_sort)?;
        out.text("title", &[], &title)?;
        out.text("subTitle", &[], chop_punctuation(&joined(field, "b")))?;
        out.text("partNumber", &[], chop_punctuation(&joined(field, "n")))?;
        out.text("partName", &[], chop_punctuation(&joined(field, "p")))?;
        out.end("titleInfo")?;
    }
    for field in record.fields_with_tag("246") {
        out.start("titleInfo", &[("type", "alternative")])?;
        out.text("title", &[], chop_punctuation(&joined(field, "a")))?;
        out.text("subTitle", &[], chop_punctuation(&joined(field, "b")))?;
        out.end("titleInfo")?;
    }
    Ok(())
}

fn write_names(out: &mut XmlOut, record: &MarcRecord) -> Result<(), XmlError> {
    let sources = [
        ("100", "personal", true),
        ("110", "corporate", true),
        ("111", "conference", true),
        ("700", "personal", false),
        ("710", "corporate", false),
        ("711", "conference", false),
    ];
    for (tag, kind, primary) in sources {
        for field in record.fields_with_tag(tag) {
            let mut attributes = vec![("type", kind)];
            if primary {
                attributes.push(("usage", "primary"));
            }
            out.start("name", &attributes)?;
            out.text("namePart", &[], chop_punctuation(&joined(field, "abcq")))?;
            out.text("namePart", &[("type", "date")], chop_punctuation(&joined(field, "d")))?;
            for role in values(field, 'e') {
                out.start("role", &[])?;
                out.text("roleTerm", &[("type", "text"), ("authority", "marcrelator")], role)?;
                out.end("role")?;
            }
            out.end("name")?;
        }
    }
    Ok(())
}

fn write_origin_info(out: &mut XmlOut, record: &MarcRecord) -> Result<(), XmlError> {
    let imprints: Vec<&MarcField> = record
        .fields_with_tag("260")
        .chain(record.fields_with_tag("264"))
        .collect();
    let date1 = fixed_field(record, 7, 11);
    let editions: Vec<&MarcField> = record.fields_with_tag("250").collect();
    if imprints.is_empty() && date1.is_none() && editions.is_empty() {
        return Ok(());
    }

    out.start("originInfo", &[])?;
    if let Some(place) = fixed_field(record, 15, 18) {
        out.start("place", &[])?;
        out.text("placeTerm", &[("type", "code"), ("authority", "marccountry")], &place)?;
        out.end("place")?;
    }
    for field in &imprints {
        for place in values(field, 'a') {
            out.start("place", &[])?;
            out.text("placeTerm", &[("type", "text")], place)?;
            out.end("place")?;
        }
        for publisher in values(field, 'b') {
            out.text("publisher", &[], publisher)?;
        }
        for date in values(field, 'c') {
            out.text("dateIssued", &[], date)?;
        }
    }
    if let Some(date) = &date1 {
        out.text("dateIssued", &[("encoding", "marc")], date)?;
    }
    for field in editions {
        out.text("edition", &[], chop_punctuation(&joined(field, "ab")))?;
    }
    out.end("originInfo")
}

fn write_language(out: &mut XmlOut, record: &MarcRecord) -> Result<(), XmlError> {
    let mut codes: Vec<String> = fixed_field(record, 35, 38).into_iter().collect();
    for field in record.fields_with_tag("041") {
        for code in values(field, 'a') {
            if !codes.iter().any(|known| known == code) {
                codes.push(code.to_string());
            }
        }
    }
    for code in codes {
        out.start("language", &[])?;
        out.text("languageTerm", &[("authority", "iso639-2b"), ("type", "code")], &code)?;
        out.end("language")?;
    }
    Ok(())
}

fn write_subjects(out: &mut XmlOut, record: &MarcRecord) -> Result<(), XmlError> {
    for tag in ["600", "610", "611", "650", "651"] {
        for field in record.fields_with_tag(tag) {
            let mut attributes = Vec::new();
            if field.indicators().1 == '0' {
                attributes.push(("authority", "lcsh"));
            }
            out.start("subject", &attributes)?;
            match tag {
                "600" | "610" | "611" => {
                    let kind = match tag {
                        "600" => "personal",
                        "610" => "corporate",
                        _ => "conference",
                    };
                    out.start("name", &[("type", kind)])?;
                    out.text("namePart", &[], chop_punctuation(&joined(field, "abcq")))?;
                    let dates = joined(field, "d");
                    out.text("namePart", &[("type", "date")], chop_punctuation(&dates))?;
                    out.end("name")?;
                }
                "650" => {
                    for topic in values(field, 'a') {
                        out.text("topic", &[], topic)?;
                    }
                }
                _ => {
                    for place in values(field, 'a') {
                        out.text("geographic", &[], place)?;
                    }
                }
            }
            for topic in values(field, 'x') {
                out.text("topic", &[], topic)?;
            }
            for era in values(field, 'y') {
                out.text("temporal", &[], era)?;
            }
            for place in values(field, 'z') {
                out.text("geographic", &[], place)?;
            }
            for form in values(field, 'v') {
                out.text("genre", &[], form)?;
            }
            out.end("subject")?;
        }
    }
    Ok(())
}

fn write_record_info(out: &mut XmlOut, record: &MarcRecord) -> Result<(), XmlError> {
    out.start("recordInfo", &[])?;
    for field in record.fields_with_tag("040") {
        for source in values(field, 'a') {
            out.text("recordContentSource", &[("authority", "marcorg")], source)?;
        }
    }
    if let Some(created) = fixed_field(record, 0, 6) {
        out.text("recordCreationDate", &[("encoding", "marc")], &created)?;
    }
    if let Some(id) = record.control_value("001") {
        out.text("recordIdentifier", &[], id)?;
    }
    out.text("recordOrigin", &[], "Converted from MARCXML to MODS version 3.4")?;
    out.end("recordInfo")
}

#[cfg(test)]
mod tests {
    use super::{chop_punctuation, records_to_mods, Marc21SlimToMods, XmlTransform};
    use crate::legacy::marc::{MarcField, MarcRecord, Subfield};
    use crate::legacy::marcxml::to_marcxml;

    pub(crate) fn record() -> MarcRecord {
        MarcRecord::new("00000nam a2200000 a 4500")
            .with_field(MarcField::control("001", "ocm123"))
            .with_field(MarcField::control("008", "900101s1946    sw            000 1 swe d"))
            .with_field(MarcField::data(
                "100",
                '1',
                ' ',
                vec![
                    Subfield::new('a', "Jansson, Tove,"),
                    Subfield::new('d', "1914-2001."),
                    Subfield::new('e', "author."),
                ],
            ))
            .with_field(MarcField::data(
                "245",
                '1',
                '4',
                vec![
                    Subfield::new('a', "The comet /"),
                    Subfield::new('c', "Tove Jansson."),
                ],
            ))
            .with_field(MarcField::data(
                "260",
                ' ',
                ' ',
                vec![
                    Subfield::new('a', "Stockholm :"),
                    Subfield::new('b', "Schildt,"),
                    Subfield::new('c', "1946."),
                ],
            ))
            .with_field(MarcField::data(
                "650",
                ' ',
                '0',
                vec![Subfield::new('a', "Comets"), Subfield::new('v', "Fiction.")],
            ))
            .with_field(MarcField::data("020", ' ', ' ', vec![Subfield::new('a', "9789515")]))
    }

    #[test]
    fn punctuation_is_chopped() {
        assert_eq!(chop_punctuation("Jansson, Tove,"), "Jansson, Tove");
        assert_eq!(chop_punctuation("The comet / "), "The comet");
        assert_eq!(chop_punctuation("Stockholm :"), "Stockholm");
    }

    #[test]
    fn crosswalk_maps_core_fields() {
        let transform = Marc21SlimToMods;
        assert_eq!(transform.version(), "3.4");
        let marcxml = to_marcxml(&[record()]).unwrap();
        let mods = transform.transform(&marcxml).unwrap();

        assert!(mods.contains("<mods xmlns=\"http://www.loc.gov/mods/v3\""));
        assert!(mods.contains("<nonSort>The</nonSort>"));
        assert!(mods.contains("<title>comet</title>"));
        assert!(mods.contains("<name type=\"personal\" usage=\"primary\">"));
        assert!(mods.contains("<namePart>Jansson, Tove</namePart>"));
        assert!(mods.contains("<namePart type=\"date\">1914-2001</namePart>"));
        assert!(mods.contains("<typeOfResource>text</typeOfResource>"));
        assert!(mods.contains("<publisher>Schildt</publisher>"));
        assert!(mods.contains("<dateIssued encoding=\"marc\">1946</dateIssued>"));
        assert!(mods.contains(
            "<languageTerm authority=\"iso639-2b\" type=\"code\">swe</languageTerm>"
        ));
        assert!(mods.contains("<subject authority=\"lcsh\">"));
        assert!(mods.contains("<topic>Comets</topic>"));
        assert!(mods.contains("<identifier type=\"isbn\">9789515</identifier>"));
        assert!(mods.contains("<recordIdentifier>ocm123</recordIdentifier>"));
    }

    #[test]
    fn several_records_make_a_collection() {
        let mods = records_to_mods(&[record(), record()]).unwrap();
        assert!(mods.contains("<modsCollection"));
        assert_eq!(mods.matches("<recordIdentifier>").count(), 2);
    }

    #[test]
    fn unreadable_input_is_an_input_error() {
        let err = Marc21SlimToMods.transform("<record>").unwrap_err();
        assert!(matches!(err, super::TransformError::Input(_)));
    }
}
