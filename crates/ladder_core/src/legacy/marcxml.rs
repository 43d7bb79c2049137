//! MARCXML (MARC 21 slim) serialization of MARC records.

use super::marc::{MarcError, MarcField, MarcRecord, Subfield};
use super::xml::{parse_tree, XmlError, XmlNode, XmlOut};

pub const MARC_SLIM_NS: &str = "http://www.loc.gov/MARC21/slim";

impl From<XmlError> for MarcError {
    fn from(value: XmlError) -> Self {
        Self::Xml(value.0)
    }
}

/// Serializes records as MARCXML: a bare `record` root for one record, a
/// `collection` otherwise.
pub fn to_marcxml(records: &[MarcRecord]) -> Result<String, MarcError> {
    let mut out = XmlOut::new()?;
    if let [record] = records {
        write_record(&mut out, record, true)?;
    } else {
        out.start("collection", &[("xmlns", MARC_SLIM_NS)])?;
        for record in records {
            write_record(&mut out, record, false)?;
        }
        out.end("collection")?;
    }
    Ok(out.finish()?)
}

fn write_record(out: &mut XmlOut, record: &MarcRecord, root: bool) -> Result<(), XmlError> {
    if root {
        out.start("record", &[("xmlns", MARC_SLIM_NS)])?;
    } else {
        out.start("record", &[])?;
    }
    out.text("leader", &[], &record.leader)?;

    for field in &record.fields {
        match field {
            MarcField::Control { tag, value } => {
                out.text("controlfield", &[("tag", tag.as_str())], value)?;
            }
            MarcField::Data {
                tag,
                ind1,
                ind2,
                subfields,
            } => {
                let (ind1, ind2) = (ind1.to_string(), ind2.to_string());
                out.start(
                    "datafield",
                    &[("tag", tag.as_str()), ("ind1", ind1.as_str()), ("ind2", ind2.as_str())],
                )?;
                for subfield in subfields {
                    let code = subfield.code.to_string();
                    out.text("subfield", &[("code", code.as_str())], &subfield.value)?;
                }
                out.end("datafield")?;
            }
        }
    }
    out.end("record")
}

/// Reads every `record` element of a MARCXML document.
pub fn parse_marcxml(xml: &str) -> Result<Vec<MarcRecord>, MarcError> {
    let root = parse_tree(xml)?;
    match root.name.as_str() {
        "record" => Ok(vec![read_record(&root)]),
        "collection" => Ok(root.children_named("record").map(read_record).collect()),
        other => Err(MarcError::Xml(format!("unexpected root element `{other}`"))),
    }
}

fn read_record(node: &XmlNode) -> MarcRecord {
    let leader = node.child("leader").map_or("", |leader| leader.text.as_str());
    let mut record = MarcRecord::new(leader);
    for child in &node.children {
        let tag = child.attr("tag").unwrap_or_default();
        match child.name.as_str() {
            "controlfield" => record.fields.push(MarcField::control(tag, child.text.clone())),
            "datafield" => {
                let indicator = |name: &str| {
                    child
                        .attr(name)
                        .and_then(|value| value.chars().next())
                        .unwrap_or(' ')
                };
                let subfields = child
                    .children_named("subfield")
                    .filter_map(|subfield| {
                        let code = subfield.attr("code")?.chars().next()?;
                        Some(Subfield::new(code, subfield.text.clone()))
                    })
                    .collect();
                record.fields.push(MarcField::data(
                    tag,
                    indicator("ind1"),
                    indicator("ind2"),
                    subfields,
                ));
            }
            _ => {}
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::{parse_marcxml, to_marcxml};
    use crate::legacy::marc::{MarcField, MarcRecord, Subfield};

    fn record() -> MarcRecord {
        MarcRecord::new("00000nam a2200000 a 4500")
            .with_field(MarcField::control("001", "ocm123"))
            .with_field(MarcField::data(
                "245",
                '1',
                '0',
                vec![Subfield::new('a', "Comet & Co")],
            ))
    }

    #[test]
    fn single_record_has_record_root() {
        let xml = to_marcxml(&[record()]).unwrap();
        assert!(xml.contains("<record xmlns=\"http://www.loc.gov/MARC21/slim\">"));
        assert!(xml.contains("<controlfield tag=\"001\">ocm123</controlfield>"));
        assert!(xml.contains("<subfield code=\"a\">Comet &amp; Co</subfield>"));
        assert_eq!(parse_marcxml(&xml).unwrap(), vec![record()]);
    }

    #[test]
    fn collections_hold_every_record() {
        let xml = to_marcxml(&[record(), record()]).unwrap();
        assert!(xml.contains("<collection"));
        assert_eq!(parse_marcxml(&xml).unwrap().len(), 2);
    }

    #[test]
    fn foreign_roots_are_rejected() {
        assert!(parse_marcxml("<mods/>").is_err());
    }
}
