//! Lifts MODS XML into Dublin Core statements about a record.

use super::marc::MarcError;
use super::mods::TransformError;
use super::xml::{parse_tree, XmlNode};
use crate::graph::{Literal, Term};
use crate::model::descriptor::DC_TERMS;

/// `(predicate, object)` pairs for every MODS element with a Dublin Core
/// counterpart, in document order. A `modsCollection` lifts its first
/// `mods` child.
pub fn lift_mods(mods_xml: &str) -> Result<Vec<(String, Term)>, TransformError> {
    let root = parse_tree(mods_xml).map_err(|err| TransformError::Input(err.into()))?;
    let mods = match root.name.as_str() {
        "mods" => &root,
        "modsCollection" => match root.child("mods") {
            Some(mods) => mods,
            None => return Ok(Vec::new()),
        },
        other => {
            return Err(TransformError::Input(MarcError::Xml(format!(
                "unexpected root element `{other}`"
            ))))
        }
    };

    let mut pairs = Vec::new();
    let mut push = |local: &str, value: &str| {
        let value = value.trim();
        if !value.is_empty() {
            pairs.push((format!("{DC_TERMS}{local}"), Term::Literal(Literal::plain(value))));
        }
    };

    for child in &mods.children {
        match child.name.as_str() {
            "titleInfo" => {
                let title = title_text(child);
                match child.attr("type") {
                    Some(_) => push("alternative", &title),
                    None => push("title", &title),
                }
            }
            "name" => {
                let name = child
                    .children_named("namePart")
                    .filter(|part| part.attr("type").is_none())
                    .map(|part| part.text.trim())
                    .collect::<Vec<_>>()
                    .join(" ");
                match child.attr("usage") {
                    Some("primary") => push("creator", &name),
                    _ => push("contributor", &name),
                }
            }
            "typeOfResource" | "genre" => push("type", &child.text),
            "originInfo" => {
                for part in &child.children {
                    match part.name.as_str() {
                        "publisher" => push("publisher", &part.text),
                        "dateIssued" if part.attr("encoding").is_none() => push("issued", &part.text),
                        "place" => {
                            for term in part.children_named("placeTerm") {
                                if term.attr("type") == Some("text") {
                                    push("spatial", &term.text);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            "language" => {
                for term in child.children_named("languageTerm") {
                    push("language", &term.text);
                }
            }
            "physicalDescription" => {
                for extent in child.children_named("extent") {
                    push("extent", &extent.text);
                }
            }
            "abstract" => push("abstract", &child.text),
            "tableOfContents" => push("tableOfContents", &child.text),
            "note" => push("description", &child.text),
            "subject" => {
                for part in &child.children {
                    match part.name.as_str() {
                        "topic" | "genre" => push("subject", &part.text),
                        "geographic" => push("spatial", &part.text),
                        "temporal" => push("temporal", &part.text),
                        "name" => {
                            if let Some(name) = part.child_text("namePart") {
                                push("subject", name);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "identifier" => match child.attr("type") {
                Some(kind) => push("identifier", &format!("{kind}:{}", child.text.trim())),
                None => push("identifier", &child.text),
            },
            _ => {}
        }
    }
    Ok(pairs)
}

fn title_text(title_info: &XmlNode) -> String {
    let mut title = [title_info.child_text("nonSort"), title_info.child_text("title")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(sub_title) = title_info.child_text("subTitle") {
        title = format!("{title}: {sub_title}");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::lift_mods;
    use crate::graph::Term;
    use crate::legacy::marcxml::to_marcxml;
    use crate::legacy::mods::{Marc21SlimToMods, XmlTransform};
    use crate::legacy::marc::{MarcField, MarcRecord, Subfield};

    fn lifted(pairs: &[(String, Term)], local: &str) -> Vec<String> {
        pairs
            .iter()
            .filter(|(predicate, _)| predicate.ends_with(&format!("/{local}")))
            .map(|(_, object)| object.lexical().to_string())
            .collect()
    }

    #[test]
    fn mods_lifts_to_dublin_core() {
        let record = MarcRecord::new("00000nam a2200000 a 4500")
            .with_field(MarcField::data(
                "100",
                '1',
                ' ',
                vec![Subfield::new('a', "Jansson, Tove,")],
            ))
            .with_field(MarcField::data(
                "245",
                '1',
                '0',
                vec![Subfield::new('a', "Comet in Moominland :"), Subfield::new('b', "a tale /")],
            ))
            .with_field(MarcField::data(
                "246",
                '3',
                ' ',
                vec![Subfield::new('a', "Kometjakten")],
            ))
            .with_field(MarcField::data(
                "650",
                ' ',
                '0',
                vec![Subfield::new('a', "Comets"), Subfield::new('z', "Finland")],
            ));
        let mods = Marc21SlimToMods
            .transform(&to_marcxml(&[record]).unwrap())
            .unwrap();
        let pairs = lift_mods(&mods).unwrap();

        assert_eq!(lifted(&pairs, "title"), vec!["Comet in Moominland: a tale"]);
        assert_eq!(lifted(&pairs, "alternative"), vec!["Kometjakten"]);
        assert_eq!(lifted(&pairs, "creator"), vec!["Jansson, Tove"]);
        assert_eq!(lifted(&pairs, "type"), vec!["text"]);
        assert_eq!(lifted(&pairs, "subject"), vec!["Comets"]);
        assert_eq!(lifted(&pairs, "spatial"), vec!["Finland"]);
    }

    #[test]
    fn foreign_documents_are_rejected() {
        assert!(lift_mods("<rdf/>").is_err());
        assert!(lift_mods("<modsCollection/>").unwrap().is_empty());
    }
}
