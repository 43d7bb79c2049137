//! Built-in vocabulary declarations.

use super::Vocabulary;

pub const RDF: &str = "rdf";
pub const RDFS: &str = "rdfs";
pub const DC: &str = "dc";
pub const BIBO: &str = "bibo";
pub const MODS: &str = "mods";
pub const PRISM: &str = "prism";
pub const SKOS: &str = "skos";
pub const MADS: &str = "mads";
pub const FOAF: &str = "foaf";
pub const VCARD: &str = "vcard";

pub(super) fn all() -> Vec<Vocabulary> {
    vec![
        Vocabulary::new(RDF, "http://www.w3.org/1999/02/22-rdf-syntax-ns#")
            .with_properties(["type", "value", "first", "rest"])
            .with_classes(["Property", "Statement", "List", "Bag", "Seq", "Alt"]),
        Vocabulary::new(RDFS, "http://www.w3.org/2000/01/rdf-schema#")
            .with_properties(["label", "comment", "seeAlso", "isDefinedBy"])
            .with_classes(["Resource", "Class", "Literal", "Datatype"]),
        Vocabulary::new(DC, "http://purl.org/dc/terms/")
            .with_properties([
                "abstract",
                "alternative",
                "bibliographicCitation",
                "contributor",
                "created",
                "creator",
                "date",
                "description",
                "extent",
                "format",
                "hasPart",
                "identifier",
                "isPartOf",
                "issued",
                "language",
                "modified",
                "publisher",
                "relation",
                "rights",
                "source",
                "spatial",
                "subject",
                "tableOfContents",
                "temporal",
                "title",
                "type",
            ])
            .with_classes([
                "Agent",
                "AgentClass",
                "BibliographicResource",
                "LinguisticSystem",
                "Location",
                "PhysicalResource",
            ]),
        Vocabulary::new(BIBO, "http://purl.org/ontology/bibo/")
            .with_properties([
                "doi",
                "edition",
                "isbn",
                "isbn10",
                "isbn13",
                "issn",
                "issue",
                "lccn",
                "numPages",
                "oclcnum",
                "pages",
                "shortTitle",
                "volume",
            ])
            .with_classes([
                "Article",
                "Book",
                "Document",
                "Periodical",
                "Report",
                "Thesis",
            ]),
        Vocabulary::new(MODS, "http://www.loc.gov/mods/rdf/v1#")
            .with_properties([
                "abstract",
                "dateIssued",
                "extent",
                "genre",
                "identifierGroup",
                "languageOfResource",
                "name",
                "namePrincipal",
                "note",
                "placeOfOrigin",
                "publisher",
                "recordIdentifier",
                "subjectGeographic",
                "subjectName",
                "subjectTopic",
                "titleAlternative",
                "titlePrincipal",
                "typeOfResource",
            ])
            .with_classes(["ModsResource"]),
        Vocabulary::new(PRISM, "http://prismstandard.org/namespaces/basic/2.0/")
            .with_properties([
                "doi",
                "eIssn",
                "edition",
                "endingPage",
                "isbn",
                "issn",
                "number",
                "publicationName",
                "startingPage",
                "volume",
            ]),
        Vocabulary::new(SKOS, "http://www.w3.org/2004/02/skos/core#")
            .with_properties([
                "altLabel",
                "broader",
                "closeMatch",
                "definition",
                "exactMatch",
                "hiddenLabel",
                "inScheme",
                "narrower",
                "notation",
                "prefLabel",
                "related",
                "scopeNote",
            ])
            .with_classes(["Collection", "Concept", "ConceptScheme"]),
        Vocabulary::new(MADS, "http://www.loc.gov/mads/rdf/v1#")
            .with_properties([
                "authoritativeLabel",
                "hasBroaderAuthority",
                "hasNarrowerAuthority",
                "hasVariant",
                "identifiesRWO",
                "isMemberOfMADSScheme",
                "variantLabel",
            ])
            .with_classes([
                "Authority",
                "Concept",
                "CorporateName",
                "Geographic",
                "PersonalName",
                "Topic",
            ]),
        Vocabulary::new(FOAF, "http://xmlns.com/foaf/0.1/")
            .with_properties([
                "birthday",
                "depiction",
                "familyName",
                "gender",
                "givenName",
                "homepage",
                "knows",
                "made",
                "maker",
                "mbox",
                "member",
                "name",
                "nick",
                "page",
                "title",
            ])
            .with_classes(["Agent", "Document", "Group", "Organization", "Person"]),
        Vocabulary::new(VCARD, "http://www.w3.org/2006/vcard/ns#")
            .with_properties([
                "adr",
                "email",
                "family-name",
                "fn",
                "given-name",
                "hasMember",
                "n",
                "note",
                "org",
                "tel",
                "url",
            ])
            .with_classes(["Agent", "Group", "Individual", "Kind", "Organization"]),
    ]
}
