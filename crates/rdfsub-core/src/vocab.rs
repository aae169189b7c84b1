//! IRIs of the vocabularies the hub reads and writes.

/// Namespace of the hub's own vocabulary, bound to the `us:` prefix.
pub const US: &str = "https://w3id.org/rdfsub#";

pub const US_TOPIC: &str = "https://w3id.org/rdfsub#Topic";
pub const US_SUBSCRIPTION: &str = "https://w3id.org/rdfsub#Subscription";
pub const US_CALLBACK: &str = "https://w3id.org/rdfsub#callback";
pub const US_TRIGGER: &str = "https://w3id.org/rdfsub#trigger";
pub const US_QUERY: &str = "https://w3id.org/rdfsub#query";

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const DCTERMS_CREATED: &str = "http://purl.org/dc/terms/created";

/// Prefixes every parser knows without a declaration.
pub const BUILTIN_PREFIXES: &[(&str, &str)] = &[
  ("us", US),
  ("rdf", RDF),
  ("xsd", XSD),
  ("dcterms", DCTERMS),
];
