//! Accessor method name parsing.
//!
//! Accessor names follow `<attribute><suffix>`, where the suffix selects the
//! operation: none (get), `=` (set), `_was`, `_before_type_cast`, `?` (present).

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static PROXY_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*?)(?P<op>=|\?|_was|_before_type_cast)?$")
        .expect("valid proxy method regex")
});

/// Operation selected by an accessor suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyOperation {
    /// `name`: current cast value.
    Get,
    /// `name=`: assign a raw value.
    Set,
    /// `name_was`: value as of the last load/save boundary.
    Was,
    /// `name_before_type_cast`: raw value as assigned.
    BeforeTypeCast,
    /// `name?`: presence check.
    Present,
}

impl ProxyOperation {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Get => "",
            Self::Set => "=",
            Self::Was => "_was",
            Self::BeforeTypeCast => "_before_type_cast",
            Self::Present => "?",
        }
    }

    /// Number of arguments the operation takes.
    pub fn arity(self) -> usize {
        match self {
            Self::Set => 1,
            _ => 0,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "" => Some(Self::Get),
            "=" => Some(Self::Set),
            "_was" => Some(Self::Was),
            "_before_type_cast" => Some(Self::BeforeTypeCast),
            "?" => Some(Self::Present),
            _ => None,
        }
    }
}

/// Accessor method decomposed into attribute name and operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyMethod {
    pub attribute: String,
    pub operation: ProxyOperation,
}

impl ProxyMethod {
    pub fn new(attribute: impl Into<String>, operation: ProxyOperation) -> Self {
        Self {
            attribute: attribute.into(),
            operation,
        }
    }

    /// Splits `method` into attribute name and operation.
    ///
    /// Returns `None` when `method` is not shaped like an accessor at all.
    pub fn parse(method: &str) -> Option<Self> {
        let captures = PROXY_METHOD_RE.captures(method)?;
        let attribute = captures.name("name")?.as_str();
        let suffix = captures.name("op").map_or("", |op| op.as_str());
        Some(Self::new(attribute, ProxyOperation::from_suffix(suffix)?))
    }
}

impl Display for ProxyMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.attribute, self.operation.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::{ProxyMethod, ProxyOperation};

    #[test]
    fn parses_every_suffix() {
        let cases = [
            ("code", ProxyOperation::Get),
            ("code=", ProxyOperation::Set),
            ("code_was", ProxyOperation::Was),
            ("code_before_type_cast", ProxyOperation::BeforeTypeCast),
            ("code?", ProxyOperation::Present),
        ];
        for (method, operation) in cases {
            let parsed = ProxyMethod::parse(method).expect("accessor should parse");
            assert_eq!(parsed, ProxyMethod::new("code", operation));
            assert_eq!(parsed.to_string(), method);
        }
    }

    #[test]
    fn underscored_names_keep_their_body() {
        let parsed = ProxyMethod::parse("purchase_at_was").expect("accessor should parse");
        assert_eq!(parsed.attribute, "purchase_at");
        assert_eq!(parsed.operation, ProxyOperation::Was);

        let parsed = ProxyMethod::parse("grand_total").expect("accessor should parse");
        assert_eq!(parsed.attribute, "grand_total");
        assert_eq!(parsed.operation, ProxyOperation::Get);
    }

    #[test]
    fn rejects_non_accessor_shapes() {
        assert_eq!(ProxyMethod::parse(""), None);
        assert_eq!(ProxyMethod::parse("code!"), None);
        assert_eq!(ProxyMethod::parse("1code"), None);
        assert_eq!(ProxyMethod::parse("code=?"), None);
    }

    #[test]
    fn arity_only_for_setters() {
        assert_eq!(ProxyOperation::Set.arity(), 1);
        assert_eq!(ProxyOperation::Get.arity(), 0);
        assert_eq!(ProxyOperation::Present.arity(), 0);
    }
}
