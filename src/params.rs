use std::fmt::{self, Display};

/// A single `<cvParam>` annotation attached to an mzML entity.
///
/// The accession is the only attribute mzML requires; the rest are
/// optional and preserved verbatim so "first match wins" lookups can
/// run over the raw document order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CvParam {
    pub accession: String,
    pub value: Option<String>,
    pub name: Option<String>,
    pub unit_accession: Option<String>,
}

impl CvParam {
    pub fn new<S: Into<String>>(accession: S) -> Self {
        Self {
            accession: accession.into(),
            ..Default::default()
        }
    }

    pub fn with_value<S: Into<String>, V: Into<String>>(accession: S, value: V) -> Self {
        Self {
            accession: accession.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_unit<S: Into<String>, V: Into<String>, U: Into<String>>(
        accession: S,
        value: V,
        unit_accession: U,
    ) -> Self {
        Self {
            accession: accession.into(),
            value: Some(value.into()),
            unit_accession: Some(unit_accession.into()),
            ..Default::default()
        }
    }

    /// The parameter value, treating a present-but-empty attribute the
    /// same as an absent one.
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit_accession.as_deref()
    }
}

impl Display for CvParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.value) {
            (Some(name), Some(value)) => write!(f, "{} ({}) = {}", self.accession, name, value),
            (Some(name), None) => write!(f, "{} ({})", self.accession, name),
            (None, Some(value)) => write!(f, "{} = {}", self.accession, value),
            (None, None) => f.write_str(&self.accession),
        }
    }
}

/// A `<userParam>` name/value pair. Only a handful of vendor quirks use
/// these, so no ontology bookkeeping is attached.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserParam {
    pub name: String,
    pub value: String,
}

impl UserParam {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered, possibly duplicated collection of CV parameters.
///
/// Order matters: derived-field resolution takes the first matching
/// accession when a document repeats one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CvGroup {
    params: Vec<CvParam>,
}

impl CvGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, param: CvParam) {
        self.params.push(param);
    }

    /// Append a copy of every parameter in `params`, preserving order.
    /// Used when expanding a `<referenceableParamGroupRef>`.
    pub fn extend_from(&mut self, params: &[CvParam]) {
        self.params.extend_from_slice(params);
    }

    pub fn params(&self) -> &[CvParam] {
        &self.params
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CvParam> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Find the first parameter with the given accession.
    pub fn param(&self, accession: &str) -> Option<&CvParam> {
        self.params.iter().find(|p| p.accession == accession)
    }

    /// First-match-wins value lookup. A parameter that is present without
    /// a value yields an empty string, distinguishing "term present" from
    /// "term absent".
    pub fn value_of(&self, accession: &str) -> Option<&str> {
        self.param(accession)
            .map(|p| p.value_str().unwrap_or_default())
    }

    pub fn has(&self, accession: &str) -> bool {
        self.param(accession).is_some()
    }
}

impl FromIterator<CvParam> for CvGroup {
    fn from_iter<T: IntoIterator<Item = CvParam>>(iter: T) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CvGroup {
    type Item = &'a CvParam;
    type IntoIter = std::slice::Iter<'a, CvParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let mut group = CvGroup::new();
        group.add(CvParam::with_value("MS:1000511", "2"));
        group.add(CvParam::with_value("MS:1000511", "3"));
        assert_eq!(group.value_of("MS:1000511"), Some("2"));
    }

    #[test]
    fn test_present_without_value() {
        let mut group = CvGroup::new();
        group.add(CvParam::new("MS:1000127"));
        assert_eq!(group.value_of("MS:1000127"), Some(""));
        assert_eq!(group.value_of("MS:1000128"), None);
        assert!(group.has("MS:1000127"));
    }

    #[test]
    fn test_extend_preserves_order() {
        let shared = vec![
            CvParam::new("MS:1000130"),
            CvParam::with_value("MS:1000511", "1"),
        ];
        let mut group = CvGroup::new();
        group.add(CvParam::new("MS:1000128"));
        group.extend_from(&shared);
        let accessions: Vec<_> = group.iter().map(|p| p.accession.as_str()).collect();
        assert_eq!(accessions, ["MS:1000128", "MS:1000130", "MS:1000511"]);
    }
}
