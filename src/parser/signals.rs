//! Static signal rules: which tag, attribute or label text arms which field.
//!
//! Field codes and labels are fixed by the hospital system's export templates.
//! Adding a code means adding a row here; the state machine only walks tables.

/// Fields a signal can arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    BedNumber,
    PatientName,
    Gender,
    Age,
    PatientNumber,
    Diagnosis,
    Operation,
    Surgeon,
    Anesthesia,
}

/// The three fields carried by custom container tags. Only one can be pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Demographic {
    Gender,
    Age,
    Diagnosis,
}

impl From<Demographic> for Field {
    fn from(d: Demographic) -> Self {
        match d {
            Demographic::Gender => Field::Gender,
            Demographic::Age => Field::Age,
            Demographic::Diagnosis => Field::Diagnosis,
        }
    }
}

/// Generic `attr="value"` match on any tag that is neither a container nor an image.
#[derive(Debug, Clone, Copy)]
pub struct AttrRule {
    pub attr: &'static str,
    pub value: &'static str,
    pub arms: Field,
}

/// What a literal label text does when it appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAction {
    ArmSurgeon,
    ConfirmBed,
}

/// Custom field-container tag names.
pub const CONTAINER_TAGS: &[&str] = &["customtag:ded_y", "customtag:de_y"];

/// Attribute on a container tag that carries the field code.
pub const CONTAINER_CODE_ATTR: &str = "id";

pub const CONTAINER_CODES: &[(&str, Demographic)] = &[
    ("STD_DE_SEX", Demographic::Gender),
    ("STD_DE_AGE", Demographic::Age),
    ("STD_DE_DIAGNOSIS_NAME|3|2", Demographic::Diagnosis),
];

pub const IMAGE_TAG: &str = "img";

/// Image attribute holding the signing surgeon's name.
pub const IMAGE_CONTENT_ATTR: &str = "imgcontent";

/// Checked in order; the first rule matching any attribute of the tag wins.
pub const ATTR_RULES: &[AttrRule] = &[
    AttrRule {
        attr: "align",
        value: "right",
        arms: Field::BedNumber,
    },
    AttrRule {
        attr: "value",
        value: "patient.name",
        arms: Field::PatientName,
    },
    AttrRule {
        attr: "value",
        value: "residence.event",
        arms: Field::PatientNumber,
    },
    AttrRule {
        attr: "id",
        value: "EXT_DE_939FC1AD_31BD_43D0_9385_F5D0F2B0CA4F",
        arms: Field::Operation,
    },
    AttrRule {
        attr: "id",
        value: "EXT_DE_046B7DD6_2FF3_41C6_86D5_9F5C151DE1DB",
        arms: Field::Anesthesia,
    },
];

pub const LABEL_RULES: &[(&str, LabelAction)] = &[
    ("经治医生:", LabelAction::ArmSurgeon),
    ("床号:", LabelAction::ConfirmBed),
];

/// Unit suffix on age values.
pub const AGE_SUFFIX: char = '岁';

pub fn is_container(tag: &str) -> bool {
    CONTAINER_TAGS.contains(&tag)
}

pub fn container_code(code: &str) -> Option<Demographic> {
    CONTAINER_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, d)| *d)
}

/// First generic rule, in table order, matched by any of `attrs`.
pub fn match_attr_rule(attrs: &[(String, String)]) -> Option<&'static AttrRule> {
    ATTR_RULES
        .iter()
        .find(|rule| attrs.iter().any(|(k, v)| k == rule.attr && v == rule.value))
}

/// Drop a trailing age unit: "62岁" -> "62". Anything else is returned as is.
pub fn strip_age_suffix(text: &str) -> &str {
    match text.strip_suffix(AGE_SUFFIX) {
        Some(rest) => rest.trim_end(),
        None => text,
    }
}

pub fn label_action(text: &str) -> Option<LabelAction> {
    LABEL_RULES
        .iter()
        .find(|(label, _)| *label == text)
        .map(|(_, action)| *action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn container_codes() {
        assert_eq!(container_code("STD_DE_AGE"), Some(Demographic::Age));
        assert_eq!(
            container_code("STD_DE_DIAGNOSIS_NAME|3|2"),
            Some(Demographic::Diagnosis)
        );
        assert_eq!(container_code("STD_DE_DIAGNOSIS_NAME"), None);
        assert!(is_container("customtag:de_y"));
        assert!(!is_container("customtag"));
    }

    #[test]
    fn attr_rules_follow_table_order() {
        // both attributes present; align=right comes first in the table
        let a = attrs(&[("value", "patient.name"), ("align", "right")]);
        assert_eq!(match_attr_rule(&a).map(|r| r.arms), Some(Field::BedNumber));
    }

    #[test]
    fn attr_rule_values_are_exact() {
        assert!(match_attr_rule(&attrs(&[("align", "Right")])).is_none());
        assert!(match_attr_rule(&attrs(&[("value", "patient.names")])).is_none());
        let op = attrs(&[("id", "EXT_DE_939FC1AD_31BD_43D0_9385_F5D0F2B0CA4F")]);
        assert_eq!(match_attr_rule(&op).map(|r| r.arms), Some(Field::Operation));
    }

    #[test]
    fn age_suffix() {
        assert_eq!(strip_age_suffix("62岁"), "62");
        assert_eq!(strip_age_suffix("62 岁"), "62");
        assert_eq!(strip_age_suffix("62"), "62");
        assert_eq!(strip_age_suffix("岁"), "");
        assert_eq!(strip_age_suffix("3岁5月"), "3岁5月");
    }

    #[test]
    fn labels() {
        assert_eq!(label_action("经治医生:"), Some(LabelAction::ArmSurgeon));
        assert_eq!(label_action("床号:"), Some(LabelAction::ConfirmBed));
        assert_eq!(label_action("床号"), None);
    }
}
