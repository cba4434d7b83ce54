use tracing::debug;

use super::signals::strip_age_suffix;
use crate::record::{ExtractionResult, SurgeryRecord};

/// Map a raw capture onto the schedule vocabulary.
///
/// Age is parsed after dropping its unit; an unparsable age becomes 0.
/// The anesthesia doctor starts out as the main surgeon and is a plain copy,
/// so later edits to either field do not touch the other.
pub fn to_record(raw: ExtractionResult) -> SurgeryRecord {
    let age = parse_age(&raw.age);
    SurgeryRecord {
        bed_number: raw.bed_number,
        patient_name: raw.patient_name,
        gender: raw.gender,
        age,
        hospital_number: raw.patient_number,
        diagnosis: raw.diagnosis,
        operation: raw.operation,
        anesthesia_doctor: raw.surgeon.clone(),
        main_surgeon: raw.surgeon,
        anesthesia_type: raw.anesthesia,
    }
}

pub fn parse_age(raw: &str) -> i64 {
    let digits = strip_age_suffix(raw.trim());
    match digits.parse() {
        Ok(age) => age,
        Err(_) => {
            if !raw.is_empty() {
                debug!(raw, "age is not a number, using 0");
            }
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_fields() {
        let raw = ExtractionResult {
            bed_number: "08".into(),
            patient_name: "张三".into(),
            gender: "男".into(),
            age: "45".into(),
            patient_number: "ZY001".into(),
            diagnosis: "急性阑尾炎".into(),
            operation: "阑尾切除术".into(),
            surgeon: "王医生".into(),
            anesthesia: "全麻".into(),
        };
        let rec = to_record(raw);
        assert_eq!(rec.bed_number, "08");
        assert_eq!(rec.patient_name, "张三");
        assert_eq!(rec.gender, "男");
        assert_eq!(rec.age, 45);
        assert_eq!(rec.hospital_number, "ZY001");
        assert_eq!(rec.diagnosis, "急性阑尾炎");
        assert_eq!(rec.operation, "阑尾切除术");
        assert_eq!(rec.main_surgeon, "王医生");
        assert_eq!(rec.anesthesia_doctor, "王医生");
        assert_eq!(rec.anesthesia_type, "全麻");
    }

    #[test]
    fn default_raw_maps_to_default_record() {
        assert_eq!(to_record(ExtractionResult::default()), SurgeryRecord::default());
    }

    #[test]
    fn age_parsing() {
        assert_eq!(parse_age("62岁"), 62);
        assert_eq!(parse_age("62"), 62);
        assert_eq!(parse_age(" 7 "), 7);
        assert_eq!(parse_age("—"), 0);
        assert_eq!(parse_age(""), 0);
        assert_eq!(parse_age("三十"), 0);
        assert_eq!(parse_age("3岁5月"), 0);
    }

    #[test]
    fn anesthesia_doctor_is_a_copy() {
        let raw = ExtractionResult {
            surgeon: "Dr. Li".into(),
            ..Default::default()
        };
        let mut rec = to_record(raw);
        rec.anesthesia_doctor = "Dr. Zhao".into();
        assert_eq!(rec.main_surgeon, "Dr. Li");
    }

    #[test]
    fn operation_separators_survive() {
        let raw = ExtractionResult {
            operation: "腹腔镜胆囊切除术 + 胆总管探查术；T管引流".into(),
            ..Default::default()
        };
        assert_eq!(
            to_record(raw).operation,
            "腹腔镜胆囊切除术 + 胆总管探查术；T管引流"
        );
    }
}
