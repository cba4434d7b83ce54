use tracing::debug;

use super::signals::{self, Demographic, Field, LabelAction};
use super::tokenize::{Event, Tag};
use crate::error::ParseError;
use crate::record::ExtractionResult;

/// Capture state of a field armed by a single signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Capture {
    #[default]
    Idle,
    Armed,
}

impl Capture {
    /// Reset to idle, reporting whether the field was armed.
    fn take(&mut self) -> bool {
        std::mem::take(self) == Capture::Armed
    }
}

/// Bed number needs its attribute signal and then the "床号:" label before the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BedCapture {
    #[default]
    Idle,
    LabelPending,
    Armed,
}

/// Extraction state for one document. Each event goes in by value and comes
/// back out, so a run is a plain fold over the event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    result: ExtractionResult,
    bed: BedCapture,
    name: Capture,
    number: Capture,
    operation: Capture,
    anesthesia: Capture,
    surgeon: Capture,
    expected: Option<Demographic>,
}

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, event: &Event) -> Self {
        match event {
            Event::Open(tag) => self.on_open(tag),
            Event::Text(text) => self.on_text(text),
            Event::Close(_) => {}
        }
        self
    }

    pub fn finish(self) -> ExtractionResult {
        self.result
    }

    fn on_open(&mut self, tag: &Tag) {
        if signals::is_container(&tag.name) {
            let code = tag
                .attrs
                .iter()
                .filter(|(k, _)| k == signals::CONTAINER_CODE_ATTR)
                .find_map(|(_, v)| signals::container_code(v));
            if let Some(d) = code {
                self.arm(d.into());
            }
        } else if tag.name == signals::IMAGE_TAG {
            if self.surgeon == Capture::Armed {
                if let Some(content) = tag.get(signals::IMAGE_CONTENT_ATTR) {
                    self.surgeon = Capture::Idle;
                    capture(Field::Surgeon, &mut self.result.surgeon, content);
                }
            }
        } else if let Some(rule) = signals::match_attr_rule(&tag.attrs) {
            self.arm(rule.arms);
        }
    }

    fn on_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let label = signals::label_action(text);
        if label == Some(LabelAction::ArmSurgeon) {
            self.arm(Field::Surgeon);
        }

        match self.bed {
            BedCapture::LabelPending if label == Some(LabelAction::ConfirmBed) => {
                debug!("bed number label confirmed");
                self.bed = BedCapture::Armed;
                return;
            }
            BedCapture::Armed => {
                self.bed = BedCapture::Idle;
                capture(Field::BedNumber, &mut self.result.bed_number, text);
                return;
            }
            _ => {}
        }

        let r = &mut self.result;
        if self.name.take() {
            capture(Field::PatientName, &mut r.patient_name, text);
        } else if self.number.take() {
            capture(Field::PatientNumber, &mut r.patient_number, text);
        } else if self.operation.take() {
            capture(Field::Operation, &mut r.operation, text);
        } else if self.anesthesia.take() {
            capture(Field::Anesthesia, &mut r.anesthesia, text);
        } else if let Some(d) = self.expected.take() {
            match d {
                Demographic::Gender => capture(Field::Gender, &mut r.gender, text),
                Demographic::Age => {
                    capture(Field::Age, &mut r.age, signals::strip_age_suffix(text))
                }
                Demographic::Diagnosis => capture(Field::Diagnosis, &mut r.diagnosis, text),
            }
        }
    }

    fn arm(&mut self, field: Field) {
        debug!(?field, "armed");
        match field {
            Field::BedNumber => self.bed = BedCapture::LabelPending,
            Field::PatientName => self.name = Capture::Armed,
            Field::PatientNumber => self.number = Capture::Armed,
            Field::Operation => self.operation = Capture::Armed,
            Field::Anesthesia => self.anesthesia = Capture::Armed,
            Field::Surgeon => self.surgeon = Capture::Armed,
            Field::Gender => self.expected = Some(Demographic::Gender),
            Field::Age => self.expected = Some(Demographic::Age),
            Field::Diagnosis => self.expected = Some(Demographic::Diagnosis),
        }
    }
}

fn capture(field: Field, slot: &mut String, value: &str) {
    debug!(?field, value, "captured");
    *slot = value.to_string();
}

/// Run a fresh extraction over an already tokenized document.
pub fn run<I>(events: I) -> ExtractionResult
where
    I: IntoIterator<Item = Event>,
{
    events
        .into_iter()
        .fold(Extraction::new(), |state, event| state.step(&event))
        .finish()
}

/// Like [`run`], over a fallible token stream. The first error ends the run.
pub fn try_run<I>(events: I) -> Result<ExtractionResult, ParseError>
where
    I: IntoIterator<Item = Result<Event, ParseError>>,
{
    events
        .into_iter()
        .try_fold(Extraction::new(), |state, event| event.map(|e| state.step(&e)))
        .map(Extraction::finish)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(name: &str, attrs: &[(&str, &str)]) -> Event {
        let tag = attrs
            .iter()
            .fold(Tag::new(name), |tag, (k, v)| tag.attr(k, v));
        Event::Open(tag)
    }

    fn text(t: &str) -> Event {
        Event::Text(t.to_string())
    }

    fn close(name: &str) -> Event {
        Event::Close(name.to_string())
    }

    const OPERATION_ID: &str = "EXT_DE_939FC1AD_31BD_43D0_9385_F5D0F2B0CA4F";
    const ANESTHESIA_ID: &str = "EXT_DE_046B7DD6_2FF3_41C6_86D5_9F5C151DE1DB";

    #[test]
    fn unrelated_markup_leaves_defaults() {
        let result = run(vec![
            open("html", &[]),
            open("td", &[("align", "left")]),
            text("床号:"),
            text("08"),
            open("img", &[("imgcontent", "王医生")]),
            close("td"),
        ]);
        assert_eq!(result, ExtractionResult::default());
    }

    #[test]
    fn bed_number_needs_label() {
        let result = run(vec![
            open("td", &[("align", "right")]),
            text("床号:"),
            text("12"),
        ]);
        assert_eq!(result.bed_number, "12");
    }

    #[test]
    fn whitespace_does_not_disturb_pending_state() {
        let result = run(vec![
            open("td", &[("align", "right")]),
            text("   "),
            text("床号:"),
            text(" \n\t "),
            text("12"),
        ]);
        assert_eq!(result.bed_number, "12");
    }

    #[test]
    fn bed_label_pending_survives_unrelated_text() {
        let mut state = Extraction::new()
            .step(&open("td", &[("align", "right")]))
            .step(&text("科室"))
            .step(&open("span", &[]))
            .step(&text("普外科"));
        assert_eq!(state.bed, BedCapture::LabelPending);
        state = state.step(&text("床号:")).step(&text("5"));
        assert_eq!(state.bed, BedCapture::Idle);
        assert_eq!(state.finish().bed_number, "5");
    }

    #[test]
    fn bed_label_without_attribute_is_ignored() {
        let result = run(vec![text("床号:"), text("12")]);
        assert_eq!(result.bed_number, "");
    }

    #[test]
    fn last_bed_number_wins() {
        let result = run(vec![
            open("td", &[("align", "right")]),
            text("床号:"),
            text("01"),
            open("td", &[("align", "right")]),
            text("床号:"),
            text("02"),
        ]);
        assert_eq!(result.bed_number, "02");
    }

    #[test]
    fn text_fields_capture_next_text() {
        let result = run(vec![
            open("input", &[("value", "patient.name")]),
            text("  张三  "),
            open("span", &[("value", "residence.event")]),
            text("ZY0012345"),
            open("div", &[("id", OPERATION_ID)]),
            text(" 阑尾切除术+肠粘连松解术 "),
            open("div", &[("id", ANESTHESIA_ID)]),
            text("全身麻醉"),
        ]);
        assert_eq!(result.patient_name, "张三");
        assert_eq!(result.patient_number, "ZY0012345");
        assert_eq!(result.operation, "阑尾切除术+肠粘连松解术");
        assert_eq!(result.anesthesia, "全身麻醉");
    }

    #[test]
    fn one_text_fills_one_field() {
        // name and number both armed; the name takes the first text
        let state = Extraction::new()
            .step(&open("span", &[("value", "patient.name")]))
            .step(&open("span", &[("value", "residence.event")]))
            .step(&text("张三"));
        assert_eq!(state.number, Capture::Armed);
        let result = state.step(&text("ZY1")).finish();
        assert_eq!(result.patient_name, "张三");
        assert_eq!(result.patient_number, "ZY1");
    }

    #[test]
    fn bed_capture_takes_priority() {
        let result = run(vec![
            open("td", &[("align", "right")]),
            text("床号:"),
            open("span", &[("value", "patient.name")]),
            text("08"),
            text("张三"),
        ]);
        assert_eq!(result.bed_number, "08");
        assert_eq!(result.patient_name, "张三");
    }

    #[test]
    fn only_first_attr_rule_fires() {
        let state = Extraction::new().step(&open(
            "td",
            &[("value", "patient.name"), ("align", "right")],
        ));
        assert_eq!(state.bed, BedCapture::LabelPending);
        assert_eq!(state.name, Capture::Idle);
    }

    #[test]
    fn container_tags_fill_demographics() {
        let result = run(vec![
            open("customtag:ded_y", &[("id", "STD_DE_SEX")]),
            text("男"),
            close("customtag:ded_y"),
            open("customtag:de_y", &[("id", "STD_DE_AGE")]),
            text("45岁"),
            open("customtag:de_y", &[("id", "STD_DE_DIAGNOSIS_NAME|3|2")]),
            text("急性阑尾炎"),
        ]);
        assert_eq!(result.gender, "男");
        assert_eq!(result.age, "45");
        assert_eq!(result.diagnosis, "急性阑尾炎");
    }

    #[test]
    fn latest_container_replaces_pending_slot() {
        let result = run(vec![
            open("customtag:ded_y", &[("id", "STD_DE_SEX")]),
            open("customtag:ded_y", &[("id", "STD_DE_AGE")]),
            text("62岁"),
        ]);
        assert_eq!(result.gender, "");
        assert_eq!(result.age, "62");
    }

    #[test]
    fn container_tags_skip_generic_rules() {
        let state = Extraction::new().step(&open(
            "customtag:ded_y",
            &[("id", "UNKNOWN"), ("align", "right")],
        ));
        assert_eq!(state.bed, BedCapture::Idle);
        assert_eq!(state.expected, None);
    }

    #[test]
    fn surgeon_comes_from_image_attribute() {
        let result = run(vec![
            text("经治医生:"),
            open("span", &[]),
            close("span"),
            open("img", &[("src", "sign.png"), ("imgcontent", "Dr. Li")]),
        ]);
        assert_eq!(result.surgeon, "Dr. Li");
    }

    #[test]
    fn image_without_label_is_ignored() {
        let state = Extraction::new().step(&open("img", &[("imgcontent", "王医生")]));
        assert_eq!(state.finish().surgeon, "");
    }

    #[test]
    fn image_without_content_keeps_surgeon_armed() {
        let state = Extraction::new()
            .step(&text("经治医生:"))
            .step(&open("img", &[("src", "logo.png")]));
        assert_eq!(state.surgeon, Capture::Armed);
        let result = state
            .step(&open("img", &[("imgcontent", "王医生")]))
            .finish();
        assert_eq!(result.surgeon, "王医生");
    }

    #[test]
    fn image_tag_skips_generic_rules() {
        let state = Extraction::new().step(&open("img", &[("align", "right")]));
        assert_eq!(state.bed, BedCapture::Idle);
    }

    #[test]
    fn surgeon_label_can_also_be_captured() {
        let result = run(vec![
            open("span", &[("value", "patient.name")]),
            text("经治医生:"),
            open("img", &[("imgcontent", "王医生")]),
        ]);
        assert_eq!(result.patient_name, "经治医生:");
        assert_eq!(result.surgeon, "王医生");
    }

    #[test]
    fn fold_is_repeatable() {
        let events = vec![
            open("td", &[("align", "right")]),
            text("床号:"),
            text("08"),
            open("customtag:ded_y", &[("id", "STD_DE_AGE")]),
            text("45岁"),
        ];
        assert_eq!(run(events.clone()), run(events));
    }

    #[test]
    fn try_run_stops_at_first_error() {
        let err = ParseError::Markup {
            position: 3,
            message: "bad".into(),
        };
        let events = vec![Ok(text("x")), Err(err.clone()), Ok(text("y"))];
        assert_eq!(try_run(events), Err(err));
    }
}
