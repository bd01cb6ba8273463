//! Form session state
//!
//! Holds everything the extraction form tracks between submits: the live HTML
//! input, overflow attachments, the declared fields, the chosen model and the
//! versioned history of extraction results. One extraction may be in flight at
//! a time; the pending flag gates submits rather than queueing them.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;
use crate::models;
use crate::types::{
    Attachment, ExtractRequest, ExtractionResult, Field, FieldForApi, FieldType,
    VersionedExtractionResult,
};

/// Pastes longer than this (in characters, not bytes) become attachments
pub const ATTACHMENT_THRESHOLD: usize = 5000;

/// Milliseconds since the epoch, as the id scheme the wire format uses
fn timestamp_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
        .to_string()
}

/// Append-only history of extraction runs.
///
/// Versions are assigned at insert time and never reused, so version numbers
/// stay stable however the history is displayed.
#[derive(Debug, Default)]
pub struct ResultStore {
    items: Vec<VersionedExtractionResult>,
}

impl ResultStore {
    /// Record a run together with the snapshot it was produced from
    pub fn record(&mut self, result: ExtractionResult, html_input: String) -> u32 {
        let version = self.items.len() as u32 + 1;
        self.items.push(VersionedExtractionResult {
            version,
            result,
            html_input,
        });
        version
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, version: u32) -> Option<&VersionedExtractionResult> {
        self.items.iter().find(|item| item.version == version)
    }

    pub fn latest(&self) -> Option<&VersionedExtractionResult> {
        self.items.last()
    }

    /// History as displayed: newest first
    pub fn sorted_desc(&self) -> Vec<&VersionedExtractionResult> {
        let mut view: Vec<_> = self.items.iter().collect();
        view.sort_by(|a, b| b.version.cmp(&a.version));
        view
    }
}

/// State of the extraction form
#[derive(Debug)]
pub struct FormSession {
    html_input: String,
    attachments: Vec<Attachment>,
    fields: Vec<Field>,
    model: String,
    pending: bool,
    pub results: ResultStore,
}

impl Default for FormSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FormSession {
    /// Fresh session with the stock "Title" field and the default model
    pub fn new() -> Self {
        Self {
            html_input: String::new(),
            attachments: Vec::new(),
            fields: vec![Field {
                id: "default".to_string(),
                name: "Title".to_string(),
                field_type: FieldType::Text,
                additional_info: String::new(),
            }],
            model: models::default_model().id.to_string(),
            pending: false,
            results: ResultStore::default(),
        }
    }

    pub fn html_input(&self) -> &str {
        &self.html_input
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Replace the live HTML input. Input past the attachment threshold is
    /// converted into an attachment and the live input cleared, keeping the
    /// textarea responsive however much gets pasted in.
    pub fn set_html_input(&mut self, input: impl Into<String>) {
        let input = input.into();
        if input.chars().count() > ATTACHMENT_THRESHOLD {
            let id = self.unique_id();
            self.attachments.push(Attachment { id, content: input });
            self.html_input.clear();
        } else {
            self.html_input = input;
        }
    }

    pub fn remove_attachment(&mut self, id: &str) {
        self.attachments.retain(|attachment| attachment.id != id);
    }

    /// Add a field to extract; returns its assigned id
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
        additional_info: impl Into<String>,
    ) -> String {
        let id = self.unique_id();
        self.fields.push(Field {
            id: id.clone(),
            name: name.into(),
            field_type,
            additional_info: additional_info.into(),
        });
        id
    }

    pub fn remove_field(&mut self, id: &str) {
        self.fields.retain(|field| field.id != id);
    }

    pub fn field_mut(&mut self, id: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| field.id == id)
    }

    /// Timestamp id, bumped past any id already taken by an attachment or
    /// field created in the same millisecond
    fn unique_id(&self) -> String {
        let mut candidate = timestamp_id();
        loop {
            let taken = self.attachments.iter().any(|a| a.id == candidate)
                || self.fields.iter().any(|f| f.id == candidate);
            if !taken {
                return candidate;
            }
            let bumped = candidate.parse::<u128>().unwrap_or(0) + 1;
            candidate = bumped.to_string();
        }
    }

    /// The full snapshot a submit sends: every attachment in insertion order,
    /// then the live input, joined by newlines
    pub fn combined_html(&self) -> String {
        if self.attachments.is_empty() {
            return self.html_input.clone();
        }
        let mut combined = self
            .attachments
            .iter()
            .map(|attachment| attachment.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        combined.push('\n');
        combined.push_str(&self.html_input);
        combined
    }

    /// Validate the form and assemble the request body, flipping the session
    /// into the pending state. A second submit while pending is rejected
    /// rather than queued.
    pub fn begin_submit(&mut self) -> Result<ExtractRequest, Error> {
        if self.pending {
            return Err(Error::ExtractionPending);
        }
        let html = self.combined_html();
        if html.trim().is_empty() {
            return Err(Error::EmptyHtml);
        }
        if self.fields.is_empty() {
            return Err(Error::NoFields);
        }
        if !models::is_supported(&self.model) {
            return Err(Error::UnsupportedModel(self.model.clone()));
        }

        self.pending = true;
        Ok(ExtractRequest {
            html,
            fields_to_extract_selectors_for: self.fields.iter().map(FieldForApi::from).collect(),
            model: self.model.clone(),
            attachments: self.attachments.clone(),
            html_input: self.html_input.clone(),
            fields: self.fields.clone(),
        })
    }

    /// Record a completed run under the next version and clear the pending flag
    pub fn complete_submit(&mut self, result: ExtractionResult) -> u32 {
        self.pending = false;
        let snapshot = self.combined_html();
        self.results.record(result, snapshot)
    }

    /// Clear the pending flag after a failed run; nothing is recorded
    pub fn fail_submit(&mut self) {
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submittable() -> FormSession {
        let mut session = FormSession::new();
        session.set_html_input("<h1>Title</h1>");
        session
    }

    #[test]
    fn new_session_has_stock_title_field_and_default_model() {
        let session = FormSession::new();
        assert_eq!(session.fields().len(), 1);
        assert_eq!(session.fields()[0].id, "default");
        assert_eq!(session.fields()[0].name, "Title");
        assert_eq!(session.model(), "x-ai/grok-3-mini");
        assert!(!session.is_pending());
    }

    #[test]
    fn short_input_stays_in_the_textarea() {
        let mut session = FormSession::new();
        session.set_html_input("<p>short</p>");
        assert_eq!(session.html_input(), "<p>short</p>");
        assert!(session.attachments().is_empty());
    }

    #[test]
    fn oversized_paste_becomes_attachment_and_clears_input() {
        let mut session = FormSession::new();
        let big = "x".repeat(6000);
        session.set_html_input(big.clone());
        assert_eq!(session.html_input(), "");
        assert_eq!(session.attachments().len(), 1);
        assert_eq!(session.attachments()[0].content, big);
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        let mut session = FormSession::new();
        // 3000 two-byte characters: 6000 bytes but under the char threshold
        session.set_html_input("é".repeat(3000));
        assert!(session.attachments().is_empty());
        assert_eq!(session.html_input().chars().count(), 3000);
    }

    #[test]
    fn combined_html_joins_attachments_then_live_input() {
        let mut session = FormSession::new();
        session.set_html_input("a".repeat(5001));
        session.set_html_input("b".repeat(5001));
        session.set_html_input("<p>live</p>");
        let combined = session.combined_html();
        assert_eq!(
            combined,
            format!("{}\n{}\n<p>live</p>", "a".repeat(5001), "b".repeat(5001))
        );
    }

    #[test]
    fn ids_stay_unique_within_a_millisecond() {
        let mut session = FormSession::new();
        session.set_html_input("x".repeat(5001));
        session.set_html_input("y".repeat(5001));
        session.set_html_input("z".repeat(5001));
        let mut ids: Vec<_> = session.attachments().iter().map(|a| a.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn fields_can_be_added_and_removed() {
        let mut session = FormSession::new();
        let id = session.add_field("Price", FieldType::Number, "numeric only");
        assert_eq!(session.fields().len(), 2);
        session.remove_field(&id);
        assert_eq!(session.fields().len(), 1);
        session.remove_field("default");
        assert!(session.fields().is_empty());
    }

    #[test]
    fn submit_requires_html_and_fields_and_a_known_model() {
        let mut session = FormSession::new();
        assert!(matches!(session.begin_submit(), Err(Error::EmptyHtml)));

        session.set_html_input("<h1>x</h1>");
        session.remove_field("default");
        assert!(matches!(session.begin_submit(), Err(Error::NoFields)));

        session.add_field("Title", FieldType::Text, "");
        session.set_model("made-up/model");
        assert!(matches!(
            session.begin_submit(),
            Err(Error::UnsupportedModel(_))
        ));
    }

    #[test]
    fn concurrent_submit_is_rejected_until_resolution() {
        let mut session = submittable();
        let request = session.begin_submit().unwrap();
        assert_eq!(request.html, "<h1>Title</h1>");
        assert!(matches!(
            session.begin_submit(),
            Err(Error::ExtractionPending)
        ));

        session.fail_submit();
        assert!(session.begin_submit().is_ok());
    }

    #[test]
    fn request_carries_form_state_verbatim() {
        let mut session = FormSession::new();
        session.set_html_input("x".repeat(5001));
        session.set_html_input("<p>rest</p>");
        let request = session.begin_submit().unwrap();
        assert_eq!(request.html_input, "<p>rest</p>");
        assert_eq!(request.attachments.len(), 1);
        assert_eq!(request.fields_to_extract_selectors_for.len(), 1);
        assert_eq!(request.fields_to_extract_selectors_for[0].name, "Title");
        assert_eq!(request.model, "x-ai/grok-3-mini");
    }

    #[test]
    fn versions_are_assigned_in_insertion_order() {
        let mut session = submittable();
        for expected in 1..=4u32 {
            session.begin_submit().unwrap();
            let version = session.complete_submit(ExtractionResult::default());
            assert_eq!(version, expected);
        }
        assert_eq!(session.results.len(), 4);
        assert_eq!(session.results.latest().unwrap().version, 4);
    }

    #[test]
    fn history_view_is_newest_first_without_reordering_storage() {
        let mut store = ResultStore::default();
        for _ in 0..3 {
            store.record(ExtractionResult::default(), String::new());
        }
        let versions: Vec<u32> = store.sorted_desc().iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![3, 2, 1]);
        assert_eq!(store.get(2).unwrap().version, 2);
        assert_eq!(store.latest().unwrap().version, 3);
    }

    #[test]
    fn result_records_the_snapshot_it_ran_against() {
        let mut session = submittable();
        session.begin_submit().unwrap();
        session.complete_submit(ExtractionResult::default());
        assert_eq!(
            session.results.latest().unwrap().html_input,
            "<h1>Title</h1>"
        );
    }
}
