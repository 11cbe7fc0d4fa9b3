//! Per-context formatter table.
//!
//! Lookup order for one attribute, most specific first:
//! 1. per-attribute override `(record type, field name)`
//! 2. choice formatter for the field's kind, when the field has choices
//! 3. default formatter for the field's kind
//! 4. the table fallback

use super::{JoinPolicy, RecordLookup, RenderTag};
use crate::{FieldDescriptor, KindTag, Record, RecordTypeId, Value, Viewer};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a formatter may look at.
pub struct FormatInput<'a> {
    pub value: &'a Value,
    /// Record the value was read from.
    pub record: &'a Record,
    pub field: &'a FieldDescriptor,
    pub viewer: &'a Viewer,
    pub lookup: &'a dyn RecordLookup,
    pub table: &'a PrinterTable,
}

/// Value-to-string function.
pub type Formatter = Arc<dyn Fn(&FormatInput<'_>) -> String + Send + Sync>;

/// Builds a choice formatter for one field; the setup (e.g. the value→label
/// map) happens once per build.
pub type ChoiceFormatterBuilder = Arc<dyn Fn(&FieldDescriptor) -> Formatter + Send + Sync>;

/// Formatter table of one render context.
#[derive(Clone)]
pub struct PrinterTable {
    tag: RenderTag,
    defaults: HashMap<KindTag, Formatter>,
    choices: HashMap<KindTag, ChoiceFormatterBuilder>,
    overrides: HashMap<(RecordTypeId, String), Formatter>,
    fallback: Formatter,
    join: JoinPolicy,
    hidden_placeholder: String,
}

impl PrinterTable {
    /// Empty table: every value goes through `fallback`.
    pub fn new(
        tag: RenderTag,
        fallback: Formatter,
        join: JoinPolicy,
        hidden_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            tag,
            defaults: HashMap::new(),
            choices: HashMap::new(),
            overrides: HashMap::new(),
            fallback,
            join,
            hidden_placeholder: hidden_placeholder.into(),
        }
    }

    pub fn tag(&self) -> RenderTag {
        self.tag
    }

    pub fn join_policy(&self) -> &JoinPolicy {
        &self.join
    }

    pub fn hidden_placeholder(&self) -> &str {
        &self.hidden_placeholder
    }

    /// Join multi-valued output according to this context's policy.
    pub fn join(&self, items: Vec<String>) -> String {
        self.join.join(items)
    }

    /// Escape text when this context produces HTML.
    pub fn text(&self, raw: &str) -> String {
        if self.tag.is_html() {
            super::html::escape(raw)
        } else {
            raw.to_string()
        }
    }

    /// Label (or link) for a related record the viewer may or may not see.
    pub fn related_label(&self, record: &Record, viewable: bool) -> String {
        if !viewable {
            return self.text(&self.hidden_placeholder);
        }
        match self.tag {
            RenderTag::Detail | RenderTag::ListRow => super::html::record_link(record),
            RenderTag::EditForm => super::html::escape(&record.label),
            RenderTag::PlainText => record.label.clone(),
        }
    }

    pub fn set_default(&mut self, kind: KindTag, formatter: Formatter) -> &mut Self {
        self.defaults.insert(kind, formatter);
        self
    }

    pub fn set_choice(&mut self, kind: KindTag, builder: ChoiceFormatterBuilder) -> &mut Self {
        self.choices.insert(kind, builder);
        self
    }

    /// Register a per-attribute formatter. Always wins over type defaults.
    pub fn set_override(
        &mut self,
        record_type: RecordTypeId,
        field: impl Into<String>,
        formatter: Formatter,
    ) -> &mut Self {
        self.overrides.insert((record_type, field.into()), formatter);
        self
    }

    pub fn set_join(&mut self, join: JoinPolicy) -> &mut Self {
        self.join = join;
        self
    }

    /// Resolve the formatter for one attribute.
    pub fn formatter_for(&self, owner: &RecordTypeId, field: &FieldDescriptor) -> Formatter {
        if let Some(formatter) = self.overrides.get(&(owner.clone(), field.name.clone())) {
            return formatter.clone();
        }

        let kind = field.kind.tag();
        if field.has_choices() {
            if let Some(builder) = self.choices.get(&kind) {
                return builder(field);
            }
        }

        self.defaults
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl std::fmt::Debug for PrinterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrinterTable")
            .field("tag", &self.tag)
            .field("defaults", &self.defaults.len())
            .field("choices", &self.choices.len())
            .field("overrides", &self.overrides.len())
            .field("join", &self.join)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldKind;

    struct NoLookup;

    impl RecordLookup for NoLookup {
        fn record(&self, _id: crate::RecordId) -> Option<Record> {
            None
        }

        fn records(&self, _ids: &[crate::RecordId]) -> Vec<Record> {
            Vec::new()
        }

        fn may_view(&self, _viewer: &Viewer, _record: &Record) -> bool {
            true
        }
    }

    fn constant(text: &'static str) -> Formatter {
        Arc::new(move |_: &FormatInput<'_>| text.to_string())
    }

    fn format(table: &PrinterTable, owner: &RecordTypeId, field: &FieldDescriptor) -> String {
        let record = Record::new(1, owner.clone(), "r");
        let viewer = Viewer::new(uuid::Uuid::nil());
        let formatter = table.formatter_for(owner, field);
        formatter(&FormatInput {
            value: &Value::Null,
            record: &record,
            field,
            viewer: &viewer,
            lookup: &NoLookup,
            table,
        })
    }

    #[test]
    fn test_lookup_order() {
        let contact = RecordTypeId::new("persons.contact");
        let mut table = PrinterTable::new(
            RenderTag::PlainText,
            constant("fallback"),
            JoinPolicy::separator("/"),
            "hidden",
        );
        table
            .set_default(KindTag::Text, constant("default"))
            .set_choice(KindTag::Text, Arc::new(|_: &FieldDescriptor| constant("choice")));

        let plain = FieldDescriptor::new("name", "Name", FieldKind::Text);
        let with_choices = FieldDescriptor::new("status", "Status", FieldKind::Text)
            .with_choices([("a", "Active")]);
        let number = FieldDescriptor::new("age", "Age", FieldKind::Integer);

        assert_eq!(format(&table, &contact, &plain), "default");
        assert_eq!(format(&table, &contact, &with_choices), "choice");
        assert_eq!(format(&table, &contact, &number), "fallback");

        table.set_override(contact.clone(), "status", constant("override"));
        assert_eq!(format(&table, &contact, &with_choices), "override");

        // Overrides are per record type.
        let orga = RecordTypeId::new("persons.organisation");
        assert_eq!(format(&table, &orga, &with_choices), "choice");
    }

    #[test]
    fn test_related_label_placeholder_is_escaped_in_html() {
        let table = PrinterTable::new(
            RenderTag::Detail,
            constant(""),
            JoinPolicy::bullets(None),
            "<hidden>",
        );
        let record = Record::new(3, "persons.contact", "Ed");
        assert_eq!(table.related_label(&record, false), "&lt;hidden&gt;");
        assert!(table.related_label(&record, true).starts_with("<a href"));
    }
}
