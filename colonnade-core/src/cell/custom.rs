//! `custom_field`: a dynamically-defined attribute.
//!
//! The local value is the numeric field id; the portable value is the
//! field uuid. Both forms are accepted when building.

use super::{Cell, CellKind, CellParts};
use crate::render::html::{escape, linebreaks};
use crate::{
    display_value, CellError, CellFactory, CustomField, CustomFieldKind, PrinterTable, Record,
    RecordTypeId, RenderSession, RenderTag, Services, Value, Viewer,
};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use uuid::Uuid;

pub const TYPE_ID: &str = "custom_field";

pub struct CustomFieldCell {
    field: CustomField,
    labels: OnceCell<HashMap<i64, String>>,
}

impl CustomFieldCell {
    pub fn field(&self) -> &CustomField {
        &self.field
    }

    fn labels(&self) -> &HashMap<i64, String> {
        self.labels
            .get_or_init(|| self.field.choices.iter().cloned().collect())
    }

    fn label(&self, option: i64) -> String {
        self.labels()
            .get(&option)
            .cloned()
            .unwrap_or_else(|| option.to_string())
    }

    fn format(&self, value: &Value, tag: RenderTag, table: &PrinterTable) -> String {
        match (self.field.kind, value) {
            (CustomFieldKind::Enum, Value::Int(option)) => table.text(&self.label(*option)),
            (CustomFieldKind::MultiEnum, Value::IntList(options)) => {
                let labels = options.iter().map(|o| table.text(&self.label(*o))).collect();
                table.join(labels)
            }
            (CustomFieldKind::Float, Value::Decimal(d)) => format!("{d:.2}"),
            (CustomFieldKind::Text, Value::Text(text)) if tag.is_html() && !text.is_empty() => {
                match tag {
                    RenderTag::EditForm => escape(text),
                    _ => format!("<p>{}</p>", linebreaks(text)),
                }
            }
            (CustomFieldKind::Url, Value::Text(link))
                if matches!(tag, RenderTag::Detail | RenderTag::ListRow) && !link.is_empty() =>
            {
                let link = escape(link);
                format!("<a href=\"{link}\" target=\"_blank\">{link}</a>")
            }
            (_, other) => table.text(&display_value(other)),
        }
    }
}

impl CellKind for CustomFieldCell {
    fn portable_value(&self) -> Option<String> {
        Some(self.field.uuid.to_string())
    }

    fn render(
        &self,
        _cell: &Cell,
        record: &Record,
        _viewer: &Viewer,
        tag: RenderTag,
        session: &RenderSession<'_>,
    ) -> String {
        let Some(value) = session.custom_value(self.field.id, record.id) else {
            return String::new();
        };
        let table = session.services().printers.table(tag);
        self.format(&value, tag, table)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct CustomFieldFactory;

impl CustomFieldFactory {
    fn lookup(services: &Services, value: &str) -> Option<CustomField> {
        if let Ok(id) = value.parse::<i64>() {
            return services.custom_fields.custom_field_by_id(id);
        }
        let uuid = Uuid::parse_str(value).ok()?;
        services.custom_fields.custom_field_by_uuid(uuid)
    }
}

impl CellFactory for CustomFieldFactory {
    fn type_id(&self) -> &'static str {
        TYPE_ID
    }

    fn build(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        value: &str,
    ) -> Result<Cell, CellError> {
        let field = Self::lookup(services, value).ok_or_else(|| CellError::UnknownCustomField {
            value: value.to_string(),
        })?;
        if &field.record_type != record_type {
            return Err(CellError::ForeignCustomField {
                record_type: record_type.clone(),
                value: value.to_string(),
            });
        }

        let parts = CellParts {
            type_id: TYPE_ID,
            record_type: record_type.clone(),
            value: field.id.to_string(),
            title: field.name.clone(),
            excluded: field.deleted,
            multiline: matches!(field.kind, CustomFieldKind::MultiEnum | CustomFieldKind::Text),
        };
        Ok(Cell::from_parts(
            parts,
            CustomFieldCell {
                field,
                labels: OnceCell::new(),
            },
        ))
    }

    /// One value fetch for every field of the group and every record.
    fn populate(
        &self,
        cells: &[&Cell],
        records: &[Record],
        _viewer: &Viewer,
        session: &RenderSession<'_>,
    ) {
        let mut fields: Vec<i64> = cells
            .iter()
            .filter_map(|c| c.kind::<CustomFieldCell>())
            .map(|k| k.field.id)
            .collect();
        fields.sort_unstable();
        fields.dedup();

        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        session.warm_custom_values(&fields, &ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{contact, services};
    use crate::{CellDict, CellRegistry, CustomFieldStore};

    #[test]
    fn test_local_and_portable_values() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let cell = registry
            .build_from_key(&services, &contact(), "custom_field-1")
            .unwrap();

        let field = services.custom_fields.custom_field_by_id(1).unwrap();
        assert_eq!(cell.to_dict(false), CellDict::new(TYPE_ID, "1"));
        assert_eq!(cell.to_dict(true), CellDict::new(TYPE_ID, field.uuid.to_string()));

        // Building from the portable form gives the same cell.
        let rebuilt = registry
            .build_from_dict(&services, &contact(), &cell.to_dict(true))
            .unwrap();
        assert_eq!(rebuilt, cell);
        assert_eq!(rebuilt.value(), "1");
    }

    #[test]
    fn test_unknown_and_foreign_fields() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        assert!(matches!(
            registry.try_build(&services, &contact(), TYPE_ID, "999"),
            Err(CellError::UnknownCustomField { .. })
        ));
        assert!(matches!(
            registry.try_build(&services, &contact(), TYPE_ID, "not-a-uuid"),
            Err(CellError::UnknownCustomField { .. })
        ));
        // Field 3 belongs to organisations.
        assert!(matches!(
            registry.try_build(&services, &contact(), TYPE_ID, "3"),
            Err(CellError::ForeignCustomField { .. })
        ));
    }

    #[test]
    fn test_deleted_field_is_excluded() {
        let (services, catalog) = services();
        let mut field = catalog.custom_field_by_id(1).unwrap();
        field.deleted = true;
        catalog.add_custom_field(field);

        let registry = CellRegistry::with_builtins().unwrap();
        let cell = registry
            .build_from_key(&services, &contact(), "custom_field-1")
            .unwrap();
        assert!(cell.is_excluded());
    }

    #[test]
    fn test_render_multi_enum_labels() {
        let (services, catalog) = services();
        catalog.set_custom_value(2, 1, Value::IntList(vec![11, 10]));
        let registry = CellRegistry::with_builtins().unwrap();
        let cell = registry
            .build_from_key(&services, &contact(), "custom_field-2")
            .unwrap();
        assert!(cell.is_multiline());

        let record = Record::new(1, "persons.contact", "Spike");
        let viewer = Viewer::new(Uuid::nil());
        let session = RenderSession::new(&services, &registry);
        session.populate(std::slice::from_ref(&cell), std::slice::from_ref(&record), &viewer);

        assert_eq!(session.render(&cell, &record, &viewer, RenderTag::PlainText), "Go/Chess");
        assert_eq!(
            session.render(&cell, &record, &viewer, RenderTag::Detail),
            "<ul><li>Go</li><li>Chess</li></ul>"
        );
    }

    #[test]
    fn test_missing_value_renders_empty() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let cell = registry
            .build_from_key(&services, &contact(), "custom_field-1")
            .unwrap();
        let record = Record::new(1, "persons.contact", "Spike");
        let session = RenderSession::new(&services, &registry);
        let viewer = Viewer::new(Uuid::nil());
        session.populate(std::slice::from_ref(&cell), std::slice::from_ref(&record), &viewer);
        assert_eq!(session.render(&cell, &record, &viewer, RenderTag::Detail), "");
    }
}
