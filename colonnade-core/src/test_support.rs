//! Shared fixtures for the unit tests of this crate.

use crate::cell::actions::{ActionCatalog, ActionRequirement, RecordAction};
use crate::cell::function::{FunctionFieldRegistry, FunctionOutput, SimpleFunctionField};
use crate::cell::volatile::{VolatileCatalog, VolatileColumn};
use crate::{
    ColonnadeConfig, CustomField, CustomFieldKind, FieldDescriptor, FieldKind, InMemoryCatalog,
    Record, RecordTypeDescriptor, RecordTypeId, RelationType, Services,
};
use std::sync::Arc;

pub fn contact() -> RecordTypeId {
    RecordTypeId::new("persons.contact")
}

pub fn organisation() -> RecordTypeId {
    RecordTypeId::new("persons.organisation")
}

pub fn catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog.add_record_type(
        RecordTypeDescriptor::new(contact(), "Contact")
            .field(FieldDescriptor::new("first_name", "First name", FieldKind::Text))
            .field(FieldDescriptor::new("last_name", "Last name", FieldKind::Text).required())
            .field(FieldDescriptor::new("description", "Description", FieldKind::LargeText))
            .field(FieldDescriptor::new("email", "Email", FieldKind::Email))
            .field(FieldDescriptor::new("owner", "Owner", FieldKind::ToOne("auth.user".into())))
            .field(FieldDescriptor::new(
                "languages",
                "Languages",
                FieldKind::ToMany("core.language".into()),
            ))
            .field(FieldDescriptor::new("fax", "Fax", FieldKind::Text).retired())
            .field(FieldDescriptor::new("password", "Password", FieldKind::Text).not_viewable()),
    );
    catalog.add_record_type(
        RecordTypeDescriptor::new(organisation(), "Organisation")
            .field(FieldDescriptor::new("name", "Name", FieldKind::Text)),
    );
    catalog.add_record_type(
        RecordTypeDescriptor::new("auth.user", "User")
            .field(FieldDescriptor::new("name", "Name", FieldKind::Text)),
    );
    catalog.add_record_type(
        RecordTypeDescriptor::new("core.language", "Language")
            .field(FieldDescriptor::new("code", "Code", FieldKind::Text)),
    );

    catalog.add_record(Record::new(100, "auth.user", "Jet").with("name", "Jet"));
    catalog.add_record(Record::new(200, "core.language", "English").with("code", "en"));
    catalog.add_record(Record::new(201, "core.language", "French").with("code", "fr"));
    catalog.add_record(Record::new(300, "persons.organisation", "Bebop").with("name", "Bebop"));

    catalog.add_custom_field(CustomField::new(1, contact(), "Bounty", CustomFieldKind::Int));
    let mut hobbies = CustomField::new(2, contact(), "Hobbies", CustomFieldKind::MultiEnum);
    hobbies.choices = vec![(10, "Chess".to_string()), (11, "Go".to_string())];
    catalog.add_custom_field(hobbies);
    catalog.add_custom_field(CustomField::new(3, organisation(), "Size", CustomFieldKind::Int));

    catalog.add_relation_type(
        RelationType::new("employed_by", "is employed by")
            .with_subjects([contact()])
            .with_objects([organisation()]),
    );
    catalog.add_relation_type(RelationType::new("knows", "knows"));
    catalog.add_relation_type(
        RelationType::new("subsidiary_of", "is a subsidiary of").with_subjects([organisation()]),
    );
    catalog.add_relation_type(RelationType::new("former", "formerly knew").disabled());

    catalog
}

pub fn functions() -> FunctionFieldRegistry {
    let mut functions = FunctionFieldRegistry::new();
    functions.register(
        contact(),
        SimpleFunctionField::new("full_name", "Full name", |record, _viewer| {
            let first = record.get("first_name").as_text().unwrap_or_default();
            let last = record.get("last_name").as_text().unwrap_or_default();
            FunctionOutput::Text(format!("{first} {last}").trim().to_string())
        }),
    );
    functions.register(
        contact(),
        SimpleFunctionField::new("secret", "Secret", |_, _| FunctionOutput::Empty).hidden(),
    );
    functions.register_global(
        SimpleFunctionField::new("tags", "Tags", |record, _viewer| {
            FunctionOutput::List(vec![record.label.clone(), format!("#{}", record.id)])
        })
        .multiline(),
    );
    functions
}

pub fn volatiles() -> VolatileCatalog {
    let mut volatiles = VolatileCatalog::new();
    volatiles.register(
        contact(),
        VolatileColumn::new("initials", "Initials", |record, _viewer, _tag| {
            record.label.chars().take(1).collect()
        }),
    );
    volatiles
}

pub fn actions() -> ActionCatalog {
    let mut actions = ActionCatalog::new();
    actions
        .register(contact(), RecordAction::new("view", "View", ActionRequirement::View))
        .register(contact(), RecordAction::new("edit", "Edit", ActionRequirement::Change))
        .register(contact(), RecordAction::new("delete", "Delete", ActionRequirement::Delete));
    actions
}

/// Services wired to a fresh fixture catalog.
pub fn services() -> (Services, Arc<InMemoryCatalog>) {
    let catalog = Arc::new(catalog());
    let services = Services::from_backend(catalog.clone(), ColonnadeConfig::default())
        .with_functions(functions())
        .with_volatiles(volatiles())
        .with_actions(actions());
    (services, catalog)
}
