//! `function_field`: a named value computed from a record.

use super::{Cell, CellKind, CellParts};
use crate::{
    CellError, CellFactory, Record, RecordTypeId, RenderSession, RenderTag, Services, Viewer,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub const TYPE_ID: &str = "function_field";

/// Result of a function field for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionOutput {
    Empty,
    Text(String),
    List(Vec<String>),
}

/// A computed value.
pub trait FunctionField: Send + Sync {
    fn name(&self) -> &str;

    fn verbose_name(&self) -> &str;

    /// Hidden functions are still buildable but excluded.
    fn is_hidden(&self) -> bool {
        false
    }

    fn is_multiline(&self) -> bool {
        false
    }

    fn compute(&self, record: &Record, viewer: &Viewer) -> FunctionOutput;

    /// Bulk form, called once per populate. Override when the values of
    /// several records can be computed together.
    fn compute_many(&self, records: &[Record], viewer: &Viewer) -> Vec<FunctionOutput> {
        records.iter().map(|r| self.compute(r, viewer)).collect()
    }
}

type ComputeFn = dyn Fn(&Record, &Viewer) -> FunctionOutput + Send + Sync;

/// Function field backed by a closure.
pub struct SimpleFunctionField {
    name: String,
    verbose_name: String,
    hidden: bool,
    multiline: bool,
    compute: Arc<ComputeFn>,
}

impl SimpleFunctionField {
    pub fn new<F>(name: impl Into<String>, verbose_name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record, &Viewer) -> FunctionOutput + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            verbose_name: verbose_name.into(),
            hidden: false,
            multiline: false,
            compute: Arc::new(compute),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }
}

impl FunctionField for SimpleFunctionField {
    fn name(&self) -> &str {
        &self.name
    }

    fn verbose_name(&self) -> &str {
        &self.verbose_name
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn is_multiline(&self) -> bool {
        self.multiline
    }

    fn compute(&self, record: &Record, viewer: &Viewer) -> FunctionOutput {
        (self.compute)(record, viewer)
    }
}

/// Function fields per record type, plus ones available on every type.
/// A type-specific function shadows a global one with the same name.
#[derive(Default)]
pub struct FunctionFieldRegistry {
    by_type: HashMap<RecordTypeId, HashMap<String, Arc<dyn FunctionField>>>,
    global: HashMap<String, Arc<dyn FunctionField>>,
}

impl FunctionFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        record_type: RecordTypeId,
        function: impl FunctionField + 'static,
    ) -> &mut Self {
        self.by_type
            .entry(record_type)
            .or_default()
            .insert(function.name().to_string(), Arc::new(function));
        self
    }

    pub fn register_global(&mut self, function: impl FunctionField + 'static) -> &mut Self {
        self.global
            .insert(function.name().to_string(), Arc::new(function));
        self
    }

    pub fn get(&self, record_type: &RecordTypeId, name: &str) -> Option<Arc<dyn FunctionField>> {
        self.by_type
            .get(record_type)
            .and_then(|functions| functions.get(name))
            .or_else(|| self.global.get(name))
            .cloned()
    }

    /// Every function usable on `record_type`, sorted by name.
    pub fn names_for(&self, record_type: &RecordTypeId) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_type
            .get(record_type)
            .into_iter()
            .flat_map(|functions| functions.keys().cloned())
            .chain(self.global.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for FunctionFieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionFieldRegistry")
            .field("types", &self.by_type.len())
            .field("global", &self.global.len())
            .finish()
    }
}

pub struct FunctionFieldCell {
    function: Arc<dyn FunctionField>,
}

impl FunctionFieldCell {
    pub fn function(&self) -> &Arc<dyn FunctionField> {
        &self.function
    }
}

impl CellKind for FunctionFieldCell {
    fn render(
        &self,
        _cell: &Cell,
        record: &Record,
        viewer: &Viewer,
        tag: RenderTag,
        session: &RenderSession<'_>,
    ) -> String {
        let output = match session.function_output(self.function.name(), record.id) {
            Some(output) => output,
            None => {
                warn!(
                    function = %self.function.name(),
                    record = record.id,
                    "computing function field without prefetch"
                );
                self.function.compute(record, viewer)
            }
        };

        let table = session.services().printers.table(tag);
        match output {
            FunctionOutput::Empty => String::new(),
            FunctionOutput::Text(text) => table.text(&text),
            FunctionOutput::List(items) => {
                table.join(items.iter().map(|item| table.text(item)).collect())
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct FunctionFieldFactory;

impl CellFactory for FunctionFieldFactory {
    fn type_id(&self) -> &'static str {
        TYPE_ID
    }

    fn build(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        value: &str,
    ) -> Result<Cell, CellError> {
        let function =
            services
                .functions
                .get(record_type, value)
                .ok_or_else(|| CellError::UnknownFunction {
                    record_type: record_type.clone(),
                    name: value.to_string(),
                })?;

        let parts = CellParts {
            type_id: TYPE_ID,
            record_type: record_type.clone(),
            value: value.to_string(),
            title: function.verbose_name().to_string(),
            excluded: function.is_hidden(),
            multiline: function.is_multiline(),
        };
        Ok(Cell::from_parts(parts, FunctionFieldCell { function }))
    }

    /// One bulk computation per distinct function.
    fn populate(
        &self,
        cells: &[&Cell],
        records: &[Record],
        viewer: &Viewer,
        session: &RenderSession<'_>,
    ) {
        let mut done: Vec<&str> = Vec::new();
        for kind in cells.iter().filter_map(|c| c.kind::<FunctionFieldCell>()) {
            let name = kind.function.name();
            if done.contains(&name) {
                continue;
            }
            done.push(name);

            let outputs = kind.function.compute_many(records, viewer);
            session.store_function_outputs(name, records.iter().map(|r| r.id).zip(outputs));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{contact, organisation, services};
    use crate::CellRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[test]
    fn test_lookup_type_specific_then_global() {
        let (services, _) = services();
        assert!(services.functions.get(&contact(), "full_name").is_some());
        assert!(services.functions.get(&organisation(), "full_name").is_none());
        assert!(services.functions.get(&organisation(), "tags").is_some());
        assert_eq!(
            services.functions.names_for(&contact()),
            vec!["full_name", "secret", "tags"]
        );
    }

    #[test]
    fn test_build_and_render() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let cell = registry
            .build_from_key(&services, &contact(), "function_field-full_name")
            .unwrap();
        assert_eq!(cell.title(), "Full name");

        let record = Record::new(1, "persons.contact", "Spike")
            .with("first_name", "Spike")
            .with("last_name", "Spiegel");
        let viewer = Viewer::new(Uuid::nil());
        let session = RenderSession::new(&services, &registry);
        session.populate(std::slice::from_ref(&cell), std::slice::from_ref(&record), &viewer);
        assert_eq!(
            session.render(&cell, &record, &viewer, RenderTag::PlainText),
            "Spike Spiegel"
        );

        let tags = registry
            .build_from_key(&services, &contact(), "function_field-tags")
            .unwrap();
        assert!(tags.is_multiline());
        assert_eq!(
            session.render(&tags, &record, &viewer, RenderTag::EditForm),
            "Spike, #1"
        );
    }

    #[test]
    fn test_hidden_function_is_excluded_and_unknown_fails() {
        let (services, _) = services();
        let registry = CellRegistry::with_builtins().unwrap();
        let cell = registry
            .build_from_key(&services, &contact(), "function_field-secret")
            .unwrap();
        assert!(cell.is_excluded());

        assert!(matches!(
            registry.try_build(&services, &contact(), TYPE_ID, "nope"),
            Err(CellError::UnknownFunction { .. })
        ));
    }

    struct Counting {
        bulk_calls: Arc<AtomicUsize>,
    }

    impl FunctionField for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn verbose_name(&self) -> &str {
            "Counting"
        }

        fn compute(&self, record: &Record, _viewer: &Viewer) -> FunctionOutput {
            FunctionOutput::Text(record.id.to_string())
        }

        fn compute_many(&self, records: &[Record], viewer: &Viewer) -> Vec<FunctionOutput> {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            records.iter().map(|r| self.compute(r, viewer)).collect()
        }
    }

    #[test]
    fn test_populate_computes_once_per_function() {
        let (services, _) = services();
        let bulk_calls = Arc::new(AtomicUsize::new(0));
        let mut functions = FunctionFieldRegistry::new();
        functions.register(contact(), Counting { bulk_calls: bulk_calls.clone() });
        let services = services.with_functions(functions);

        let registry = CellRegistry::with_builtins().unwrap();
        let cell = registry
            .build_from_key(&services, &contact(), "function_field-counting")
            .unwrap();
        let cells = vec![cell.clone(), cell.with_hidden(true)];
        let records: Vec<Record> = (1..=50)
            .map(|id| Record::new(id, "persons.contact", "x"))
            .collect();

        let viewer = Viewer::new(Uuid::nil());
        let session = RenderSession::new(&services, &registry);
        session.populate(&cells, &records, &viewer);
        assert_eq!(bulk_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.render(&cells[0], &records[9], &viewer, RenderTag::PlainText),
            "10"
        );
    }
}
