//! End-to-end scenarios: cell construction, batch prefetch against a
//! counting backend, and self-healing of stored cell lists.

use colonnade_core::cell::regular::{RegularFieldCell, RegularFieldFactory};
use colonnade_core::{
    install_global, global, CellDict, CellRegistry, CellSetEntity, NamedView, RegistryError,
    RenderSession, RenderTag,
};
use colonnade_storage::{MockNamedViewStorage, ViewStorage};
use colonnade_test_utils::assertions::{assert_keys, assert_ok};
use colonnade_test_utils::fixtures;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn count(&self, needle: &str) -> usize {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).matches(needle).count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture<T>(logs: &CapturedLogs, f: impl FnOnce() -> T) -> T {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

#[test]
fn owner_name_resolves_to_two_step_path() {
    let (services, _) = fixtures::services();
    let registry = fixtures::registry();

    let cell = registry
        .build_from_key(&services, &fixtures::contact(), "regular_field-owner__name")
        .expect("owner__name builds");
    let path = cell.kind::<RegularFieldCell>().unwrap().path();
    assert_eq!(path.len(), 2);
    assert!(!cell.is_multiline());
    assert_eq!(
        serde_json::to_string(&cell.to_dict(false)).unwrap(),
        r#"{"type":"regular_field","value":"owner__name"}"#
    );
}

#[test]
fn duplicate_discriminator_is_fatal() {
    let mut builder = CellRegistry::builder();
    builder.register_builtins().unwrap();
    match builder.register(RegularFieldFactory) {
        Err(RegistryError::DuplicateType { type_id }) => assert_eq!(type_id, "regular_field"),
        Err(other) => panic!("Expected DuplicateType, got: {other}"),
        Ok(_) => panic!("Expected DuplicateType, registration succeeded"),
    }
}

#[test]
fn global_registry_freezes_once() {
    let installed = install_global(fixtures::registry()).unwrap();
    assert!(installed.factory("custom_field").is_some());
    assert!(std::ptr::eq(installed, global().unwrap()));
    assert!(matches!(
        install_global(fixtures::registry()),
        Err(RegistryError::AlreadyInstalled)
    ));
}

#[test]
fn unknown_discriminator_gives_no_cell() {
    let (services, _) = fixtures::services();
    let registry = fixtures::registry();
    let dict = CellDict::new("nonexistent", "x");
    assert!(registry
        .build_from_dict(&services, &fixtures::contact(), &dict)
        .is_none());
}

#[test]
fn populate_issues_one_bulk_call_per_variant() {
    let (services, backend) = fixtures::counting_services();
    let registry = fixtures::registry();
    let contacts = fixtures::populate_contacts(backend.catalog(), 500);
    let (cells, dropped) = registry.build_many_from_keys(
        &services,
        &fixtures::contact(),
        &["custom_field-1", "relation-employed_by", "custom_field-2", "relation-knows"],
    );
    assert!(!dropped);
    assert_eq!(cells.len(), 4);
    backend.reset();

    let viewer = fixtures::viewer();
    let session = RenderSession::new(&services, &registry);
    let report = session.populate(&cells, &contacts, &viewer);
    assert_eq!(report.bulk_calls(), 2);
    assert_eq!(backend.calls().custom_values, 1);
    assert_eq!(backend.calls().related, 1);
    assert_eq!(backend.calls().total(), 2);

    let mut first_row = Vec::new();
    for (n, contact) in contacts.iter().enumerate() {
        for tag in [RenderTag::ListRow, RenderTag::PlainText] {
            let row = session.render_row(&cells, contact, &viewer, tag);
            if n == 0 && tag == RenderTag::PlainText {
                first_row = row;
            }
        }
    }
    assert_eq!(backend.calls().total(), 2, "rendering must not fetch");
    assert_eq!(first_row, vec!["0", "Bebop", "Chess/Go", "Jet"]);
}

#[test]
fn function_field_without_prefetch_warns_per_record() {
    let (services, backend) = fixtures::counting_services();
    let registry = fixtures::registry();
    let contacts = fixtures::populate_contacts(backend.catalog(), 3);
    let cell = registry
        .build_from_key(&services, &fixtures::contact(), "function_field-full_name")
        .expect("full_name builds");
    let viewer = fixtures::viewer();

    let logs = CapturedLogs::default();
    let cold = RenderSession::new(&services, &registry);
    let rendered = capture(&logs, || {
        cold.render(&cell, &contacts[1], &viewer, RenderTag::PlainText)
    });
    assert_eq!(rendered, "First1 Last1");
    assert_eq!(logs.count("computing function field without prefetch"), 1);

    let quiet = CapturedLogs::default();
    let warm = RenderSession::new(&services, &registry);
    capture(&quiet, || {
        warm.populate(std::slice::from_ref(&cell), &contacts, &viewer);
        for contact in &contacts {
            warm.render(&cell, contact, &viewer, RenderTag::PlainText);
        }
    });
    assert_eq!(quiet.count("without prefetch"), 0);
}

#[test]
fn stale_custom_field_is_dropped_logged_once_and_purged() {
    let (services, catalog) = fixtures::services();
    let registry = fixtures::registry();
    let storage = MockNamedViewStorage::new();

    let (cells, _) = registry.build_many_from_keys(
        &services,
        &fixtures::contact(),
        &["regular_field-last_name", "custom_field-1", "regular_field-email"],
    );
    let mut view = NamedView::new("Bounty hunters", fixtures::contact());
    view.set_cells(cells).unwrap();
    storage.insert(&mut view).unwrap();

    catalog.remove_custom_field(fixtures::BOUNTY);

    let logs = CapturedLogs::default();
    let mut loaded = storage.get_by_uuid(view.uuid()).unwrap().unwrap();
    capture(&logs, || {
        assert_keys(
            loaded.cells(&registry, &services).cells(),
            &["regular_field-last_name", "regular_field-email"],
        );
        // Cached on the instance: no second decode.
        assert_eq!(loaded.cells(&registry, &services).len(), 2);
    });
    assert_eq!(logs.count("stale entries"), 1);

    assert!(loaded.repair(&registry, &services).unwrap());
    assert_ok(&storage.update(&loaded));

    let after = CapturedLogs::default();
    let reread = storage.get_by_uuid(view.uuid()).unwrap().unwrap();
    capture(&after, || {
        assert_eq!(reread.cells(&registry, &services).len(), 2);
        assert!(!reread.needs_repair(&registry, &services));
    });
    assert_eq!(after.count("stale entries"), 0);
}

#[test]
fn submission_rejects_every_bad_entry() {
    let (services, catalog) = fixtures::services();
    catalog.set_hidden(&fixtures::contact(), "email", true);
    let registry = fixtures::registry();

    let result = registry.build_from_submission(
        &services,
        &fixtures::contact(),
        &[
            "regular_field-last_name",
            "regular_field-nope",
            "regular_field-email",
            "regular_field-last_name",
        ],
    );
    colonnade_test_utils::assertions::assert_rejected_at(&result, &[1, 2, 3]);
}
