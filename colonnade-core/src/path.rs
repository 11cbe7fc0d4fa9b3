//! Accessor path resolution.
//!
//! A dotted reference such as `owner__team__name` is resolved against a
//! starting record type into the ordered list of attribute descriptors it
//! crosses. Every non-terminal step is a relation. At most one to-many
//! relation may appear, and only a single non-relation attribute may follow
//! it: past a to-many relation there is no single record to continue from.

use crate::{CellError, FieldDescriptor, FieldKind, FieldVisibility, RecordTypeId, SchemaCatalog};

/// Separator between the segments of a compound attribute reference.
pub const PATH_SEPARATOR: &str = "__";

/// One resolved segment of an accessor path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    /// Record type the attribute belongs to.
    pub owner: RecordTypeId,
    pub field: FieldDescriptor,
}

/// Resolved accessor path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    steps: Vec<PathStep>,
}

impl FieldPath {
    /// Resolve `path` against `root`.
    pub fn resolve(
        schema: &dyn SchemaCatalog,
        root: &RecordTypeId,
        path: &str,
    ) -> Result<Self, CellError> {
        if path.is_empty() {
            return Err(invalid(path, "empty path"));
        }

        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let mut steps = Vec::with_capacity(segments.len());
        let mut current = root.clone();
        let mut crossed_to_many = false;

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(invalid(path, "empty segment"));
            }

            let record_type = schema
                .record_type(&current)
                .ok_or_else(|| unknown(root, path))?;
            let field = record_type
                .get(segment)
                .cloned()
                .ok_or_else(|| unknown(root, path))?;

            if !field.viewable {
                return Err(invalid(path, &format!("\"{segment}\" is not viewable")));
            }

            if crossed_to_many && field.kind.is_relation() {
                return Err(invalid(
                    path,
                    "cannot chain through a relation past a to-many relation",
                ));
            }

            let is_last = index + 1 == segments.len();
            let next = match &field.kind {
                FieldKind::ToOne(target) => Some(target.clone()),
                FieldKind::ToMany(target) => {
                    crossed_to_many = true;
                    Some(target.clone())
                }
                _ if !is_last => {
                    return Err(invalid(path, &format!("\"{segment}\" is not a relation")));
                }
                _ => None,
            };

            steps.push(PathStep {
                owner: current.clone(),
                field,
            });

            if let Some(next) = next {
                current = next;
            }
        }

        Ok(Self {
            raw: path.to_string(),
            steps,
        })
    }

    /// The reference this path was resolved from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> &PathStep {
        &self.steps[0]
    }

    pub fn last(&self) -> &PathStep {
        &self.steps[self.steps.len() - 1]
    }

    /// Position of the to-many step, if any.
    pub fn to_many_index(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| matches!(s.field.kind, FieldKind::ToMany(_)))
    }

    /// Verbose names of every step joined with `" - "`.
    pub fn verbose_name(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.field.verbose_name.as_str())
            .collect::<Vec<_>>()
            .join(" - ")
    }

    pub fn is_multiline(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.field.kind, FieldKind::LargeText | FieldKind::ToMany(_)))
    }

    /// Checked at cell construction time, never cached with the path.
    pub fn is_hidden_by(&self, visibility: &dyn FieldVisibility) -> bool {
        self.steps
            .iter()
            .any(|s| visibility.is_hidden(&s.owner, &s.field.name))
    }

    pub fn is_retired(&self) -> bool {
        self.steps.iter().any(|s| s.field.retired)
    }
}

fn invalid(path: &str, reason: &str) -> CellError {
    CellError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn unknown(root: &RecordTypeId, path: &str) -> CellError {
    CellError::UnknownField {
        record_type: root.clone(),
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryCatalog, RecordTypeDescriptor};

    fn rt(id: &str) -> RecordTypeId {
        RecordTypeId::new(id)
    }

    fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.add_record_type(
            RecordTypeDescriptor::new("persons.contact", "Contact")
                .field(FieldDescriptor::new("last_name", "Last name", FieldKind::Text))
                .field(FieldDescriptor::new("description", "Description", FieldKind::LargeText))
                .field(FieldDescriptor::new("owner", "Owner", FieldKind::ToOne(rt("auth.user"))))
                .field(FieldDescriptor::new(
                    "languages",
                    "Languages",
                    FieldKind::ToMany(rt("core.language")),
                ))
                .field(
                    FieldDescriptor::new("password", "Password", FieldKind::Text).not_viewable(),
                ),
        );
        catalog.add_record_type(
            RecordTypeDescriptor::new("auth.user", "User")
                .field(FieldDescriptor::new("name", "Name", FieldKind::Text))
                .field(FieldDescriptor::new("team", "Team", FieldKind::ToOne(rt("auth.team")))),
        );
        catalog.add_record_type(
            RecordTypeDescriptor::new("auth.team", "Team")
                .field(FieldDescriptor::new("name", "Name", FieldKind::Text)),
        );
        catalog.add_record_type(
            RecordTypeDescriptor::new("core.language", "Language")
                .field(FieldDescriptor::new("code", "Code", FieldKind::Text))
                .field(FieldDescriptor::new(
                    "family",
                    "Family",
                    FieldKind::ToOne(rt("core.family")),
                )),
        );
        catalog
    }

    #[test]
    fn test_resolve_single_attribute() {
        let catalog = catalog();
        let path = FieldPath::resolve(&catalog, &rt("persons.contact"), "last_name").unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.last().field.name, "last_name");
        assert!(!path.is_multiline());
    }

    #[test]
    fn test_resolve_to_one_chain() {
        let catalog = catalog();
        let path =
            FieldPath::resolve(&catalog, &rt("persons.contact"), "owner__team__name").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.steps()[1].owner, rt("auth.user"));
        assert_eq!(path.steps()[2].owner, rt("auth.team"));
        assert_eq!(path.verbose_name(), "Owner - Team - Name");
    }

    #[test]
    fn test_to_many_terminal_and_subfield() {
        let catalog = catalog();
        let terminal = FieldPath::resolve(&catalog, &rt("persons.contact"), "languages").unwrap();
        assert!(terminal.is_multiline());
        assert_eq!(terminal.to_many_index(), Some(0));

        let sub = FieldPath::resolve(&catalog, &rt("persons.contact"), "languages__code").unwrap();
        assert_eq!(sub.len(), 2);
    }

    #[test]
    fn test_reject_relation_past_to_many() {
        let catalog = catalog();
        let err = FieldPath::resolve(&catalog, &rt("persons.contact"), "languages__family__name");
        assert!(matches!(err, Err(CellError::InvalidPath { .. })));
    }

    #[test]
    fn test_reject_unknown_and_non_relation_chain() {
        let catalog = catalog();
        let contact = rt("persons.contact");

        assert!(matches!(
            FieldPath::resolve(&catalog, &contact, "nope"),
            Err(CellError::UnknownField { .. })
        ));
        assert!(matches!(
            FieldPath::resolve(&catalog, &contact, "last_name__x"),
            Err(CellError::InvalidPath { .. })
        ));
        assert!(matches!(
            FieldPath::resolve(&catalog, &contact, "owner__"),
            Err(CellError::InvalidPath { .. })
        ));
        assert!(matches!(
            FieldPath::resolve(&catalog, &contact, ""),
            Err(CellError::InvalidPath { .. })
        ));
        assert!(matches!(
            FieldPath::resolve(&catalog, &contact, "password"),
            Err(CellError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_hidden_check_is_not_cached() {
        let catalog = catalog();
        let path = FieldPath::resolve(&catalog, &rt("persons.contact"), "owner__name").unwrap();
        assert!(!path.is_hidden_by(&catalog));

        catalog.set_hidden(&rt("auth.user"), "name", true);
        assert!(path.is_hidden_by(&catalog));

        catalog.set_hidden(&rt("auth.user"), "name", false);
        assert!(!path.is_hidden_by(&catalog));
    }
}
