//! `actions`: the per-record actions the viewer may perform.
//!
//! The value is `all` or a comma-separated list of action ids.

use super::{Cell, CellKind, CellParts};
use crate::render::html::{escape, record_url};
use crate::{
    CellError, CellFactory, Record, RecordTypeId, RenderSession, RenderTag, Services, Viewer,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;

pub const TYPE_ID: &str = "actions";

/// Value selecting every action of the record type.
pub const ALL_ACTIONS: &str = "all";

/// Credential an action needs on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRequirement {
    View,
    Change,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAction {
    pub id: String,
    pub label: String,
    pub requires: ActionRequirement,
}

impl RecordAction {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        requires: ActionRequirement,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            requires,
        }
    }
}

/// Actions per record type, in registration order.
#[derive(Debug, Default)]
pub struct ActionCatalog {
    actions: HashMap<RecordTypeId, Vec<RecordAction>>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, record_type: RecordTypeId, action: RecordAction) -> &mut Self {
        let actions = self.actions.entry(record_type).or_default();
        actions.retain(|a| a.id != action.id);
        actions.push(action);
        self
    }

    pub fn actions_for(&self, record_type: &RecordTypeId) -> &[RecordAction] {
        self.actions
            .get(record_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

pub struct ActionsCell {
    actions: Vec<RecordAction>,
}

impl ActionsCell {
    pub fn actions(&self) -> &[RecordAction] {
        &self.actions
    }
}

impl CellKind for ActionsCell {
    fn render(
        &self,
        _cell: &Cell,
        record: &Record,
        viewer: &Viewer,
        tag: RenderTag,
        session: &RenderSession<'_>,
    ) -> String {
        // Exports carry data only.
        if tag == RenderTag::PlainText {
            return String::new();
        }

        let access = &session.services().access;
        let links: String = self
            .actions
            .iter()
            .filter(|action| match action.requires {
                ActionRequirement::View => access.may_view(viewer, record),
                ActionRequirement::Change => access.may_change(viewer, record),
                ActionRequirement::Delete => access.may_delete(viewer, record),
            })
            .map(|action| {
                format!(
                    "<a class=\"action\" href=\"{}/{}\">{}</a>",
                    escape(&record_url(record)),
                    escape(&action.id),
                    escape(&action.label)
                )
            })
            .collect();

        if links.is_empty() {
            return links;
        }
        format!("<div class=\"actions\">{links}</div>")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct ActionsFactory;

impl CellFactory for ActionsFactory {
    fn type_id(&self) -> &'static str {
        TYPE_ID
    }

    fn build(
        &self,
        services: &Services,
        record_type: &RecordTypeId,
        value: &str,
    ) -> Result<Cell, CellError> {
        let available = services.actions.actions_for(record_type);

        let actions = if value == ALL_ACTIONS {
            available.to_vec()
        } else {
            let mut selected = Vec::new();
            for id in value.split(',').map(str::trim) {
                let action = available.iter().find(|a| a.id == id).ok_or_else(|| {
                    CellError::InvalidValue {
                        type_id: TYPE_ID.to_string(),
                        reason: format!("unknown action \"{id}\" for {record_type}"),
                    }
                })?;
                selected.push(action.clone());
            }
            selected
        };

        let parts = CellParts {
            type_id: TYPE_ID,
            record_type: record_type.clone(),
            value: value.to_string(),
            title: "Actions".to_string(),
            excluded: false,
            multiline: false,
        };
        Ok(Cell::from_parts(parts, ActionsCell { actions }))
    }
}
