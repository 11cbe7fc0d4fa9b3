//! Configuration types

use crate::{ColonnadeError, ColonnadeResult, ConfigError};
use serde::{Deserialize, Serialize};

/// Rendering and policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonnadeConfig {
    /// Maximum items of a bulleted list in the list-row context before the
    /// remainder is collapsed into an "N more" item.
    pub list_row_limit: usize,
    /// Join separator for multi-valued output in plain-text exports.
    pub plain_text_separator: String,
    /// Join separator for multi-valued output in edit forms.
    pub form_separator: String,
    /// Fixed string shown instead of a record the viewer may not see.
    pub hidden_placeholder: String,
    /// Whether ownerless named views are editable by anyone (not only
    /// superusers).
    pub allow_shared_view_edition: bool,
}

impl Default for ColonnadeConfig {
    fn default() -> Self {
        Self {
            list_row_limit: 10,
            plain_text_separator: "/".to_string(),
            form_separator: ", ".to_string(),
            hidden_placeholder: "••••••".to_string(),
            allow_shared_view_edition: false,
        }
    }
}

impl ColonnadeConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `COLONNADE_LIST_ROW_LIMIT`: list-row bullet cap (default: 10)
    /// - `COLONNADE_PLAIN_TEXT_SEPARATOR`: plain-text join separator (default: "/")
    /// - `COLONNADE_FORM_SEPARATOR`: edit-form join separator (default: ", ")
    /// - `COLONNADE_HIDDEN_PLACEHOLDER`: viewer-forbidden placeholder
    /// - `COLONNADE_ALLOW_SHARED_VIEW_EDITION`: "true"/"false" (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            list_row_limit: std::env::var("COLONNADE_LIST_ROW_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.list_row_limit),
            plain_text_separator: std::env::var("COLONNADE_PLAIN_TEXT_SEPARATOR")
                .unwrap_or(defaults.plain_text_separator),
            form_separator: std::env::var("COLONNADE_FORM_SEPARATOR")
                .unwrap_or(defaults.form_separator),
            hidden_placeholder: std::env::var("COLONNADE_HIDDEN_PLACEHOLDER")
                .unwrap_or(defaults.hidden_placeholder),
            allow_shared_view_edition: std::env::var("COLONNADE_ALLOW_SHARED_VIEW_EDITION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.allow_shared_view_edition),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - list_row_limit >= 1
    /// - separators are non-empty
    /// - hidden_placeholder is non-empty
    pub fn validate(&self) -> ColonnadeResult<()> {
        if self.list_row_limit == 0 {
            return Err(invalid(
                "list_row_limit",
                self.list_row_limit.to_string(),
                "list_row_limit must be at least 1",
            ));
        }

        if self.plain_text_separator.is_empty() {
            return Err(invalid(
                "plain_text_separator",
                String::new(),
                "plain_text_separator must not be empty",
            ));
        }

        if self.form_separator.is_empty() {
            return Err(invalid(
                "form_separator",
                String::new(),
                "form_separator must not be empty",
            ));
        }

        if self.hidden_placeholder.trim().is_empty() {
            return Err(invalid(
                "hidden_placeholder",
                self.hidden_placeholder.clone(),
                "hidden_placeholder must not be blank",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> ColonnadeError {
    ColonnadeError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}
