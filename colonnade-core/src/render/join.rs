//! How multi-valued output is joined in a render context.

use serde::{Deserialize, Serialize};

/// Join policy for multi-valued output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Plain separator between items.
    Separator { separator: String },
    /// HTML bulleted list. When `limit` is set, items beyond it are replaced
    /// by a single "N more" entry.
    Bullets { limit: Option<usize> },
}

impl JoinPolicy {
    pub fn separator(separator: impl Into<String>) -> Self {
        Self::Separator {
            separator: separator.into(),
        }
    }

    pub fn bullets(limit: Option<usize>) -> Self {
        Self::Bullets { limit }
    }

    /// Join already-formatted items. Empty items are skipped; an empty
    /// result joins to the empty string.
    pub fn join(&self, items: Vec<String>) -> String {
        let items: Vec<String> = items.into_iter().filter(|i| !i.is_empty()).collect();
        if items.is_empty() {
            return String::new();
        }

        match self {
            Self::Separator { separator } => items.join(separator),
            Self::Bullets { limit } => {
                let total = items.len();
                let shown = limit.map_or(total, |l| l.min(total));

                let mut out = String::from("<ul>");
                for item in &items[..shown] {
                    out.push_str("<li>");
                    out.push_str(item);
                    out.push_str("</li>");
                }
                if shown < total {
                    out.push_str(&format!("<li class=\"more\">{} more</li>", total - shown));
                }
                out.push_str("</ul>");
                out
            }
        }
    }
}
