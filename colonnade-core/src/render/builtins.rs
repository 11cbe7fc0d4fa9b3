//! Default formatters installed in every standard printer table.

use super::html::{escape, linebreaks};
use super::table::{ChoiceFormatterBuilder, FormatInput, Formatter, PrinterTable};
use super::RenderTag;
use crate::{FieldDescriptor, KindTag, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Context-free textual form of a value.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Text(s) => s.clone(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Value::Ref(id) => format!("#{id}"),
        Value::Refs(ids) => ids
            .iter()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(", "),
        Value::IntList(ids) => ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Fallback used when no kind-specific formatter applies.
pub fn fallback() -> Formatter {
    Arc::new(|input: &FormatInput<'_>| input.table.text(&display_value(input.value)))
}

pub(super) fn install(table: &mut PrinterTable) {
    let tag = table.tag();

    table
        .set_default(KindTag::Text, fallback())
        .set_default(KindTag::Integer, fallback())
        .set_default(KindTag::Decimal, decimal())
        .set_default(KindTag::Date, fallback())
        .set_default(KindTag::DateTime, fallback())
        .set_default(KindTag::LargeText, large_text(tag))
        .set_default(KindTag::Boolean, boolean(tag))
        .set_default(KindTag::Email, email(tag))
        .set_default(KindTag::Url, url(tag))
        .set_default(KindTag::ToOne, to_one())
        .set_default(KindTag::ToMany, to_many());

    for kind in [
        KindTag::Text,
        KindTag::Integer,
        KindTag::Decimal,
        KindTag::Boolean,
        KindTag::Date,
        KindTag::Email,
        KindTag::Url,
    ] {
        table.set_choice(kind, choice());
    }
}

fn decimal() -> Formatter {
    Arc::new(|input: &FormatInput<'_>| match input.value {
        Value::Decimal(d) => format!("{d:.2}"),
        other => input.table.text(&display_value(other)),
    })
}

fn large_text(tag: RenderTag) -> Formatter {
    Arc::new(move |input: &FormatInput<'_>| {
        let text = display_value(input.value);
        match tag {
            RenderTag::Detail | RenderTag::ListRow if !text.is_empty() => {
                format!("<p>{}</p>", linebreaks(&text))
            }
            RenderTag::Detail | RenderTag::ListRow | RenderTag::EditForm => escape(&text),
            RenderTag::PlainText => text,
        }
    })
}

fn boolean(tag: RenderTag) -> Formatter {
    Arc::new(move |input: &FormatInput<'_>| match (input.value, tag) {
        (Value::Bool(b), RenderTag::Detail | RenderTag::ListRow) => format!(
            "<input type=\"checkbox\" disabled{}/>{}",
            if *b { " checked" } else { "" },
            if *b { "Yes" } else { "No" }
        ),
        (Value::Bool(_), _) => display_value(input.value),
        // Unset nullable boolean
        _ => String::new(),
    })
}

fn email(tag: RenderTag) -> Formatter {
    Arc::new(move |input: &FormatInput<'_>| {
        let address = display_value(input.value);
        if address.is_empty() {
            return address;
        }
        match tag {
            RenderTag::Detail | RenderTag::ListRow => {
                let address = escape(&address);
                format!("<a href=\"mailto:{address}\">{address}</a>")
            }
            RenderTag::EditForm => escape(&address),
            RenderTag::PlainText => address,
        }
    })
}

fn url(tag: RenderTag) -> Formatter {
    Arc::new(move |input: &FormatInput<'_>| {
        let link = display_value(input.value);
        if link.is_empty() {
            return link;
        }
        match tag {
            RenderTag::Detail | RenderTag::ListRow => {
                let link = escape(&link);
                format!("<a href=\"{link}\" target=\"_blank\">{link}</a>")
            }
            RenderTag::EditForm => escape(&link),
            RenderTag::PlainText => link,
        }
    })
}

fn to_one() -> Formatter {
    Arc::new(|input: &FormatInput<'_>| {
        let Value::Ref(id) = input.value else {
            return String::new();
        };
        match input.lookup.record(*id) {
            Some(related) => {
                let viewable = input.lookup.may_view(input.viewer, &related);
                input.table.related_label(&related, viewable)
            }
            None => String::new(),
        }
    })
}

fn to_many() -> Formatter {
    Arc::new(|input: &FormatInput<'_>| {
        let Value::Refs(ids) = input.value else {
            return String::new();
        };
        let items = input
            .lookup
            .records(ids)
            .iter()
            .map(|related| {
                let viewable = input.lookup.may_view(input.viewer, related);
                input.table.related_label(related, viewable)
            })
            .collect();
        input.table.join(items)
    })
}

fn choice() -> ChoiceFormatterBuilder {
    Arc::new(|field: &FieldDescriptor| {
        let labels: HashMap<String, String> = field
            .choices
            .iter()
            .flatten()
            .cloned()
            .collect();

        Arc::new(move |input: &FormatInput<'_>| {
            let stored = display_value(input.value);
            if stored.is_empty() {
                return stored;
            }
            let label = labels.get(&stored).cloned().unwrap_or(stored);
            input.table.text(&label)
        })
    })
}
