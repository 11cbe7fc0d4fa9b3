//! Minimal HTML helpers for the interactive render contexts.

use crate::Record;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape and turn line breaks into `<br>`.
pub fn linebreaks(text: &str) -> String {
    escape(text).replace("\r\n", "\n").replace('\n', "<br>")
}

/// Canonical detail URL of a record.
pub fn record_url(record: &Record) -> String {
    format!("/{}/{}", record.record_type, record.id)
}

/// Anchor to a record's detail page, labelled with the record's label.
pub fn record_link(record: &Record) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        escape(&record_url(record)),
        escape(&record.label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(
            escape("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_linebreaks() {
        assert_eq!(linebreaks("a\r\nb\n<c>"), "a<br>b<br>&lt;c&gt;");
    }

    #[test]
    fn test_record_link() {
        let record = Record::new(12, "persons.contact", "Jet <Black>");
        assert_eq!(
            record_link(&record),
            "<a href=\"/persons.contact/12\">Jet &lt;Black&gt;</a>"
        );
    }
}
