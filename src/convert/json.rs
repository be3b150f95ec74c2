/*!
 * JSON Rendering
 * Turns arbitrary JSON trees into nested HTML tables
 */

use super::{escape_html, ConvertError, ConvertResult};
use serde_json::Value;

pub(super) fn to_html(content: &str) -> ConvertResult<String> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| ConvertError::InvalidJson(e.to_string()))?;
    let mut out = String::new();
    write_value(&mut out, &value);
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            out.push_str("<table>");
            for (key, child) in map {
                out.push_str("<tr><th>");
                out.push_str(&escape_html(key));
                out.push_str("</th><td>");
                write_value(out, child);
                out.push_str("</td></tr>");
            }
            out.push_str("</table>");
        }
        Value::Array(items) => {
            out.push_str("<table>");
            for item in items {
                out.push_str("<tr><td>");
                write_value(out, item);
                out.push_str("</td></tr>");
            }
            out.push_str("</table>");
        }
        Value::String(s) => out.push_str(&escape_html(s)),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => out.push_str("&mdash;"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_become_key_value_rows() {
        let html = to_html(r#"{"beds": 3, "baths": 2}"#).unwrap();
        assert!(html.contains("<th>beds</th><td>3</td>"));
        assert!(html.contains("<th>baths</th><td>2</td>"));
    }

    #[test]
    fn nested_structures_nest_tables() {
        let html = to_html(r#"{"listing": {"price": 100}}"#).unwrap();
        assert_eq!(html.matches("<table>").count(), 2);
    }

    #[test]
    fn string_values_are_escaped() {
        let html = to_html(r#"{"note": "<b>bold</b>"}"#).unwrap();
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(to_html("{nope"), Err(ConvertError::InvalidJson(_))));
    }
}
