/*!
 * Template Expansion
 * `{{ dotted.path }}` placeholders resolved against a JSON data object
 *
 * Deliberately minimal: no conditionals, no loops. Values are HTML-escaped
 * on substitution; a placeholder naming a missing field is an error rather
 * than silently expanding to nothing.
 */

use super::{escape_html, ConvertError, ConvertResult};
use serde_json::Value;

pub(super) fn expand(template: &str, data: Option<&Value>) -> ConvertResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(ConvertError::UnterminatedPlaceholder(offset + start))?;
        let path = after_open[..end].trim();
        out.push_str(&render_field(path, data)?);
        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

fn render_field(path: &str, data: Option<&Value>) -> ConvertResult<String> {
    let root = data.ok_or_else(|| ConvertError::UnknownField(path.to_string()))?;
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| ConvertError::UnknownField(path.to_string()))?,
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .ok_or_else(|| ConvertError::UnknownField(path.to_string()))?,
            _ => return Err(ConvertError::UnknownField(path.to_string())),
        };
    }
    Ok(match current {
        Value::String(s) => escape_html(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => escape_html(&other.to_string()),
    })
}
