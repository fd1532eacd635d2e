//! Template Variable Interpolation
//!
//! Replaces `$name`, `${name}`, `${name:format}`, `[[name]]` and
//! `[[name:format]]` occurrences with scoped variable values. Unknown
//! variables are left as written.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::hooks::QueryHooks;
use crate::query::{QueryTarget, ScopedVar, ScopedVars};

static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\w+)|\$\{(\w+)(?::(\w+))?\}|\[\[(\w+)(?::(\w+))?\]\]")
        .expect("variable pattern is valid")
});

/// Interpolate every variable reference in `text`
#[must_use]
pub fn interpolate(text: &str, vars: &ScopedVars) -> String {
    VARIABLE_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            let format = caps.get(3).or_else(|| caps.get(5)).map(|m| m.as_str());

            match vars.get(name) {
                Some(var) => format_value(var, format),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn format_value(var: &ScopedVar, format: Option<&str>) -> String {
    if format == Some("text") {
        return var.text.clone();
    }

    let values: Vec<String> = match &var.value {
        Value::Array(items) => items.iter().map(scalar_to_string).collect(),
        other => vec![scalar_to_string(other)],
    };

    match (format, values.as_slice()) {
        (_, [single]) => single.clone(),
        (Some("csv" | "raw"), many) => many.join(","),
        (Some("pipe"), many) => many.join("|"),
        (_, many) => format!("{{{}}}", many.join(",")),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn interpolate_value(value: &Value, vars: &ScopedVars) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| interpolate_value(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Hooks that interpolate every string inside a target's query fields
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateHooks;

impl QueryHooks for TemplateHooks {
    fn apply_template_variables(&self, target: &QueryTarget, scoped_vars: &ScopedVars) -> QueryTarget {
        if scoped_vars.is_empty() {
            return target.clone();
        }
        QueryTarget {
            fields: target
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, scoped_vars)))
                .collect(),
            ..target.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> ScopedVars {
        let mut vars = ScopedVars::new();
        vars.insert("job".to_string(), ScopedVar::text("api"));
        vars.insert(
            "pod".to_string(),
            ScopedVar {
                text: "web-1 + web-2".to_string(),
                value: json!(["web-1", "web-2"]),
            },
        );
        vars.insert(
            "__interval_ms".to_string(),
            ScopedVar {
                text: "60000".to_string(),
                value: json!(60000),
            },
        );
        vars
    }

    #[test]
    fn test_all_syntaxes() {
        let vars = vars();
        assert_eq!(interpolate("up{job=\"$job\"}", &vars), "up{job=\"api\"}");
        assert_eq!(interpolate("${job}_total", &vars), "api_total");
        assert_eq!(interpolate("[[job]]", &vars), "api");
        assert_eq!(interpolate("step=$__interval_ms", &vars), "step=60000");
    }

    #[test]
    fn test_multi_value_formats() {
        let vars = vars();
        assert_eq!(interpolate("$pod", &vars), "{web-1,web-2}");
        assert_eq!(interpolate("${pod:csv}", &vars), "web-1,web-2");
        assert_eq!(interpolate("[[pod:pipe]]", &vars), "web-1|web-2");
        assert_eq!(interpolate("${pod:text}", &vars), "web-1 + web-2");
    }

    #[test]
    fn test_unknown_variable_untouched() {
        assert_eq!(interpolate("rate($missing[5m])", &vars()), "rate($missing[5m])");
    }

    #[test]
    fn test_template_hooks_leave_input_alone() {
        let target = QueryTarget::new("A")
            .with_field("expr", "sum(rate(http_requests_total{job=\"$job\"}[5m]))")
            .with_field("nested", json!({"labels": ["$job", 3]}));

        let built = TemplateHooks.apply_template_variables(&target, &vars());

        assert_eq!(
            built.fields["expr"],
            json!("sum(rate(http_requests_total{job=\"api\"}[5m]))")
        );
        assert_eq!(built.fields["nested"], json!({"labels": ["api", 3]}));
        assert_eq!(built.ref_id, target.ref_id);
        assert_eq!(target.fields["expr"], json!("sum(rate(http_requests_total{job=\"$job\"}[5m]))"));
    }
}
