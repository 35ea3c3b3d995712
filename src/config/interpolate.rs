//! Environment-variable interpolation over string values.
//!
//! Placeholders are `${VAR}` and `${VAR|default}`; `$$` produces a literal
//! `$`. Resolved values always stay strings. Paths whose whole value was one
//! placeholder are reported back so the validator can read counts and flags
//! from the environment without touching text fields.

use serde_yaml::Value;
use std::collections::{HashMap, HashSet};

use super::validator::ValidationIssue;

/// Source of environment values.
pub trait EnvLookup {
    /// Returns the value of `name`, if set.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Result of one interpolation pass.
#[derive(Debug, Default)]
pub struct Interpolation {
    /// One issue per unresolved or malformed placeholder.
    pub issues: Vec<ValidationIssue>,
    /// Dotted paths whose value was exactly one placeholder.
    pub whole_placeholders: HashSet<String>,
}

/// Resolves placeholders in every string value of `value`, in place.
///
/// Issues are keyed by the dotted path of the value that carried the
/// placeholder.
pub fn interpolate(value: &mut Value, env: &dyn EnvLookup) -> Interpolation {
    let mut result = Interpolation::default();
    walk(value, "", env, &mut result);
    result
}

/// Escapes every `$` in the string values of `value` so that interpolating
/// the result gives back the same text.
pub fn escape_placeholders(value: &mut Value) {
    match value {
        Value::String(text) if text.contains('$') => *text = text.replace('$', "$$"),
        Value::Mapping(map) => map.iter_mut().for_each(|(_, child)| escape_placeholders(child)),
        Value::Sequence(items) => items.iter_mut().for_each(escape_placeholders),
        Value::Tagged(tagged) => escape_placeholders(&mut tagged.value),
        _ => {}
    }
}

fn walk(value: &mut Value, path: &str, env: &dyn EnvLookup, result: &mut Interpolation) {
    match value {
        Value::String(text) => {
            if !text.contains('$') {
                return;
            }
            match expand(text, env) {
                Ok((expanded, whole)) => {
                    if whole {
                        result.whole_placeholders.insert(path.to_string());
                    }
                    *text = expanded;
                }
                Err(messages) => result
                    .issues
                    .extend(messages.into_iter().map(|message| ValidationIssue::new(path, message))),
            }
        }
        Value::Mapping(map) => {
            for (key, child) in map.iter_mut() {
                let key = key_name(key);
                let child_path = if path.is_empty() {
                    key
                } else {
                    format!("{path}.{key}")
                };
                walk(child, &child_path, env, result);
            }
        }
        Value::Sequence(items) => {
            for (index, child) in items.iter_mut().enumerate() {
                walk(child, &format!("{path}[{index}]"), env, result);
            }
        }
        Value::Tagged(tagged) => walk(&mut tagged.value, path, env, result),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::from("?"),
    }
}

/// Expands placeholders; the flag is true when `text` is exactly one placeholder.
///
/// Every unset variable in `text` is reported, not just the first.
fn expand(text: &str, env: &dyn EnvLookup) -> Result<(String, bool), Vec<String>> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut placeholders = 0usize;
    let mut literal_text = false;
    let mut missing = Vec::new();

    while let Some(pos) = rest.find('$') {
        if pos > 0 {
            literal_text = true;
        }
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            literal_text = true;
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let Some(end) = body.find('}') else {
                missing.push(format!("unterminated placeholder in '{text}'"));
                return Err(missing);
            };
            let inner = &body[..end];
            let (name, default) = match inner.split_once('|') {
                Some((name, default)) => (name, Some(default)),
                None => (inner, None),
            };
            if !is_var_name(name) {
                missing.push(format!("invalid environment variable name '{name}'"));
                return Err(missing);
            }
            match env.lookup(name).or_else(|| default.map(String::from)) {
                Some(resolved) => out.push_str(&resolved),
                None => missing.push(format!("environment variable '{name}' is not set")),
            }
            placeholders += 1;
            rest = &body[end + 1..];
        } else {
            out.push('$');
            literal_text = true;
            rest = after;
        }
    }
    if !missing.is_empty() {
        return Err(missing);
    }
    if !rest.is_empty() {
        literal_text = true;
    }
    out.push_str(rest);

    Ok((out, placeholders == 1 && !literal_text))
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
