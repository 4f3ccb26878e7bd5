//! Read-only tree view over a JSON value.
//!
//! Every array and object has its own expand flag keyed by its path from the
//! root (`root.items.2.name`). Only the root's starting state is
//! configurable; everything below starts collapsed.

use std::collections::HashMap;
use std::fmt::Write;

use serde_json::Value;

pub const ROOT_PATH: &str = "root";

const INDENT: &str = "  ";

#[derive(Debug, Clone)]
pub struct JsonViewer {
    root: Value,
    initial_expanded: bool,
    expanded: HashMap<String, bool>,
}

pub fn child_path(parent: &str, segment: &str) -> String {
    format!("{}.{}", parent, segment)
}

impl JsonViewer {
    pub fn new(root: Value, initial_expanded: bool) -> Self {
        let mut viewer = Self {
            root,
            initial_expanded,
            expanded: HashMap::new(),
        };
        viewer.reset();
        viewer
    }

    fn reset(&mut self) {
        self.expanded.clear();
        self.expanded
            .insert(ROOT_PATH.to_string(), self.initial_expanded);
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Replaces the displayed value. Expansion state is kept when the value
    /// is unchanged and reset otherwise.
    pub fn set_root(&mut self, root: Value) {
        if root != self.root {
            self.root = root;
            self.reset();
        }
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.get(path).copied().unwrap_or(false)
    }

    pub fn toggle(&mut self, path: &str) {
        let flag = self.expanded.entry(path.to_string()).or_insert(false);
        *flag = !*flag;
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(&self.root, ROOT_PATH, 0, None, &mut out);
        out
    }

    fn render_node(
        &self,
        value: &Value,
        path: &str,
        depth: usize,
        label: Option<&str>,
        out: &mut String,
    ) {
        let indent = INDENT.repeat(depth);
        let prefix = match label {
            Some(label) => format!("{}{}: ", indent, label),
            None => indent,
        };

        match value {
            Value::Array(items) if !items.is_empty() => {
                let open = self.is_expanded(path);
                let _ = writeln!(out, "{}[ {} ] {} items", prefix, marker(open), items.len());
                if open {
                    for (i, item) in items.iter().enumerate() {
                        let segment = i.to_string();
                        self.render_node(item, &child_path(path, &segment), depth + 1, Some(&segment), out);
                    }
                }
            }
            Value::Object(map) if !map.is_empty() => {
                let open = self.is_expanded(path);
                let _ = writeln!(out, "{}{{ {} }} {} properties", prefix, marker(open), map.len());
                if open {
                    for (key, item) in map {
                        self.render_node(item, &child_path(path, key), depth + 1, Some(key), out);
                    }
                }
            }
            scalar => {
                let _ = writeln!(out, "{}{}", prefix, scalar_text(scalar));
            }
        }
    }
}

fn marker(open: bool) -> &'static str {
    if open {
        "−"
    } else {
        "+"
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(_) => "[]".to_string(),
        Value::Object(_) => "{}".to_string(),
    }
}
