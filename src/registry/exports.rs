// Tue Jan 13 2026 - Alex

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a module hands back after execution, reduced to what searches can
/// observe: function source text, component wrappers, named stores and
/// plain property bags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportValue {
    Function {
        source: String,
    },
    Component {
        source: String,
        #[serde(default)]
        inner: Option<Box<ExportValue>>,
    },
    Store {
        name: String,
        #[serde(default)]
        props: IndexMap<String, ExportValue>,
    },
    Object {
        #[serde(default)]
        props: IndexMap<String, ExportValue>,
    },
    Primitive {
        value: serde_json::Value,
    },
}

impl ExportValue {
    pub fn function(source: impl Into<String>) -> Self {
        ExportValue::Function { source: source.into() }
    }

    pub fn object<I, K>(props: I) -> Self
    where
        I: IntoIterator<Item = (K, ExportValue)>,
        K: Into<String>,
    {
        ExportValue::Object {
            props: props.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn null() -> Self {
        ExportValue::Primitive {
            value: serde_json::Value::Null,
        }
    }

    pub fn props(&self) -> Option<&IndexMap<String, ExportValue>> {
        match self {
            ExportValue::Object { props } | ExportValue::Store { props, .. } => Some(props),
            _ => None,
        }
    }

    pub fn prop(&self, key: &str) -> Option<&ExportValue> {
        self.props().and_then(|p| p.get(key))
    }

    pub fn has_props<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        match self.props() {
            Some(props) => keys.iter().all(|k| props.contains_key(k.as_ref())),
            None => false,
        }
    }

    /// Source text of anything callable. Components count: they are
    /// functions to the host.
    pub fn callable_source(&self) -> Option<&str> {
        match self {
            ExportValue::Function { source } | ExportValue::Component { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Source texts of a component and every component it wraps, outermost
    /// first.
    pub fn component_sources(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(value) = current {
            match value {
                ExportValue::Component { source, inner } => {
                    out.push(source.as_str());
                    current = inner.as_deref();
                }
                ExportValue::Function { source } => {
                    out.push(source.as_str());
                    current = None;
                }
                _ => current = None,
            }
        }
        out
    }

    pub fn store_name(&self) -> Option<&str> {
        match self {
            ExportValue::Store { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExportValue::Primitive { value } if value.is_null())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExportValue::Function { .. } => "function",
            ExportValue::Component { .. } => "component",
            ExportValue::Store { .. } => "store",
            ExportValue::Object { .. } => "object",
            ExportValue::Primitive { .. } => "primitive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportPath {
    Root,
    Default,
    Named(String),
}

impl fmt::Display for ExportPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportPath::Root => f.write_str("<root>"),
            ExportPath::Default => f.write_str("default"),
            ExportPath::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleExports {
    root: ExportValue,
}

impl ModuleExports {
    pub fn new(root: ExportValue) -> Self {
        Self { root }
    }

    pub fn empty() -> Self {
        Self::new(ExportValue::object(Vec::<(String, ExportValue)>::new()))
    }

    pub fn root(&self) -> &ExportValue {
        &self.root
    }

    pub fn get(&self, path: &ExportPath) -> Option<&ExportValue> {
        match path {
            ExportPath::Root => Some(&self.root),
            ExportPath::Default => self.root.prop("default"),
            ExportPath::Named(name) => self.root.prop(name),
        }
    }

    /// Values a search tests, in order: the root, `default`, then named
    /// exports whose key is at most `key_limit` long. Minified bundles give
    /// their real exports short keys, so the limit skips the rest.
    pub fn candidates(&self, key_limit: usize) -> Vec<(ExportPath, &ExportValue)> {
        let mut out = vec![(ExportPath::Root, &self.root)];
        if let Some(props) = self.root.props() {
            if let Some(default) = props.get("default") {
                if !default.is_null() {
                    out.push((ExportPath::Default, default));
                }
            }
            for (key, value) in props {
                if key != "default" && key.chars().count() <= key_limit && !value.is_null() {
                    out.push((ExportPath::Named(key.clone()), value));
                }
            }
        }
        out
    }

    /// Top-level named exports regardless of key length.
    pub fn named(&self) -> Vec<(&str, &ExportValue)> {
        self.root
            .props()
            .map(|p| p.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default()
    }
}

impl From<ExportValue> for ModuleExports {
    fn from(root: ExportValue) -> Self {
        Self::new(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModuleExports {
        ModuleExports::new(ExportValue::object(vec![
            ("default", ExportValue::object(vec![("fooExport", ExportValue::function("function(){}"))])),
            ("Z", ExportValue::function("function(e){return e.jsx}")),
            ("longName", ExportValue::function("function(){}")),
        ]))
    }

    #[test]
    fn test_candidate_order_and_key_limit() {
        let exports = sample();
        let paths: Vec<_> = exports.candidates(3).into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![ExportPath::Root, ExportPath::Default, ExportPath::Named("Z".to_string())]
        );
    }

    #[test]
    fn test_component_sources_descend() {
        let memo = ExportValue::Component {
            source: "memo".to_string(),
            inner: Some(Box::new(ExportValue::Component {
                source: "forwardRef".to_string(),
                inner: Some(Box::new(ExportValue::function("function Inner(){}"))),
            })),
        };
        assert_eq!(memo.component_sources(), vec!["memo", "forwardRef", "function Inner(){}"]);
    }

    #[test]
    fn test_deserialize_tagged() {
        let value: ExportValue = serde_json::from_str(
            r#"{"type":"store","name":"UserStore","props":{"getUser":{"type":"function","source":"function(e){}"}}}"#,
        )
        .unwrap();
        assert_eq!(value.store_name(), Some("UserStore"));
        assert!(value.has_props(&["getUser"]));
        assert!(!value.has_props(&["getUser", "missing"]));
    }
}
