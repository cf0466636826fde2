// Tue Jan 13 2026 - Alex

use crate::lazy::history::SearchKind;
use crate::lazy::LazyError;
use crate::pattern::fragment::{all_match, CodeFragment};
use crate::registry::ExportValue;
use itertools::Itertools;

/// What a search looks for in a module's exports or factory source.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    ByProps(Vec<String>),
    ByCode(Vec<CodeFragment>),
    ByStoreName(String),
    ByFactoryCode(Vec<CodeFragment>),
    ComponentByCode(Vec<CodeFragment>),
}

fn fragments<I, F>(code: I, what: &str) -> Result<Vec<CodeFragment>, LazyError>
where
    I: IntoIterator<Item = F>,
    F: Into<CodeFragment>,
{
    let code: Vec<CodeFragment> = code.into_iter().map(Into::into).collect();
    if code.is_empty() {
        return Err(LazyError::MalformedCriteria(format!("{} needs at least one code fragment", what)));
    }
    if code.iter().any(CodeFragment::is_empty) {
        return Err(LazyError::MalformedCriteria(format!("{} got an empty code fragment", what)));
    }
    Ok(code)
}

impl Filter {
    pub fn by_props<I, S>(props: I) -> Result<Self, LazyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let props: Vec<String> = props.into_iter().map(Into::into).collect();
        if props.is_empty() {
            return Err(LazyError::MalformedCriteria("byProps needs at least one prop".to_string()));
        }
        if props.iter().any(String::is_empty) {
            return Err(LazyError::MalformedCriteria("byProps got an empty prop name".to_string()));
        }
        Ok(Filter::ByProps(props))
    }

    pub fn by_code<I, F>(code: I) -> Result<Self, LazyError>
    where
        I: IntoIterator<Item = F>,
        F: Into<CodeFragment>,
    {
        Ok(Filter::ByCode(fragments(code, "byCode")?))
    }

    pub fn by_store_name(name: impl Into<String>) -> Result<Self, LazyError> {
        let name = name.into();
        if name.is_empty() {
            return Err(LazyError::MalformedCriteria("byStoreName needs a name".to_string()));
        }
        Ok(Filter::ByStoreName(name))
    }

    pub fn by_factory_code<I, F>(code: I) -> Result<Self, LazyError>
    where
        I: IntoIterator<Item = F>,
        F: Into<CodeFragment>,
    {
        Ok(Filter::ByFactoryCode(fragments(code, "byFactoryCode")?))
    }

    pub fn component_by_code<I, F>(code: I) -> Result<Self, LazyError>
    where
        I: IntoIterator<Item = F>,
        F: Into<CodeFragment>,
    {
        Ok(Filter::ComponentByCode(fragments(code, "componentByCode")?))
    }

    /// Whether the filter looks at factory source instead of exports.
    pub fn targets_factory(&self) -> bool {
        matches!(self, Filter::ByFactoryCode(_))
    }

    pub fn test(&self, value: &ExportValue) -> bool {
        match self {
            Filter::ByProps(props) => value.has_props(props),
            Filter::ByCode(code) => value.callable_source().map_or(false, |s| all_match(s, code)),
            Filter::ByStoreName(name) => value.store_name() == Some(name.as_str()),
            Filter::ByFactoryCode(_) => false,
            Filter::ComponentByCode(code) => value
                .component_sources()
                .into_iter()
                .any(|s| all_match(s, code)),
        }
    }

    pub fn test_factory(&self, source: &str) -> bool {
        match self {
            Filter::ByFactoryCode(code) => all_match(source, code),
            _ => false,
        }
    }

    pub fn kind(&self) -> SearchKind {
        match self {
            Filter::ByProps(_) => SearchKind::FindByProps,
            Filter::ByCode(_) => SearchKind::FindByCode,
            Filter::ByStoreName(_) => SearchKind::FindStore,
            Filter::ByFactoryCode(_) => SearchKind::FindByFactoryCode,
            Filter::ComponentByCode(_) => SearchKind::FindComponentByCode,
        }
    }

    /// The arguments alone, as a search call would show them.
    pub fn args(&self) -> String {
        match self {
            Filter::ByProps(props) => props.iter().map(|p| format!("{:?}", p)).join(", "),
            Filter::ByStoreName(name) => format!("{:?}", name),
            Filter::ByCode(code) | Filter::ByFactoryCode(code) | Filter::ComponentByCode(code) => {
                code.iter().join(", ")
            }
        }
    }

    /// Stable text identifying the filter, e.g. `byProps("a", "b")`.
    pub fn signature(&self) -> String {
        let name = match self {
            Filter::ByProps(_) => "byProps",
            Filter::ByCode(_) => "byCode",
            Filter::ByStoreName(_) => "byStoreName",
            Filter::ByFactoryCode(_) => "byFactoryCode",
            Filter::ComponentByCode(_) => "componentByCode",
        };
        format!("{}({})", name, self.args())
    }
}
