// Tue Jan 13 2026 - Alex

use crate::lazy::filter::Filter;
use crate::registry::ExportValue;
use indexmap::IndexMap;

/// Gives readable names to a module's minified exports. Each mapper takes
/// the first export it accepts; mappers that accept nothing are absent from
/// the result.
pub fn map_exports(root: &ExportValue, mappers: &IndexMap<String, Filter>) -> IndexMap<String, ExportValue> {
    let mut mapped = IndexMap::new();
    let Some(props) = root.props() else {
        return mapped;
    };

    for (name, filter) in mappers {
        if let Some(value) = props.values().find(|v| filter.test(v)) {
            mapped.insert(name.clone(), value.clone());
        }
    }
    mapped
}

pub fn unmapped<'a>(mapped: &IndexMap<String, ExportValue>, mappers: &'a IndexMap<String, Filter>) -> Vec<&'a str> {
    mappers
        .keys()
        .filter(|name| !mapped.contains_key(*name))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_by_filter() {
        let root = ExportValue::object(vec![
            ("Ay", ExportValue::function("function(e){openModal(e)}")),
            ("Bz", ExportValue::function("function(){closeAll()}")),
        ]);
        let mut mappers = IndexMap::new();
        mappers.insert("openModal".to_string(), Filter::by_code(["openModal"]).unwrap());
        mappers.insert("closeAll".to_string(), Filter::by_code(["closeAll"]).unwrap());
        mappers.insert("missing".to_string(), Filter::by_code(["nothing"]).unwrap());

        let mapped = map_exports(&root, &mappers);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped["openModal"].callable_source(), Some("function(e){openModal(e)}"));
        assert_eq!(unmapped(&mapped, &mappers), vec!["missing"]);
    }
}
