use std::collections::BTreeMap;

/// Create labels that can be used as a unique selector for a given app name.
pub fn selector_labels(app: &str) -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from_iter(vec![(
        "app".to_owned(),
        app.to_owned(),
    )]))
}

/// Label key identifying the app a resource belongs to.
pub const APP_SELECTOR: &str = "app";

/// Manage by label
pub const MANAGED_BY_LABEL_SELECTOR: &str = "managed-by=octavia-operator";

/// Labels that indicate the resource is managed by the octavia operator.
pub fn managed_labels() -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from_iter(vec![(
        "managed-by".to_owned(),
        "octavia-operator".to_owned(),
    )]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_labels_match_the_selector() {
        let labels = managed_labels().unwrap();
        let selector: Vec<String> = labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        assert_eq!(selector.join(","), MANAGED_BY_LABEL_SELECTOR);
    }

    #[test]
    fn selector_labels_key_app() {
        let labels = selector_labels("octavia-rsyslog").unwrap();
        assert_eq!(
            labels.get(APP_SELECTOR).map(String::as_str),
            Some("octavia-rsyslog")
        );
    }
}
