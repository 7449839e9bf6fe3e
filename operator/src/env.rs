use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector};

/// Source of an environment variable value to merge into a container.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    /// A literal value.
    Value(String),
    /// A value injected from the pod's own metadata via the downward API,
    /// e.g. `spec.nodeName`.
    FieldRef(String),
}

impl EnvValue {
    fn into_env_var(self, name: &str) -> EnvVar {
        match self {
            EnvValue::Value(value) => EnvVar {
                name: name.to_owned(),
                value: Some(value),
                ..Default::default()
            },
            EnvValue::FieldRef(field_path) => EnvVar {
                name: name.to_owned(),
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }
}

/// Merge a set of named values into a base env var list.
///
/// A merged value replaces any base entry of the same name. The result is
/// sorted by name so repeated builds produce identical manifests.
pub fn merge_envs(base: Vec<EnvVar>, overrides: BTreeMap<String, EnvValue>) -> Vec<EnvVar> {
    let mut envs = base;
    for (name, value) in overrides {
        if let Some((pos, _)) = envs.iter().enumerate().find(|(_, var)| var.name == name) {
            envs.swap_remove(pos);
        }
        envs.push(value.into_env_var(&name));
    }
    envs.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    envs
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    #[test]
    fn merge_replaces_and_sorts() {
        let base = vec![EnvVar {
            name: "CONFIG_HASH".to_owned(),
            value: Some("stale".to_owned()),
            ..Default::default()
        }];
        let overrides = BTreeMap::from_iter(vec![
            (
                "NODE_NAME".to_owned(),
                EnvValue::FieldRef("spec.nodeName".to_owned()),
            ),
            (
                "CONFIG_HASH".to_owned(),
                EnvValue::Value("abc123".to_owned()),
            ),
        ]);
        let merged = merge_envs(base, overrides);
        let names: Vec<&str> = merged.iter().map(|var| var.name.as_str()).collect();
        expect![[r#"
            [
                "CONFIG_HASH",
                "NODE_NAME",
            ]
        "#]]
        .assert_debug_eq(&names);
        assert_eq!(merged[0].value.as_deref(), Some("abc123"));
        assert_eq!(
            merged[1]
                .value_from
                .as_ref()
                .and_then(|source| source.field_ref.as_ref())
                .map(|field_ref| field_ref.field_path.as_str()),
            Some("spec.nodeName")
        );
    }

    #[test]
    fn merge_is_deterministic() {
        let overrides = BTreeMap::from_iter(vec![
            ("B".to_owned(), EnvValue::Value("2".to_owned())),
            ("A".to_owned(), EnvValue::Value("1".to_owned())),
        ]);
        assert_eq!(
            merge_envs(Vec::new(), overrides.clone()),
            merge_envs(Vec::new(), overrides)
        );
    }
}
