use k8s_openapi::{
    api::core::v1::{Affinity, PodAffinityTerm, PodAntiAffinity, WeightedPodAffinityTerm},
    apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement},
};

/// Build a soft anti-affinity rule that prefers spreading pods of the given
/// apps across distinct nodes of the topology.
///
/// This is a preference, not a constraint. If no other node is available the
/// scheduler still co-locates pods on the same node.
pub fn distribute_pods(selector_key: &str, selector_values: &[&str], topology_key: &str) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    pod_affinity_term: PodAffinityTerm {
                        label_selector: Some(LabelSelector {
                            match_expressions: Some(vec![LabelSelectorRequirement {
                                key: selector_key.to_owned(),
                                operator: "In".to_owned(),
                                values: Some(
                                    selector_values
                                        .iter()
                                        .map(|value| (*value).to_owned())
                                        .collect(),
                                ),
                            }]),
                            ..Default::default()
                        }),
                        topology_key: topology_key.to_owned(),
                        ..Default::default()
                    },
                    weight: 100,
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
