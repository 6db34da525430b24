use super::client::KubeClient;
use super::helpers::{add_label_tags, created_nanos};
use super::{GatherContext, ResourceKind};
use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::models::{Fields, Tags};
use k8s_openapi::api::core::v1::ConfigMap;

const MEASUREMENT: &str = "kubernetes_configmap";

pub(super) async fn collect(
    client: &KubeClient,
    acc: &dyn Accumulator,
    ctx: &GatherContext,
) -> Result<usize> {
    let items: Vec<ConfigMap> = client
        .get_list(&ResourceKind::ConfigMaps.api_path(&ctx.namespace))
        .await?;

    let mut count = 0;
    for cm in items.iter().filter(|cm| wanted(cm, ctx)) {
        let (fields, tags) = flatten(cm);
        acc.add_fields(MEASUREMENT, fields, tags, Some(ctx.now));
        count += 1;
    }
    Ok(count)
}

/// Everything on the first gather; afterwards only configmaps younger than
/// `max_config_map_age` when it is set
fn wanted(cm: &ConfigMap, ctx: &GatherContext) -> bool {
    if ctx.first_gather {
        return true;
    }
    let Some(max_age) = ctx.max_config_map_age else {
        return true;
    };
    let Some(created) = cm.metadata.creation_timestamp.as_ref() else {
        return true;
    };

    match (ctx.now - created.0).to_std() {
        Ok(age) => age <= max_age,
        // Created in the future relative to our clock
        Err(_) => true,
    }
}

fn flatten(cm: &ConfigMap) -> (Fields, Tags) {
    let meta = &cm.metadata;

    let mut tags = Tags::new();
    tags.insert(
        "configmap_name".to_string(),
        meta.name.clone().unwrap_or_default(),
    );
    tags.insert(
        "namespace".to_string(),
        meta.namespace.clone().unwrap_or_default(),
    );
    tags.insert(
        "resource_version".to_string(),
        meta.resource_version.clone().unwrap_or_default(),
    );
    add_label_tags(&mut tags, "label_", meta.labels.as_ref());

    let data_keys = cm.data.as_ref().map_or(0, |d| d.len())
        + cm.binary_data.as_ref().map_or(0, |d| d.len());

    let mut fields = Fields::new();
    if let Some(created) = created_nanos(meta) {
        fields.insert("created".into(), created.into());
    }
    fields.insert("data_keys".into(), (data_keys as i64).into());

    (fields, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn configmap(created: &str) -> ConfigMap {
        serde_json::from_value(serde_json::json!({
            "metadata": {
                "name": "app-settings",
                "namespace": "default",
                "resourceVersion": "4711",
                "creationTimestamp": created,
                "labels": {"app.kubernetes.io/part-of": "shop"}
            },
            "data": {"a": "1", "b": "2"}
        }))
        .unwrap()
    }

    fn ctx(first_gather: bool, max_age: Option<Duration>) -> GatherContext {
        GatherContext {
            namespace: "default".to_string(),
            first_gather,
            max_config_map_age: max_age,
            now: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_flatten_configmap() {
        let (fields, tags) = flatten(&configmap("2024-05-01T10:00:00Z"));

        assert_eq!(tags["configmap_name"], "app-settings");
        assert_eq!(tags["namespace"], "default");
        assert_eq!(tags["resource_version"], "4711");
        assert_eq!(tags["label_app_kubernetes_io_part_of"], "shop");
        assert_eq!(fields["data_keys"].as_i64(), Some(2));
        assert_eq!(
            fields["created"].as_i64(),
            Some(1_714_557_600_000_000_000)
        );
    }

    #[test]
    fn test_age_filter() {
        let old = configmap("2024-05-01T10:00:00Z");
        let young = configmap("2024-05-01T11:30:00Z");
        let hour = Some(Duration::from_secs(3600));

        // First gather reports everything
        assert!(wanted(&old, &ctx(true, hour)));
        // No limit configured
        assert!(wanted(&old, &ctx(false, None)));

        assert!(!wanted(&old, &ctx(false, hour)));
        assert!(wanted(&young, &ctx(false, hour)));
    }
}
