use super::client::KubeClient;
use super::helpers::{add_label_tags, bool_int, quantity_to_i64, quantity_to_millis};
use super::{GatherContext, ResourceKind};
use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::models::{Fields, Tags};
use k8s_openapi::api::core::v1::{Container, ContainerStatus, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

const MEASUREMENT: &str = "kubernetes_pod_container";

pub(super) async fn collect(
    client: &KubeClient,
    acc: &dyn Accumulator,
    ctx: &GatherContext,
) -> Result<usize> {
    let items: Vec<Pod> = client
        .get_list(&ResourceKind::Pods.api_path(&ctx.namespace))
        .await?;

    let mut count = 0;
    for pod in &items {
        for (fields, tags) in flatten(pod) {
            acc.add_fields(MEASUREMENT, fields, tags, Some(ctx.now));
            count += 1;
        }
    }
    Ok(count)
}

/// One record per container in the pod spec
fn flatten(pod: &Pod) -> Vec<(Fields, Tags)> {
    let Some(spec) = pod.spec.as_ref() else {
        return Vec::new();
    };
    let status = pod.status.as_ref();
    let statuses = status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default();

    let mut pod_tags = Tags::new();
    pod_tags.insert(
        "namespace".to_string(),
        pod.metadata.namespace.clone().unwrap_or_default(),
    );
    pod_tags.insert(
        "node_name".to_string(),
        spec.node_name.clone().unwrap_or_default(),
    );
    pod_tags.insert(
        "pod_name".to_string(),
        pod.metadata.name.clone().unwrap_or_default(),
    );
    pod_tags.insert(
        "phase".to_string(),
        status.and_then(|s| s.phase.clone()).unwrap_or_default(),
    );
    add_label_tags(&mut pod_tags, "label_", pod.metadata.labels.as_ref());

    spec.containers
        .iter()
        .map(|container| {
            let status = statuses.iter().find(|s| s.name == container.name);
            container_record(container, status, &pod_tags)
        })
        .collect()
}

fn container_record(
    container: &Container,
    status: Option<&ContainerStatus>,
    pod_tags: &Tags,
) -> (Fields, Tags) {
    let (state, state_code) = container_state(status);
    let ready = status.map_or(false, |s| s.ready);

    let mut tags = pod_tags.clone();
    tags.insert("container_name".to_string(), container.name.clone());
    tags.insert("state".to_string(), state.to_string());
    tags.insert(
        "readiness".to_string(),
        if ready { "ready" } else { "unready" }.to_string(),
    );

    let mut fields = Fields::new();
    fields.insert(
        "restarts_total".into(),
        i64::from(status.map_or(0, |s| s.restart_count)).into(),
    );
    fields.insert("state_code".into(), state_code.into());
    fields.insert("ready".into(), bool_int(ready).into());

    let resources = container.resources.as_ref();
    add_resources(
        &mut fields,
        "resource_requests",
        resources.and_then(|r| r.requests.as_ref()),
    );
    add_resources(
        &mut fields,
        "resource_limits",
        resources.and_then(|r| r.limits.as_ref()),
    );

    (fields, tags)
}

fn container_state(status: Option<&ContainerStatus>) -> (&'static str, i64) {
    match status.and_then(|s| s.state.as_ref()) {
        Some(state) if state.running.is_some() => ("running", 0),
        Some(state) if state.terminated.is_some() => ("terminated", 1),
        Some(state) if state.waiting.is_some() => ("waiting", 2),
        _ => ("unknown", 3),
    }
}

fn add_resources(fields: &mut Fields, prefix: &str, resources: Option<&BTreeMap<String, Quantity>>) {
    let Some(resources) = resources else {
        return;
    };

    if let Some(millis) = resources.get("cpu").and_then(|q| quantity_to_millis(&q.0)) {
        fields.insert(format!("{}_millicpu_units", prefix), millis.into());
    }
    if let Some(bytes) = resources.get("memory").and_then(|q| quantity_to_i64(&q.0)) {
        fields.insert(format!("{}_memory_bytes", prefix), bytes.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod() -> Pod {
        serde_json::from_value(serde_json::json!({
            "metadata": {
                "name": "web-7d9f",
                "namespace": "shop",
                "labels": {"app": "web", "pod-template-hash": "7d9f"}
            },
            "spec": {
                "nodeName": "worker-1",
                "containers": [
                    {
                        "name": "app",
                        "resources": {
                            "requests": {"cpu": "250m", "memory": "128Mi"},
                            "limits": {"cpu": "1", "memory": "256Mi"}
                        }
                    },
                    {"name": "sidecar"},
                    {"name": "init-not-started"}
                ]
            },
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    {
                        "name": "app", "ready": true, "restartCount": 3, "image": "web:1",
                        "imageID": "", "state": {"running": {"startedAt": "2024-05-01T00:00:00Z"}}
                    },
                    {
                        "name": "sidecar", "ready": false, "restartCount": 0, "image": "proxy:1",
                        "imageID": "", "state": {"waiting": {"reason": "CrashLoopBackOff"}}
                    }
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_one_record_per_container() {
        let records = flatten(&pod());
        assert_eq!(records.len(), 3);

        for (_, tags) in &records {
            assert_eq!(tags["pod_name"], "web-7d9f");
            assert_eq!(tags["namespace"], "shop");
            assert_eq!(tags["node_name"], "worker-1");
            assert_eq!(tags["phase"], "Running");
            assert_eq!(tags["label_pod_template_hash"], "7d9f");
        }
    }

    #[test]
    fn test_running_container_fields() {
        let records = flatten(&pod());
        let (fields, tags) = &records[0];

        assert_eq!(tags["container_name"], "app");
        assert_eq!(tags["state"], "running");
        assert_eq!(tags["readiness"], "ready");
        assert_eq!(fields["restarts_total"].as_i64(), Some(3));
        assert_eq!(fields["state_code"].as_i64(), Some(0));
        assert_eq!(fields["ready"].as_i64(), Some(1));
        assert_eq!(
            fields["resource_requests_millicpu_units"].as_i64(),
            Some(250)
        );
        assert_eq!(
            fields["resource_requests_memory_bytes"].as_i64(),
            Some(134_217_728)
        );
        assert_eq!(fields["resource_limits_millicpu_units"].as_i64(), Some(1000));
        assert_eq!(
            fields["resource_limits_memory_bytes"].as_i64(),
            Some(268_435_456)
        );
    }

    #[test]
    fn test_waiting_and_unknown_containers() {
        let records = flatten(&pod());

        let (fields, tags) = &records[1];
        assert_eq!(tags["state"], "waiting");
        assert_eq!(tags["readiness"], "unready");
        assert_eq!(fields["state_code"].as_i64(), Some(2));
        assert!(!fields.contains_key("resource_requests_millicpu_units"));

        let (fields, tags) = &records[2];
        assert_eq!(tags["state"], "unknown");
        assert_eq!(fields["state_code"].as_i64(), Some(3));
        assert_eq!(fields["restarts_total"].as_i64(), Some(0));
    }
}
