use super::client::KubeClient;
use super::helpers::{add_label_tags, created_nanos};
use super::{GatherContext, ResourceKind};
use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::models::{Fields, Tags};
use k8s_openapi::api::apps::v1::Deployment;

const MEASUREMENT: &str = "kubernetes_deployment";

pub(super) async fn collect(
    client: &KubeClient,
    acc: &dyn Accumulator,
    ctx: &GatherContext,
) -> Result<usize> {
    let items: Vec<Deployment> = client
        .get_list(&ResourceKind::Deployments.api_path(&ctx.namespace))
        .await?;

    for deployment in &items {
        let (fields, tags) = flatten(deployment);
        acc.add_fields(MEASUREMENT, fields, tags, Some(ctx.now));
    }
    Ok(items.len())
}

fn flatten(deployment: &Deployment) -> (Fields, Tags) {
    let meta = &deployment.metadata;
    let status = deployment.status.as_ref();

    let mut tags = Tags::new();
    tags.insert(
        "deployment_name".to_string(),
        meta.name.clone().unwrap_or_default(),
    );
    tags.insert(
        "namespace".to_string(),
        meta.namespace.clone().unwrap_or_default(),
    );
    add_label_tags(&mut tags, "label_", meta.labels.as_ref());

    let count = |v: Option<i32>| i64::from(v.unwrap_or(0));

    let mut fields = Fields::new();
    fields.insert(
        "replicas_available".into(),
        count(status.and_then(|s| s.available_replicas)).into(),
    );
    fields.insert(
        "replicas_unavailable".into(),
        count(status.and_then(|s| s.unavailable_replicas)).into(),
    );
    fields.insert(
        "replicas_updated".into(),
        count(status.and_then(|s| s.updated_replicas)).into(),
    );
    fields.insert(
        "spec_replicas".into(),
        count(deployment.spec.as_ref().and_then(|s| s.replicas)).into(),
    );
    if let Some(created) = created_nanos(meta) {
        fields.insert("created".into(), created.into());
    }

    (fields, tags)
}
