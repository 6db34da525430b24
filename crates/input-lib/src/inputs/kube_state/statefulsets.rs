use super::client::KubeClient;
use super::helpers::{add_label_tags, created_nanos};
use super::{GatherContext, ResourceKind};
use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::models::{Fields, Tags};
use k8s_openapi::api::apps::v1::StatefulSet;

const MEASUREMENT: &str = "kubernetes_statefulset";

pub(super) async fn collect(
    client: &KubeClient,
    acc: &dyn Accumulator,
    ctx: &GatherContext,
) -> Result<usize> {
    let items: Vec<StatefulSet> = client
        .get_list(&ResourceKind::StatefulSets.api_path(&ctx.namespace))
        .await?;

    for set in &items {
        let (fields, tags) = flatten(set);
        acc.add_fields(MEASUREMENT, fields, tags, Some(ctx.now));
    }
    Ok(items.len())
}

fn flatten(set: &StatefulSet) -> (Fields, Tags) {
    let meta = &set.metadata;
    let status = set.status.as_ref();

    let mut tags = Tags::new();
    tags.insert(
        "statefulset_name".to_string(),
        meta.name.clone().unwrap_or_default(),
    );
    tags.insert(
        "namespace".to_string(),
        meta.namespace.clone().unwrap_or_default(),
    );
    add_label_tags(&mut tags, "label_", meta.labels.as_ref());

    let count = |v: Option<i32>| i64::from(v.unwrap_or(0));

    let mut fields = Fields::new();
    if let Some(created) = created_nanos(meta) {
        fields.insert("created".into(), created.into());
    }
    fields.insert("generation".into(), meta.generation.unwrap_or(0).into());
    fields.insert(
        "observed_generation".into(),
        status
            .and_then(|s| s.observed_generation)
            .unwrap_or(0)
            .into(),
    );
    fields.insert(
        "replicas".into(),
        count(status.map(|s| s.replicas)).into(),
    );
    fields.insert(
        "replicas_current".into(),
        count(status.and_then(|s| s.current_replicas)).into(),
    );
    fields.insert(
        "replicas_ready".into(),
        count(status.and_then(|s| s.ready_replicas)).into(),
    );
    fields.insert(
        "replicas_updated".into(),
        count(status.and_then(|s| s.updated_replicas)).into(),
    );
    fields.insert(
        "spec_replicas".into(),
        count(set.spec.as_ref().and_then(|s| s.replicas)).into(),
    );

    (fields, tags)
}
