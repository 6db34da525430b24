use super::client::KubeClient;
use super::helpers::{bool_int, parse_quantity, quantity_to_i64, quantity_to_millis};
use super::{GatherContext, ResourceKind};
use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::models::{Fields, Tags};
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

const MEASUREMENT: &str = "kubernetes_node";

pub(super) async fn collect(
    client: &KubeClient,
    acc: &dyn Accumulator,
    ctx: &GatherContext,
) -> Result<usize> {
    let items: Vec<Node> = client
        .get_list(&ResourceKind::Nodes.api_path(&ctx.namespace))
        .await?;

    for node in &items {
        let (fields, tags) = flatten(node);
        acc.add_fields(MEASUREMENT, fields, tags, Some(ctx.now));
    }
    Ok(items.len())
}

fn flatten(node: &Node) -> (Fields, Tags) {
    let mut tags = Tags::new();
    tags.insert(
        "node_name".to_string(),
        node.metadata.name.clone().unwrap_or_default(),
    );

    let mut fields = Fields::new();
    let status = node.status.as_ref();
    add_resources(&mut fields, "capacity", status.and_then(|s| s.capacity.as_ref()));
    add_resources(
        &mut fields,
        "allocatable",
        status.and_then(|s| s.allocatable.as_ref()),
    );

    let unschedulable = node
        .spec
        .as_ref()
        .and_then(|s| s.unschedulable)
        .unwrap_or(false);
    fields.insert("spec_unschedulable".into(), bool_int(unschedulable).into());

    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .into_iter()
        .flatten()
        .any(|c| c.type_ == "Ready" && c.status == "True");
    fields.insert("ready".into(), bool_int(ready).into());

    (fields, tags)
}

fn add_resources(fields: &mut Fields, prefix: &str, resources: Option<&BTreeMap<String, Quantity>>) {
    let Some(resources) = resources else {
        return;
    };

    if let Some(cpu) = resources.get("cpu") {
        if let Some(cores) = parse_quantity(&cpu.0) {
            fields.insert(format!("{}_cpu_cores", prefix), cores.into());
        }
        if let Some(millis) = quantity_to_millis(&cpu.0) {
            fields.insert(format!("{}_millicpu_cores", prefix), millis.into());
        }
    }
    if let Some(bytes) = resources.get("memory").and_then(|q| quantity_to_i64(&q.0)) {
        fields.insert(format!("{}_memory_bytes", prefix), bytes.into());
    }
    if let Some(pods) = resources.get("pods").and_then(|q| quantity_to_i64(&q.0)) {
        fields.insert(format!("{}_pods", prefix), pods.into());
    }
}
