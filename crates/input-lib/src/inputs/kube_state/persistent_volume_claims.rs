use super::client::KubeClient;
use super::helpers::{add_label_tags, phase_code, quantity_to_i64};
use super::{GatherContext, ResourceKind};
use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::models::{Fields, Tags};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;

const MEASUREMENT: &str = "kubernetes_persistentvolumeclaim";

pub(super) async fn collect(
    client: &KubeClient,
    acc: &dyn Accumulator,
    ctx: &GatherContext,
) -> Result<usize> {
    let items: Vec<PersistentVolumeClaim> = client
        .get_list(&ResourceKind::PersistentVolumeClaims.api_path(&ctx.namespace))
        .await?;

    for pvc in &items {
        let (fields, tags) = flatten(pvc);
        acc.add_fields(MEASUREMENT, fields, tags, Some(ctx.now));
    }
    Ok(items.len())
}

fn flatten(pvc: &PersistentVolumeClaim) -> (Fields, Tags) {
    let phase = pvc
        .status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_default();
    let spec = pvc.spec.as_ref();

    let mut tags = Tags::new();
    tags.insert(
        "pvc_name".to_string(),
        pvc.metadata.name.clone().unwrap_or_default(),
    );
    tags.insert(
        "namespace".to_string(),
        pvc.metadata.namespace.clone().unwrap_or_default(),
    );
    tags.insert("phase".to_string(), phase.clone());
    tags.insert(
        "storageclass".to_string(),
        spec.and_then(|s| s.storage_class_name.clone())
            .unwrap_or_default(),
    );
    add_label_tags(
        &mut tags,
        "selector_",
        spec.and_then(|s| s.selector.as_ref())
            .and_then(|s| s.match_labels.as_ref()),
    );

    let mut fields = Fields::new();
    fields.insert("phase_type".into(), phase_code(&phase).into());
    if let Some(bytes) = spec
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .and_then(|q| quantity_to_i64(&q.0))
    {
        fields.insert("requested_bytes".into(), bytes.into());
    }

    (fields, tags)
}
