use super::client::KubeClient;
use super::helpers::{phase_code, quantity_to_i64};
use super::{GatherContext, ResourceKind};
use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::models::{Fields, Tags};
use k8s_openapi::api::core::v1::PersistentVolume;

const MEASUREMENT: &str = "kubernetes_persistentvolume";

pub(super) async fn collect(
    client: &KubeClient,
    acc: &dyn Accumulator,
    ctx: &GatherContext,
) -> Result<usize> {
    let items: Vec<PersistentVolume> = client
        .get_list(&ResourceKind::PersistentVolumes.api_path(&ctx.namespace))
        .await?;

    for pv in &items {
        let (fields, tags) = flatten(pv);
        acc.add_fields(MEASUREMENT, fields, tags, Some(ctx.now));
    }
    Ok(items.len())
}

fn flatten(pv: &PersistentVolume) -> (Fields, Tags) {
    let phase = pv
        .status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_default();
    let spec = pv.spec.as_ref();

    let mut tags = Tags::new();
    tags.insert(
        "pv_name".to_string(),
        pv.metadata.name.clone().unwrap_or_default(),
    );
    tags.insert("phase".to_string(), phase.clone());
    tags.insert(
        "storageclass".to_string(),
        spec.and_then(|s| s.storage_class_name.clone())
            .unwrap_or_default(),
    );

    let mut fields = Fields::new();
    fields.insert("phase_type".into(), phase_code(&phase).into());
    if let Some(bytes) = spec
        .and_then(|s| s.capacity.as_ref())
        .and_then(|c| c.get("storage"))
        .and_then(|q| quantity_to_i64(&q.0))
    {
        fields.insert("capacity_bytes".into(), bytes.into());
    }

    (fields, tags)
}
