//! Gather tests against a mock API server

use super::*;
use crate::accumulator::MemoryAccumulator;
use mockito::{Mock, Server};
use serde_json::json;
use std::io::Write;

fn config_for(server: &Server) -> KubeStateConfig {
    parse_table(json!({ "url": server.url() })).unwrap()
}

fn list_body(api_version: &str, kind: &str, items: serde_json::Value) -> String {
    json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": {"resourceVersion": "1"},
        "items": items
    })
    .to_string()
}

async fn mock_list(server: &mut Server, kind: ResourceKind, body: String) -> Mock {
    server
        .mock("GET", kind.api_path("default").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

async fn mock_empty(server: &mut Server, kind: ResourceKind) -> Mock {
    let (api_version, list_kind) = match kind {
        ResourceKind::ConfigMaps => ("v1", "ConfigMapList"),
        ResourceKind::Deployments => ("apps/v1", "DeploymentList"),
        ResourceKind::Nodes => ("v1", "NodeList"),
        ResourceKind::PersistentVolumes => ("v1", "PersistentVolumeList"),
        ResourceKind::PersistentVolumeClaims => ("v1", "PersistentVolumeClaimList"),
        ResourceKind::Pods => ("v1", "PodList"),
        ResourceKind::StatefulSets => ("apps/v1", "StatefulSetList"),
    };
    mock_list(server, kind, list_body(api_version, list_kind, json!([]))).await
}

fn nodes_body() -> String {
    list_body(
        "v1",
        "NodeList",
        json!([
            {"metadata": {"name": "worker-1"}, "status": {"capacity": {"cpu": "2"}}},
            {"metadata": {"name": "worker-2"}, "status": {"capacity": {"cpu": "2"}}}
        ]),
    )
}

fn old_configmap_body() -> String {
    list_body(
        "v1",
        "ConfigMapList",
        json!([{
            "metadata": {
                "name": "legacy",
                "namespace": "default",
                "creationTimestamp": "2020-01-01T00:00:00Z"
            },
            "data": {"k": "v"}
        }]),
    )
}

#[test]
fn test_api_paths() {
    assert_eq!(
        ResourceKind::ConfigMaps.api_path("default"),
        "/api/v1/namespaces/default/configmaps"
    );
    assert_eq!(
        ResourceKind::Deployments.api_path("shop"),
        "/apis/apps/v1/namespaces/shop/deployments"
    );
    assert_eq!(ResourceKind::Nodes.api_path("shop"), "/api/v1/nodes");
    assert_eq!(
        ResourceKind::PersistentVolumes.api_path("shop"),
        "/api/v1/persistentvolumes"
    );
    assert_eq!(
        ResourceKind::PersistentVolumeClaims.api_path("shop"),
        "/api/v1/namespaces/shop/persistentvolumeclaims"
    );
    assert_eq!(
        ResourceKind::Pods.api_path("default"),
        "/api/v1/namespaces/default/pods"
    );
    assert_eq!(
        ResourceKind::StatefulSets.api_path("default"),
        "/apis/apps/v1/namespaces/default/statefulsets"
    );
    // Empty namespace lists across the cluster
    assert_eq!(ResourceKind::Pods.api_path(""), "/api/v1/pods");
}

#[test]
fn test_resource_kind_round_trips_through_names() {
    for kind in ResourceKind::ALL {
        assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
    }
    assert!("services".parse::<ResourceKind>().is_err());
}

#[test]
fn test_config_defaults() {
    let config: KubeStateConfig = parse_table(json!({"url": "https://10.0.0.1:6443"})).unwrap();

    assert_eq!(config.namespace, "default");
    assert_eq!(config.response_timeout, Duration::from_secs(5));
    assert!(config.resource_exclude.is_empty());
    assert!(config.max_config_map_age.is_none());
    assert!(!config.insecure_skip_verify);

    let config: KubeStateConfig = parse_table(json!({
        "url": "https://10.0.0.1:6443",
        "response_timeout": "1s",
        "max_config_map_age": "1h"
    }))
    .unwrap();
    assert_eq!(config.response_timeout, Duration::from_secs(1));
    assert_eq!(config.max_config_map_age, Some(Duration::from_secs(3600)));

    assert!(parse_table::<KubeStateConfig>(json!({})).is_err());
}

#[test]
fn test_exclusions_compute_enabled_set() {
    let input = KubeState::new(
        parse_table(json!({
            "url": "https://10.0.0.1:6443",
            "resource_exclude": ["deployments", "nodes", "statefulsets", "services"]
        }))
        .unwrap(),
    );

    let enabled: Vec<_> = input.enabled_kinds().collect();
    assert_eq!(
        enabled,
        vec![
            ResourceKind::ConfigMaps,
            ResourceKind::PersistentVolumes,
            ResourceKind::PersistentVolumeClaims,
            ResourceKind::Pods,
        ]
    );
}

fn pods_body() -> String {
    list_body(
        "v1",
        "PodList",
        json!([{
            "metadata": {"name": "web-7d9f", "namespace": "default"},
            "spec": {"nodeName": "worker-1", "containers": [{"name": "app"}, {"name": "proxy"}]},
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    {"name": "app", "ready": true, "restartCount": 0, "image": "web:1",
                     "imageID": "", "state": {"running": {}}},
                    {"name": "proxy", "ready": true, "restartCount": 1, "image": "proxy:1",
                     "imageID": "", "state": {"running": {}}}
                ]
            }
        }]),
    )
}

#[tokio::test]
async fn test_gather_all_kinds() {
    let mut server = Server::new_async().await;
    let mut mocks = vec![
        mock_list(&mut server, ResourceKind::Nodes, nodes_body()).await,
        mock_list(&mut server, ResourceKind::Pods, pods_body()).await,
        mock_list(&mut server, ResourceKind::ConfigMaps, old_configmap_body()).await,
    ];
    for kind in [
        ResourceKind::Deployments,
        ResourceKind::PersistentVolumes,
        ResourceKind::PersistentVolumeClaims,
        ResourceKind::StatefulSets,
    ] {
        mocks.push(mock_empty(&mut server, kind).await);
    }

    let mut input = KubeState::new(config_for(&server));
    let acc = MemoryAccumulator::new();
    input.gather(&acc).await.unwrap();

    for mock in &mocks {
        mock.assert_async().await;
    }

    // Kinds finish in any order; every record still lands in the sink
    let metrics = acc.metrics();
    assert_eq!(metrics.len(), 5);
    assert!(metrics.iter().all(|m| m.timestamp.is_some()));

    let count = |measurement: &str| {
        metrics
            .iter()
            .filter(|m| m.measurement == measurement)
            .count()
    };
    assert_eq!(count("kubernetes_node"), 2);
    assert_eq!(count("kubernetes_pod_container"), 2);
    assert_eq!(count("kubernetes_configmap"), 1);
}

#[tokio::test]
async fn test_excluded_kinds_are_not_requested() {
    let mut server = Server::new_async().await;
    let nodes = mock_list(&mut server, ResourceKind::Nodes, nodes_body()).await;
    let pods = server
        .mock("GET", ResourceKind::Pods.api_path("default").as_str())
        .expect(0)
        .create_async()
        .await;

    let mut config = config_for(&server);
    config.resource_exclude = ResourceKind::ALL
        .iter()
        .filter(|k| **k != ResourceKind::Nodes)
        .map(|k| k.to_string())
        .collect();

    let mut input = KubeState::new(config);
    let acc = MemoryAccumulator::new();
    input.gather(&acc).await.unwrap();

    nodes.assert_async().await;
    pods.assert_async().await;
    assert_eq!(acc.len(), 2);
}

#[tokio::test]
async fn test_failed_kind_keeps_other_records() {
    let mut server = Server::new_async().await;
    let _nodes = mock_list(&mut server, ResourceKind::Nodes, nodes_body()).await;
    let _pods = server
        .mock("GET", ResourceKind::Pods.api_path("default").as_str())
        .with_status(403)
        .with_body("forbidden")
        .create_async()
        .await;

    let mut config = config_for(&server);
    config.resource_exclude = vec![
        "configmaps".into(),
        "deployments".into(),
        "persistentvolumes".into(),
        "persistentvolumeclaims".into(),
        "statefulsets".into(),
    ];

    let mut input = KubeState::new(config);
    let acc = MemoryAccumulator::new();
    let err = input.gather(&acc).await.unwrap_err();

    match err {
        InputError::PartialGather(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].kind, "pods");
            assert!(matches!(
                failures[0].error,
                InputError::UnexpectedStatus { status: 403, .. }
            ));
        }
        other => panic!("expected partial gather, got {other}"),
    }
    assert_eq!(acc.len(), 2);
}

#[tokio::test]
async fn test_bearer_token_file_is_sent() {
    let mut server = Server::new_async().await;
    let nodes = server
        .mock("GET", "/api/v1/nodes")
        .match_header("authorization", "Bearer s3cr3t")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_body(nodes_body())
        .create_async()
        .await;

    let mut token = tempfile::NamedTempFile::new().unwrap();
    writeln!(token, "s3cr3t").unwrap();

    let mut config = config_for(&server);
    config.bearer_token = Some(token.path().to_path_buf());
    config.bearer_token_string = Some("ignored".to_string());
    config.resource_exclude = ResourceKind::ALL
        .iter()
        .filter(|k| **k != ResourceKind::Nodes)
        .map(|k| k.to_string())
        .collect();

    let mut input = KubeState::new(config);
    let acc = MemoryAccumulator::new();
    input.gather(&acc).await.unwrap();

    nodes.assert_async().await;
}

#[tokio::test]
async fn test_inline_bearer_token_is_sent() {
    let mut server = Server::new_async().await;
    let nodes = server
        .mock("GET", "/api/v1/nodes")
        .match_header("authorization", "Bearer abc_123")
        .with_status(200)
        .with_body(nodes_body())
        .create_async()
        .await;

    let mut config = config_for(&server);
    config.bearer_token_string = Some("abc_123".to_string());
    config.resource_exclude = ResourceKind::ALL
        .iter()
        .filter(|k| **k != ResourceKind::Nodes)
        .map(|k| k.to_string())
        .collect();

    let mut input = KubeState::new(config);
    let acc = MemoryAccumulator::new();
    input.gather(&acc).await.unwrap();

    nodes.assert_async().await;
}

#[tokio::test]
async fn test_configmap_age_filter_applies_after_first_gather() {
    let mut server = Server::new_async().await;
    let _configmaps =
        mock_list(&mut server, ResourceKind::ConfigMaps, old_configmap_body()).await;

    let mut config = config_for(&server);
    config.max_config_map_age = Some(Duration::from_secs(3600));
    config.resource_exclude = ResourceKind::ALL
        .iter()
        .filter(|k| **k != ResourceKind::ConfigMaps)
        .map(|k| k.to_string())
        .collect();

    let mut input = KubeState::new(config);
    assert!(!input.is_first_gather());

    let acc = MemoryAccumulator::new();
    input.gather(&acc).await.unwrap();
    assert_eq!(acc.len(), 1);
    assert!(!input.is_first_gather());

    let acc = MemoryAccumulator::new();
    input.gather(&acc).await.unwrap();
    assert!(acc.is_empty());
}

#[tokio::test]
async fn test_missing_token_file_fails_and_retries_next_gather() {
    let dir = tempfile::tempdir().unwrap();
    let mut config: KubeStateConfig =
        parse_table(json!({"url": "https://127.0.0.1:1"})).unwrap();
    config.bearer_token = Some(dir.path().join("token"));

    let mut input = KubeState::new(config);
    let acc = MemoryAccumulator::new();

    for _ in 0..2 {
        let err = input.gather(&acc).await.unwrap_err();
        assert!(matches!(err, InputError::TokenRead { .. }));
    }
    assert!(acc.is_empty());
}

#[tokio::test]
async fn test_client_cert_without_key_is_tls_error() {
    let mut config: KubeStateConfig =
        parse_table(json!({"url": "https://127.0.0.1:1"})).unwrap();
    config.tls_cert = Some("/nonexistent/client.pem".into());

    let mut input = KubeState::new(config);
    let acc = MemoryAccumulator::new();
    let err = input.gather(&acc).await.unwrap_err();

    assert!(matches!(err, InputError::Tls(_)));
}

#[test]
fn test_factory_builds_input() {
    let input = factory(json!({"url": "https://10.0.0.1:10255"})).unwrap();
    assert_eq!(input.name(), PLUGIN_NAME);
    assert!(input.sample_config().contains("resource_exclude"));
}
