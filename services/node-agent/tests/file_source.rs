//! Integration tests for the file source.
//!
//! Covers both the direct `extract_once` primitive, which surfaces errors,
//! and the polling task, which turns failures into empty SET updates.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use podcfg_api::{
    validate_pod, Container, Operation, Pod, PodSpec, PodUpdate, PullPolicy, SourceKey, Volume,
    VolumeSource, NAMESPACE_DEFAULT,
};
use podcfg_manifest::{DecodeError, Decoder};
use podcfg_node_agent::{ExtractError, FileSource};
use rstest::rstest;
use tokio::sync::mpsc;

fn test_source(path: &Path) -> FileSource {
    FileSource::new(path, Arc::new(Decoder::default()))
}

/// A v1beta1 manifest with id and uid `id`, and the spec it decodes to.
fn example_manifest_and_spec(id: &str) -> (serde_json::Value, PodSpec) {
    let manifest = serde_json::json!({
        "version": "v1beta1",
        "id": id,
        "uuid": id,
        "containers": [{
            "name": format!("c{id}"),
            "image": "foo",
            "terminationMessagePath": "/somepath",
        }],
        "volumes": [{
            "name": "host-dir",
            "source": { "hostDir": { "path": "/dir/path" } },
        }],
    });

    let mut container = Container::new("foo").with_name(format!("c{id}"));
    container.termination_message_path = "/somepath".to_string();
    let spec = PodSpec {
        containers: vec![container],
        volumes: vec![Volume {
            name: "host-dir".to_string(),
            source: VolumeSource::HostPath {
                path: "/dir/path".to_string(),
            },
        }],
    };

    (manifest, spec)
}

/// Strips the generated `-<hash>` suffix from a pod name.
fn base_name(pod: &Pod) -> &str {
    pod.name()
        .rsplit_once('-')
        .map(|(base, _)| base)
        .unwrap_or(pod.name())
}

async fn next_update(rx: &mut mpsc::Receiver<PodUpdate>) -> PodUpdate {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Expected update, timeout instead")
        .expect("update channel closed")
}

fn write_manifest(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_extract_from_non_existent_file() {
    let err = test_source(Path::new("/some/fake/file"))
        .extract_once()
        .unwrap_err();
    assert!(matches!(err, ExtractError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn test_update_on_non_existent_file() {
    let (tx, mut rx) = mpsc::channel(1);
    let handle = test_source(Path::new("random_non_existent_path"))
        .start(Duration::from_millis(1), tx);

    let update = next_update(&mut rx).await;
    assert_eq!(update, PodUpdate::empty_set(SourceKey::file()));

    handle.stop().await;
}

#[tokio::test]
async fn test_read_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        "test_pod_config",
        r#"{
            "version": "v1beta1",
            "uuid": "12345",
            "id": "test",
            "containers": [{ "image": "test/image", imagePullPolicy: "PullAlways"}]
        }"#,
    );

    let (tx, mut rx) = mpsc::channel(1);
    let handle = test_source(&path).start(Duration::from_millis(1), tx);
    let update = next_update(&mut rx).await;
    handle.stop().await;

    assert_eq!(update.op, Operation::Set);
    assert_eq!(update.source, SourceKey::file());
    assert_eq!(update.pods.len(), 1);

    let pod = &update.pods[0];
    assert!(pod.name().starts_with("test-"), "unexpected name {}", pod.name());
    // Manifests cannot carry a namespace, so it is always defaulted.
    assert_eq!(pod.namespace(), NAMESPACE_DEFAULT);
    assert!(pod.metadata.self_link.starts_with("/api/"));
    assert_eq!(pod.uid(), "12345");

    let mut expected = Container::new("test/image");
    expected.image_pull_policy = PullPolicy::Always;
    assert_eq!(pod.spec.containers, vec![expected]);
}

#[tokio::test]
async fn test_read_from_file_without_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        "test_pod_config",
        r#"{
            "version": "v1beta1",
            "uuid": "12345",
            "containers": [{ "image": "test/image", imagePullPolicy: "PullAlways"}]
        }"#,
    );

    let (tx, mut rx) = mpsc::channel(1);
    let handle = test_source(&path).start(Duration::from_millis(1), tx);
    let update = next_update(&mut rx).await;
    handle.stop().await;

    let pod = &update.pods[0];
    assert!(!pod.name().is_empty(), "Name did not get defaulted");
    assert_eq!(pod.uid(), "12345");
    assert_eq!(pod.spec.containers[0].image, "test/image");
}

#[tokio::test]
async fn test_read_v1beta2_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        "test_pod_config",
        r#"{
            "version": "v1beta2",
            "uuid": "12345",
            "id": "test",
            "containers": [{ "image": "test/image", imagePullPolicy: "PullAlways"}]
        }"#,
    );

    let (tx, mut rx) = mpsc::channel(1);
    let handle = test_source(&path).start(Duration::from_millis(1), tx);
    let update = next_update(&mut rx).await;
    handle.stop().await;

    let pod = &update.pods[0];
    assert_eq!(pod.uid(), "12345");
    assert_eq!(pod.namespace(), NAMESPACE_DEFAULT);
    assert_eq!(pod.spec.containers[0].image, "test/image");
}

#[test]
fn test_read_from_file_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        "test_pod_config",
        r#"{
            "version": "v1beta1",
            "id": "test",
            "containers": [{ "image": "test/image" }]
        }"#,
    );

    let update = test_source(&path).extract_once().unwrap();
    let pod = &update.pods[0];
    assert!(!pod.uid().is_empty(), "Unexpected UID: {}", pod.uid());
    assert!(pod.name().starts_with("test-"));
    assert_eq!(pod.spec.containers, vec![Container::new("test/image")]);
}

#[test]
fn test_yaml_manifest_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        "web.yaml",
        "version: v1beta2\nid: web\ncontainers:\n  - name: web\n    image: nginx\n",
    );

    let update = test_source(&path).extract_once().unwrap();
    assert_eq!(update.pods.len(), 1);
    assert!(update.pods[0].name().starts_with("web-"));
}

#[rstest]
#[case::binary(&[1, 2, 3], "unknown format")]
#[case::unknown_version(br#"{"version": "v0", "containers": []}"#, "unknown version")]
#[case::missing_image(br#"{"version": "v1beta1", "containers": [{"name": "web"}]}"#, "missing field")]
fn test_extract_from_bad_data_file(#[case] contents: &[u8], #[case] kind: &str) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test_pod_config");
    fs::write(&path, contents).unwrap();

    let err = test_source(&path).extract_once().unwrap_err();
    let ExtractError::Decode { source, .. } = err else {
        panic!("expected decode error, got {err:?}");
    };
    let matched = match source {
        DecodeError::UnknownFormat(_) => "unknown format",
        DecodeError::UnknownVersion(_) => "unknown version",
        DecodeError::MissingField(_) => "missing field",
    };
    assert_eq!(matched, kind);
}

#[tokio::test]
async fn test_bad_data_file_publishes_empty_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test_pod_config");
    fs::write(&path, [1u8, 2, 3]).unwrap();

    let (tx, mut rx) = mpsc::channel(1);
    let handle = test_source(&path).start(Duration::from_millis(1), tx);
    let update = next_update(&mut rx).await;
    handle.stop().await;

    assert_eq!(update, PodUpdate::empty_set(SourceKey::file()));
}

#[test]
fn test_extract_from_empty_dir() {
    let dir = tempfile::tempdir().unwrap();

    let update = test_source(dir.path()).extract_once().unwrap();
    assert_eq!(update, PodUpdate::empty_set(SourceKey::file()));
}

#[test]
fn test_extract_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut expected = Vec::new();
    for id in ["1", "2"] {
        let (manifest, spec) = example_manifest_and_spec(id);
        write_manifest(
            dir.path(),
            &format!("{id}.json"),
            &serde_json::to_string(&manifest).unwrap(),
        );
        expected.push((id.to_string(), spec));
    }

    let update = test_source(dir.path()).extract_once().unwrap();
    assert_eq!(update.op, Operation::Set);
    assert_eq!(update.pods.len(), 2);

    // Pod order is not significant.
    let mut got: Vec<_> = update
        .pods
        .iter()
        .map(|pod| (base_name(pod).to_string(), pod.spec.clone()))
        .collect();
    got.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(got, expected);

    for pod in &update.pods {
        assert_eq!(pod.uid(), base_name(pod));
        assert_eq!(pod.namespace(), NAMESPACE_DEFAULT);
        assert_eq!(validate_pod(pod), Ok(()), "pod {} failed validation", pod.name());
    }
}

#[test]
fn test_extract_from_dir_skips_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let (manifest, _) = example_manifest_and_spec("good");
    write_manifest(
        dir.path(),
        "good.json",
        &serde_json::to_string(&manifest).unwrap(),
    );
    write_manifest(dir.path(), "bad.json", "\u{1}\u{2}\u{3}");
    write_manifest(dir.path(), "future.json", r#"{"version": "v3"}"#);

    let update = test_source(dir.path()).extract_once().unwrap();
    assert_eq!(update.pods.len(), 1);
    assert_eq!(update.pods[0].uid(), "good");
}

#[test]
fn test_extract_from_dir_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    for id in ["1", "2", "3"] {
        let (manifest, _) = example_manifest_and_spec(id);
        write_manifest(
            dir.path(),
            &format!("{id}.json"),
            &serde_json::to_string(&manifest).unwrap(),
        );
    }

    let source = test_source(dir.path());
    let mut first = source.extract_once().unwrap().pods;
    let mut second = source.extract_once().unwrap().pods;
    first.sort_by_key(Pod::identity);
    second.sort_by_key(Pod::identity);
    assert_eq!(first, second);
}

#[test]
fn test_identical_manifests_in_dir_get_distinct_names() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = r#"{"version": "v1beta1", "id": "web", "containers": [{"image": "nginx"}]}"#;
    write_manifest(dir.path(), "a.json", manifest);
    write_manifest(dir.path(), "b.json", manifest);

    let update = test_source(dir.path()).extract_once().unwrap();
    assert_eq!(update.pods.len(), 2);
    assert_ne!(update.pods[0].name(), update.pods[1].name());
    assert_ne!(update.pods[0].uid(), update.pods[1].uid());
    assert!(update.pods.iter().all(|p| p.name().starts_with("web-")));
}

#[tokio::test]
async fn test_stop_ends_polling() {
    let dir = tempfile::tempdir().unwrap();

    let (tx, mut rx) = mpsc::channel(4);
    let handle = test_source(dir.path()).start(Duration::from_secs(3600), tx);
    assert_eq!(handle.source(), &SourceKey::file());

    // The first tick fires immediately.
    let update = next_update(&mut rx).await;
    assert!(update.pods.is_empty());
    assert!(handle.is_running());

    handle.stop().await;

    // The task has exited and dropped its sender.
    let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("channel not closed after stop");
    assert!(next.is_none());
}

#[tokio::test]
async fn test_source_exits_when_receiver_dropped() {
    let dir = tempfile::tempdir().unwrap();

    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let handle = test_source(dir.path()).start(Duration::from_millis(1), tx);

    tokio::time::timeout(Duration::from_secs(1), async {
        while handle.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("source kept running without a receiver");
}

#[tokio::test]
async fn test_periodic_rescan_picks_up_new_files() {
    let dir = tempfile::tempdir().unwrap();

    let (tx, mut rx) = mpsc::channel(1);
    let handle = test_source(dir.path()).start(Duration::from_millis(10), tx);

    let first = next_update(&mut rx).await;
    assert!(first.pods.is_empty());

    let (manifest, _) = example_manifest_and_spec("1");
    write_manifest(
        dir.path(),
        "1.json",
        &serde_json::to_string(&manifest).unwrap(),
    );

    let found = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let update = rx.recv().await.expect("update channel closed");
            if !update.pods.is_empty() {
                return update;
            }
        }
    })
    .await
    .expect("new manifest never observed");
    assert_eq!(found.pods.len(), 1);

    handle.stop().await;
}
