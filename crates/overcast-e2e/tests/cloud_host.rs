//! Cloud-provisioned host tests

use std::sync::Arc;
use std::time::Duration;

use overcast::{CloudHost, HostError, InstanceRequest, ProvisionedHost, DEFAULT_INSTANCE_TYPE};
use overcast_e2e::{Event, EventLog, MockCloudBackend};

fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("overcast=debug,overcast_e2e=debug")
        .with_test_writer()
        .try_init();
}

fn cloud_host(backend: Arc<MockCloudBackend>) -> CloudHost {
    CloudHost::new(
        "db",
        InstanceRequest::new("ami-0abc"),
        Duration::ZERO,
        backend,
    )
}

#[tokio::test]
async fn test_cloud_host_lifecycle() {
    init_test();
    let events = EventLog::new();
    let backend = MockCloudBackend::new(events.clone());
    let mut host = cloud_host(backend.clone());

    assert_eq!(host.request().instance_type, DEFAULT_INSTANCE_TYPE);
    assert!(host.instance().is_none());
    assert!(matches!(host.host_name(), Err(HostError::State(_))));

    host.setup().await.unwrap();
    let instance_id = host.instance().unwrap().instance_id.clone();
    assert!(backend.is_running(&instance_id));
    assert_eq!(
        host.host_name().unwrap(),
        format!("{}.compute.internal", instance_id)
    );
    assert_eq!(host.port(5432), Some(5432));

    host.teardown().await.unwrap();
    assert_eq!(backend.running_count(), 0);
    assert!(host.instance().is_none());
    assert!(host.host_name().is_err());

    assert_eq!(
        events.events(),
        vec![
            Event::CreateInstance {
                image_id: "ami-0abc".into()
            },
            Event::InstanceAddress {
                instance_id: instance_id.clone()
            },
            Event::TerminateInstance { instance_id },
        ]
    );
}

#[tokio::test]
async fn test_address_failure_terminates_instance() {
    init_test();
    let events = EventLog::new();
    let backend = MockCloudBackend::new(events.clone());
    backend.set_fail_address(true);
    let mut host = cloud_host(backend.clone());

    let err = host.setup().await.unwrap_err();

    assert!(matches!(
        err,
        HostError::Cloud {
            operation: "address lookup",
            ..
        }
    ));
    assert_eq!(backend.running_count(), 0);
    assert!(host.instance().is_none());
    assert_eq!(
        events.count(|e| matches!(e, Event::TerminateInstance { .. })),
        1
    );
}

#[tokio::test]
async fn test_create_failure() {
    init_test();
    let backend = MockCloudBackend::new(EventLog::new());
    backend.set_fail_create(true);
    let mut host = cloud_host(backend.clone());

    let err = host.setup().await.unwrap_err();

    assert!(matches!(
        err,
        HostError::Cloud {
            operation: "creation",
            ..
        }
    ));
    // Nothing to clean up
    host.teardown().await.unwrap();
}

#[tokio::test]
async fn test_terminate_failure_is_reported() {
    init_test();
    let backend = MockCloudBackend::new(EventLog::new());
    let mut host = cloud_host(backend.clone());
    host.setup().await.unwrap();

    backend.set_fail_terminate(true);
    let err = host.teardown().await.unwrap_err();

    assert!(matches!(
        err,
        HostError::Cloud {
            operation: "termination",
            ..
        }
    ));
}
