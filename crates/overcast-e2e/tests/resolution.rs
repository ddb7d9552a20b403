//! Host resolution from configuration, end to end through the mock backends

use std::fs;

use overcast::{ConfigError, HostError};
use overcast_config::ConfigLoader;
use overcast_e2e::{Event, TestHosts};

fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("overcast=debug,overcast_config=debug,overcast_e2e=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_existing_host() {
    init_test();
    let hosts = TestHosts::with_properties(&[("web.hostname", "web.example.com")]);

    let mut host = hosts.resolver.host("web").unwrap();
    host.setup().await.unwrap();

    assert_eq!(host.host_name().unwrap(), "web.example.com");
    assert_eq!(host.port(8080), Some(8080));

    host.teardown().await.unwrap();
    assert!(hosts.events.events().is_empty());
}

#[tokio::test]
async fn test_hostname_wins_over_ami() {
    init_test();
    let hosts = TestHosts::with_properties(&[
        ("web.hostname", "web.example.com"),
        ("web.ami", "ami-123"),
    ]);

    let mut host = hosts.resolver.host("web").unwrap();
    host.setup().await.unwrap();

    assert_eq!(host.host_name().unwrap(), "web.example.com");
    assert_eq!(hosts.cloud.running_count(), 0);
}

#[tokio::test]
async fn test_cloud_host_from_ami() {
    init_test();
    let hosts = TestHosts::with_properties(&[("db.ami", "ami-456")]);

    let mut host = hosts.resolver.host("db").unwrap();
    host.setup().await.unwrap();

    assert_eq!(hosts.cloud.running_count(), 1);
    assert!(host.host_name().unwrap().ends_with(".compute.internal"));

    host.teardown().await.unwrap();
    assert_eq!(hosts.cloud.running_count(), 0);
}

#[test]
fn test_cloud_denied() {
    init_test();
    let hosts = TestHosts::with_properties(&[("db.ami", "ami-456")]);

    let err = hosts.resolver.host_without_cloud("db").err().unwrap();

    assert!(matches!(err, HostError::State(ref m) if m.contains("ami-456")));
}

#[test]
fn test_unknown_label() {
    init_test();
    let hosts = TestHosts::with_properties(&[]);

    let err = hosts.resolver.host("nope").err().unwrap();

    assert!(matches!(err, HostError::State(ref m) if m.contains("nope")));
}

#[test]
fn test_tunnel_without_password() {
    init_test();
    let hosts = TestHosts::with_properties(&[
        ("win.hostname", "win.example.com"),
        ("win.tunnel.username", "Administrator"),
        ("win.tunnel.ports", "2222:22"),
    ]);

    let err = hosts.resolver.host("win").err().unwrap();

    match err {
        HostError::Config(ConfigError::MissingProperty { key }) => {
            assert_eq!(key, "win.tunnel.password");
        }
        other => panic!("Expected missing property, got {:?}", other),
    }
}

#[test]
fn test_tunnel_with_bad_ports() {
    init_test();
    let hosts = TestHosts::with_properties(&[
        ("win.hostname", "win.example.com"),
        ("win.tunnel.username", "Administrator"),
        ("win.tunnel.password", "secret"),
        ("win.tunnel.ports", "2222-22"),
    ]);

    let err = hosts.resolver.host("win").err().unwrap();

    assert!(matches!(
        err,
        HostError::Config(ConfigError::InvalidPortMap { .. })
    ));
}

#[tokio::test]
async fn test_tunneled_cloud_host() {
    init_test();
    let hosts = TestHosts::with_properties(&[
        ("win.ami", "ami-789"),
        ("win.tunnel.username", "Administrator"),
        ("win.tunnel.password", "secret"),
        ("win.tunnel.ports", "2222:22,1445:445"),
    ]);

    let mut host = hosts.resolver.host("win").unwrap();
    host.setup().await.unwrap();

    assert_eq!(host.host_name().unwrap(), "localhost");
    assert_eq!(host.port(445), Some(1445));
    assert_eq!(hosts.tunnels.open_local_ports(), vec![1445, 2222]);

    // Forwards point at the instance address
    let address = hosts
        .events
        .events()
        .into_iter()
        .find_map(|e| match e {
            Event::OpenForward { host, .. } => Some(host),
            _ => None,
        })
        .unwrap();
    assert!(address.ends_with(".compute.internal"));

    host.teardown().await.unwrap();

    let terminate = hosts
        .events
        .position(|e| matches!(e, Event::TerminateInstance { .. }))
        .unwrap();
    let last_close = hosts
        .events
        .events()
        .iter()
        .rposition(|e| matches!(e, Event::CloseForward { .. }))
        .unwrap();
    assert!(last_close < terminate);
    assert_eq!(hosts.cloud.running_count(), 0);
    assert_eq!(hosts.tunnels.open_count(), 0);
}

#[tokio::test]
async fn test_runtime_override_wins_over_files() {
    init_test();
    let home = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let home_file = home.path().join("overcast.toml");
    let work_file = work.path().join("overcast.toml");

    fs::write(
        &home_file,
        "[web]\nhostname = \"home.example.com\"\n",
    )
    .unwrap();
    fs::write(
        &work_file,
        "[web]\nhostname = \"work.example.com\"\n",
    )
    .unwrap();

    let load = |override_host: Option<&str>| {
        let mut loader = ConfigLoader::empty()
            .bundled("[web]\nhostname = \"bundled.example.com\"\n")
            .home_file(Some(home_file.clone()))
            .working_dir_file(Some(work_file.clone()));
        if let Some(h) = override_host {
            loader = loader.override_property("web.hostname", h);
        }
        loader.load().unwrap()
    };

    let hosts = TestHosts::with_config(load(None));
    let mut host = hosts.resolver.host("web").unwrap();
    host.setup().await.unwrap();
    assert_eq!(host.host_name().unwrap(), "work.example.com");

    let hosts = TestHosts::with_config(load(Some("override.example.com")));
    assert!(hosts.resolver.config().contains("web.hostname"));
    assert!(!hosts.resolver.config().contains("web.ami"));
    let mut host = hosts.resolver.host("web").unwrap();
    host.setup().await.unwrap();
    assert_eq!(host.host_name().unwrap(), "override.example.com");
}
