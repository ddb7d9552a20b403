use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use overcast_config::ConfigLoader;
use overcast_libvirt::{prepare_for_cloning, set_domain_name, DomainDescriptor};
use tracing_subscriber::EnvFilter;

use overcast::{
    AwsCliBackend, BasePlan, CloudPolicy, HostPlan, HostResolver, ProvisionedHost,
    SshTunnelBackend,
};

/// Overcast - ephemeral hosts for integration tests
#[derive(Parser, Debug)]
#[command(name = "overcast")]
#[command(about = "Set up and tear down test hosts described in overcast.toml")]
struct Cli {
    /// Override a property (beats every overcast.toml), e.g. --set web.hostname=10.0.0.5
    #[arg(short = 'D', long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    overrides: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which host a label resolves to, without starting anything
    Plan {
        label: String,

        /// Refuse to launch cloud instances
        #[arg(long)]
        no_cloud: bool,
    },

    /// Set up a host, keep it up until Ctrl-C, then tear it down
    Up {
        label: String,

        /// Refuse to launch cloud instances
        #[arg(long)]
        no_cloud: bool,
    },

    /// Rename a libvirt domain XML and strip its uuid and MAC addresses
    CloneDomain {
        /// Domain XML of the base VM (e.g. from `virsh dumpxml`)
        input: PathBuf,

        /// Name of the clone
        #[arg(long)]
        name: String,

        /// Where to write the result (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn cloud_policy(no_cloud: bool) -> CloudPolicy {
    if no_cloud {
        CloudPolicy::Deny
    } else {
        CloudPolicy::Allow
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("overcast=info".parse()?)
                .add_directive("overcast_config=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CloneDomain {
            input,
            name,
            output,
        } => run_clone_domain(&input, &name, output.as_deref()),
        Commands::Plan { label, no_cloud } => {
            let resolver = build_resolver(cli.overrides)?;
            let plan = resolver.plan(&label, cloud_policy(no_cloud))?;
            print_plan(&plan);
            Ok(())
        }
        Commands::Up { label, no_cloud } => {
            let resolver = build_resolver(cli.overrides)?;
            run_up(&resolver, &label, cloud_policy(no_cloud)).await
        }
    }
}

fn build_resolver(overrides: Vec<(String, String)>) -> Result<HostResolver> {
    let config = if overrides.is_empty() {
        overcast_config::global()
            .context("Failed to load overcast.toml")?
            .clone()
    } else {
        ConfigLoader::new()
            .overrides(overrides)
            .load()
            .context("Failed to load overcast.toml")?
    };
    let config = Arc::new(config);

    let cloud = Arc::new(AwsCliBackend::from_config(&config));
    let tunnels = Arc::new(SshTunnelBackend::new());

    Ok(HostResolver::new(config, cloud, tunnels))
}

fn print_plan(plan: &HostPlan) {
    match &plan.base {
        BasePlan::Existing { hostname } => {
            println!("{}: existing host {}", plan.label, hostname);
        }
        BasePlan::CloudProvisioned { request, boot_wait } => {
            println!(
                "{}: cloud instance of {} ({}), boot wait {:?}",
                plan.label, request.image_id, request.instance_type, boot_wait
            );
        }
    }

    if let Some(tunnel) = &plan.tunnel {
        println!("  tunneled as {}:", tunnel.credentials.username);
        for forward in &tunnel.ports {
            println!("    localhost:{} -> {}", forward.local, forward.remote);
        }
    }
}

async fn run_up(resolver: &HostResolver, label: &str, policy: CloudPolicy) -> Result<()> {
    let plan = resolver.plan(label, policy)?;
    let remote_ports = plan
        .tunnel
        .as_ref()
        .map(|t| t.ports.remote_ports())
        .unwrap_or_default();

    let mut host = resolver.build(plan);

    if let Err(e) = host.setup().await {
        tracing::error!("Setup of {} failed: {}", label, e);
        if let Err(teardown) = host.teardown().await {
            tracing::warn!("Teardown after failed setup also failed: {}", teardown);
        }
        return Err(e).with_context(|| format!("Failed to set up {}", label));
    }

    print_endpoint(&*host, label, &remote_ports)?;

    println!("Press Ctrl-C to tear down {}", label);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Tearing down {}", label);
    host.teardown()
        .await
        .with_context(|| format!("Failed to tear down {}", label))
}

fn print_endpoint(host: &dyn ProvisionedHost, label: &str, remote_ports: &[u16]) -> Result<()> {
    println!("{} is up at {}", label, host.host_name()?);
    for remote in remote_ports {
        if let Some(local) = host.port(*remote) {
            println!("  port {} -> {}", remote, local);
        }
    }
    Ok(())
}

fn run_clone_domain(input: &std::path::Path, name: &str, output: Option<&std::path::Path>) -> Result<()> {
    let xml = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut domain = DomainDescriptor::parse(&xml)?;
    prepare_for_cloning(set_domain_name(&mut domain, name)?);
    let clone_xml = domain.to_xml()?;

    match output {
        Some(path) => {
            std::fs::write(path, clone_xml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote clone domain {} to {}", name, path.display());
        }
        None => println!("{}", clone_xml),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("web.hostname=10.0.0.5").unwrap(),
            ("web.hostname".to_string(), "10.0.0.5".to_string())
        );
        assert_eq!(
            parse_key_value("web.tunnel.ports=2222:22,1445:445").unwrap().1,
            "2222:22,1445:445"
        );
        assert!(parse_key_value("web.hostname").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "overcast",
            "--set",
            "web.hostname=a",
            "-D",
            "web.ami=ami-1",
            "plan",
            "web",
            "--no-cloud",
        ])
        .unwrap();
        assert_eq!(cli.overrides.len(), 2);
        assert!(matches!(cli.command, Commands::Plan { no_cloud: true, .. }));
    }
}
