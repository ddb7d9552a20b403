//! EC2 backend driven through the AWS CLI
//!
//! Requires the `aws` CLI to be installed and configured with credentials.
//!
//! See: https://docs.aws.amazon.com/cli/latest/reference/ec2/

use std::process::Stdio;

use async_trait::async_trait;
use overcast_config::Configuration;
use serde::Deserialize;
use tokio::process::Command;

use crate::cloud::{CloudBackend, InstanceHandle, InstanceRequest};
use crate::error::BackendError;

pub const AWS_REGION_PROPERTY: &str = "aws.region";
pub const AWS_PROFILE_PROPERTY: &str = "aws.profile";

const PROGRAM: &str = "aws";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesOutput {
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    instance_id: String,
    #[serde(default)]
    public_dns_name: Option<String>,
    #[serde(default)]
    public_ip_address: Option<String>,
    #[serde(default)]
    private_ip_address: Option<String>,
}

impl Instance {
    /// Best address to reach the instance: public DNS, public IP, then private IP
    fn address(&self) -> Option<&str> {
        [
            &self.public_dns_name,
            &self.public_ip_address,
            &self.private_ip_address,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|a| !a.is_empty())
    }
}

/// Launches and terminates EC2 instances with `aws ec2 ...`
#[derive(Debug, Clone, Default)]
pub struct AwsCliBackend {
    region: Option<String>,
    profile: Option<String>,
}

impl AwsCliBackend {
    pub fn new(region: Option<String>, profile: Option<String>) -> Self {
        Self { region, profile }
    }

    /// Use `aws.region` and `aws.profile` when configured
    pub fn from_config(config: &Configuration) -> Self {
        Self::new(
            config.get(AWS_REGION_PROPERTY).map(str::to_string),
            config.get(AWS_PROFILE_PROPERTY).map(str::to_string),
        )
    }

    fn global_args(&self) -> Vec<String> {
        let mut args = vec!["--output".to_string(), "json".to_string()];
        if let Some(region) = &self.region {
            args.extend(["--region".to_string(), region.clone()]);
        }
        if let Some(profile) = &self.profile {
            args.extend(["--profile".to_string(), profile.clone()]);
        }
        args
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>, BackendError> {
        tracing::debug!("Running {} {}", PROGRAM, args.join(" "));

        let output = Command::new(PROGRAM)
            .args(args)
            .args(self.global_args())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BackendError::command(
                        PROGRAM,
                        "AWS CLI not found. Install from https://aws.amazon.com/cli/",
                    )
                } else {
                    BackendError::command(PROGRAM, format!("failed to execute: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::command(PROGRAM, stderr.trim()));
        }

        Ok(output.stdout)
    }
}

fn run_instances_args(request: &InstanceRequest) -> Vec<String> {
    let mut args: Vec<String> = [
        "ec2",
        "run-instances",
        "--image-id",
        request.image_id.as_str(),
        "--instance-type",
        request.instance_type.as_str(),
        "--count",
        "1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if let Some(group) = &request.security_group {
        args.extend(["--security-groups".to_string(), group.clone()]);
    }
    if let Some(key_name) = &request.key_name {
        args.extend(["--key-name".to_string(), key_name.clone()]);
    }
    args
}

fn instance_args(command: &str, instance: &InstanceHandle) -> Vec<String> {
    vec![
        "ec2".to_string(),
        command.to_string(),
        "--instance-ids".to_string(),
        instance.instance_id.clone(),
    ]
}

fn parse_run_instances(stdout: &[u8]) -> Result<InstanceHandle, BackendError> {
    let output: RunInstancesOutput = serde_json::from_slice(stdout)
        .map_err(|e| BackendError::Api(format!("unexpected run-instances output: {}", e)))?;

    output
        .instances
        .into_iter()
        .next()
        .map(|i| InstanceHandle {
            instance_id: i.instance_id,
        })
        .ok_or_else(|| BackendError::Api("run-instances returned no instance".to_string()))
}

fn parse_instance_address(stdout: &[u8], instance: &InstanceHandle) -> Result<String, BackendError> {
    let output: DescribeInstancesOutput = serde_json::from_slice(stdout)
        .map_err(|e| BackendError::Api(format!("unexpected describe-instances output: {}", e)))?;

    let found = output
        .reservations
        .iter()
        .flat_map(|r| r.instances.iter())
        .find(|i| i.instance_id == instance.instance_id)
        .ok_or_else(|| BackendError::NotFound(instance.instance_id.clone()))?;

    found.address().map(str::to_string).ok_or_else(|| {
        BackendError::Api(format!("instance {} has no address", instance.instance_id))
    })
}

#[async_trait]
impl CloudBackend for AwsCliBackend {
    async fn create_instance(
        &self,
        request: &InstanceRequest,
    ) -> Result<InstanceHandle, BackendError> {
        let stdout = self.run(&run_instances_args(request)).await?;
        let instance = parse_run_instances(&stdout)?;
        tracing::info!("Created EC2 instance {}", instance.instance_id);
        Ok(instance)
    }

    async fn instance_address(&self, instance: &InstanceHandle) -> Result<String, BackendError> {
        tracing::info!("Waiting for EC2 instance {} to be running", instance.instance_id);

        let wait = [
            "ec2",
            "wait",
            "instance-running",
            "--instance-ids",
            instance.instance_id.as_str(),
        ]
        .map(str::to_string);
        self.run(&wait).await?;

        let stdout = self.run(&instance_args("describe-instances", instance)).await?;
        parse_instance_address(&stdout, instance)
    }

    async fn terminate_instance(&self, instance: &InstanceHandle) -> Result<(), BackendError> {
        self.run(&instance_args("terminate-instances", instance)).await?;
        tracing::info!("Terminated EC2 instance {}", instance.instance_id);
        Ok(())
    }
}
