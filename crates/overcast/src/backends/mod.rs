//! Cloud and tunnel backends backed by command-line tools

pub mod aws;
pub mod ssh;

pub use aws::AwsCliBackend;
pub use ssh::SshTunnelBackend;
