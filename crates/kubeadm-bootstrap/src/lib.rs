//! kubeadm bootstrap data for new cluster machines.
//!
//! This crate renders the user data a machine consumes on first boot to
//! initialize a Kubernetes control plane or join an existing cluster with
//! kubeadm. Two encodings are supported:
//!
//! - [`cloudinit`]: a `#cloud-config` YAML document for cloud-init.
//! - [`ignition`]: an Ignition JSON document, produced by handing the same
//!   assembled files and commands to a [`ignition::Transpiler`].
//!
//! Both implement [`Provisioner`], one operation per node role.
//!
//! # Example
//!
//! ```rust
//! use kubeadm_bootstrap::cloudinit::{CloudInitProvisioner, WorkerJoinInput};
//! use kubeadm_bootstrap::Provisioner;
//!
//! let provisioner = CloudInitProvisioner::new();
//! let data = provisioner
//!     .worker_join_data(WorkerJoinInput {
//!         join_configuration: "kind: JoinConfiguration".to_string(),
//!         ..WorkerJoinInput::default()
//!     })
//!     .unwrap();
//! assert!(data.starts_with(b"## template: jinja\n#cloud-config\n"));
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod certs;
pub mod cloudinit;
pub mod error;
pub mod ignition;
pub mod provisioner;
pub mod request;
pub mod types;

pub use cloudinit::CloudInitProvisioner;
pub use error::{ProvisioningError, TranspileError};
pub use ignition::IgnitionProvisioner;
pub use provisioner::{provision, Format, NodeInput, NodeRole, Provisioner, ProvisionerInput};
pub use request::BootstrapRequest;
