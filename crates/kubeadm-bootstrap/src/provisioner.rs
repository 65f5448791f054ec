//! The provisioning contract shared by every output encoding.
//!
//! A [`Provisioner`] turns a node input into the bytes an infrastructure
//! provider hands to a new instance through its metadata service. Each encoding
//! names its own input types, so handing a worker input to the control-plane
//! init operation does not compile:
//!
//! ```compile_fail
//! use kubeadm_bootstrap::cloudinit::{self, WorkerJoinInput};
//! use kubeadm_bootstrap::Provisioner;
//!
//! let provisioner = cloudinit::CloudInitProvisioner::new();
//! provisioner.control_plane_init_data(WorkerJoinInput::default());
//! ```
//!
//! Callers that only learn the role at runtime (for example from a request
//! file) go through [`provision`], which checks the requested role against the
//! input variant and reports a [`ProvisioningError::TypeMismatch`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisioningError, Result};

/// Output encoding of a provisioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// cloud-init `#cloud-config` document.
    CloudConfig,
    /// Ignition JSON document.
    Ignition,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CloudConfig => write!(f, "cloud-config"),
            Self::Ignition => write!(f, "ignition"),
        }
    }
}

/// Node lifecycle a payload is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    /// First control-plane node, runs `kubeadm init`.
    ControlPlaneInit,
    /// Additional control-plane node, runs `kubeadm join`.
    ControlPlaneJoin,
    /// Worker node, runs `kubeadm join`.
    WorkerJoin,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlPlaneInit => write!(f, "ControlPlaneInitInput"),
            Self::ControlPlaneJoin => write!(f, "ControlPlaneJoinInput"),
            Self::WorkerJoin => write!(f, "WorkerJoinInput"),
        }
    }
}

/// Generates the data needed to provision a machine.
///
/// Inputs are consumed: every call gets a freshly built input and nothing is
/// kept between calls.
pub trait Provisioner: Send + Sync {
    /// Input for initializing the first control-plane node.
    type ControlPlaneInit;
    /// Input for joining a control-plane node.
    type ControlPlaneJoin;
    /// Input for joining a worker node.
    type WorkerJoin;

    /// Encoding of the returned data.
    fn format(&self) -> Format;

    /// Data for a control-plane node during the kubeadm init phase.
    fn control_plane_init_data(&self, input: Self::ControlPlaneInit) -> Result<Vec<u8>>;

    /// Data for a control-plane node during the kubeadm join phase.
    fn control_plane_join_data(&self, input: Self::ControlPlaneJoin) -> Result<Vec<u8>>;

    /// Data for a worker node, which only has a join phase.
    fn worker_join_data(&self, input: Self::WorkerJoin) -> Result<Vec<u8>>;
}

/// One of the three role inputs of an encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeInput<I, J, W> {
    ControlPlaneInit(I),
    ControlPlaneJoin(J),
    WorkerJoin(W),
}

impl<I, J, W> NodeInput<I, J, W> {
    /// Role this input was built for.
    pub fn role(&self) -> NodeRole {
        match self {
            Self::ControlPlaneInit(_) => NodeRole::ControlPlaneInit,
            Self::ControlPlaneJoin(_) => NodeRole::ControlPlaneJoin,
            Self::WorkerJoin(_) => NodeRole::WorkerJoin,
        }
    }
}

/// [`NodeInput`] typed for provisioner `P`.
pub type ProvisionerInput<P> = NodeInput<
    <P as Provisioner>::ControlPlaneInit,
    <P as Provisioner>::ControlPlaneJoin,
    <P as Provisioner>::WorkerJoin,
>;

/// Run the operation for `role` on `input`.
///
/// Returns [`ProvisioningError::TypeMismatch`] without rendering anything when
/// `input` was built for another role.
pub fn provision<P: Provisioner + ?Sized>(
    provisioner: &P,
    role: NodeRole,
    input: ProvisionerInput<P>,
) -> Result<Vec<u8>> {
    match (role, input) {
        (NodeRole::ControlPlaneInit, NodeInput::ControlPlaneInit(input)) => {
            provisioner.control_plane_init_data(input)
        }
        (NodeRole::ControlPlaneJoin, NodeInput::ControlPlaneJoin(input)) => {
            provisioner.control_plane_join_data(input)
        }
        (NodeRole::WorkerJoin, NodeInput::WorkerJoin(input)) => provisioner.worker_join_data(input),
        (expected, input) => Err(ProvisioningError::TypeMismatch {
            expected,
            actual: input.role(),
        }),
    }
}
