//! Bootstrap requests read from YAML.
//!
//! A request names its role with `kind` and carries the cloud-init input of
//! that role, plus an optional `ignition` section used only by the Ignition
//! encoding:
//!
//! ```yaml
//! kind: WorkerJoin
//! kubeadmVerbosity: --v=2
//! joinConfiguration: |
//!   apiVersion: kubeadm.k8s.io/v1beta3
//!   kind: JoinConfiguration
//! ignition:
//!   containerLinuxConfig:
//!     strict: true
//! ```

use serde::Deserialize;

use crate::cloudinit;
use crate::ignition;
use crate::provisioner::{NodeInput, NodeRole, ProvisionerInput};
use crate::types::IgnitionSpec;
use crate::{CloudInitProvisioner, IgnitionProvisioner};

/// One role input and its Ignition options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    #[serde(flatten)]
    pub input: T,
    #[serde(default)]
    pub ignition: Option<IgnitionSpec>,
}

/// A request for one of the three roles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind")]
pub enum BootstrapRequest {
    ControlPlaneInit(Request<cloudinit::ControlPlaneInitInput>),
    ControlPlaneJoin(Request<cloudinit::ControlPlaneJoinInput>),
    WorkerJoin(Request<cloudinit::WorkerJoinInput>),
}

impl BootstrapRequest {
    /// Parse a YAML request.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn role(&self) -> NodeRole {
        match self {
            Self::ControlPlaneInit(_) => NodeRole::ControlPlaneInit,
            Self::ControlPlaneJoin(_) => NodeRole::ControlPlaneJoin,
            Self::WorkerJoin(_) => NodeRole::WorkerJoin,
        }
    }

    /// Input for the cloud-config encoding. The `ignition` section is dropped.
    pub fn into_cloud_init(self) -> ProvisionerInput<CloudInitProvisioner> {
        match self {
            Self::ControlPlaneInit(r) => NodeInput::ControlPlaneInit(r.input),
            Self::ControlPlaneJoin(r) => NodeInput::ControlPlaneJoin(r.input),
            Self::WorkerJoin(r) => NodeInput::WorkerJoin(r.input),
        }
    }

    /// Input for the Ignition encoding.
    pub fn into_ignition(self) -> ProvisionerInput<IgnitionProvisioner> {
        match self {
            Self::ControlPlaneInit(r) => NodeInput::ControlPlaneInit(
                ignition::ControlPlaneInitInput::new(r.input, r.ignition),
            ),
            Self::ControlPlaneJoin(r) => NodeInput::ControlPlaneJoin(
                ignition::ControlPlaneJoinInput::new(r.input, r.ignition),
            ),
            Self::WorkerJoin(r) => {
                NodeInput::WorkerJoin(ignition::WorkerJoinInput::new(r.input, r.ignition))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::Purpose;

    #[test]
    fn test_worker_request() {
        let request = BootstrapRequest::from_yaml(
            "kind: WorkerJoin\nkubeadmVerbosity: --v=2\nuseExperimentalRetry: true\njoinConfiguration: joinCfg\nignition:\n  containerLinuxConfig:\n    strict: true\n",
        )
        .unwrap();
        assert_eq!(request.role(), NodeRole::WorkerJoin);

        let BootstrapRequest::WorkerJoin(r) = &request else {
            panic!("unexpected {request:?}");
        };
        assert_eq!(r.input.join_configuration, "joinCfg");
        assert_eq!(r.input.base.kubeadm_verbosity, "--v=2");
        assert!(r.input.base.use_experimental_retry);
        assert!(r
            .ignition
            .as_ref()
            .and_then(|i| i.container_linux_config.as_ref())
            .is_some_and(|c| c.strict));

        let NodeInput::WorkerJoin(input) = request.into_ignition() else {
            panic!("wrong variant");
        };
        assert!(input.cloud_init.is_some());
        assert!(input.ignition.is_some());
    }

    #[test]
    fn test_init_request_with_certificates() {
        let request = BootstrapRequest::from_yaml(
            "kind: ControlPlaneInit\nclusterConfiguration: clusterCfg\ninitConfiguration: initCfg\ncertificates:\n  - purpose: ca\n    certFile: /etc/kubernetes/pki/ca.crt\n    keyFile: /etc/kubernetes/pki/ca.key\n    keyPair:\n      cert: CERT\n      key: KEY\n",
        )
        .unwrap();

        let NodeInput::ControlPlaneInit(input) = request.into_cloud_init() else {
            panic!("wrong variant");
        };
        assert_eq!(input.cluster_configuration, "clusterCfg");
        assert_eq!(input.init_configuration, "initCfg");
        assert!(input.certificates.get(Purpose::ClusterCa).is_some());
    }

    #[test]
    fn test_derived_fields_are_not_read() {
        let request = BootstrapRequest::from_yaml(
            "kind: ControlPlaneJoin\njoinConfiguration: j\nkubeadmCommand: rm -rf /\ncontrolPlane: false\n",
        )
        .unwrap();
        let BootstrapRequest::ControlPlaneJoin(r) = request else {
            panic!("wrong variant");
        };
        assert!(r.input.base.kubeadm_command.is_empty());
    }

    #[test]
    fn test_unknown_kind() {
        assert!(BootstrapRequest::from_yaml("kind: Etcd\n").is_err());
    }
}
