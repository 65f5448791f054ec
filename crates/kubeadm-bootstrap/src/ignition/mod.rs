//! Ignition bootstrap data.
//!
//! The Ignition flavor reuses the cloud-init inputs: it assembles the same
//! files and commands, composes a single kubeadm config, and hands all of it
//! to a [`Transpiler`] that produces the final document.

mod clc;
mod provisioner;
mod transpiler;

use tracing::debug;

use crate::cloudinit::{self, BaseUserData};
use crate::error::{ProvisioningError, Result};
use crate::types::{ContainerLinuxConfig, IgnitionSpec};

pub use clc::{IgnitionTranspiler, IGNITION_SPEC_VERSION};
pub use provisioner::IgnitionProvisioner;
pub use transpiler::{Transpiled, Transpiler};

#[cfg(test)]
pub(crate) use transpiler::MockTranspiler;

/// Where the composed kubeadm config is written on the node.
pub const KUBEADM_CONFIG_PATH: &str = "/etc/kubeadm.yml";

const JOIN_SUBCOMMAND: &str = "join";
const INIT_SUBCOMMAND: &str = "init";

/// `kubeadm <subcommand> --config /etc/kubeadm.yml <verbosity>`.
fn kubeadm_command(subcommand: &str, verbosity: &str) -> String {
    format!("kubeadm {subcommand} --config {KUBEADM_CONFIG_PATH} {verbosity}")
}

/// Input for a worker node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerJoinInput {
    pub cloud_init: Option<cloudinit::WorkerJoinInput>,
    pub ignition: Option<IgnitionSpec>,
}

impl WorkerJoinInput {
    #[must_use]
    pub fn new(cloud_init: cloudinit::WorkerJoinInput, ignition: Option<IgnitionSpec>) -> Self {
        Self {
            cloud_init: Some(cloud_init),
            ignition,
        }
    }
}

/// Input for a control-plane node joining the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlPlaneJoinInput {
    pub cloud_init: Option<cloudinit::ControlPlaneJoinInput>,
    pub ignition: Option<IgnitionSpec>,
}

impl ControlPlaneJoinInput {
    #[must_use]
    pub fn new(
        cloud_init: cloudinit::ControlPlaneJoinInput,
        ignition: Option<IgnitionSpec>,
    ) -> Self {
        Self {
            cloud_init: Some(cloud_init),
            ignition,
        }
    }
}

/// Input for the control-plane node that initializes the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlPlaneInitInput {
    pub cloud_init: Option<cloudinit::ControlPlaneInitInput>,
    pub ignition: Option<IgnitionSpec>,
}

impl ControlPlaneInitInput {
    #[must_use]
    pub fn new(
        cloud_init: cloudinit::ControlPlaneInitInput,
        ignition: Option<IgnitionSpec>,
    ) -> Self {
        Self {
            cloud_init: Some(cloud_init),
            ignition,
        }
    }
}

/// Ignition data for a worker node joining the cluster.
pub fn worker_join_data<T: Transpiler + ?Sized>(
    input: Option<WorkerJoinInput>,
    transpiler: &T,
) -> Result<Transpiled> {
    let input = input.ok_or(ProvisioningError::NilInput("input"))?;
    let mut node = input
        .cloud_init
        .ok_or(ProvisioningError::NilInput("node input"))?;

    let base = &mut node.base;
    base.write_files.extend(base.additional_files.iter().cloned());
    base.kubeadm_command = kubeadm_command(JOIN_SUBCOMMAND, &base.kubeadm_verbosity);

    render(
        "worker join",
        &node.base,
        input.ignition.as_ref(),
        &node.join_configuration,
        transpiler,
    )
}

/// Ignition data for a control-plane node joining the cluster.
pub fn control_plane_join_data<T: Transpiler + ?Sized>(
    input: Option<ControlPlaneJoinInput>,
    transpiler: &T,
) -> Result<Transpiled> {
    let input = input.ok_or(ProvisioningError::NilInput("input"))?;
    let mut node = input
        .cloud_init
        .ok_or(ProvisioningError::NilInput("controlplane join input"))?;

    let base = &mut node.base;
    base.write_files = node.certificates.as_files();
    base.write_files.extend(base.additional_files.iter().cloned());
    base.kubeadm_command = kubeadm_command(JOIN_SUBCOMMAND, &base.kubeadm_verbosity);

    render(
        "control-plane join",
        &node.base,
        input.ignition.as_ref(),
        &node.join_configuration,
        transpiler,
    )
}

/// Ignition data for the control-plane node that initializes the cluster.
pub fn control_plane_init_data<T: Transpiler + ?Sized>(
    input: Option<ControlPlaneInitInput>,
    transpiler: &T,
) -> Result<Transpiled> {
    let input = input.ok_or(ProvisioningError::NilInput("input"))?;
    let mut node = input
        .cloud_init
        .ok_or(ProvisioningError::NilInput("controlplane input"))?;

    let base = &mut node.base;
    base.write_files = node.certificates.as_files();
    base.write_files.extend(base.additional_files.iter().cloned());
    base.kubeadm_command = kubeadm_command(INIT_SUBCOMMAND, &base.kubeadm_verbosity);

    let kubeadm_config = format!(
        "{}\n---\n{}",
        node.cluster_configuration, node.init_configuration
    );
    render(
        "control-plane init",
        &node.base,
        input.ignition.as_ref(),
        &kubeadm_config,
        transpiler,
    )
}

fn render<T: Transpiler + ?Sized>(
    flow: &'static str,
    input: &BaseUserData,
    ignition: Option<&IgnitionSpec>,
    kubeadm_config: &str,
    transpiler: &T,
) -> Result<Transpiled> {
    let default_config = ContainerLinuxConfig::default();
    let config = ignition
        .and_then(|spec| spec.container_linux_config.as_ref())
        .unwrap_or(&default_config);

    let transpiled = transpiler.transpile(input, config, kubeadm_config)?;
    debug!(
        flow,
        files = input.write_files.len(),
        bytes = transpiled.data.len(),
        format = %transpiled.format,
        "Generated Ignition config"
    );
    Ok(transpiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::{Certificates, KeyPair, Purpose, DEFAULT_CERTIFICATES_DIR};
    use crate::error::TranspileError;
    use crate::types::File;

    fn transpiled() -> Transpiled {
        Transpiled {
            data: b"{}".to_vec(),
            format: "ignition-test".to_string(),
        }
    }

    fn untouched() -> MockTranspiler {
        let mut transpiler = MockTranspiler::new();
        transpiler.expect_transpile().never();
        transpiler
    }

    #[test]
    fn test_nil_inputs() {
        let transpiler = untouched();

        let err = worker_join_data(None, &transpiler).unwrap_err();
        assert_eq!(err.to_string(), "input can't be nil");
        let err = worker_join_data(Some(WorkerJoinInput::default()), &transpiler).unwrap_err();
        assert_eq!(err.to_string(), "node input can't be nil");

        let err = control_plane_join_data(None, &transpiler).unwrap_err();
        assert!(matches!(err, ProvisioningError::NilInput("input")));
        let err =
            control_plane_join_data(Some(ControlPlaneJoinInput::default()), &transpiler).unwrap_err();
        assert!(matches!(err, ProvisioningError::NilInput("controlplane join input")));

        let err = control_plane_init_data(None, &transpiler).unwrap_err();
        assert!(matches!(err, ProvisioningError::NilInput("input")));
        let err =
            control_plane_init_data(Some(ControlPlaneInitInput::default()), &transpiler).unwrap_err();
        assert!(matches!(err, ProvisioningError::NilInput("controlplane input")));
    }

    #[test]
    fn test_init_composes_kubeadm_config_and_command() {
        let mut certificates = Certificates::control_plane(DEFAULT_CERTIFICATES_DIR);
        certificates.get_mut(Purpose::ClusterCa).unwrap().key_pair = Some(KeyPair {
            cert: "CERT".to_string(),
            key: "KEY".to_string(),
        });
        let node = cloudinit::ControlPlaneInitInput {
            base: BaseUserData {
                kubeadm_verbosity: "--v=2".to_string(),
                additional_files: vec![File::root_owned("/etc/extra", "0644", "x")],
                ..BaseUserData::default()
            },
            certificates,
            cluster_configuration: "clusterCfg".to_string(),
            init_configuration: "initCfg".to_string(),
        };

        let mut transpiler = MockTranspiler::new();
        transpiler
            .expect_transpile()
            .withf(|input, config, kubeadm_config| {
                let paths: Vec<_> = input.write_files.iter().map(|f| f.path.as_str()).collect();
                input.kubeadm_command == "kubeadm init --config /etc/kubeadm.yml --v=2"
                    && paths
                        == [
                            "/etc/kubernetes/pki/ca.crt",
                            "/etc/kubernetes/pki/ca.key",
                            "/etc/extra",
                        ]
                    && *config == ContainerLinuxConfig::default()
                    && kubeadm_config == "clusterCfg\n---\ninitCfg"
            })
            .times(1)
            .returning(|_, _, _| Ok(transpiled()));

        let out = control_plane_init_data(
            Some(ControlPlaneInitInput::new(node, None)),
            &transpiler,
        )
        .unwrap();
        assert_eq!(out, transpiled());
    }

    #[test]
    fn test_join_passes_override_config() {
        let override_config = ContainerLinuxConfig {
            additional_config: "systemd: {}".to_string(),
            strict: true,
        };
        let ignition = IgnitionSpec {
            container_linux_config: Some(override_config.clone()),
        };
        let node = cloudinit::WorkerJoinInput {
            base: BaseUserData {
                kubeadm_verbosity: "--v=3".to_string(),
                ..BaseUserData::default()
            },
            join_configuration: "joinCfg".to_string(),
        };

        let mut transpiler = MockTranspiler::new();
        transpiler
            .expect_transpile()
            .withf(move |input, config, kubeadm_config| {
                input.kubeadm_command == "kubeadm join --config /etc/kubeadm.yml --v=3"
                    && input.write_files.is_empty()
                    && *config == override_config
                    && kubeadm_config == "joinCfg"
            })
            .times(1)
            .returning(|_, _, _| Ok(transpiled()));

        worker_join_data(Some(WorkerJoinInput::new(node, Some(ignition))), &transpiler).unwrap();
    }

    #[test]
    fn test_control_plane_join_writes_certificates() {
        let mut certificates = Certificates::control_plane(DEFAULT_CERTIFICATES_DIR);
        certificates.get_mut(Purpose::EtcdCa).unwrap().key_pair = Some(KeyPair {
            cert: "ETCD CERT".to_string(),
            key: String::new(),
        });
        let node = cloudinit::ControlPlaneJoinInput {
            certificates,
            join_configuration: "joinCfg".to_string(),
            ..cloudinit::ControlPlaneJoinInput::default()
        };

        let mut transpiler = MockTranspiler::new();
        transpiler
            .expect_transpile()
            .withf(|input, _, kubeadm_config| {
                input.write_files.len() == 1
                    && input.write_files[0].path == "/etc/kubernetes/pki/etcd/ca.crt"
                    && input.kubeadm_command.starts_with("kubeadm join --config /etc/kubeadm.yml")
                    && kubeadm_config == "joinCfg"
            })
            .times(1)
            .returning(|_, _, _| Ok(transpiled()));

        control_plane_join_data(Some(ControlPlaneJoinInput::new(node, None)), &transpiler)
            .unwrap();
    }

    #[test]
    fn test_transpiler_errors_propagate_unchanged() {
        let mut transpiler = MockTranspiler::new();
        transpiler
            .expect_transpile()
            .returning(|_, _, _| {
                Err(TranspileError::StrictOverride {
                    path: "bogus".to_string(),
                    reason: "unknown key".to_string(),
                })
            });

        let err = worker_join_data(
            Some(WorkerJoinInput::new(cloudinit::WorkerJoinInput::default(), None)),
            &transpiler,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::Transpile(TranspileError::StrictOverride { .. })
        ));
        assert_eq!(
            err.to_string(),
            "strict additional config rejected at bogus: unknown key"
        );
    }
}
