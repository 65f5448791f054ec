use serde::Deserialize;

use super::{generate, kubeadm_config_file, BaseUserData, KUBEADM_JOIN_CONFIG_PATH};
use crate::certs::Certificates;
use crate::error::{ProvisioningError, Result};

const FLOW: &str = "control-plane join";

/// Input for joining an additional control-plane node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneJoinInput {
    #[serde(flatten)]
    pub base: BaseUserData,
    /// Cluster certificates the joining node must already trust.
    #[serde(default)]
    pub certificates: Certificates,
    #[serde(default)]
    pub bootstrap_token: String,
    /// kubeadm `JoinConfiguration` document.
    #[serde(default)]
    pub join_configuration: String,
}

/// cloud-config for `kubeadm join` on a control-plane node.
pub(crate) fn control_plane_join_data(mut input: ControlPlaneJoinInput) -> Result<Vec<u8>> {
    // TODO: check that the certificates needed for stacked or external etcd are all present
    input.base.write_files = input.certificates.as_files();
    input.base.control_plane = true;
    input
        .base
        .prepare()
        .map_err(|source| ProvisioningError::Render { flow: FLOW, source })?;

    let config = kubeadm_config_file(KUBEADM_JOIN_CONFIG_PATH, input.join_configuration);
    let kubeadm_line = format!(
        "{} && {}",
        input.base.kubeadm_command, input.base.sentinel_file_command
    );
    generate(FLOW, &input.base, &config, &kubeadm_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::{KeyPair, Purpose, DEFAULT_CERTIFICATES_DIR};
    use crate::cloudinit::RETRIABLE_JOIN_SCRIPT_NAME;

    fn input() -> ControlPlaneJoinInput {
        let mut certificates = Certificates::control_plane(DEFAULT_CERTIFICATES_DIR);
        for cert in &mut certificates.0 {
            cert.key_pair = Some(KeyPair {
                cert: format!("{} cert", cert.purpose),
                key: format!("{} key", cert.purpose),
            });
        }
        ControlPlaneJoinInput {
            base: BaseUserData {
                kubeadm_verbosity: "--v=4".to_string(),
                pre_kubeadm_commands: vec!["echo pre".to_string()],
                post_kubeadm_commands: vec!["echo post".to_string()],
                ..BaseUserData::default()
            },
            certificates,
            bootstrap_token: "abcdef.0123456789abcdef".to_string(),
            join_configuration: "joinCfg".to_string(),
        }
    }

    fn render(input: ControlPlaneJoinInput) -> String {
        String::from_utf8(control_plane_join_data(input).unwrap()).unwrap()
    }

    #[test]
    fn test_join_line_runs_once_before_sentinel() {
        let out = render(input());
        let line = "  - 'kubeadm join --config /run/kubeadm/kubeadm-join-config.yaml --v=4 && echo success > /run/cluster-api/bootstrap-success.complete'\n";
        assert_eq!(out.matches("kubeadm join --config").count(), 1);
        assert!(out.contains(&format!("runcmd:\n  - \"echo pre\"\n{line}  - \"echo post\"\n")));
    }

    #[test]
    fn test_writes_certificates_and_join_config() {
        let out = render(input());
        assert!(out.contains("-   path: /etc/kubernetes/pki/ca.crt\n"));
        assert!(out.contains("-   path: /etc/kubernetes/pki/etcd/ca.key\n    owner: root:root\n    permissions: '0600'\n"));
        assert!(out.contains(
            "-   path: /run/kubeadm/kubeadm-join-config.yaml\n    owner: root:root\n    permissions: '0640'\n    content: |\n      joinCfg\n"
        ));
        assert!(
            out.find("sa.key").unwrap() < out.find("kubeadm-join-config.yaml").unwrap()
        );
    }

    #[test]
    fn test_retry_script_runs_control_plane_phases() {
        let mut input = input();
        input.base.use_experimental_retry = true;

        let out = render(input);
        assert!(out.contains(&format!("-   path: {RETRIABLE_JOIN_SCRIPT_NAME}\n    owner: root\n    permissions: '0755'\n")));
        assert!(out.contains("control-plane-prepare download-certs"));
        assert!(out.contains(&format!(
            "  - '{RETRIABLE_JOIN_SCRIPT_NAME} && echo success > /run/cluster-api/bootstrap-success.complete'\n"
        )));
        assert!(!out.contains("kubeadm join --config /run/kubeadm/kubeadm-join-config.yaml --v=4 &&"));
    }

    #[test]
    fn test_output_is_valid_yaml() {
        let mut input = input();
        input.base.use_experimental_retry = true;
        let out = render(input);
        let parsed: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        let runcmd = parsed["runcmd"].as_sequence().unwrap();
        assert_eq!(runcmd.len(), 3);
    }
}
