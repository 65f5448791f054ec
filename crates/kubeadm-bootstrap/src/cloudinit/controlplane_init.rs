use serde::Deserialize;

use super::{
    generate, kubeadm_config_file, BaseUserData, CLOUD_CONFIG_HEADER, KUBEADM_INIT_CONFIG_PATH,
    SENTINEL_FILE_COMMAND,
};
use crate::certs::Certificates;
use crate::error::Result;

const FLOW: &str = "control-plane init";

/// Input for initializing the first control-plane node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneInitInput {
    #[serde(flatten)]
    pub base: BaseUserData,
    #[serde(default)]
    pub certificates: Certificates,
    /// kubeadm `ClusterConfiguration` document.
    #[serde(default)]
    pub cluster_configuration: String,
    /// kubeadm `InitConfiguration` document.
    #[serde(default)]
    pub init_configuration: String,
}

impl ControlPlaneInitInput {
    /// Both kubeadm documents as one multi-document YAML file.
    #[must_use]
    pub fn kubeadm_config(&self) -> String {
        format!(
            "---\n{}\n---\n{}",
            self.cluster_configuration, self.init_configuration
        )
    }
}

/// cloud-config for `kubeadm init`.
pub(crate) fn control_plane_init_data(mut input: ControlPlaneInitInput) -> Result<Vec<u8>> {
    let base = &mut input.base;
    base.header = CLOUD_CONFIG_HEADER.to_string();
    base.write_files = input.certificates.as_files();
    base.write_files.extend(base.additional_files.iter().cloned());
    base.sentinel_file_command = SENTINEL_FILE_COMMAND.to_string();

    let config = kubeadm_config_file(KUBEADM_INIT_CONFIG_PATH, input.kubeadm_config());
    let kubeadm_line = format!(
        "kubeadm init --config {KUBEADM_INIT_CONFIG_PATH} {} && {}",
        input.base.kubeadm_verbosity, input.base.sentinel_file_command
    );
    generate(FLOW, &input.base, &config, &kubeadm_line)
}
