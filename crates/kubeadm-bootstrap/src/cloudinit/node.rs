use serde::Deserialize;

use super::{generate, kubeadm_config_file, BaseUserData, KUBEADM_JOIN_CONFIG_PATH};
use crate::error::{ProvisioningError, Result};

const FLOW: &str = "worker join";

/// Input for joining a worker node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerJoinInput {
    #[serde(flatten)]
    pub base: BaseUserData,
    /// kubeadm `JoinConfiguration` document.
    #[serde(default)]
    pub join_configuration: String,
}

/// cloud-config for `kubeadm join` on a worker node.
pub(crate) fn worker_join_data(mut input: WorkerJoinInput) -> Result<Vec<u8>> {
    input.base.write_files.clear();
    input.base.control_plane = false;
    input
        .base
        .prepare()
        .map_err(|source| ProvisioningError::Render { flow: FLOW, source })?;

    let config = kubeadm_config_file(
        KUBEADM_JOIN_CONFIG_PATH,
        format!("---\n{}", input.join_configuration),
    );
    let kubeadm_line = format!(
        "{} && {}",
        input.base.kubeadm_command, input.base.sentinel_file_command
    );
    generate(FLOW, &input.base, &config, &kubeadm_line)
}
