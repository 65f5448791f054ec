use crate::cloudinit::BaseUserData;
use crate::error::TranspileError;
use crate::types::ContainerLinuxConfig;

/// Encoded output of a [`Transpiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transpiled {
    /// The encoded document.
    pub data: Vec<u8>,
    /// Sub-encoding of `data`, used to label the stored bootstrap secret.
    pub format: String,
}

/// Turns assembled files and commands into the final declarative document.
#[cfg_attr(test, mockall::automock)]
pub trait Transpiler: Send + Sync {
    /// Encode `input` with `kubeadm_config` as the kubeadm config file,
    /// applying the caller's `config` overrides.
    fn transpile(
        &self,
        input: &BaseUserData,
        config: &ContainerLinuxConfig,
        kubeadm_config: &str,
    ) -> Result<Transpiled, TranspileError>;
}
