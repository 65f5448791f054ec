//! cloud-init (`#cloud-config`) bootstrap data.
//!
//! Every document has the same skeleton: header, files, `bootcmd`, `runcmd`
//! (pre-commands, the kubeadm line, post-commands), then NTP, users, disk
//! setup, filesystem setup and mounts. Optional sections are left out entirely
//! when they have nothing to say.

mod controlplane_init;
mod controlplane_join;
mod document;
mod join_script;
mod node;
mod provisioner;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ProvisioningError, RenderError, Result};
use crate::types::{DiskSetup, File, MountPoints, Ntp, User};

pub use controlplane_init::ControlPlaneInitInput;
pub use controlplane_join::ControlPlaneJoinInput;
pub use node::WorkerJoinInput;
pub use provisioner::CloudInitProvisioner;

pub(crate) use controlplane_init::control_plane_init_data;
pub(crate) use controlplane_join::control_plane_join_data;
pub(crate) use node::worker_join_data;

use document::CloudConfigBuilder;

/// Preamble of every cloud-config document.
pub const CLOUD_CONFIG_HEADER: &str = "## template: jinja\n#cloud-config\n";

/// Marks a node as bootstrapped; written in a way that works on Linux and Windows.
pub const SENTINEL_FILE_COMMAND: &str =
    "echo success > /run/cluster-api/bootstrap-success.complete";

/// kubeadm config written for `kubeadm init`.
pub const KUBEADM_INIT_CONFIG_PATH: &str = "/run/kubeadm/kubeadm.yaml";

/// kubeadm config written for `kubeadm join`.
pub const KUBEADM_JOIN_CONFIG_PATH: &str = "/run/kubeadm/kubeadm-join-config.yaml";

/// Placeholder that creates `/run/cluster-api` on Linux and Windows alike.
pub const PLACEHOLDER_PATH: &str = "/run/cluster-api/placeholder";

/// Script that replaces the join command when retries are enabled.
pub const RETRIABLE_JOIN_SCRIPT_NAME: &str = "/usr/local/bin/kubeadm-bootstrap-script";

const PLACEHOLDER_CONTENT: &str = "This placeholder file is used to create the /run/cluster-api sub directory in a way that is compatible with both Linux and Windows (mkdir -p /run/cluster-api does not work with Windows)";
const KUBEADM_CONFIG_PERMISSIONS: &str = "0640";
const RETRIABLE_JOIN_SCRIPT_OWNER: &str = "root";
const RETRIABLE_JOIN_SCRIPT_PERMISSIONS: &str = "0755";

/// The join command used unless retries are enabled.
#[must_use]
pub fn standard_join_command(verbosity: &str) -> String {
    format!("kubeadm join --config {KUBEADM_JOIN_CONFIG_PATH} {verbosity}")
}

/// Fields shared by every role's input.
///
/// The derived fields are filled in by the generators and cannot be supplied
/// from a request file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseUserData {
    #[serde(skip)]
    pub header: String,
    #[serde(default)]
    pub boot_commands: Vec<String>,
    #[serde(default)]
    pub pre_kubeadm_commands: Vec<String>,
    #[serde(default)]
    pub post_kubeadm_commands: Vec<String>,
    /// Caller supplied files, written after the mandatory ones.
    #[serde(default)]
    pub additional_files: Vec<File>,
    /// Files written by the document, assembled by the generators.
    #[serde(skip)]
    pub write_files: Vec<File>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub ntp: Option<Ntp>,
    #[serde(default)]
    pub disk_setup: Option<DiskSetup>,
    #[serde(default)]
    pub mounts: Vec<MountPoints>,
    #[serde(skip)]
    pub control_plane: bool,
    /// Join through [`RETRIABLE_JOIN_SCRIPT_NAME`], retrying each phase.
    #[serde(default)]
    pub use_experimental_retry: bool,
    #[serde(skip)]
    pub kubeadm_command: String,
    /// Appended to the kubeadm invocation, e.g. `--v=2`.
    #[serde(default)]
    pub kubeadm_verbosity: String,
    #[serde(skip)]
    pub sentinel_file_command: String,
}

impl BaseUserData {
    /// Fill in the derived fields for a join flow.
    ///
    /// Additional files are appended to whatever `write_files` already holds.
    /// With retries enabled the join command becomes the retry script, which
    /// is rendered for a control-plane or worker node depending on
    /// `control_plane`.
    pub(crate) fn prepare(&mut self) -> std::result::Result<(), RenderError> {
        self.header = CLOUD_CONFIG_HEADER.to_string();
        self.write_files
            .extend(self.additional_files.iter().cloned());
        self.sentinel_file_command = SENTINEL_FILE_COMMAND.to_string();
        self.kubeadm_command = standard_join_command(&self.kubeadm_verbosity);

        if self.use_experimental_retry {
            let script = join_script::render(self)?;
            self.kubeadm_command = RETRIABLE_JOIN_SCRIPT_NAME.to_string();
            self.write_files.push(File {
                path: RETRIABLE_JOIN_SCRIPT_NAME.to_string(),
                owner: RETRIABLE_JOIN_SCRIPT_OWNER.to_string(),
                permissions: RETRIABLE_JOIN_SCRIPT_PERMISSIONS.to_string(),
                content: script,
                ..File::default()
            });
        }
        Ok(())
    }
}

/// Render the full document for `flow`.
///
/// `kubeadm_config` is the mandatory config file placed after `write_files`;
/// `kubeadm_line` is the complete `runcmd` entry that runs kubeadm and the
/// sentinel.
fn generate(
    flow: &'static str,
    input: &BaseUserData,
    kubeadm_config: &File,
    kubeadm_line: &str,
) -> Result<Vec<u8>> {
    let render = || -> std::result::Result<String, RenderError> {
        let mut doc = CloudConfigBuilder::new(&input.header);
        doc.write_files(&input.write_files)?;
        doc.file(kubeadm_config)?;
        doc.placeholder(PLACEHOLDER_PATH, PLACEHOLDER_CONTENT)?;
        doc.boot_commands(&input.boot_commands)?;
        doc.run_commands(
            &input.pre_kubeadm_commands,
            kubeadm_line,
            &input.post_kubeadm_commands,
        )?;
        doc.ntp(input.ntp.as_ref())?;
        doc.users(&input.users)?;
        doc.disk_setup(input.disk_setup.as_ref())?;
        doc.fs_setup(input.disk_setup.as_ref())?;
        doc.mounts(&input.mounts)?;
        Ok(doc.finish())
    };

    let data = render().map_err(|source| ProvisioningError::Render { flow, source })?;
    debug!(
        flow,
        files = input.write_files.len() + 2,
        bytes = data.len(),
        "Generated cloud-config"
    );
    Ok(data.into_bytes())
}

/// `kubeadm_config` at `path` with the fixed owner and mode.
fn kubeadm_config_file(path: &str, content: String) -> File {
    File::root_owned(path, KUBEADM_CONFIG_PERMISSIONS, content)
}
