//! Bootstrap API value types.
//!
//! These mirror the user-facing fields of a kubeadm bootstrap config: files to
//! write, users, NTP, disk layout and mounts. They carry no behavior beyond
//! small accessors; each generator decides how they are encoded.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Owner used for every file this crate writes on its own behalf.
pub const ROOT_OWNER: &str = "root:root";

/// Encoding of a [`File`]'s content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEncoding {
    /// Content is base64 encoded.
    #[serde(rename = "base64")]
    Base64,
    /// Content is gzip compressed.
    #[serde(rename = "gzip")]
    Gzip,
    /// Content is gzip compressed, then base64 encoded.
    #[serde(rename = "gzip+base64")]
    GzipBase64,
}

impl FileEncoding {
    /// The name used for this encoding in cloud-config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::Gzip => "gzip",
            Self::GzipBase64 => "gzip+base64",
        }
    }
}

impl fmt::Display for FileEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file to write on the node before kubeadm runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path of the file on the node.
    pub path: String,
    /// Ownership in `user:group` form.
    #[serde(default)]
    pub owner: String,
    /// Octal permission string, e.g. `0640`.
    #[serde(default)]
    pub permissions: String,
    /// Content encoding, `None` for plain text.
    #[serde(default)]
    pub encoding: Option<FileEncoding>,
    /// Append to an existing file instead of replacing it.
    #[serde(default)]
    pub append: bool,
    /// File content.
    #[serde(default)]
    pub content: String,
}

impl File {
    /// Create a `root:root` owned file.
    #[must_use]
    pub fn root_owned(
        path: impl Into<String>,
        permissions: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            owner: ROOT_OWNER.to_string(),
            permissions: permissions.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Split the owner into its user and group halves.
    ///
    /// An owner without a colon is a bare user name.
    #[must_use]
    pub fn owner_parts(&self) -> (Option<&str>, Option<&str>) {
        fn non_empty(s: &str) -> Option<&str> {
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }

        match self.owner.split_once(':') {
            Some((user, group)) => (non_empty(user), non_empty(group)),
            None => (non_empty(&self.owner), None),
        }
    }
}

/// A user account to create on the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub gecos: Option<String>,
    /// Comma separated supplementary groups.
    #[serde(default)]
    pub groups: Option<String>,
    #[serde(default)]
    pub home_dir: Option<String>,
    #[serde(default)]
    pub inactive: Option<bool>,
    #[serde(default)]
    pub shell: Option<String>,
    /// Hashed password.
    #[serde(default)]
    pub passwd: Option<String>,
    #[serde(default)]
    pub primary_group: Option<String>,
    #[serde(default)]
    pub lock_password: Option<bool>,
    /// Sudo rule, e.g. `ALL=(ALL) NOPASSWD:ALL`.
    #[serde(default)]
    pub sudo: Option<String>,
    #[serde(default)]
    pub ssh_authorized_keys: Vec<String>,
}

impl User {
    /// Supplementary groups as a list.
    #[must_use]
    pub fn group_list(&self) -> Vec<&str> {
        self.groups
            .as_deref()
            .map(|groups| {
                groups
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// NTP client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ntp {
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl Ntp {
    /// Whether NTP is explicitly enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

/// Partitions and filesystems to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSetup {
    #[serde(default)]
    pub partitions: Vec<Partition>,
    #[serde(default)]
    pub filesystems: Vec<Filesystem>,
}

/// Partition table of a single device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub device: String,
    /// Create a single partition spanning the whole device.
    #[serde(default)]
    pub layout: bool,
    #[serde(default)]
    pub overwrite: Option<bool>,
    /// `mbr` or `gpt`.
    #[serde(default)]
    pub table_type: Option<String>,
}

/// A filesystem to create on a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filesystem {
    pub device: String,
    /// Filesystem type, e.g. `ext4`.
    pub filesystem: String,
    pub label: String,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub replace_fs: Option<String>,
    #[serde(default)]
    pub extra_opts: Vec<String>,
}

/// A mount entry: `[device-or-label, mountpoint, options...]`.
pub type MountPoints = Vec<String>;

/// Ignition specific options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionSpec {
    #[serde(default)]
    pub container_linux_config: Option<ContainerLinuxConfig>,
}

/// User supplied configuration merged into the generated Ignition document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerLinuxConfig {
    /// YAML document in Ignition's own schema.
    #[serde(default)]
    pub additional_config: String,
    /// Treat unknown keys and type conflicts in `additional_config` as errors.
    #[serde(default)]
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_parts() {
        let file = File::root_owned("/etc/x", "0640", "x");
        assert_eq!(file.owner_parts(), (Some("root"), Some("root")));

        let file = File {
            owner: "core".to_string(),
            ..File::default()
        };
        assert_eq!(file.owner_parts(), (Some("core"), None));

        let file = File {
            owner: ":wheel".to_string(),
            ..File::default()
        };
        assert_eq!(file.owner_parts(), (None, Some("wheel")));

        assert_eq!(File::default().owner_parts(), (None, None));
    }

    #[test]
    fn test_group_list() {
        let user = User {
            name: "ops".to_string(),
            groups: Some("wheel, docker,,adm".to_string()),
            ..User::default()
        };
        assert_eq!(user.group_list(), vec!["wheel", "docker", "adm"]);
        assert!(User::default().group_list().is_empty());
    }

    #[test]
    fn test_file_from_yaml() {
        let file: File = serde_yaml::from_str(
            "path: /etc/motd\nowner: root:root\npermissions: '0644'\nencoding: gzip+base64\ncontent: aGk=\n",
        )
        .unwrap();
        assert_eq!(file.encoding, Some(FileEncoding::GzipBase64));
        assert_eq!(file.permissions, "0644");
        assert!(!file.append);
    }
}
