//! Built-in transpiler producing Ignition spec 3.4.0 JSON.
//!
//! kubeadm runs from a oneshot `kubeadm.service` that executes
//! `/etc/kubeadm.sh`. The script runs under `set -e`, so the sentinel only
//! lands after kubeadm succeeded, and it moves the kubeadm config away so the
//! unit does not run again on the next boot.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::transpiler::{Transpiled, Transpiler};
use super::KUBEADM_CONFIG_PATH;
use crate::cloudinit::{BaseUserData, SENTINEL_FILE_COMMAND};
use crate::error::TranspileError;
use crate::types::{ContainerLinuxConfig, File, FileEncoding, Ntp, User};

/// Ignition spec version of the generated documents.
pub const IGNITION_SPEC_VERSION: &str = "3.4.0";

const KUBEADM_SCRIPT_PATH: &str = "/etc/kubeadm.sh";
const NTP_CONF_PATH: &str = "/etc/ntp.conf";
const SUDOERS_DIR: &str = "/etc/sudoers.d";

/// Top-level keys accepted in the additional config.
const OVERRIDE_KEYS: [&str; 5] = ["ignition", "kernelArguments", "passwd", "storage", "systemd"];

const KUBEADM_UNIT: &str = "\
[Unit]
Description=kubeadm
# Gone after the first successful run.
ConditionPathExists=/etc/kubeadm.yml
Wants=network-online.target
After=network-online.target

[Service]
Type=oneshot
ExecStart=/etc/kubeadm.sh

[Install]
WantedBy=multi-user.target
";

const NTP_RESTRICTIONS: &str = "\
restrict default nomodify nopeer noquery notrap limited kod
restrict 127.0.0.1
restrict [::1]
";

/// Transpiles to Ignition without any external tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnitionTranspiler;

impl IgnitionTranspiler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transpiler for IgnitionTranspiler {
    fn transpile(
        &self,
        input: &BaseUserData,
        config: &ContainerLinuxConfig,
        kubeadm_config: &str,
    ) -> Result<Transpiled, TranspileError> {
        let document = Config::build(input, kubeadm_config)?;
        let mut value = serde_json::to_value(&document)?;
        apply_override(&mut value, config)?;

        let version = value
            .pointer("/ignition/version")
            .and_then(Value::as_str)
            .unwrap_or(IGNITION_SPEC_VERSION);
        let format = format!("ignition-{version}");

        Ok(Transpiled {
            data: serde_json::to_vec(&value)?,
            format,
        })
    }
}

#[derive(Debug, Serialize)]
struct Config {
    ignition: IgnitionMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    passwd: Option<Passwd>,
    storage: Storage,
    systemd: Systemd,
}

#[derive(Debug, Serialize)]
struct IgnitionMeta {
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct Passwd {
    users: Vec<PasswdUser>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswdUser {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gecos: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    home_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shell: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ssh_authorized_keys: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct Storage {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    disks: Vec<Disk>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filesystems: Vec<Filesystem>,
    files: Vec<IgnitionFile>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Disk {
    device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wipe_table: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    partitions: Vec<WholeDisk>,
}

/// A partition with every field defaulted: number auto, size fills the disk.
#[derive(Debug, Serialize)]
struct WholeDisk {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Filesystem {
    device: String,
    format: String,
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wipe_filesystem: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IgnitionFile {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<Named>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<Named>,
    #[serde(skip_serializing_if = "Option::is_none")]
    overwrite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contents: Option<Resource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    append: Vec<Resource>,
}

#[derive(Debug, Serialize)]
struct Named {
    name: String,
}

#[derive(Debug, Serialize)]
struct Resource {
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<&'static str>,
    source: String,
}

impl Resource {
    fn inline(content: &str) -> Self {
        Self {
            compression: None,
            source: format!("data:;base64,{}", STANDARD.encode(content)),
        }
    }
}

#[derive(Debug, Serialize)]
struct Systemd {
    units: Vec<Unit>,
}

#[derive(Debug, Serialize)]
struct Unit {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contents: Option<String>,
}

impl Config {
    fn build(input: &BaseUserData, kubeadm_config: &str) -> Result<Self, TranspileError> {
        let mut files = input
            .write_files
            .iter()
            .map(ignition_file)
            .collect::<Result<Vec<_>, _>>()?;
        files.extend(input.users.iter().filter_map(sudoers_file));
        files.push(inline_file(
            KUBEADM_SCRIPT_PATH,
            0o700,
            &kubeadm_script(input),
        ));
        files.push(inline_file(
            KUBEADM_CONFIG_PATH,
            0o600,
            &format!("---\n{kubeadm_config}"),
        ));
        if let Some(conf) = input.ntp.as_ref().and_then(ntp_conf) {
            files.push(inline_file(NTP_CONF_PATH, 0o644, &conf));
        }

        let mut units = vec![Unit {
            name: "kubeadm.service".to_string(),
            enabled: Some(true),
            contents: Some(KUBEADM_UNIT.to_string()),
        }];
        if input.ntp.as_ref().is_some_and(Ntp::is_enabled) {
            units.push(Unit {
                name: "ntpd.service".to_string(),
                enabled: Some(true),
                contents: None,
            });
        }
        units.extend(input.mounts.iter().map(Vec::as_slice).filter_map(mount_unit));

        let disk_setup = input.disk_setup.as_ref();
        let disks = disk_setup
            .map(|d| d.partitions.iter().map(disk).collect())
            .unwrap_or_default();
        let filesystems = disk_setup
            .map(|d| d.filesystems.iter().map(filesystem).collect())
            .unwrap_or_default();

        let passwd = if input.users.is_empty() {
            None
        } else {
            Some(Passwd {
                users: input.users.iter().map(passwd_user).collect(),
            })
        };

        Ok(Self {
            ignition: IgnitionMeta {
                version: IGNITION_SPEC_VERSION,
            },
            passwd,
            storage: Storage {
                disks,
                filesystems,
                files,
            },
            systemd: Systemd { units },
        })
    }
}

fn ignition_file(file: &File) -> Result<IgnitionFile, TranspileError> {
    let mode = parse_mode(file)?;
    let resource = match file.encoding {
        None => Resource::inline(&file.content),
        Some(FileEncoding::Base64) => Resource {
            compression: None,
            source: base64_source(&file.content),
        },
        Some(FileEncoding::GzipBase64) => Resource {
            compression: Some("gzip"),
            source: base64_source(&file.content),
        },
        Some(encoding @ FileEncoding::Gzip) => {
            return Err(TranspileError::UnsupportedEncoding {
                path: file.path.clone(),
                encoding: encoding.to_string(),
            });
        }
    };

    let (user, group) = file.owner_parts();
    let named = |name: Option<&str>| {
        name.map(|name| Named {
            name: name.to_string(),
        })
    };

    let (overwrite, contents, append) = if file.append {
        (None, None, vec![resource])
    } else {
        (Some(true), Some(resource), Vec::new())
    };

    Ok(IgnitionFile {
        path: file.path.clone(),
        mode,
        user: named(user),
        group: named(group),
        overwrite,
        contents,
        append,
    })
}

fn inline_file(path: &str, mode: u32, content: &str) -> IgnitionFile {
    IgnitionFile {
        path: path.to_string(),
        mode: Some(mode),
        user: None,
        group: None,
        overwrite: Some(true),
        contents: Some(Resource::inline(content)),
        append: Vec::new(),
    }
}

fn parse_mode(file: &File) -> Result<Option<u32>, TranspileError> {
    let permissions = file.permissions.trim();
    if permissions.is_empty() {
        return Ok(None);
    }
    let digits = permissions.strip_prefix("0o").unwrap_or(permissions);
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .map(Some)
        .ok_or_else(|| TranspileError::InvalidPermissions {
            path: file.path.clone(),
            permissions: file.permissions.clone(),
        })
}

fn base64_source(content: &str) -> String {
    let encoded: String = content.split_whitespace().collect();
    format!("data:;base64,{encoded}")
}

fn kubeadm_script(input: &BaseUserData) -> String {
    let mut script = String::from("#!/bin/bash\nset -e\n\n");
    for command in &input.pre_kubeadm_commands {
        script.push_str(command);
        script.push('\n');
    }
    script.push_str(&input.kubeadm_command);
    script.push('\n');
    script.push_str("mkdir -p /run/cluster-api && ");
    script.push_str(SENTINEL_FILE_COMMAND);
    script.push('\n');
    script.push_str(&format!("mv {KUBEADM_CONFIG_PATH} /tmp/\n"));
    for command in &input.post_kubeadm_commands {
        script.push_str(command);
        script.push('\n');
    }
    script
}

fn ntp_conf(ntp: &Ntp) -> Option<String> {
    if !ntp.is_enabled() || ntp.servers.is_empty() {
        return None;
    }
    let mut conf = String::from("# Common pool\n");
    for server in &ntp.servers {
        conf.push_str("server ");
        conf.push_str(server);
        conf.push('\n');
    }
    conf.push('\n');
    conf.push_str(NTP_RESTRICTIONS);
    Some(conf)
}

fn passwd_user(user: &User) -> PasswdUser {
    PasswdUser {
        name: user.name.clone(),
        gecos: user.gecos.clone(),
        groups: user.group_list().into_iter().map(str::to_string).collect(),
        home_dir: user.home_dir.clone(),
        shell: user.shell.clone(),
        password_hash: user.passwd.clone(),
        primary_group: user.primary_group.clone(),
        ssh_authorized_keys: user.ssh_authorized_keys.clone(),
    }
}

/// Ignition has no sudo field; rules go to a sudoers drop-in instead.
fn sudoers_file(user: &User) -> Option<IgnitionFile> {
    let rule = user.sudo.as_deref()?;
    Some(inline_file(
        &format!("{SUDOERS_DIR}/{}", user.name),
        0o440,
        &format!("{} {rule}\n", user.name),
    ))
}

fn disk(partition: &crate::types::Partition) -> Disk {
    Disk {
        device: partition.device.clone(),
        wipe_table: partition.overwrite,
        partitions: if partition.layout {
            vec![WholeDisk {}]
        } else {
            Vec::new()
        },
    }
}

fn filesystem(fs: &crate::types::Filesystem) -> Filesystem {
    Filesystem {
        device: partition_device(&fs.device, fs.partition.as_deref()),
        format: fs.filesystem.clone(),
        label: fs.label.clone(),
        wipe_filesystem: fs.overwrite,
        options: fs.extra_opts.clone(),
    }
}

/// Device node of a numbered partition; `auto`, `any` and `none` keep the device.
fn partition_device(device: &str, partition: Option<&str>) -> String {
    match partition {
        Some(number) if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) => {
            if device.ends_with(|c: char| c.is_ascii_digit()) {
                format!("{device}p{number}")
            } else {
                format!("{device}{number}")
            }
        }
        _ => device.to_string(),
    }
}

fn mount_unit(mount: &[String]) -> Option<Unit> {
    let [source, mountpoint, options @ ..] = mount else {
        warn!(?mount, "Skipping mount entry without a mountpoint");
        return None;
    };

    let what = if source.starts_with('/') {
        source.clone()
    } else {
        format!("/dev/disk/by-label/{source}")
    };
    let mut contents = format!(
        "[Unit]\nDescription=Mount {source}\n\n[Mount]\nWhat={what}\nWhere={mountpoint}\n"
    );
    if !options.is_empty() {
        contents.push_str(&format!("Options={}\n", options.join(",")));
    }
    contents.push_str("\n[Install]\nWantedBy=multi-user.target\n");

    Some(Unit {
        name: mount_unit_name(mountpoint),
        enabled: Some(true),
        contents: Some(contents),
    })
}

/// systemd unit name for a mountpoint, escaped like `systemd-escape --path`.
fn mount_unit_name(mountpoint: &str) -> String {
    let mut name = String::new();
    for (i, component) in mountpoint.split('/').filter(|c| !c.is_empty()).enumerate() {
        if i > 0 {
            name.push('-');
        }
        for (j, byte) in component.bytes().enumerate() {
            let first = i == 0 && j == 0;
            if byte.is_ascii_alphanumeric() || byte == b':' || byte == b'_' || (byte == b'.' && !first)
            {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("\\x{byte:02x}"));
            }
        }
    }
    if name.is_empty() {
        name.push('-');
    }
    name.push_str(".mount");
    name
}

/// Deep-merge the additional config over the generated document.
///
/// Maps merge key by key, lists append and scalars replace.
fn apply_override(document: &mut Value, config: &ContainerLinuxConfig) -> Result<(), TranspileError> {
    if config.additional_config.trim().is_empty() {
        return Ok(());
    }
    let parsed: serde_yaml::Value = serde_yaml::from_str(&config.additional_config)?;
    let overlay = serde_json::to_value(parsed)?;

    if overlay.is_null() {
        return Ok(());
    }
    let Value::Object(overlay) = overlay else {
        return reject(config.strict, "<root>", "additional config must be a mapping");
    };
    let Value::Object(target) = document else {
        return Ok(());
    };

    for (key, value) in overlay {
        if !OVERRIDE_KEYS.contains(&key.as_str()) {
            reject(config.strict, &key, "unknown key")?;
            continue;
        }
        let path = key.clone();
        merge(
            target.entry(key).or_insert(Value::Null),
            value,
            &path,
            config.strict,
        )?;
    }
    Ok(())
}

fn merge(target: &mut Value, overlay: Value, path: &str, strict: bool) -> Result<(), TranspileError> {
    if target.is_null() {
        *target = overlay;
        return Ok(());
    }
    match overlay {
        Value::Null => {}
        Value::Object(overlay) => {
            let Some(target) = target.as_object_mut() else {
                return reject(strict, path, "expected a mapping");
            };
            for (key, value) in overlay {
                let child = format!("{path}.{key}");
                merge(target.entry(key).or_insert(Value::Null), value, &child, strict)?;
            }
        }
        Value::Array(overlay) => {
            let Some(target) = target.as_array_mut() else {
                return reject(strict, path, "expected a list");
            };
            target.extend(overlay);
        }
        scalar => {
            if target.is_object() || target.is_array() {
                return reject(strict, path, "expected a scalar");
            }
            *target = scalar;
        }
    }
    Ok(())
}

fn reject(strict: bool, path: &str, reason: &str) -> Result<(), TranspileError> {
    if strict {
        return Err(TranspileError::StrictOverride {
            path: path.to_string(),
            reason: reason.to_string(),
        });
    }
    warn!(path, reason, "Ignoring additional config entry");
    Ok(())
}
