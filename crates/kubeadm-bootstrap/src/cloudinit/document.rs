//! Section by section cloud-config writer.
//!
//! Sections backed by an empty collection are skipped outright, so any subset
//! of them can be absent and the document stays valid YAML.

use std::fmt::{self, Write};

use crate::types::{DiskSetup, File, MountPoints, Ntp, User};

/// Indentation of file content under `content: |`.
const CONTENT_INDENT: usize = 6;

/// Prefix every line of `input` with `spaces` spaces.
pub(crate) fn indent(input: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    let mut out = String::with_capacity(input.len() + pad.len());
    for (i, line) in input.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&pad);
        out.push_str(line);
    }
    out
}

/// YAML double-quoted scalar.
pub(crate) fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// YAML single-quoted scalar.
pub(crate) fn single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) struct CloudConfigBuilder {
    doc: String,
}

impl CloudConfigBuilder {
    /// Start a document; a blank line follows the header.
    pub(crate) fn new(header: &str) -> Self {
        let mut doc = String::with_capacity(4096);
        doc.push_str(header);
        doc.push('\n');
        Self { doc }
    }

    /// `write_files:` followed by `files`.
    ///
    /// The key is always written since every flow adds mandatory files after it.
    pub(crate) fn write_files(&mut self, files: &[File]) -> fmt::Result {
        writeln!(self.doc, "write_files:")?;
        for file in files {
            self.file(file)?;
        }
        Ok(())
    }

    /// A single `write_files` entry with block content.
    pub(crate) fn file(&mut self, file: &File) -> fmt::Result {
        writeln!(self.doc, "-   path: {}", file.path)?;
        if let Some(encoding) = file.encoding {
            writeln!(self.doc, "    encoding: \"{encoding}\"")?;
        }
        if !file.owner.is_empty() {
            writeln!(self.doc, "    owner: {}", file.owner)?;
        }
        if !file.permissions.is_empty() {
            writeln!(self.doc, "    permissions: '{}'", file.permissions)?;
        }
        if file.append {
            writeln!(self.doc, "    append: true")?;
        }
        writeln!(self.doc, "    content: |")?;
        writeln!(self.doc, "{}", indent(&file.content, CONTENT_INDENT))
    }

    /// The placeholder entry, whose content is a quoted scalar.
    pub(crate) fn placeholder(&mut self, path: &str, content: &str) -> fmt::Result {
        writeln!(self.doc, "-   path: {path}")?;
        writeln!(self.doc, "    owner: root:root")?;
        writeln!(self.doc, "    permissions: '0640'")?;
        writeln!(self.doc, "    content: {}", double_quoted(content))
    }

    pub(crate) fn boot_commands(&mut self, commands: &[String]) -> fmt::Result {
        if commands.is_empty() {
            return Ok(());
        }
        writeln!(self.doc, "bootcmd:")?;
        self.commands(commands)
    }

    /// `runcmd:` with the kubeadm line between pre and post commands.
    pub(crate) fn run_commands(
        &mut self,
        pre: &[String],
        kubeadm_line: &str,
        post: &[String],
    ) -> fmt::Result {
        writeln!(self.doc, "runcmd:")?;
        self.commands(pre)?;
        writeln!(self.doc, "  - {}", single_quoted(kubeadm_line))?;
        self.commands(post)
    }

    fn commands(&mut self, commands: &[String]) -> fmt::Result {
        for command in commands {
            writeln!(self.doc, "  - {}", double_quoted(command))?;
        }
        Ok(())
    }

    /// `ntp:`, written when there are servers or NTP is enabled.
    pub(crate) fn ntp(&mut self, ntp: Option<&Ntp>) -> fmt::Result {
        let Some(ntp) = ntp else {
            return Ok(());
        };
        if ntp.servers.is_empty() && !ntp.is_enabled() {
            return Ok(());
        }
        writeln!(self.doc, "ntp:")?;
        if ntp.is_enabled() {
            writeln!(self.doc, "  enabled: true")?;
        }
        if !ntp.servers.is_empty() {
            writeln!(self.doc, "  servers:")?;
            for server in &ntp.servers {
                writeln!(self.doc, "    - {server}")?;
            }
        }
        Ok(())
    }

    pub(crate) fn users(&mut self, users: &[User]) -> fmt::Result {
        if users.is_empty() {
            return Ok(());
        }
        writeln!(self.doc, "users:")?;
        for user in users {
            writeln!(self.doc, "  - name: {}", user.name)?;
            let fields = [
                ("passwd", user.passwd.as_deref()),
                ("gecos", user.gecos.as_deref()),
                ("groups", user.groups.as_deref()),
                ("homedir", user.home_dir.as_deref()),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    writeln!(self.doc, "    {key}: {value}")?;
                }
            }
            if let Some(inactive) = user.inactive {
                writeln!(self.doc, "    inactive: {inactive}")?;
            }
            if let Some(lock) = user.lock_password {
                writeln!(self.doc, "    lock_passwd: {lock}")?;
            }
            let fields = [
                ("shell", user.shell.as_deref()),
                ("primary_group", user.primary_group.as_deref()),
                ("sudo", user.sudo.as_deref()),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    writeln!(self.doc, "    {key}: {value}")?;
                }
            }
            if !user.ssh_authorized_keys.is_empty() {
                writeln!(self.doc, "    ssh_authorized_keys:")?;
                for key in &user.ssh_authorized_keys {
                    writeln!(self.doc, "      - {key}")?;
                }
            }
        }
        Ok(())
    }

    /// `disk_setup:` from the partition table.
    pub(crate) fn disk_setup(&mut self, disk_setup: Option<&DiskSetup>) -> fmt::Result {
        let Some(partitions) = disk_setup
            .map(|d| d.partitions.as_slice())
            .filter(|p| !p.is_empty())
        else {
            return Ok(());
        };
        writeln!(self.doc, "disk_setup:")?;
        for partition in partitions {
            writeln!(self.doc, "  {}:", partition.device)?;
            if let Some(table_type) = &partition.table_type {
                writeln!(self.doc, "    table_type: {table_type}")?;
            }
            writeln!(self.doc, "    layout: {}", partition.layout)?;
            if let Some(overwrite) = partition.overwrite {
                writeln!(self.doc, "    overwrite: {overwrite}")?;
            }
        }
        Ok(())
    }

    /// `fs_setup:` from the filesystem list.
    pub(crate) fn fs_setup(&mut self, disk_setup: Option<&DiskSetup>) -> fmt::Result {
        let Some(filesystems) = disk_setup
            .map(|d| d.filesystems.as_slice())
            .filter(|f| !f.is_empty())
        else {
            return Ok(());
        };
        writeln!(self.doc, "fs_setup:")?;
        for fs in filesystems {
            writeln!(self.doc, "  - label: {}", fs.label)?;
            writeln!(self.doc, "    filesystem: {}", fs.filesystem)?;
            writeln!(self.doc, "    device: {}", fs.device)?;
            if let Some(partition) = &fs.partition {
                writeln!(self.doc, "    partition: {partition}")?;
            }
            if let Some(overwrite) = fs.overwrite {
                writeln!(self.doc, "    overwrite: {overwrite}")?;
            }
            if let Some(replace_fs) = &fs.replace_fs {
                writeln!(self.doc, "    replace_fs: {replace_fs}")?;
            }
            if !fs.extra_opts.is_empty() {
                writeln!(self.doc, "    extra_opts:")?;
                for opt in &fs.extra_opts {
                    writeln!(self.doc, "      - {opt}")?;
                }
            }
        }
        Ok(())
    }

    /// `mounts:` as a list of lists; empty entries are dropped.
    pub(crate) fn mounts(&mut self, mounts: &[MountPoints]) -> fmt::Result {
        let mut entries = mounts.iter().filter(|m| !m.is_empty()).peekable();
        if entries.peek().is_none() {
            return Ok(());
        }
        writeln!(self.doc, "mounts:")?;
        for entry in entries {
            for (i, value) in entry.iter().enumerate() {
                let lead = if i == 0 { "  - - " } else { "    - " };
                writeln!(self.doc, "{lead}{value}")?;
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> String {
        self.doc
    }
}
