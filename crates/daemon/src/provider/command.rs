//! Mount provider that shells out to a FUSE binary
//!
//! Buckets are mounted by running an external filesystem binary (goofys by
//! default) that daemonizes once the mount is ready, and unmounted with the
//! platform's FUSE unmount tool.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use common::provider::{MountOptions, MountProvider};

pub const DEFAULT_PROGRAM: &str = "goofys";
pub const DEFAULT_FUSERMOUNT: &str = "fusermount";

/// How to invoke the mount binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Binary that mounts a bucket: `<program> [flags] -- <bucket> <mountpoint>`
    #[serde(default = "default_program")]
    pub program: String,
    /// Region of the object store, passed as `--region`
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint of an S3-compatible store, passed as `--endpoint`
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Extra flags appended before the bucket and mountpoint
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// FUSE unmount helper (Linux only)
    #[serde(default = "default_fusermount")]
    pub fusermount: String,
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

fn default_fusermount() -> String {
    DEFAULT_FUSERMOUNT.to_string()
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            region: None,
            endpoint: None,
            extra_args: Vec::new(),
            fusermount: default_fusermount(),
        }
    }
}

/// Marker for a bucket mounted by [`CommandProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMount {
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct CommandProvider {
    config: CommandConfig,
}

impl CommandProvider {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    pub fn mount_args(&self, bucket: &str, target: &Path, options: &MountOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if let Some(region) = &self.config.region {
            args.extend(["--region".into(), region.into()]);
        }
        if let Some(endpoint) = &self.config.endpoint {
            args.extend(["--endpoint".into(), endpoint.into()]);
        }
        if let Some(uid) = options.uid {
            args.extend(["--uid".into(), uid.to_string().into()]);
        }
        if let Some(gid) = options.gid {
            args.extend(["--gid".into(), gid.to_string().into()]);
        }
        if let Some(mode) = options.dir_mode {
            args.extend(["--dir-mode".into(), format!("0{:o}", mode).into()]);
        }
        if let Some(mode) = options.file_mode {
            args.extend(["--file-mode".into(), format!("0{:o}", mode).into()]);
        }
        if options.allow_other {
            args.extend(["-o".into(), "allow_other".into()]);
        }
        if options.read_only {
            args.extend(["-o".into(), "ro".into()]);
        }

        args.extend(self.config.extra_args.iter().map(OsString::from));
        // end of flags: a bucket or mountpoint must never be read as one
        args.push("--".into());
        args.push(bucket.into());
        args.push(target.as_os_str().to_owned());
        args
    }
}

#[async_trait::async_trait]
impl MountProvider for CommandProvider {
    type Handle = CommandMount;

    async fn mount(
        &self,
        bucket: &str,
        target: &Path,
        options: &MountOptions,
    ) -> anyhow::Result<CommandMount> {
        let args = self.mount_args(bucket, target, options);
        tracing::debug!(program = %self.config.program, ?args, "running mount command");

        run(&self.config.program, &args).await?;

        Ok(CommandMount {
            bucket: bucket.to_string(),
        })
    }

    async fn unmount(&self, target: &Path, handle: CommandMount) -> anyhow::Result<()> {
        tracing::debug!(bucket = %handle.bucket, target = %target.display(), "unmounting");
        self.unmount_path(target).await
    }

    async fn force_unmount(&self, target: &Path) -> anyhow::Result<()> {
        self.force_unmount_path(target).await
    }
}

impl CommandProvider {
    #[cfg(target_os = "linux")]
    async fn unmount_path(&self, target: &Path) -> anyhow::Result<()> {
        let fusermount = &self.config.fusermount;
        if let Err(e) = run(fusermount, &["-u".into(), target.into()]).await {
            tracing::warn!(target = %target.display(), "unmount failed, retrying lazily: {:#}", e);
            run(fusermount, &["-uz".into(), target.into()]).await?;
        }
        Ok(())
    }

    #[cfg(target_os = "macos")]
    async fn unmount_path(&self, target: &Path) -> anyhow::Result<()> {
        if let Err(e) = run("umount", &[target.into()]).await {
            tracing::warn!(target = %target.display(), "umount failed, forcing: {:#}", e);
            self.force_unmount_path(target).await?;
        }
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    async fn unmount_path(&self, target: &Path) -> anyhow::Result<()> {
        tracing::warn!(target = %target.display(), "unmount not implemented for this platform");
        Ok(())
    }

    #[cfg(target_os = "linux")]
    async fn force_unmount_path(&self, target: &Path) -> anyhow::Result<()> {
        run(&self.config.fusermount, &["-uz".into(), target.into()]).await
    }

    #[cfg(target_os = "macos")]
    async fn force_unmount_path(&self, target: &Path) -> anyhow::Result<()> {
        run(
            "diskutil",
            &["unmount".into(), "force".into(), target.into()],
        )
        .await
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    async fn force_unmount_path(&self, target: &Path) -> anyhow::Result<()> {
        tracing::warn!(target = %target.display(), "forced unmount not implemented for this platform");
        Ok(())
    }
}

/// Run `program` to completion, failing with its stderr on a non-zero exit.
async fn run(program: &str, args: &[OsString]) -> anyhow::Result<()> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to run {}", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{} exited with {}: {}", program, output.status, stderr.trim());
    }

    Ok(())
}
