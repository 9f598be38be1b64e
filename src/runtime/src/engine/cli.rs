//! Engine backed by a container runtime CLI (`docker` or `podman`).
//!
//! Each exec step runs in a fresh, uniquely named container. When a later
//! step or a publish needs the resulting filesystem, the container is
//! committed and the next step starts from that image. Mounted directories
//! are staged as private copies, so the caller's directory is never written.

use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

use azpush_core::error::{AzError, Result};
use azpush_core::EngineConfig;

use super::{ContainerEngine, RegistryCredential};
use crate::container::{Container, Mount};

/// Container runtime CLI flavor; they differ in how login state is isolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Docker,
    Podman,
}

impl Flavor {
    fn detect(runtime: &str) -> Self {
        let name = Path::new(runtime)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.starts_with("podman") {
            Flavor::Podman
        } else {
            Flavor::Docker
        }
    }
}

/// A mount whose source has been copied into a temporary directory.
struct StagedMount {
    dir: TempDir,
    target: String,
}

/// Outcome of running a container's exec steps.
struct Realized {
    image: String,
    stdout: String,
    /// `image` was committed by this realization rather than being the base.
    committed: bool,
}

/// [`ContainerEngine`] driving a container runtime CLI as a child process.
#[derive(Debug, Clone)]
pub struct CliEngine {
    runtime: String,
    flavor: Flavor,
}

impl CliEngine {
    pub fn new(runtime: impl Into<String>) -> Self {
        let runtime = runtime.into();
        let flavor = Flavor::detect(&runtime);
        Self { runtime, flavor }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.runtime.clone())
    }

    /// Runtime binary this engine invokes.
    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// Spawn the runtime with `args`, optionally feeding `stdin`, and collect output.
    async fn invoke(&self, args: &[String], stdin: Option<&SecretString>) -> std::io::Result<Output> {
        tracing::debug!(runtime = %self.runtime, args = ?args, "Invoking container runtime");

        let mut cmd = Command::new(&self.runtime);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.expose_secret().as_bytes()).await?;
            pipe.shutdown().await?;
        }
        child.wait_with_output().await
    }

    /// Run a housekeeping or publish command, mapping failure with `on_error`.
    async fn checked<F>(&self, args: &[String], stdin: Option<&SecretString>, on_error: F) -> Result<String>
    where
        F: Fn(String) -> AzError,
    {
        let output = self.invoke(args, stdin).await.map_err(|e| {
            on_error(format!("failed to run {}: {}", self.runtime, e))
        })?;
        if !output.status.success() {
            return Err(on_error(combined_output(&output)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Best-effort removal; failures are only logged.
    async fn remove(&self, args: Vec<String>) {
        match self.invoke(&args, None).await {
            Ok(output) if output.status.success() => {}
            Ok(output) => tracing::warn!(
                args = ?args,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Cleanup command failed"
            ),
            Err(e) => tracing::warn!(args = ?args, error = %e, "Cleanup command failed"),
        }
    }

    async fn realize(&self, container: &Container, commit_final: bool) -> Result<Realized> {
        let staged = stage_mounts(container.mounts())?;
        let execs = container.execs();
        let mut image = container.base_image().to_string();
        let mut stdout = String::new();
        let mut intermediates = Vec::new();

        for (i, step) in execs.iter().enumerate() {
            let (program, rest) = step.split_first().ok_or_else(|| {
                AzError::ConstructionError("Exec step has no program".to_string())
            })?;
            let command = step.join(" ");
            let name = format!("azpush-{}", Uuid::new_v4().simple());

            let mut run_args = args(["run", "--name", name.as_str()]);
            for mount in &staged {
                run_args.push("--mount".to_string());
                run_args.push(format!(
                    "type=bind,source={},target={}",
                    mount.dir.path().display(),
                    mount.target
                ));
            }
            run_args.push("--entrypoint".to_string());
            run_args.push(program.clone());
            run_args.push(image.clone());
            run_args.extend(rest.iter().cloned());

            tracing::info!(image = %image, command = %command, "Running exec step");

            let output = self.invoke(&run_args, None).await.map_err(|e| AzError::ExecutionError {
                command: command.clone(),
                exit_code: None,
                stderr: format!("failed to run {}: {}", self.runtime, e),
            })?;

            if !output.status.success() {
                self.remove(args(["rm", "-f", name.as_str()])).await;
                self.remove_images(&intermediates).await;
                return Err(AzError::ExecutionError {
                    command,
                    exit_code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            stdout = String::from_utf8_lossy(&output.stdout).to_string();

            let is_last = i + 1 == execs.len();
            if !is_last || commit_final {
                let committed = self
                    .checked(&args(["commit", name.as_str()]), None, |message| {
                        AzError::ExecutionError {
                            command: format!("commit {}", name),
                            exit_code: None,
                            stderr: message,
                        }
                    })
                    .await;
                self.remove(args(["rm", "-f", name.as_str()])).await;
                let committed = match committed {
                    Ok(id) if !id.trim().is_empty() => id.trim().to_string(),
                    Ok(_) => {
                        self.remove_images(&intermediates).await;
                        return Err(AzError::ExecutionError {
                            command: format!("commit {}", name),
                            exit_code: None,
                            stderr: "runtime printed no image id".to_string(),
                        });
                    }
                    Err(e) => {
                        self.remove_images(&intermediates).await;
                        return Err(e);
                    }
                };
                intermediates.push(committed.clone());
                image = committed;
            } else {
                self.remove(args(["rm", "-f", name.as_str()])).await;
            }
        }

        if commit_final {
            // The final image is what gets published.
            intermediates.pop();
        }
        self.remove_images(&intermediates).await;
        Ok(Realized {
            committed: commit_final && !execs.is_empty(),
            image,
            stdout,
        })
    }

    /// Make `image` available locally, pulling it only when it is missing.
    async fn ensure_image(&self, image: &str, address: &str) -> Result<()> {
        let present = self
            .invoke(&args(["image", "inspect", image]), None)
            .await
            .map(|output| output.status.success())
            .unwrap_or(false);
        if present {
            tracing::debug!(image = %image, "Using local image");
            return Ok(());
        }

        tracing::info!(image = %image, "Pulling image");
        self.checked(&args(["pull", image]), None, |message| AzError::PublishError {
            address: address.to_string(),
            message: format!("pull {}: {}", image, message),
        })
        .await
        .map(|_| ())
    }

    async fn remove_images(&self, images: &[String]) {
        for image in images {
            self.remove(args(["rmi", image.as_str()])).await;
        }
    }

    async fn login(&self, auth_dir: &Path, credential: &RegistryCredential) -> Result<()> {
        tracing::info!(registry = %credential.host, "Logging in to registry");

        let mut login = self.isolated(auth_dir, "login");
        login.extend(args([
            credential.host.as_str(),
            "--username",
            credential.username.as_str(),
            "--password-stdin",
        ]));
        self.checked(&login, Some(&credential.password), |message| AzError::PublishError {
            address: credential.host.clone(),
            message,
        })
        .await
        .map(|_| ())
    }

    async fn login_and_tag(
        &self,
        auth_dir: &Path,
        image: &str,
        target: &str,
        credentials: &[RegistryCredential],
    ) -> Result<()> {
        for credential in credentials {
            self.login(auth_dir, credential).await?;
        }
        self.checked(&args(["tag", image, target]), None, |message| {
            AzError::PublishError {
                address: target.to_string(),
                message,
            }
        })
        .await
        .map(|_| ())
    }

    /// Push `target` and return it with the digest the runtime reports.
    async fn push(&self, auth_dir: &Path, target: &str) -> Result<String> {
        tracing::info!(address = %target, "Pushing image");

        let mut push = self.isolated(auth_dir, "push");
        let digest_file = auth_dir.join("digest");
        if self.flavor == Flavor::Podman {
            push.push("--digestfile".to_string());
            push.push(digest_file.display().to_string());
        }
        push.push(target.to_string());
        let stdout = self
            .checked(&push, None, |message| AzError::PublishError {
                address: target.to_string(),
                message,
            })
            .await?;

        let digest = match self.flavor {
            Flavor::Docker => parse_push_digest(&stdout),
            Flavor::Podman => read_digest_file(&digest_file),
        };
        Ok(match digest {
            Some(digest) => format!("{}@{}", target, digest),
            None => target.to_string(),
        })
    }

    /// Arguments for `subcommand` with login state confined to `auth_dir`.
    fn isolated(&self, auth_dir: &Path, subcommand: &str) -> Vec<String> {
        match self.flavor {
            Flavor::Docker => vec![
                "--config".to_string(),
                auth_dir.display().to_string(),
                subcommand.to_string(),
            ],
            Flavor::Podman => vec![
                subcommand.to_string(),
                "--authfile".to_string(),
                auth_dir.join("auth.json").display().to_string(),
            ],
        }
    }
}

#[async_trait]
impl ContainerEngine for CliEngine {
    async fn stdout(&self, container: &Container) -> Result<String> {
        Ok(self.realize(container, false).await?.stdout)
    }

    async fn publish(
        &self,
        container: &Container,
        address: &str,
        credentials: &[RegistryCredential],
    ) -> Result<String> {
        let target = with_default_tag(address);
        let auth_dir = tempfile::tempdir().map_err(|e| AzError::PublishError {
            address: target.clone(),
            message: format!("failed to create login state directory: {}", e),
        })?;

        if container.execs().is_empty() {
            self.ensure_image(container.base_image(), &target).await?;
        }
        let realized = self.realize(container, true).await?;

        let tagged = self
            .login_and_tag(auth_dir.path(), &realized.image, &target, credentials)
            .await;
        let result = match tagged {
            Ok(()) => {
                let pushed = self.push(auth_dir.path(), &target).await;
                // Untagging also deletes a committed image that has no other name.
                self.remove(args(["rmi", target.as_str()])).await;
                pushed
            }
            Err(e) => {
                if realized.committed {
                    self.remove(args(["rmi", realized.image.as_str()])).await;
                }
                Err(e)
            }
        };

        if let Ok(reference) = &result {
            tracing::info!(reference = %reference, "Image published");
        }
        result
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut message = stderr.trim().to_string();
    if message.is_empty() {
        message = stdout.trim().to_string();
    }
    match output.status.code() {
        Some(code) => format!("exit status {}: {}", code, message),
        None => format!("terminated by signal: {}", message),
    }
}

/// Append `:latest` when the last path component carries no tag or digest.
fn with_default_tag(address: &str) -> String {
    let last = address.rsplit('/').next().unwrap_or(address);
    if last.contains(':') || last.contains('@') {
        address.to_string()
    } else {
        format!("{}:latest", address)
    }
}

/// Extract `sha256:...` from docker's `<tag>: digest: sha256:... size: N` line.
fn parse_push_digest(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once("digest: ")?;
        let digest = rest.split_whitespace().next()?;
        digest.contains(':').then(|| digest.to_string())
    })
}

fn read_digest_file(path: &Path) -> Option<String> {
    let digest = std::fs::read_to_string(path).ok()?;
    let digest = digest.trim();
    (!digest.is_empty()).then(|| digest.to_string())
}

fn stage_mounts(mounts: &[Mount]) -> Result<Vec<StagedMount>> {
    mounts
        .iter()
        .map(|mount| {
            let dir = tempfile::Builder::new()
                .prefix("azpush-mount-")
                .tempdir()
                .map_err(|e| {
                    AzError::ConstructionError(format!("Failed to create staging directory: {}", e))
                })?;
            copy_dir_recursive(&mount.source, dir.path()).map_err(|e| {
                AzError::ConstructionError(format!(
                    "Failed to stage {} for {}: {}",
                    mount.source.display(),
                    mount.target,
                    e
                ))
            })?;
            Ok(StagedMount {
                dir,
                target: mount.target.clone(),
            })
        })
        .collect()
}

/// Recursively copy a directory. Symlinks are recreated, not followed.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(std::fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> std::io::Result<()> {
    tracing::debug!(path = %src.display(), "Skipping symlink in mounted directory");
    Ok(())
}
