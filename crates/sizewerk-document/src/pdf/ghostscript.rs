// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External PDF rewriting through Ghostscript's `pdfwrite` device.
//
// Each invocation is an isolated child process, in its own process group on
// Unix, bounded by a wall-clock timeout. A missing executable, a non-zero
// exit, a timeout, or an empty output are all reported as errors for that
// preset only, and any partial output is removed.

use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use sizewerk_core::config::PdfSettings;
use sizewerk_core::error::{Result, SizewerkError};
use sizewerk_core::types::PdfPreset;
use tracing::{debug, instrument, warn};

use crate::artifact::discard;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Characters of stderr kept in failure messages.
const STDERR_TAIL: usize = 400;

/// How long stderr is awaited after the child exits. A helper that inherited
/// the pipe can keep it open past the child's exit.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Rewrites a PDF with a quality preset into a new file.
pub trait PdfRewriter: Send + Sync {
    /// Tool name used in logs and errors.
    fn name(&self) -> &str;

    /// Rewrite `input` into `output` using `preset`. On success `output`
    /// exists and is non-empty.
    fn rewrite(&self, preset: PdfPreset, input: &Path, output: &Path) -> Result<()>;
}

/// `gs -sDEVICE=pdfwrite -dPDFSETTINGS=/<preset> ...`
#[derive(Debug, Clone)]
pub struct GhostscriptRewriter {
    binary: String,
    timeout: Duration,
}

impl GhostscriptRewriter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &PdfSettings) -> Self {
        Self::new(
            settings.ghostscript.clone(),
            Duration::from_secs(settings.tool_timeout_secs),
        )
    }

    /// Argument vector for one preset.
    pub fn arguments(preset: PdfPreset, input: &Path, output: &Path) -> Vec<OsString> {
        let mut out_arg = OsString::from("-sOutputFile=");
        out_arg.push(output.as_os_str());
        vec![
            "-sDEVICE=pdfwrite".into(),
            "-dCompatibilityLevel=1.4".into(),
            format!("-dPDFSETTINGS=/{}", preset.keyword()).into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dBATCH".into(),
            "-dSAFER".into(),
            out_arg,
            input.as_os_str().to_owned(),
        ]
    }

    fn failed(&self, detail: impl Into<String>) -> SizewerkError {
        SizewerkError::ExternalToolFailed {
            tool: self.binary.clone(),
            detail: detail.into(),
        }
    }

    fn run(&self, preset: PdfPreset, input: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command
            .args(Self::arguments(preset, input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        own_process_group(&mut command);
        let mut child = command.spawn().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                SizewerkError::ExternalToolUnavailable(format!("{}: {}", self.binary, err))
            }
            _ => self.failed(format!("spawn failed: {err}")),
        })?;

        // stderr must be drained while the child runs or a full pipe stalls it.
        let stderr = child.stderr.take();
        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut text);
            }
            let _ = sender.send(text);
        });

        let status = self.wait_bounded(&mut child)?;
        let stderr_text = receiver.recv_timeout(DRAIN_GRACE).unwrap_or_default();

        if !status.success() {
            let tail: String = stderr_text
                .trim()
                .chars()
                .rev()
                .take(STDERR_TAIL)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(self.failed(format!("{status}: {tail}")));
        }

        match std::fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => {
                debug!(size = meta.len(), "Rewrite produced output");
                Ok(())
            }
            _ => Err(self.failed("exited successfully but produced no output")),
        }
    }

    /// Wait for the child, killing its process group once the timeout
    /// elapses.
    fn wait_bounded(&self, child: &mut Child) -> Result<ExitStatus> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= self.timeout {
                warn!(
                    binary = %self.binary,
                    timeout_secs = self.timeout.as_secs(),
                    "Killing timed-out rewrite"
                );
                kill_process_group(child);
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.failed(format!(
                    "timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl PdfRewriter for GhostscriptRewriter {
    fn name(&self) -> &str {
        &self.binary
    }

    #[instrument(
        skip(self, input, output),
        fields(binary = %self.binary, preset = preset.keyword())
    )]
    fn rewrite(&self, preset: PdfPreset, input: &Path, output: &Path) -> Result<()> {
        let result = self.run(preset, input, output);
        if result.is_err() {
            discard(output);
        }
        result
    }
}

/// Start the child as the leader of a new process group, so helpers it forks
/// can be signalled together.
#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    if let Ok(pid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) only sends a signal; a negative pid addresses the
        // group this child leads.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_carry_preset_and_paths() {
        let args = GhostscriptRewriter::arguments(
            PdfPreset::Ebook,
            Path::new("/in/a.pdf"),
            Path::new("/out/b.pdf"),
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"-dPDFSETTINGS=/ebook".to_string()));
        assert!(args.contains(&"-sOutputFile=/out/b.pdf".to_string()));
        assert_eq!(args.last().unwrap(), "/in/a.pdf");
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let rewriter = GhostscriptRewriter::new(
            "sizewerk-no-such-ghostscript-binary",
            Duration::from_secs(5),
        );
        let err = rewriter
            .rewrite(
                PdfPreset::Screen,
                &dir.path().join("in.pdf"),
                &dir.path().join("out.pdf"),
            )
            .unwrap_err();
        assert!(matches!(err, SizewerkError::ExternalToolUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        // `false` ignores its arguments and exits 1.
        let rewriter = GhostscriptRewriter::new("false", Duration::from_secs(5));
        let err = rewriter
            .rewrite(
                PdfPreset::Default,
                &dir.path().join("in.pdf"),
                &dir.path().join("out.pdf"),
            )
            .unwrap_err();
        assert!(matches!(err, SizewerkError::ExternalToolFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_forked_helpers_and_removes_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        // Writes a partial output, then blocks in a forked `sleep` that
        // inherits stderr.
        let script = dir.path().join("slow-gs");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             for a in \"$@\"; do\n\
             case \"$a\" in -sOutputFile=*) echo partial > \"${a#-sOutputFile=}\" ;; esac\n\
             done\n\
             sleep 30\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let output = dir.path().join("out.pdf");
        let rewriter =
            GhostscriptRewriter::new(script.to_string_lossy(), Duration::from_secs(1));
        let started = Instant::now();
        let err = rewriter
            .rewrite(PdfPreset::Screen, &dir.path().join("in.pdf"), &output)
            .unwrap_err();

        assert!(matches!(err, SizewerkError::ExternalToolFailed { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn success_without_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        // `true` exits 0 but writes nothing.
        let rewriter = GhostscriptRewriter::new("true", Duration::from_secs(5));
        let err = rewriter
            .rewrite(
                PdfPreset::Default,
                &dir.path().join("in.pdf"),
                &dir.path().join("out.pdf"),
            )
            .unwrap_err();
        assert!(matches!(err, SizewerkError::ExternalToolFailed { .. }));
    }
}
