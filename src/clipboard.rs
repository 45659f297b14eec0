use std::io::Write as _;
use std::process::{Command, Stdio};

use anyhow::{anyhow, bail, Context, Result};

/// Copies text to the system clipboard by piping it into the platform's copy tool.
/// - macOS: `pbcopy`
/// - Linux: `wl-copy`, then `xclip`, then `xsel`
/// - Windows: `clip`
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut last_err = None;
    for (program, args) in candidates() {
        match pipe_into(program, args, text) {
            Ok(()) => {
                tracing::debug!(program, bytes = text.len(), "copied to clipboard");
                return Ok(());
            }
            Err(err) => {
                tracing::debug!(program, error = %err, "clipboard tool unavailable");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("clipboard not supported on this platform")))
}

fn candidates() -> &'static [(&'static str, &'static [&'static str])] {
    if cfg!(target_os = "macos") {
        &[("pbcopy", &[])]
    } else if cfg!(target_os = "windows") {
        &[("clip", &[])]
    } else if cfg!(target_os = "linux") {
        &[
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ]
    } else {
        &[]
    }
}

fn pipe_into(program: &str, args: &[&str], text: &str) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .with_context(|| format!("failed to write to {program}"))?;
    }

    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {program}"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

/// Clipboard payload for a page: trailing blank lines dropped.
pub fn format_page_for_clipboard(text: &str) -> String {
    text.trim_end_matches(['\n', ' ']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_text_loses_trailing_blank_lines() {
        assert_eq!(format_page_for_clipboard("Hello\nworld\n\n"), "Hello\nworld");
        assert_eq!(format_page_for_clipboard(""), "");
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = pipe_into("/definitely/not/a/clipboard-tool", &[], "x").unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
