// src/transform/external.rs

//! Running configured command-line tools as transforms.
//!
//! A tool reads the source on stdin and writes the result on stdout. The
//! command line may reference `{path}` (the source file) and `{dir}` (its
//! directory), e.g. `sass --stdin --load-path={dir}`.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{TransformError, TransformKind};

/// Substitute `{path}` and `{dir}` in a tool command line.
pub fn expand_command(template: &str, source: &Path) -> String {
    let dir = source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    template
        .replace("{path}", &source.to_string_lossy())
        .replace("{dir}", &dir.to_string_lossy())
}

/// Run `template` for one source file and return its stdout.
///
/// A non-zero exit status is a [`TransformError`] carrying the tool's stderr.
pub async fn run_tool(
    kind: TransformKind,
    template: &str,
    source: &Path,
    input: &[u8],
) -> Result<Vec<u8>, TransformError> {
    let command_line = expand_command(template, source);
    debug!(transform = %kind, path = ?source, cmd = %command_line, "running tool");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&command_line);
        c
    };

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| TransformError::new(kind, source, format!("spawning '{command_line}': {e}")))?;

    // Feed stdin from a separate task so a tool that writes before it has
    // read everything cannot deadlock against us.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_vec();
        tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        })
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| TransformError::new(kind, source, format!("waiting for '{command_line}': {e}")))?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            // Tools may legitimately exit without draining stdin.
            Ok(Err(e)) => debug!(path = ?source, error = %e, "tool closed stdin early"),
            Err(e) => warn!(path = ?source, error = %e, "stdin writer task failed"),
        }
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(TransformError::new(
            kind,
            source,
            format!("'{command_line}' exited with {code}: {stderr}"),
        ));
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_expand_to_source_location() {
        let cmd = expand_command("sass --stdin --load-path={dir} # {path}", Path::new("app/scss/style.scss"));
        assert_eq!(cmd, "sass --stdin --load-path=app/scss # app/scss/style.scss");
        assert_eq!(expand_command("tool {dir}", Path::new("x.js")), "tool .");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_output_replaces_contents() {
        let out = run_tool(
            TransformKind::ScriptMinify,
            "tr a-z A-Z",
            Path::new("main.js"),
            b"let x = 1;",
        )
        .await
        .unwrap();
        assert_eq!(out, b"LET X = 1;");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_reports_stderr_and_path() {
        let err = run_tool(
            TransformKind::StylesheetCompile,
            "echo 'Error: expected \"}\"' >&2; exit 65",
            Path::new("app/scss/style.scss"),
            b"body {",
        )
        .await
        .unwrap_err();
        assert_eq!(err.path, Path::new("app/scss/style.scss"));
        assert!(err.reason.contains("exited with 65"), "{}", err.reason);
        assert!(err.reason.contains("expected"), "{}", err.reason);
    }
}
