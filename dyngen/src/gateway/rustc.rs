//! External `rustc` compiler service targeting WebAssembly.

use super::compiler::{CompileRequest, CompilerOutput, CompilerService, Diagnostic};
use super::GatewayError;
use crate::config::CompilerConfig;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RustcCompiler {
    rustc: PathBuf,
    target: String,
    edition: String,
    extra_args: Vec<String>,
}

impl RustcCompiler {
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            rustc: config.rustc.clone(),
            target: config.target.clone(),
            edition: config.edition.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    /// Whether the executable answers `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.rustc)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for RustcCompiler {
    fn default() -> Self {
        Self::from_config(&CompilerConfig::default())
    }
}

impl CompilerService for RustcCompiler {
    fn name(&self) -> &'static str {
        "rustc"
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompilerOutput, GatewayError> {
        let scratch = tempfile::Builder::new().prefix("dyngen-").tempdir()?;
        let source_path = scratch.path().join("lib.rs");
        let output_path = scratch.path().join(format!("{}.wasm", request.unit_name));
        std::fs::write(&source_path, request.source)?;

        let mut cmd = Command::new(&self.rustc);
        cmd.arg("--edition")
            .arg(&self.edition)
            .arg("--crate-type")
            .arg(request.output_kind.crate_type())
            .arg("--crate-name")
            .arg(request.unit_name)
            .arg("--target")
            .arg(&self.target)
            .arg("--error-format=json")
            .arg("-C")
            .arg("opt-level=2");
        if request.warnings_as_errors {
            cmd.arg("-D").arg("warnings");
        }

        let search_dirs: BTreeSet<PathBuf> = request
            .references
            .iter()
            .filter_map(|reference| reference.path())
            .filter_map(|path| path.parent().map(|dir| dir.to_path_buf()))
            .collect();
        for dir in search_dirs {
            cmd.arg("-L").arg(format!("native={}", dir.display()));
        }

        cmd.args(&self.extra_args)
            .arg("-o")
            .arg(&output_path)
            .arg(&source_path);

        debug!("Running {:?}", cmd);
        let output = cmd.output().map_err(|e| GatewayError::CompilerUnavailable {
            compiler: self.rustc.display().to_string(),
            reason: e.to_string(),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut diagnostics = parse_json_diagnostics(&stderr);

        if !output.status.success() {
            if !diagnostics.iter().any(Diagnostic::is_blocking) {
                diagnostics.push(Diagnostic::error(
                    "rustc-exit",
                    format!("rustc exited with {}: {}", output.status, stderr.trim()),
                ));
            }
            return Ok(CompilerOutput::failed(diagnostics));
        }

        let binary = std::fs::read(&output_path)?;
        Ok(CompilerOutput::success(binary, diagnostics))
    }
}

#[derive(Debug, Deserialize)]
struct RustcMessage {
    #[serde(rename = "$message_type", default)]
    message_type: Option<String>,
    message: String,
    level: String,
    code: Option<RustcCode>,
}

#[derive(Debug, Deserialize)]
struct RustcCode {
    code: String,
}

/// Parse the diagnostics rustc prints with `--error-format=json`, one JSON
/// object per line. Lines that are not diagnostics are skipped.
pub fn parse_json_diagnostics(stderr: &str) -> Vec<Diagnostic> {
    stderr
        .lines()
        .filter_map(|line| serde_json::from_str::<RustcMessage>(line.trim()).ok())
        .filter(|msg| msg.message_type.as_deref().map_or(true, |t| t == "diagnostic"))
        .map(|msg| {
            let code = msg
                .code
                .map(|c| c.code)
                .unwrap_or_else(|| "rustc".to_string());
            if msg.level.starts_with("error") {
                Diagnostic::error(&code, msg.message)
            } else if msg.level == "warning" {
                Diagnostic::warning(&code, msg.message)
            } else {
                Diagnostic::note(&code, msg.message)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::compiler::Severity;

    #[test]
    fn test_parse_error_and_warning_lines() {
        let stderr = concat!(
            r#"{"$message_type":"diagnostic","message":"cannot find value `y` in this scope","code":{"code":"E0425","explanation":"..."},"level":"error","spans":[],"children":[],"rendered":"error[E0425]"}"#,
            "\n",
            r#"{"$message_type":"diagnostic","message":"unused variable: `x`","code":{"code":"unused_variables","explanation":null},"level":"warning","spans":[],"children":[],"rendered":"warning"}"#,
            "\n",
            r#"{"$message_type":"diagnostic","message":"aborting due to 1 previous error","code":null,"level":"error","spans":[],"children":[],"rendered":"error"}"#,
            "\n",
            r#"{"$message_type":"artifact","artifact":"/tmp/x.wasm","emit":"link"}"#,
            "\n",
            "not json at all\n",
        );

        let diagnostics = parse_json_diagnostics(stderr);
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].code, "E0425");
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[1].code, "unused_variables");
        assert_eq!(diagnostics[1].severity, Severity::Warning);
        assert_eq!(diagnostics[2].code, "rustc");
    }

    #[test]
    fn test_notes_do_not_block() {
        let stderr = r#"{"message":"for more information about this error, try `rustc --explain E0425`","code":null,"level":"failure-note","spans":[],"children":[],"rendered":""}"#;
        let diagnostics = parse_json_diagnostics(stderr);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Note);
        assert!(!diagnostics[0].is_blocking());
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let compiler = RustcCompiler::from_config(&CompilerConfig {
            rustc: PathBuf::from("/nonexistent/bin/rustc-dyngen"),
            ..CompilerConfig::default()
        });
        assert!(!compiler.is_available());

        let request = CompileRequest {
            unit_name: "unit_missing",
            source: "",
            references: &[],
            output_kind: Default::default(),
            warnings_as_errors: false,
        };
        let err = compiler.compile(&request).unwrap_err();
        assert!(matches!(err, GatewayError::CompilerUnavailable { .. }));
    }
}
