use std::io;

use layerpack_core::{DependencyAnalysis, LayerBuild};
use layerpack_domain::{ErrorKind, LayerError, PinnedPackage};
use serde_json::{json, Value};

use crate::dispatch::Report;
use crate::style::{Status, Style};

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;

/// What a command produced, ready to print as text or JSON.
#[derive(Debug)]
pub struct CommandOutcome {
    pub status: Status,
    pub message: String,
    pub details: Value,
    pub code: i32,
    pub body: Vec<String>,
}

impl CommandOutcome {
    pub fn from_result(result: anyhow::Result<Report>, style: &Style) -> Self {
        match result {
            Ok(report) => success(report, style),
            Err(err) => failure(&err),
        }
    }

    pub fn to_json(&self, command: &str) -> Value {
        json!({
            "status": match self.status {
                Status::Ok => "ok",
                Status::Failure => "error",
            },
            "message": format!("layerpack {command}: {}", self.message),
            "details": self.details,
        })
    }

    pub fn hint(&self) -> Option<&str> {
        self.details.get("hint").and_then(Value::as_str)
    }
}

/// Exit code for a failed command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<LayerError>().map(LayerError::kind) {
        Some(ErrorKind::Configuration) => 2,
        Some(ErrorKind::IncompatibleRuntime) => 3,
        Some(ErrorKind::PackageNotFound) => 4,
        Some(ErrorKind::DependencyConflict) => 5,
        Some(ErrorKind::LayerSizeLimit) => 6,
        None => EXIT_FAILURE,
    }
}

fn failure(err: &anyhow::Error) -> CommandOutcome {
    let code = exit_code(err);
    let details = match err.downcast_ref::<LayerError>() {
        Some(layer) => layer.details(),
        None if is_not_found(err) => json!({
            "reason": "file_not_found",
            "hint": "Please make sure the file exists and the path is correct.",
        }),
        None => json!({
            "reason": "unexpected_error",
            "hint": "If this persists, please report this issue.",
        }),
    };
    CommandOutcome {
        status: Status::Failure,
        message: format!("{err:#}"),
        details,
        code,
        body: Vec::new(),
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|io_err| io_err.kind() == io::ErrorKind::NotFound)
}

fn success(report: Report, style: &Style) -> CommandOutcome {
    match report {
        Report::Layer { name, build } => layer_outcome(&name, &build, style),
        Report::Analysis {
            requirements,
            include_dependencies,
            analysis,
        } => CommandOutcome {
            status: Status::Ok,
            message: format!(
                "resolved {} packages from {}",
                analysis.total(),
                requirements.display()
            ),
            details: json!({
                "requirements": requirements.display().to_string(),
                "backend": analysis.backend,
                "top_level": analysis.top_level,
                "transitive": analysis.transitive,
            }),
            code: EXIT_OK,
            body: render_analysis(style, &analysis, include_dependencies),
        },
    }
}

fn layer_outcome(name: &str, build: &LayerBuild, style: &Style) -> CommandOutcome {
    let mut body = Vec::new();
    if !build.stripped.is_empty() {
        body.push(style.info(&format!(
            "Stripped {} test files and {} test directories",
            build.stripped.files, build.stripped.dirs
        )));
    }
    if build.packages.is_empty() {
        body.push(style.warning("The layer contains no packages"));
    }
    CommandOutcome {
        status: Status::Ok,
        message: format!(
            "Created layer at: {} ({:.2} MB, {} packages)",
            build.artifact.path.display(),
            build.artifact.size_mb(),
            build.packages.len()
        ),
        details: json!({
            "layer": name,
            "archive": build.artifact.path.display().to_string(),
            "bytes": build.artifact.bytes,
            "uncompressed_bytes": build.uncompressed_bytes,
            "packages": build.packages,
            "stripped": build.stripped,
            "backend": build.backend,
        }),
        code: EXIT_OK,
        body,
    }
}

fn render_analysis(
    style: &Style,
    analysis: &DependencyAnalysis,
    include_dependencies: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(String::new());
    lines.push(style.table_header("Top-level Packages"));
    lines.push(format_package_table(style, &analysis.top_level));
    if include_dependencies {
        lines.push(String::new());
        lines.push(style.table_header("Other Dependencies"));
        lines.push(format_package_table(style, &analysis.transitive));
    }
    lines.push(String::new());
    lines.push(style.table_header("Summary"));
    lines.push(format!("Total packages: {}", analysis.total()));
    lines.push(format!("Top-level packages: {}", analysis.top_level.len()));
    if include_dependencies {
        lines.push(format!("Sub-dependencies: {}", analysis.transitive.len()));
    }
    lines
}

fn format_package_table(style: &Style, rows: &[PinnedPackage]) -> String {
    if rows.is_empty() {
        return "  (none)".to_string();
    }
    let headers = ["Package", "Version"];
    let mut widths = [headers[0].len(), headers[1].len()];
    for row in rows {
        widths[0] = widths[0].max(row.name.len());
        widths[1] = widths[1].max(row.version.len());
    }

    let header_line = format!(
        "{:<width0$}  {:<width1$}",
        headers[0],
        headers[1],
        width0 = widths[0],
        width1 = widths[1],
    );
    let mut lines = vec![
        style.table_header(header_line.trim_end()),
        format!(
            "{:-<width0$}  {:-<width1$}",
            "",
            "",
            width0 = widths[0],
            width1 = widths[1],
        ),
    ];
    for row in rows {
        let line = format!(
            "{:<width0$}  {:<width1$}",
            row.name,
            row.version,
            width0 = widths[0],
            width1 = widths[1],
        );
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    fn pin(name: &str, version: &str) -> PinnedPackage {
        PinnedPackage {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let cases = [
            (LayerError::configuration("optimization_level", "bad"), 2),
            (
                LayerError::IncompatibleRuntime {
                    runtime: "python3.7".into(),
                    compatible: vec!["python3.9".into()],
                },
                3,
            ),
            (LayerError::PackageNotFound { detail: "x".into() }, 4),
            (LayerError::DependencyConflict { detail: "x".into() }, 5),
            (LayerError::NoInput, 5),
            (
                LayerError::LayerSizeLimit {
                    actual_mb: 300.0,
                    limit_mb: 250.0,
                    metric: layerpack_domain::SizeMetric::Archive,
                },
                6,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(exit_code(&anyhow::Error::new(err)), code);
        }
        assert_eq!(exit_code(&anyhow::anyhow!("disk on fire")), 1);
    }

    #[test]
    fn missing_file_gets_file_hint() {
        let err = Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "No such file"))
            .context("File not found - reqs.txt")
            .expect_err("error");
        let outcome = failure(&err);
        assert_eq!(outcome.code, 1);
        assert_eq!(
            outcome.hint(),
            Some("Please make sure the file exists and the path is correct.")
        );
        assert!(outcome.message.starts_with("File not found - reqs.txt"));
    }

    #[test]
    fn layer_errors_carry_hint_and_code() {
        let outcome = failure(&anyhow::Error::new(LayerError::PackageNotFound {
            detail: "nosuchpkg".into(),
        }));
        let payload = outcome.to_json("create-layer");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["details"]["code"], "LP110");
        assert_eq!(
            outcome.hint(),
            Some("Please verify the package name and version.")
        );
    }

    #[test]
    fn analysis_table_lists_pins() {
        let style = Style::new(true, false);
        let analysis = DependencyAnalysis {
            top_level: vec![pin("requests", "2.31.0")],
            transitive: vec![pin("idna", "3.6"), pin("urllib3", "2.2.1")],
            backend: "uv",
        };
        let lines = render_analysis(&style, &analysis, true).join("\n");
        assert!(lines.contains("Package   Version\n--------  -------\nrequests  2.31.0"));
        assert!(lines.contains("urllib3  2.2.1"));
        assert!(lines.contains("Total packages: 3"));
        assert!(lines.contains("Sub-dependencies: 2"));

        let direct_only = render_analysis(&style, &analysis, false).join("\n");
        assert!(!direct_only.contains("Other Dependencies"));
        assert!(!direct_only.contains("Sub-dependencies"));
    }
}
