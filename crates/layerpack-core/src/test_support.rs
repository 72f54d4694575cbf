use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use layerpack_domain::{filter_requests, parse_requirements};

use crate::effects::ToolRunner;
use crate::observer::{BuildObserver, Stage};
use crate::process::ToolOutput;

const DEFAULT_VERSION: &str = "1.0.0";

/// Fake uv/pip that answers the handful of command lines the pipeline issues.
///
/// `pip compile` echoes every requirement back as a pin (keeping an explicit
/// `==` version, otherwise [`DEFAULT_VERSION`]) plus any configured transitive
/// pins. `install` lays down a small package tree under `--target`.
pub(crate) struct ScriptedRunner {
    located: HashMap<String, PathBuf>,
    uv_healthy: bool,
    transitive: Vec<(String, String)>,
    compile_failure: Option<String>,
    install_failures: HashMap<String, String>,
    freeze_output: String,
    payload_bytes: usize,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            located: HashMap::new(),
            uv_healthy: true,
            transitive: Vec::new(),
            compile_failure: None,
            install_failures: HashMap::new(),
            freeze_output: String::new(),
            payload_bytes: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_located(mut self, name: &str, path: &str) -> Self {
        self.located.insert(name.to_string(), PathBuf::from(path));
        self
    }

    pub(crate) fn without_uv_on_path(mut self) -> Self {
        self.located.remove("uv");
        self
    }

    pub(crate) fn with_broken_uv(mut self) -> Self {
        self.uv_healthy = false;
        self.with_located("uv", "/usr/bin/uv")
    }

    pub(crate) fn with_transitive(mut self, name: &str, version: &str) -> Self {
        self.transitive
            .push((name.to_string(), version.to_string()));
        self
    }

    pub(crate) fn with_compile_failure(mut self, stderr: &str) -> Self {
        self.compile_failure = Some(stderr.to_string());
        self
    }

    pub(crate) fn with_install_failure(mut self, name: &str, stderr: &str) -> Self {
        self.install_failures
            .insert(name.to_string(), stderr.to_string());
        self
    }

    pub(crate) fn with_freeze_output(mut self, stdout: &str) -> Self {
        self.freeze_output = stdout.to_string();
        self
    }

    /// Add an incompressible data file of `bytes` to every installed package.
    pub(crate) fn with_payload(mut self, bytes: usize) -> Self {
        self.payload_bytes = bytes;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn compile(&self, spec_file: &Path) -> Result<ToolOutput> {
        if let Some(stderr) = &self.compile_failure {
            return Ok(failure(1, stderr));
        }
        let contents = fs::read_to_string(spec_file)
            .with_context(|| format!("reading {}", spec_file.display()))?;
        let mut stdout =
            String::from("# This file was autogenerated by uv via the following command:\n");
        for request in filter_requests(parse_requirements(&contents)) {
            let version = request
                .as_str()
                .split_once("==")
                .map_or(DEFAULT_VERSION, |(_, version)| version.trim());
            stdout.push_str(&format!("{}=={version}\n", request.bare_name()));
            stdout.push_str("    # via -r requirements.in\n");
        }
        for (name, version) in &self.transitive {
            stdout.push_str(&format!("{name}=={version}\n"));
        }
        Ok(success(stdout))
    }

    fn install(&self, spec: &str, target: &Path) -> Result<ToolOutput> {
        let (name, version) = spec.split_once("==").unwrap_or((spec, DEFAULT_VERSION));
        if let Some(stderr) = self.install_failures.get(name) {
            return Ok(failure(1, stderr));
        }
        let package = target.join(name);
        fs::create_dir_all(package.join("tests"))?;
        fs::write(
            package.join("__init__.py"),
            format!("__version__ = \"{version}\"\n"),
        )?;
        fs::write(package.join("core.py"), "def run():\n    return 1\n")?;
        fs::write(package.join("core_test.py"), "def test_run():\n    pass\n")?;
        fs::write(package.join("tests").join("test_core.py"), "def test_core():\n    pass\n")?;
        if self.payload_bytes > 0 {
            fs::write(package.join("_data.bin"), noise(self.payload_bytes))?;
        }
        let dist_info = target.join(format!("{name}-{version}.dist-info"));
        fs::create_dir_all(&dist_info)?;
        fs::write(
            dist_info.join("METADATA"),
            format!("Metadata-Version: 2.1\nName: {name}\nVersion: {version}\n"),
        )?;
        Ok(success(format!("Installed {name}=={version}\n")))
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, program: &Path, args: &[String], _cwd: &Path) -> Result<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{} {}", program.display(), args.join(" ")));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["--version"] if self.uv_healthy => Ok(success("uv 0.4.30\n".to_string())),
            ["--version"] => Ok(failure(2, "uv: broken installation")),
            ["pip", "compile", spec_file] => self.compile(Path::new(spec_file)),
            ["freeze"] => Ok(success(self.freeze_output.clone())),
            ["pip", "install", spec, "--target", target]
            | ["install", spec, "--target", target] => self.install(spec, Path::new(target)),
            other => Ok(failure(127, &format!("unexpected invocation: {other:?}"))),
        }
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.located.get(name).cloned()
    }
}

fn success(stdout: String) -> ToolOutput {
    ToolOutput {
        code: 0,
        stdout,
        stderr: String::new(),
    }
}

fn failure(code: i32, stderr: &str) -> ToolOutput {
    ToolOutput {
        code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state.to_le_bytes()[0]
        })
        .collect()
}

/// Observer that keeps every event as a flat string.
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl BuildObserver for RecordingObserver {
    fn stage_started(&self, layer: &str, stage: Stage) {
        self.push(format!("start:{layer}:{stage}"));
    }

    fn stage_completed(&self, layer: &str, stage: Stage) {
        self.push(format!("done:{layer}:{stage}"));
    }

    fn stage_failed(&self, layer: &str, stage: Stage, error: &anyhow::Error) {
        self.push(format!("failed:{layer}:{stage}:{error}"));
    }

    fn package_installed(&self, name: &str, version: &str) {
        self.push(format!("installed:{name}=={version}"));
    }

    fn warning(&self, message: &str) {
        self.push(format!("warning:{message}"));
    }
}
