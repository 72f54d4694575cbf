#![allow(dead_code)]

use std::{
    fs,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use serde_json::Value;
use tempfile::TempDir;

/// Stand-in for `uv` that understands `--version`, `pip compile` and
/// `pip install ... --target`. Requirements named `nosuchpkg` fail as unknown,
/// `conflicted` fails as unresolvable, and `FAKE_UV_PAYLOAD_KB` pads every
/// installed package with random bytes.
const FAKE_UV: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "uv 0.4.30 (fake)"
  exit 0
fi
if [ "$1" = "pip" ] && [ "$2" = "compile" ]; then
  while IFS= read -r line || [ -n "$line" ]; do
    case "$line" in
      ''|'#'*) continue ;;
    esac
    name=$(printf '%s' "$line" | sed -e 's/[][<>=!~;, ].*//' | tr 'A-Z' 'a-z')
    case "$line" in
      *==*) version=${line#*==} ;;
      *) version=1.0.0 ;;
    esac
    if [ "$name" = "nosuchpkg" ]; then
      echo "error: Because $name was not found in the package registry" >&2
      exit 1
    fi
    if [ "$name" = "conflicted" ]; then
      echo "error: No solution found when resolving dependencies" >&2
      exit 1
    fi
    echo "$name==$version"
    echo "    # via -r requirements.in"
  done < "$3"
  if [ -n "$FAKE_UV_TRANSITIVE" ]; then
    echo "$FAKE_UV_TRANSITIVE"
  fi
  exit 0
fi
if [ "$1" = "pip" ] && [ "$2" = "install" ]; then
  spec=$3
  target=$5
  name=${spec%%==*}
  version=${spec#*==}
  mkdir -p "$target/$name/tests" "$target/$name-$version.dist-info"
  printf '__version__ = "%s"\n' "$version" > "$target/$name/__init__.py"
  printf 'def test_it():\n    pass\n' > "$target/$name/tests/test_it.py"
  printf 'def check():\n    pass\n' > "$target/$name/api_test.py"
  printf 'Name: %s\nVersion: %s\n' "$name" "$version" > "$target/$name-$version.dist-info/METADATA"
  if [ -n "$FAKE_UV_PAYLOAD_KB" ]; then
    head -c $((FAKE_UV_PAYLOAD_KB * 1024)) /dev/urandom > "$target/$name/_data.bin"
  fi
  exit 0
fi
echo "unexpected invocation: $*" >&2
exit 2
"#;

pub struct Sandbox {
    temp: TempDir,
    uv: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = tempfile::Builder::new()
            .prefix("layerpack-cli")
            .tempdir()
            .expect("tempdir");
        let uv = temp.path().join("fake-uv");
        fs::write(&uv, FAKE_UV).expect("write fake uv");
        make_executable(&uv);
        fs::create_dir_all(temp.path().join("scratch")).expect("scratch root");
        Self { temp, uv }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("dist")
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("layerpack");
        cmd.current_dir(self.root())
            .env("LAYERPACK_UV", &self.uv)
            .env("LAYERPACK_SCRATCH_DIR", self.root().join("scratch"))
            .env_remove("LAYERPACK_KEEP_SCRATCH")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }

    pub fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.root().join("scratch"))
            .expect("read scratch root")
            .next()
            .is_none()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod fake uv");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

pub fn archive_entries(path: &Path) -> Vec<String> {
    let file = File::open(path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("read archive");
    (0..archive.len())
        .map(|index| archive.by_index(index).expect("entry").name().to_string())
        .collect()
}

pub fn archive_entry(path: &Path, name: &str) -> String {
    let file = File::open(path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("read archive");
    let mut entry = archive.by_name(name).expect("entry present");
    let mut body = String::new();
    entry.read_to_string(&mut body).expect("utf-8 entry");
    body
}

/// Exit code and captured streams of one invocation.
pub struct Run {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Run {
    pub fn json(&self) -> Value {
        parse_json(self.stdout.as_bytes())
    }
}

pub fn run(mut cmd: Command) -> Run {
    let output = cmd.output().expect("run layerpack");
    Run {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

pub fn parse_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("valid json output")
}
