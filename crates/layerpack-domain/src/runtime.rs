use std::path::PathBuf;
use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Python runtimes the function platform accepts for layers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum PythonRuntime {
    #[strum(serialize = "python3.7")]
    Python37,
    #[strum(serialize = "python3.8")]
    Python38,
    #[strum(serialize = "python3.9")]
    Python39,
    #[strum(serialize = "python3.10")]
    Python310,
    #[strum(serialize = "python3.11")]
    Python311,
}

impl PythonRuntime {
    /// Parse an identifier such as `python3.9`; surrounding whitespace is ignored.
    pub fn parse(identifier: &str) -> Option<Self> {
        Self::from_str(identifier.trim()).ok()
    }

    /// The `major.minor` interpreter version.
    pub fn version(self) -> &'static str {
        match self {
            Self::Python37 => "3.7",
            Self::Python38 => "3.8",
            Self::Python39 => "3.9",
            Self::Python310 => "3.10",
            Self::Python311 => "3.11",
        }
    }

    /// Site-packages location relative to the layer root.
    pub fn site_packages(self) -> PathBuf {
        PathBuf::from("python")
            .join("lib")
            .join(format!("python{}", self.version()))
            .join("site-packages")
    }

    pub fn supported() -> Vec<&'static str> {
        Self::iter().map(<&'static str>::from).collect()
    }
}
