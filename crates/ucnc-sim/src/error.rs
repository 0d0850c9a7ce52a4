//! Harness-level errors: configuration loading and fixture I/O. The
//! motion-path crates stay on plain `Copy` enums (see
//! `ucnc_motion::error`); this crate is the one place in the workspace
//! with a heap and a filesystem, so it uses `thiserror` the way the
//! reference workspace's host-facing crates do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
