//! Static build metadata surfaced by `GET /health`.

pub struct BuildInfo {
    pub version: &'static str,
}

pub static BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
};
