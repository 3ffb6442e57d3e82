// Build-time identity from Cargo.toml, reported by GET /version

/// Package name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-line package description.
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
