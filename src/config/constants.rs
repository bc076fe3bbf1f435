//! Constants for assetpipe

/// Default config file, looked up in the working directory
pub const CONFIG_FILE: &str = "assetpipe.toml";

/// Default source tree
pub const SOURCE_DIR: &str = "./src/";

/// Default destination tree
pub const DIST_DIR: &str = "./dist/";

/// Default third-party bundle consumed read-only
pub const VENDOR_DIR: &str = "./node_modules/bootstrap-sass/";

/// Default markup extension
pub const MARKUP_EXTENSION: &str = "html";

/// Watch polling interval in milliseconds
pub const POLL_INTERVAL_MS: u64 = 500;

/// Name of the minified, concatenated stylesheet
pub const STYLE_BUNDLE: &str = "style.min.css";

/// Name of the minified, concatenated script
pub const SCRIPT_BUNDLE: &str = "script.min.js";

/// Default JPEG re-encoding quality
pub const JPEG_QUALITY: u8 = 85;

/// Separator used when concatenating bundle members
pub const CONCAT_SEPARATOR: &str = "\n";
