/// Application name used for per-user directories.
pub const APP_NAME: &str = "suitebuild";

/// Length of the truncated hash used for record file names.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Environment variable overriding the artifact cache directory.
pub const CACHE_DIR_ENV: &str = "SUITE_CACHE_DIR";

/// Default build target directory, relative to the suite root.
pub const DEFAULT_TARGET_DIR: &str = "target";

/// Version used for `EffectiveVersion` when neither project nor suite declares one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Name of the suite description file looked up by the CLI.
pub const SUITE_FILE_NAME: &str = "suite.yaml";
