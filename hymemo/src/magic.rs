/// Name of the environment variable containing the path to the hymemo configuration file.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CONFIG_HOME/hyperion/hymemo.toml` or `$HOME/.config/hyperion/hymemo.toml`
///  (2) on Windows: `%APPDATA%\hyperion\hymemo.toml`
pub const ENV_MEMO_CONFIG_PATH: &str = "HYMEMO_CONFIG_PATH";

/// File name of the configuration file inside the hyperion configuration directory.
pub const MEMO_CONFIG_FILE_NAME: &str = "hymemo.toml";

/// Directory shared by every hyperion configuration file.
pub const HYPERION_CONFIG_DIR_NAME: &str = "hyperion";
