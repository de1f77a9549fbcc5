// src/constants.rs

use colored::Color;

/// The annotation namespace: every metadata line reads `@vercel.<field> ...`.
pub const ANNOTATION_NAMESPACE: &str = "vercel";

/// File extension a file must carry to be considered a script.
pub const SCRIPT_EXTENSION: &str = "sh";

/// The name of the per-user configuration directory (inside the system config dir).
pub const APP_DIR_NAME: &str = "vss";

/// The name of the global store file (in ~/.config/vss/).
pub const GLOBAL_STORE_FILENAME: &str = "global.json";

/// The name of the per-project store file, kept in the working directory.
pub const PROJECT_STORE_FILENAME: &str = ".vss-app.json";

/// Where the runtime wrapper is materialized inside the cache directory.
pub const RUNTIME_FILENAME: &str = "runtime.sh";

/// Where bundled scripts are materialized inside the cache directory.
pub const BUNDLED_DIR_NAME: &str = "bundled";

/// File the runtime wrapper writes `export -p` to before sourcing a script.
pub const PRE_ENV_FILE_VAR: &str = "VSS_PRE_ENV_FILE";
/// File the runtime wrapper writes `export -p` to when the script exits.
pub const POST_ENV_FILE_VAR: &str = "VSS_POST_ENV_FILE";
/// Set to `1` in the child environment when `--debug` is given.
pub const DEBUG_VAR: &str = "VSS_DEBUG";

/// Output colors handed out to scripts in turn.
pub const PALETTE: [Color; 6] = [
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::Red,
];
