use std::process;

use mcp_wrapper_cli::{init_logging, run_uninstaller, LogSettings};

fn main() {
    init_logging(&LogSettings::from_env());
    process::exit(run_uninstaller());
}
