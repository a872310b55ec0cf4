use std::env;
use std::process;

use mcp_wrapper_cli::{init_logging, run, LogSettings};

fn main() {
    init_logging(&LogSettings::from_env());
    process::exit(run(env::args_os().collect()));
}
