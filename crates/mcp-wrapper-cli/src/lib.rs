mod dispatch;
mod launcher;
mod logging;
mod render;

pub use dispatch::{
    parse_wrapper_command, run, run_uninstaller, wrapper_help, WrapperCommand, EXIT_FAILURE,
    EXIT_SUCCESS,
};
pub use launcher::exit_code;
pub use logging::{init as init_logging, LogFormat, LogSettings, LOG_ENV, LOG_JSON_ENV};
pub use render::{current_output_style, render_status_line, OutputStyle, Stream};

#[cfg(test)]
mod tests;
