use barry::cli::main_with_args;
use log::trace;
use std::{env, process};

fn main() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    trace!("start main");
    let code = main_with_args(env::args());
    trace!("end main");
    process::exit(code);
}
