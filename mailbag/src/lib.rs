#[cfg(not(unix))]
compile_error!("Only unix platforms are currently supported");

pub mod cli;
pub mod runtime;
