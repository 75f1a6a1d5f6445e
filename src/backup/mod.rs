pub mod artifact;
pub mod command;
pub mod compress;
pub mod database;
pub mod dependency;
pub mod dump;
pub mod encrypt;
pub mod file_ext;
pub mod file_name;
pub mod heartbeat;
pub mod logging;
pub mod pipeline;
pub mod redacted;
pub mod result_error;
pub mod run_config;
pub mod tables;
pub mod upload;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
