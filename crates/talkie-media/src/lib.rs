//! Wrapper around the external talking-head inference tool.
//!
//! This crate provides:
//! - A builder for the inference command line
//! - A runner that captures exit code, stdout and stderr in full
//! - Parsing of the result file reference printed on stdout

pub mod command;
pub mod error;
pub mod result;

pub use command::{check_executable, InferenceCommand, InferenceRunner, ProcessOutput};
pub use error::{MediaError, MediaResult};
pub use result::parse_result_file;
