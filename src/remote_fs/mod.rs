//! Remote filesystem operations built from plain shell commands
//!
//! Everything here runs through [`crate::ssh::Session::execute`]; no file
//! transfer subsystem is needed on the server, only a POSIX shell with
//! `ls`, `base64`, `mv` and `rm`.

pub mod codec;
mod error;
pub mod listing;
pub mod path_utils;
pub mod shell;
pub mod transfer;

pub use error::{ListError, TransferError};
pub use listing::{filter_entries, list_directory, parse_listing, RemoteEntry};
pub use transfer::{
    fetch_file, rename_file, rename_in_place, upload_file, upload_file_chunked,
    upload_local_file,
};
