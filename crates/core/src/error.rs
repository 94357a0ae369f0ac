use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("path must be absolute: {path}")]
    PathNotAbsolute { path: PathBuf },

    #[error("path must be relative: {path}")]
    PathNotRelative { path: PathBuf },

    #[error("{path} is not under {base}")]
    NotUnderBase { path: PathBuf, base: PathBuf },

    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path { path: PathBuf },
}
