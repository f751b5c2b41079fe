pub mod build;
pub mod deploy;
pub mod publish;

pub type CmdResult<T> = roadie::Result<(T, i32)>;

/// Directory the pipeline runs in: the current working directory.
pub(crate) fn working_dir() -> roadie::Result<std::path::PathBuf> {
    std::env::current_dir().map_err(|e| {
        roadie::Error::internal_io(e.to_string(), Some("resolve working directory".to_string()))
    })
}
