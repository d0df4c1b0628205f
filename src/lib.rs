pub mod application;
pub mod archive;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod package;
pub mod remote;
pub mod runtime;

pub use error::{PmError, Result};

/// Test utilities shared by unit tests.
#[cfg(test)]
pub mod test_utils {
    use crate::runtime::{MockRuntime, RealRuntime, Runtime};
    use std::path::PathBuf;

    /// A mock runtime that performs real file system operations but reports
    /// `cwd` as the working directory, so tests never change the process
    /// working directory.
    pub fn mock_runtime_in(cwd: PathBuf) -> MockRuntime {
        let mut runtime = MockRuntime::new();

        runtime
            .expect_current_dir()
            .returning(move || Ok(cwd.clone()));

        runtime
            .expect_rename()
            .returning(|from, to| RealRuntime.rename(from, to));
        runtime
            .expect_create_dir_all()
            .returning(|path| RealRuntime.create_dir_all(path));
        runtime
            .expect_remove_file()
            .returning(|path| RealRuntime.remove_file(path));
        runtime
            .expect_exists()
            .returning(|path| RealRuntime.exists(path));
        runtime
            .expect_read_dir()
            .returning(|path| RealRuntime.read_dir(path));
        runtime
            .expect_create_file()
            .returning(|path| RealRuntime.create_file(path));
        runtime.expect_open().returning(|path| RealRuntime.open(path));
        runtime
            .expect_remove_dir_all()
            .returning(|path| RealRuntime.remove_dir_all(path));
        runtime
            .expect_is_dir()
            .returning(|path| RealRuntime.is_dir(path));
        runtime
            .expect_glob()
            .returning(|pattern| RealRuntime.glob(pattern));
        runtime
            .expect_file_mode()
            .returning(|path| RealRuntime.file_mode(path));
        runtime
            .expect_set_permissions()
            .returning(|path, mode| RealRuntime.set_permissions(path, mode));

        runtime
    }
}
