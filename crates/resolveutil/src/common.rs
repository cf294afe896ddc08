// moon: The build system and package manager for MoonBit.
// Copyright (C) 2024 International Digital Economy Academy
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// For inquiries, you can contact us via e-mail at jichuruanjian@idea.edu.cn.

use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

/// File name of the configuration file inside the home directory.
pub const CONFIG_JSON: &str = "config.json";

/// Name of the component metadata file inside a file repository.
pub const COMPONENT_JSON: &str = "component.json";

/// An exclusive advisory lock on `<dir>/<name>.lock`, released on drop.
///
/// Separate processes sharing one cache directory serialize on it.
pub struct FileLock {
    _file: std::fs::File,
    path: PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self._file) {
            log::warn!("failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

impl FileLock {
    pub fn lock(dir: &Path, name: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.lock"));
        let file = std::fs::File::create(&path)?;
        match file.try_lock_exclusive() {
            Ok(_) => Ok(FileLock { _file: file, path }),
            Err(_) => {
                log::info!("Blocking waiting for file lock {} ...", path.display());
                file.lock_exclusive()
                    .map_err(|e| std::io::Error::new(e.kind(), "failed to lock cache dir"))?;
                Ok(FileLock { _file: file, path })
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lock_is_reacquirable_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::lock(dir.path(), "cache").unwrap();
        assert!(lock.path().ends_with("cache.lock"));
        drop(lock);
        let again = FileLock::lock(dir.path(), "cache").unwrap();
        assert!(again.path().exists());
    }
}
