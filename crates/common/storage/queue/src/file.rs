// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Whole-file access to the queue file.
//!
//! Callers must hold the queue lock: the temporary file used for replacement
//! has a fixed name and is only safe with a single writer.

use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use snafu::ResultExt;

use crate::{Result, error::IoSnafu};

const TMP_SUFFIX: &str = ".tmp";

/// Appends `suffix` to the final component of `path`.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug, Clone)]
pub struct QueueFile {
    path:          PathBuf,
    tmp_path:      PathBuf,
    sync_on_write: bool,
}

impl QueueFile {
    pub fn new<P: Into<PathBuf>>(path: P, sync_on_write: bool) -> Self {
        let path = path.into();
        let tmp_path = with_suffix(&path, TMP_SUFFIX);
        Self {
            path,
            tmp_path,
            sync_on_write,
        }
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn exists(&self) -> Result<bool> {
        self.path
            .try_exists()
            .context(IoSnafu { path: &self.path })
    }

    /// Read the whole file. `None` when it does not exist.
    pub fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(IoSnafu { path: &self.path }),
        }
    }

    /// Replace the file contents with `data`.
    ///
    /// Data is written to a sibling temporary file and renamed over the
    /// target, so readers see either the old or the new contents.
    pub fn replace(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context(IoSnafu { path: parent })?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.tmp_path)
            .context(IoSnafu {
                path: &self.tmp_path,
            })?;
        file.write_all(data).context(IoSnafu {
            path: &self.tmp_path,
        })?;
        if self.sync_on_write {
            file.sync_all().context(IoSnafu {
                path: &self.tmp_path,
            })?;
        }
        drop(file);

        fs::rename(&self.tmp_path, &self.path).context(IoSnafu { path: &self.path })?;

        if self.sync_on_write {
            sync_parent_dir(&self.path);
        }
        Ok(())
    }

    /// Remove the file, tolerating its absence. Returns whether it existed.
    pub fn remove(&self) -> Result<bool> {
        let _ = fs::remove_file(&self.tmp_path);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(IoSnafu { path: &self.path }),
        }
    }
}

/// Persist the rename itself. Failures are ignored: not every platform can
/// open a directory for syncing.
fn sync_parent_dir(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
}
