// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Append-only audit log files.

Merge events are recorded as comma-separated lines, one event per line, each
event category in its own file under the log directory. Appends from
concurrently running merge tasks are serialized behind a mutex so partial
lines never interleave.
*/

use std::{fs::OpenOptions, io::Write, path::PathBuf, sync::Mutex};

/// File recording banned package determinations.
pub const BANNED_LOG: &str = "bannedpackages.txt";

/// File recording packages that depend on the tracked package.
pub const TRACKED_LOG: &str = "libsystemd.txt";

/// File recording obsolete version notices for a suite.
pub fn obsolete_log(suite: &str) -> String {
    format!("{}-oldpackages.txt", suite)
}

/// Shared sink for audit event lines.
pub struct AuditLog {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    /// Construct an instance, creating the log directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Append one line to the named log file.
    pub fn append(&self, basename: &str, line: &str) -> std::io::Result<()> {
        self.append_many(basename, std::iter::once(line))
    }

    /// Append a batch of lines to the named log file in one write.
    pub fn append_many<'a>(
        &self,
        basename: &str,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> std::io::Result<()> {
        let mut buf = String::new();
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }

        if buf.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().expect("audit log lock poisoned");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(basename))?;

        file.write_all(buf.as_bytes())
    }
}
