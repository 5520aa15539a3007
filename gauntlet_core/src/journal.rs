use crate::executor::AttemptOutcome;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Marker prefix for lines the harness itself writes into the log,
/// distinguishing them from captured target output.
const MARKER_PREFIX: &str = "%%";

/// File-name prefix that distinguishes harness logs from anything the
/// target itself might write next to the executable.
const LOG_FILE_PREFIX: &str = "AI-";

/// Owns one attempt's log file, from temp creation to promote-or-discard.
///
/// The journal is shared between the control flow (input echoes, terminal
/// marker) and the output drain thread (captured lines); all writes go
/// through one mutex so lines never interleave. Every line is flushed as it
/// is written, so partial output survives abrupt termination.
///
/// The temp file never outlives the attempt: [`AttemptJournal::finish`]
/// renames it to the final path on a natural finish and deletes it
/// otherwise, and `Drop` deletes it if the attempt ended without reaching
/// `finish` at all.
#[derive(Debug)]
pub struct AttemptJournal {
    writer: Mutex<Option<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

/// The final (promoted) log path for a target: the target's file name with
/// its extension replaced by `log` and a fixed `AI-` prefix, in the
/// target's own directory.
pub fn log_path_for(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".to_string());
    target.with_file_name(format!("{LOG_FILE_PREFIX}{stem}.log"))
}

impl AttemptJournal {
    /// Opens the temp log for one attempt and writes the start marker.
    ///
    /// Parent directories are created as needed. Only `finish` can turn
    /// the temp file into the user-visible final log.
    pub fn begin(target: &Path) -> io::Result<Self> {
        let final_path = log_path_for(target);
        let tmp_path = match final_path.extension() {
            Some(ext) => {
                let mut ext = ext.to_os_string();
                ext.push(".tmp");
                final_path.with_extension(ext)
            }
            None => final_path.with_extension("tmp"),
        };

        if let Some(parent) = final_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&tmp_path)?;
        writeln!(file, "{MARKER_PREFIX} [SESSION START]")?;
        file.flush()?;

        Ok(Self {
            writer: Mutex::new(Some(file)),
            tmp_path,
            final_path,
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Appends an input-echo marker for one command sent to the target.
    pub fn echo_input(&self, command: &str) -> io::Result<()> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{MARKER_PREFIX} {command}")?;
            file.flush()?;
        }
        Ok(())
    }

    /// Appends one captured line of target output.
    pub fn append_output(&self, line: &str) -> io::Result<()> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{line}")?;
            file.flush()?;
        }
        Ok(())
    }

    /// Writes the terminal marker, closes the file, and promotes or
    /// discards the temp log.
    ///
    /// On [`AttemptOutcome::Finished`] the temp file is renamed onto the
    /// final path (replacing any prior final log) and the promoted path is
    /// returned. On [`AttemptOutcome::NotFinished`] the temp file is
    /// deleted and `None` is returned. Calling `finish` twice is a no-op.
    pub fn finish(&self, outcome: &AttemptOutcome) -> io::Result<Option<PathBuf>> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut file) = guard.take() else {
            return Ok(None);
        };

        match outcome {
            AttemptOutcome::Finished(code) => {
                writeln!(file, "\n{MARKER_PREFIX} [SESSION FINISHED rc={code}]")?;
            }
            AttemptOutcome::NotFinished => {
                writeln!(file, "\n{MARKER_PREFIX} [SESSION NOT FINISHED]")?;
            }
        }
        file.flush()?;
        drop(file);

        match outcome {
            AttemptOutcome::Finished(_) => {
                fs::rename(&self.tmp_path, &self.final_path)?;
                Ok(Some(self.final_path.clone()))
            }
            AttemptOutcome::NotFinished => {
                match fs::remove_file(&self.tmp_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
                Ok(None)
            }
        }
    }
}

impl Drop for AttemptJournal {
    fn drop(&mut self) {
        // An attempt that never reached `finish` must not leak its temp file.
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
