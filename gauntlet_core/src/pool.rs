use rand_core::RngCore;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading a command pool.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool file does not exist at the expected path.
    #[error("Command pool file not found: {0:?}")]
    NotFound(PathBuf),

    /// The pool file exists but could not be read.
    #[error("Failed to read command pool {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pool file contained no usable commands after filtering.
    #[error("Command pool {0:?} has no usable commands")]
    Empty(PathBuf),
}

/// An ordered, immutable set of candidate input lines.
///
/// Attempt command sequences are drawn from the pool uniformly at random,
/// with replacement. The pool never changes for the duration of a run.
#[derive(Debug, Clone)]
pub struct CommandPool {
    commands: Vec<String>,
}

impl CommandPool {
    /// Loads a pool from a newline-delimited file.
    ///
    /// Lines that are empty after trimming, or whose first non-whitespace
    /// character is `#`, are ignored.
    pub fn load(path: &Path) -> Result<Self, PoolError> {
        if !path.exists() {
            return Err(PoolError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| PoolError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let commands: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        if commands.is_empty() {
            return Err(PoolError::Empty(path.to_path_buf()));
        }
        Ok(Self { commands })
    }

    /// The pool file the generator expects, next to the target:
    /// the target path with its extension replaced by `inputs`.
    pub fn inputs_path_for(target: &Path) -> PathBuf {
        target.with_extension("inputs")
    }

    /// The fixed replay script the checker expects:
    /// the target path with its extension replaced by `solution`.
    pub fn solution_path_for(target: &Path) -> PathBuf {
        target.with_extension("solution")
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Draws `len` commands uniformly at random, with replacement.
    pub fn sample_sequence(&self, len: usize, rng: &mut dyn RngCore) -> Vec<String> {
        (0..len)
            .map(|_| {
                let idx = rng.next_u64() as usize % self.commands.len();
                self.commands[idx].clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;
    use std::io::Write;

    fn write_pool(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_filters_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pool(
            dir.path(),
            "game.inputs",
            "north\n\n  \n# a comment\n   # indented comment\nsouth\n  look  \n",
        );

        let pool = CommandPool::load(&path).unwrap();
        assert_eq!(pool.commands(), &["north", "south", "look"]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn load_missing_file_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.inputs");
        match CommandPool::load(&path) {
            Err(PoolError::NotFound(p)) => assert_eq!(p, path),
            other => panic!("Expected PoolError::NotFound, got {other:?}"),
        }
    }

    #[test]
    fn load_comment_only_file_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pool(dir.path(), "game.inputs", "# only\n\n   \n# comments\n");
        match CommandPool::load(&path) {
            Err(PoolError::Empty(p)) => assert_eq!(p, path),
            other => panic!("Expected PoolError::Empty, got {other:?}"),
        }
    }

    #[test]
    fn sample_sequence_has_requested_length_and_pool_membership() {
        let pool = CommandPool {
            commands: vec!["x".to_string(), "y".to_string()],
        };
        let mut rng = ChaCha8Rng::from_seed([7u8; 32]);

        let sequence = pool.sample_sequence(25, &mut rng);
        assert_eq!(sequence.len(), 25);
        for cmd in &sequence {
            assert!(
                pool.commands().contains(cmd),
                "sampled command {cmd:?} not in pool"
            );
        }
    }

    #[test]
    fn sample_sequence_is_deterministic_for_a_fixed_seed() {
        let pool = CommandPool {
            commands: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        let mut rng1 = ChaCha8Rng::from_seed([42u8; 32]);
        let mut rng2 = ChaCha8Rng::from_seed([42u8; 32]);

        assert_eq!(
            pool.sample_sequence(100, &mut rng1),
            pool.sample_sequence(100, &mut rng2)
        );
    }

    #[test]
    fn derived_paths_replace_the_extension() {
        let target = Path::new("/tmp/labs/game.bin");
        assert_eq!(
            CommandPool::inputs_path_for(target),
            PathBuf::from("/tmp/labs/game.inputs")
        );
        assert_eq!(
            CommandPool::solution_path_for(target),
            PathBuf::from("/tmp/labs/game.solution")
        );
    }
}
