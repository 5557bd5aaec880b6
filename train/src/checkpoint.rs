use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::TrainError;
use crate::model::SpeakerModel;

const CHECKPOINT_PREFIX: &str = "model_";
const CHECKPOINT_EXT: &str = "ckpt";

/// A checkpoint file found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub path: PathBuf,
    pub step: u64,
    pub loss: f32,
}

/// Directory holding the most recent model checkpoint.
///
/// Files are named `model_{step}_{loss:.3}.ckpt`. Saving deletes every
/// earlier checkpoint first, so at most one is live. Files that are not
/// checkpoints are never touched. The new file is
/// written under a temporary name and renamed into place, so an
/// interrupted write is never picked up by [`CheckpointStore::latest`].
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a checkpoint at `step` with `loss`.
    pub fn file_name(step: u64, loss: f32) -> String {
        format!("{CHECKPOINT_PREFIX}{step}_{loss:.3}.{CHECKPOINT_EXT}")
    }

    /// The checkpoint with the highest step, if any.
    pub fn latest(&self) -> Result<Option<Checkpoint>, TrainError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&self.dir, e)),
        };

        let mut best: Option<Checkpoint> = None;
        for entry in entries {
            let path = entry.map_err(|e| io_err(&self.dir, e))?.path();
            let Some((step, loss)) = path.file_name().and_then(|n| n.to_str()).and_then(parse_file_name) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| step > b.step) {
                best = Some(Checkpoint { path, step, loss });
            }
        }
        Ok(best)
    }

    /// Replaces the live checkpoint with `model`'s state at `step`.
    pub fn save(&self, step: u64, loss: f32, model: &dyn SpeakerModel) -> Result<Checkpoint, TrainError> {
        self.clear()?;

        let path = self.dir.join(Self::file_name(step, loss));
        let tmp = path.with_extension(format!("{CHECKPOINT_EXT}.tmp"));
        {
            let file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
            let mut w = BufWriter::new(file);
            model.save(&mut w)?;
            let file = w.into_inner().map_err(|e| io_err(&tmp, e.into_error()))?;
            file.sync_all().map_err(|e| io_err(&tmp, e))?;
        }
        fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;

        debug!("saved checkpoint {}", path.display());
        Ok(Checkpoint { path, step, loss })
    }

    /// Loads `checkpoint` into `model`.
    pub fn restore(&self, checkpoint: &Checkpoint, model: &mut dyn SpeakerModel) -> Result<(), TrainError> {
        let file = File::open(&checkpoint.path).map_err(|e| io_err(&checkpoint.path, e))?;
        model.load(&mut BufReader::new(file))
    }

    /// Creates the directory if needed and deletes earlier checkpoints,
    /// including partial writes. Other entries are left alone.
    fn clear(&self) -> Result<(), TrainError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        for entry in fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))? {
            let path = entry.map_err(|e| io_err(&self.dir, e))?.path();
            if !path.is_file() || !is_checkpoint_file(&path) {
                continue;
            }
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
        Ok(())
    }
}

fn is_checkpoint_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.strip_suffix(".tmp").unwrap_or(name);
    parse_file_name(name).is_some()
}

fn parse_file_name(name: &str) -> Option<(u64, f32)> {
    let rest = name.strip_prefix(CHECKPOINT_PREFIX)?;
    let rest = rest.strip_suffix(CHECKPOINT_EXT)?.strip_suffix('.')?;
    let (step, loss) = rest.split_once('_')?;
    Some((step.parse().ok()?, loss.parse().ok()?))
}

fn io_err(path: &Path, e: std::io::Error) -> TrainError {
    TrainError::Io(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProjectionModel;

    #[test]
    fn file_name_format() {
        assert_eq!(CheckpointStore::file_name(12, 0.123456), "model_12_0.123.ckpt");
        assert_eq!(parse_file_name("model_12_0.123.ckpt"), Some((12, 0.123)));
        assert_eq!(parse_file_name("model_12_0.123.ckpt.tmp"), None);
        assert_eq!(parse_file_name("model_x_0.1.ckpt"), None);
        assert_eq!(parse_file_name("notes.txt"), None);
    }

    #[test]
    fn latest_on_missing_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoints"));
        assert_eq!(store.latest().unwrap(), None);
    }

    #[test]
    fn save_keeps_only_the_last_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoints"));
        let model = ProjectionModel::new(4, 0.1, 0);

        store.save(1, 0.5, &model).unwrap();
        let second = store.save(2, 0.25, &model).unwrap();

        let files: Vec<_> = fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.latest().unwrap(), Some(second));
    }

    #[test]
    fn save_leaves_other_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        fs::write(dir.path().join("notes.txt"), b"keep").unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data").join("x.wav"), b"keep").unwrap();
        fs::write(dir.path().join("model_4_0.300.ckpt.tmp"), b"partial").unwrap();
        fs::write(dir.path().join("model_notes.ckpt"), b"keep").unwrap();

        let model = ProjectionModel::new(4, 0.1, 0);
        store.save(1, 0.5, &model).unwrap();
        let ckpt = store.save(2, 0.25, &model).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["data", "model_2_0.250.ckpt", "model_notes.ckpt", "notes.txt"]);
        assert!(dir.path().join("data").join("x.wav").exists());
        assert_eq!(store.latest().unwrap(), Some(ckpt));
    }

    #[test]
    fn latest_ignores_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        fs::write(dir.path().join("model_3_0.100.ckpt"), b"x").unwrap();
        fs::write(dir.path().join("model_9_0.100.ckpt.tmp"), b"x").unwrap();

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.step, 3);
    }

    #[test]
    fn restore_round_trips_model_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let saved = ProjectionModel::new(4, 0.1, 5);
        let ckpt = store.save(7, 0.2, &saved).unwrap();

        let mut restored = ProjectionModel::new(4, 0.1, 6);
        store.restore(&ckpt, &mut restored).unwrap();

        let mut a = Vec::new();
        let mut b = Vec::new();
        saved.save(&mut a).unwrap();
        restored.save(&mut b).unwrap();
        assert_eq!(a, b);
    }
}
