//! Checkpoints saved by a training run.
use crate::{EvalError, EvaluatorConfig};
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A checkpoint file of a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Path to the checkpoint file.
    pub path: PathBuf,

    /// Generation parsed from the file name, `None` if the name has no valid number.
    pub generation: Option<u64>,
}

impl Checkpoint {
    /// Constructs a checkpoint, parsing the generation from its file name.
    pub fn new(path: impl Into<PathBuf>, config: &EvaluatorConfig) -> Self {
        let path = path.into();
        let generation = parse_generation(
            &path,
            &config.checkpoint_marker,
            &config.checkpoint_extension,
        );
        Self { path, generation }
    }
}

/// Parses the generation number embedded in a checkpoint file name.
///
/// The number is the token between the last occurrence of `marker` and the
/// first occurrence of `extension` after it, e.g., `snapshot_120.h5` gives `120`.
pub fn parse_generation(path: &Path, marker: &str, extension: &str) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let token = name.rsplit(marker).next()?;
    let token = token.split(extension).next()?;
    token.parse().ok()
}

/// Lists the checkpoints in the directory of a run.
///
/// Checkpoints are ordered by generation. Files with an unparsable generation
/// come last, ordered by name.
pub fn discover_checkpoints(dir: &Path, config: &EvaluatorConfig) -> Result<Vec<Checkpoint>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to list run directory {:?}", dir))?;
    let mut checkpoints = vec![];

    for entry in entries {
        let path = entry?.path();
        let is_checkpoint = path.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| {
                    name.contains(&config.checkpoint_marker)
                        && name.ends_with(&config.checkpoint_extension)
                });
        if is_checkpoint {
            checkpoints.push(Checkpoint::new(path, config));
        }
    }

    checkpoints.sort_by(|a, b| {
        (a.generation.is_none(), a.generation, &a.path).cmp(&(
            b.generation.is_none(),
            b.generation,
            &b.path,
        ))
    });

    Ok(checkpoints)
}

/// Selects every `stride`-th checkpoint, starting from the first one.
///
/// `None` selects all checkpoints. The order of the checkpoints is preserved.
pub fn select_checkpoints(
    checkpoints: &[Checkpoint],
    stride: Option<usize>,
) -> Result<Vec<&Checkpoint>, EvalError> {
    match stride {
        Some(0) => Err(EvalError::InvalidStride(0)),
        _ => Ok(checkpoints.iter().step_by(stride.unwrap_or(1)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_parse_generation() {
        let p = |s: &str| parse_generation(Path::new(s), "snapshot_", ".h5");
        assert_eq!(p("/runs/seed0/snapshot_120.h5"), Some(120));
        assert_eq!(p("snapshot_0.h5"), Some(0));
        assert_eq!(p("snapshot_best.h5"), None);
        assert_eq!(p("model.h5"), None);
        assert_eq!(p("old_snapshot_snapshot_7.h5"), Some(7));
    }

    #[test]
    fn test_select_checkpoints() {
        let config = EvaluatorConfig::default();
        let checkpoints = (0..7)
            .map(|i| Checkpoint::new(format!("snapshot_{}.h5", i * 10), &config))
            .collect::<Vec<_>>();

        let gens = |s| {
            select_checkpoints(&checkpoints, s)
                .unwrap()
                .iter()
                .map(|c| c.generation.unwrap())
                .collect::<Vec<_>>()
        };

        assert_eq!(gens(None), vec![0, 10, 20, 30, 40, 50, 60]);
        assert_eq!(gens(Some(1)), vec![0, 10, 20, 30, 40, 50, 60]);
        assert_eq!(gens(Some(3)), vec![0, 30, 60]);
        assert_eq!(gens(Some(10)), vec![0]);
        assert!(select_checkpoints(&checkpoints, Some(0)).is_err());
    }

    #[test]
    fn test_discover_checkpoints() -> Result<()> {
        let dir = TempDir::new("discover_checkpoints")?;
        for name in &[
            "snapshot_100.h5",
            "snapshot_20.h5",
            "snapshot_final.h5",
            "snapshot_3.h5",
            "log.csv",
            "ob_normalization_3.npy",
        ] {
            fs::write(dir.path().join(name), "1.0")?;
        }

        let checkpoints = discover_checkpoints(dir.path(), &EvaluatorConfig::default())?;
        let gens = checkpoints.iter().map(|c| c.generation).collect::<Vec<_>>();
        assert_eq!(gens, vec![Some(3), Some(20), Some(100), None]);
        Ok(())
    }

    #[test]
    fn test_discover_checkpoints_with_custom_names() -> Result<()> {
        let dir = TempDir::new("discover_custom_checkpoints")?;
        for name in &["ckpt-12.pt", "ckpt-4.pt", "snapshot_7.h5", "ckpt-4.pt.bak"] {
            fs::write(dir.path().join(name), "1.0")?;
        }

        let config = EvaluatorConfig::default()
            .checkpoint_marker("ckpt-")
            .checkpoint_extension(".pt");
        let checkpoints = discover_checkpoints(dir.path(), &config)?;
        let names = checkpoints
            .iter()
            .map(|c| (c.path.file_name().unwrap().to_str().unwrap(), c.generation))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![("ckpt-4.pt", Some(4)), ("ckpt-12.pt", Some(12))]);
        Ok(())
    }
}
