//
// sequences.rs
// Seg-Audit
//
// Subject discovery, per-subject sequence loading and small label-volume transformations.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::{s, Array3, ArrayView3};
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{AuditError, AuditResult};
use crate::volume::{Volume, VolumeFormat};

/// One requested sequence of a subject; `volume` is `None` when it was not acquired or failed to load.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub name: String,
    pub volume: Option<Volume>,
}

/// Sorted names of the immediate sub-directories of `root`.
///
/// A missing or unreadable `root` is an error; unreadable entries below it are skipped.
pub fn list_subjects(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(AuditError::MissingDirectory(root.to_path_buf()).into());
    }
    let mut subjects = Vec::new();
    for entry in WalkDir::new(root).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to read directory {:?}", root))
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            subjects.push(name.to_owned());
        }
    }
    subjects.sort();
    Ok(subjects)
}

/// Locates `{root}/{subject}/{subject}{suffix}.{ext}` trying every supported extension.
pub fn sequence_path(root: &Path, subject: &str, suffix: &str) -> Option<PathBuf> {
    let dir = root.join(subject);
    VolumeFormat::ALL
        .into_iter()
        .map(|format| dir.join(format!("{subject}{suffix}.{}", format.extension())))
        .find(|candidate| candidate.is_file())
}

/// Loads a single sequence, failing when no file matches the naming convention.
pub fn load_sequence(root: &Path, subject: &str, suffix: &str) -> Result<Volume> {
    let path = sequence_path(root, subject, suffix).ok_or_else(|| {
        AuditError::Invalid(format!(
            "no volume found for subject {subject} with suffix {suffix} under {:?}",
            root
        ))
    })?;
    Volume::open(&path)
}

/// Loads every requested sequence of one subject, keyed by suffix without its leading underscore.
pub fn read_sequences(root: &Path, subject: &str, suffixes: &[String]) -> AuditResult<Vec<Sequence>> {
    if root.as_os_str().is_empty() {
        return Err(AuditError::Invalid("dataset root must not be empty".into()));
    }
    if subject.is_empty() {
        return Err(AuditError::Invalid("subject id must not be empty".into()));
    }

    let sequences = suffixes
        .iter()
        .map(|suffix| {
            let name = suffix.trim_start_matches('_').to_string();
            let volume = match sequence_path(root, subject, suffix) {
                None => {
                    debug!("Sequence {suffix} missing for {subject}");
                    None
                }
                Some(path) => match Volume::open(&path) {
                    Ok(volume) => Some(volume),
                    Err(e) => {
                        warn!("Failed to load {:?}: {:#}", path, e);
                        None
                    }
                },
            };
            Sequence { name, volume }
        })
        .collect();
    Ok(sequences)
}

/// Replaces `original[i]` by `replacement[i]` simultaneously; other values are kept.
pub fn label_replacement(
    volume: ArrayView3<f32>,
    original: &[f64],
    replacement: &[f64],
) -> AuditResult<Array3<f32>> {
    if original.len() != replacement.len() {
        return Err(AuditError::LabelLengthMismatch {
            original: original.len(),
            replacement: replacement.len(),
        });
    }
    let lookup: HashMap<OrderedFloat<f32>, f32> = original
        .iter()
        .zip(replacement)
        .map(|(&from, &to)| (OrderedFloat(from as f32), to as f32))
        .collect();
    Ok(volume.mapv(|v| lookup.get(&OrderedFloat(v)).copied().unwrap_or(v)))
}

/// Crops to the bounding box of non-zero voxels grown by `padding` and clipped to the volume.
pub fn fit_brain_boundaries(volume: ArrayView3<f32>, padding: usize) -> Array3<f32> {
    let shape = volume.shape();
    let mut lower = [usize::MAX; 3];
    let mut upper = [0usize; 3];
    let mut any = false;
    for ((z, y, x), &v) in volume.indexed_iter() {
        if v != 0.0 {
            any = true;
            for (axis, idx) in [z, y, x].into_iter().enumerate() {
                lower[axis] = lower[axis].min(idx);
                upper[axis] = upper[axis].max(idx);
            }
        }
    }
    if !any {
        return volume.to_owned();
    }

    let start: Vec<usize> = lower.iter().map(|&l| l.saturating_sub(padding)).collect();
    let end: Vec<usize> = upper
        .iter()
        .zip(shape)
        .map(|(&u, &len)| (u + 1 + padding).min(len))
        .collect();
    volume
        .slice(s![start[0]..end[0], start[1]..end[1], start[2]..end[2]])
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr3, Array3};
    use std::fs;
    use tempfile::tempdir;

    fn sample_segmentation() -> Array3<f32> {
        arr3(&[[[0.0, 1.0, 2.0], [3.0, 0.0, 1.0], [2.0, 3.0, 0.0]]])
    }

    #[test]
    fn label_replacement_maps_every_listed_label() {
        let out = label_replacement(
            sample_segmentation().view(),
            &[0.0, 1.0, 2.0, 3.0],
            &[10.0, 11.0, 12.0, 13.0],
        )
        .expect("replace");
        assert_eq!(
            out,
            arr3(&[[[10.0, 11.0, 12.0], [13.0, 10.0, 11.0], [12.0, 13.0, 10.0]]])
        );
    }

    #[test]
    fn label_replacement_keeps_unlisted_labels() {
        let out = label_replacement(sample_segmentation().view(), &[1.0, 2.0], &[101.0, 102.0])
            .expect("replace");
        assert_eq!(
            out,
            arr3(&[[[0.0, 101.0, 102.0], [3.0, 0.0, 101.0], [102.0, 3.0, 0.0]]])
        );
        let same = label_replacement(sample_segmentation().view(), &[], &[]).expect("noop");
        assert_eq!(same, sample_segmentation());
    }

    #[test]
    fn label_replacement_is_simultaneous() {
        let out = label_replacement(sample_segmentation().view(), &[1.0, 2.0], &[2.0, 1.0])
            .expect("swap");
        assert_eq!(
            out,
            arr3(&[[[0.0, 2.0, 1.0], [3.0, 0.0, 2.0], [1.0, 3.0, 0.0]]])
        );
    }

    #[test]
    fn label_replacement_matches_fractional_labels() {
        let volume = arr3(&[[[0.1_f32, 0.2, 0.0]]]);
        let out = label_replacement(volume.view(), &[0.1, 0.2], &[1.0, 2.0]).expect("replace");
        assert_eq!(out, arr3(&[[[1.0, 2.0, 0.0]]]));
    }

    #[test]
    fn label_replacement_rejects_mismatched_lengths() {
        let err = label_replacement(sample_segmentation().view(), &[0.0, 1.0], &[10.0]).unwrap_err();
        assert!(matches!(
            err,
            AuditError::LabelLengthMismatch {
                original: 2,
                replacement: 1
            }
        ));
    }

    #[test]
    fn fit_brain_boundaries_pads_and_clips() {
        let mut volume = Array3::<f32>::zeros((10, 10, 10));
        volume.slice_mut(s![2..8, 2..8, 2..8]).fill(1.0);
        assert_eq!(fit_brain_boundaries(volume.view(), 1).shape(), &[8, 8, 8]);
        assert_eq!(fit_brain_boundaries(volume.view(), 0).shape(), &[6, 6, 6]);

        let mut corner = Array3::<f32>::zeros((10, 10, 10));
        corner.slice_mut(s![8.., 8.., 8..]).fill(1.0);
        assert_eq!(fit_brain_boundaries(corner.view(), 2).shape(), &[4, 4, 4]);

        let full = Array3::<f32>::ones((10, 10, 10));
        assert_eq!(fit_brain_boundaries(full.view(), 1).shape(), &[10, 10, 10]);
    }

    #[test]
    fn fit_brain_boundaries_keeps_empty_volume() {
        let empty = Array3::<f32>::zeros((4, 5, 6));
        assert_eq!(fit_brain_boundaries(empty.view(), 1), empty);
    }

    #[test]
    fn read_sequences_rejects_empty_arguments() {
        let suffixes = vec!["_t1".to_string()];
        assert!(read_sequences(Path::new(""), "subject_1", &suffixes).is_err());
        assert!(read_sequences(Path::new("/mock/path"), "", &suffixes).is_err());
    }

    #[test]
    fn read_sequences_marks_missing_and_broken_files() {
        let root = tempdir().expect("tempdir");
        let subject_dir = root.path().join("subject_1");
        fs::create_dir_all(&subject_dir).expect("subject dir");
        fs::write(subject_dir.join("subject_1_t1.nii"), b"not a nifti").expect("write");

        let suffixes = vec!["_t1".to_string(), "_t2".to_string()];
        let sequences = read_sequences(root.path(), "subject_1", &suffixes).expect("read");
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0].name, "t1");
        assert!(sequences[0].volume.is_none());
        assert_eq!(sequences[1].name, "t2");
        assert!(sequences[1].volume.is_none());
    }

    #[test]
    fn list_subjects_returns_sorted_directories() {
        let root = tempdir().expect("tempdir");
        for name in ["b_002", "a_001"] {
            fs::create_dir_all(root.path().join(name)).expect("dir");
        }
        fs::write(root.path().join("notes.txt"), b"x").expect("file");
        let subjects = list_subjects(root.path()).expect("list");
        assert_eq!(subjects, vec!["a_001".to_string(), "b_002".to_string()]);
    }

    #[test]
    fn list_subjects_fails_on_missing_root() {
        let root = tempdir().expect("tempdir");
        let missing = root.path().join("not_here");
        let err = list_subjects(&missing).unwrap_err();
        assert!(err.to_string().contains("not a directory"));

        let file = root.path().join("notes.txt");
        fs::write(&file, b"x").expect("file");
        assert!(list_subjects(&file).is_err());
    }
}
