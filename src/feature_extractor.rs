//
// feature_extractor.rs
// Seg-Audit
//
// Computes spatial, statistical, texture and tumour descriptors for every subject of every configured dataset.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::FeatureExtractorConfig;
use crate::labels::LabelMap;
use crate::models::{FeatureRecord, Features};
use crate::report::write_feature_table;
use crate::sequences::{list_subjects, read_sequences};
use crate::spacing::resolve_spacing;
use crate::spatial::SpatialFeatures;
use crate::statistical::StatisticalFeatures;
use crate::texture::TextureFeatures;
use crate::tumor::TumorFeatures;
use crate::volume::Volume;

/// Feature row of one subject. Missing sequences contribute NaN columns instead of being dropped.
pub fn subject_features(
    root: &Path,
    subject: &str,
    config: &FeatureExtractorConfig,
    labels: &LabelMap,
) -> Result<Features> {
    let sequences = read_sequences(root, subject, &config.sequences)?;
    let segmentation = read_sequences(root, subject, std::slice::from_ref(&config.segmentation))?
        .pop()
        .and_then(|s| s.volume);

    let reference = sequences.iter().find_map(|s| s.volume.as_ref());
    let spacing = resolve_spacing(reference.map(|v| v.spacing));
    let spatial = SpatialFeatures::new(reference.map(Volume::view), spacing);

    let mut features = Features::new();
    if config.features.spatial {
        features.extend(spatial.extract_features());
    }

    for sequence in &sequences {
        let view = sequence.volume.as_ref().map(Volume::view);
        if config.features.statistical {
            features.extend(
                StatisticalFeatures::new(view)
                    .extract_features()
                    .with_prefix(&sequence.name),
            );
        }
        if config.features.texture {
            features.extend(
                TextureFeatures::new(view, config.remove_empty_planes)
                    .extract_features(None)
                    .with_prefix(&sequence.name),
            );
        }
    }

    if config.features.tumor {
        // Both centroids are measured with the segmentation's spacing.
        let tumor_spacing = segmentation.as_ref().map_or(spacing, |s| s.spacing);
        let brain_centre = SpatialFeatures::new(reference.map(Volume::view), tumor_spacing).brain_center_mass();
        let tumor = TumorFeatures::new(segmentation.as_ref().map(Volume::view), tumor_spacing, Some(labels));
        features.extend(tumor.extract_features(Some(brain_centre)));
    }

    debug!("Extracted {} features for {subject}", features.len());
    Ok(features)
}

/// Feature rows for every subject of one dataset; failing subjects are logged and skipped.
pub fn extract_dataset(
    dataset: &str,
    root: &Path,
    config: &FeatureExtractorConfig,
    labels: &LabelMap,
) -> Result<Vec<FeatureRecord>> {
    let subjects =
        list_subjects(root).with_context(|| format!("Failed to list subjects in {:?}", root))?;
    info!("Starting feature extraction for dataset {dataset} ({} subjects)", subjects.len());

    let mut records = Vec::with_capacity(subjects.len());
    for (n, subject) in subjects.iter().enumerate() {
        if n % 10 == 0 && n > 0 {
            info!("Processed {n} patients");
        }
        match subject_features(root, subject, config, labels) {
            Ok(features) => records.push(FeatureRecord {
                id: subject.clone(),
                set: dataset.to_string(),
                features,
            }),
            Err(e) => warn!("Skipping subject {subject} of {dataset}: {:#}", e),
        }
    }
    info!("Finishing feature extraction for dataset {dataset}");
    Ok(records)
}

/// Full run: one table per dataset. Returns the written paths.
pub fn run(config: &FeatureExtractorConfig) -> Result<Vec<PathBuf>> {
    info!("Starting feature extraction process");
    info!("Config: {:#?}", config);
    let labels = config.label_map();

    let mut outputs = Vec::with_capacity(config.data_paths.len());
    for (dataset, root) in &config.data_paths {
        let records = extract_dataset(dataset, root, config, &labels)?;
        let output = config.output_file(dataset);
        write_feature_table(&output, &records)?;
        info!("Results exported to {:?} ({} rows)", output, records.len());
        outputs.push(output);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureToggles;
    use crate::spacing::Spacing;
    use ndarray::arr3;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn config(root: &Path) -> FeatureExtractorConfig {
        FeatureExtractorConfig {
            data_paths: BTreeMap::from([("train".to_string(), root.to_path_buf())]),
            labels: BTreeMap::from([("BKG".to_string(), 0.0), ("TUMOR".to_string(), 1.0)]),
            sequences: vec!["_t1".to_string()],
            segmentation: "_seg".to_string(),
            features: FeatureToggles::default(),
            remove_empty_planes: false,
            output_path: root.join("out"),
            logs_path: None,
        }
    }

    #[test]
    fn tumour_distance_uses_segmentation_spacing() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        Volume::new(arr3(&[[[1.0]], [[1.0]]]), Spacing::isotropic())
            .save_nifti(&root.join("P01/P01_t1.nii.gz"))
            .expect("t1");
        Volume::new(arr3(&[[[0.0]], [[1.0]]]), Spacing::new(2.0, 1.0, 1.0))
            .save_nifti(&root.join("P01/P01_seg.nii.gz"))
            .expect("seg");

        let config = config(root);
        let features = subject_features(root, "P01", &config, &config.label_map()).expect("features");
        // Brain centre at axial 0.5 voxel and tumour at axial 1 voxel, both 2 mm apart per voxel.
        assert_eq!(features.get("tumor_distance"), Some(1.0));
        assert_eq!(features.get("axial_tumor_centre_mass"), Some(2.0));
        assert_eq!(features.get("lesion_size"), Some(2.0));
    }

    #[test]
    fn missing_dataset_root_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let mut config = config(dir.path());
        config.data_paths = BTreeMap::from([("train".to_string(), dir.path().join("absent"))]);
        assert!(run(&config).is_err());
        assert!(!config.output_file("train").exists());
    }
}
