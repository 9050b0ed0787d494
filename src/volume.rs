//
// volume.rs
// Seg-Audit
//
// Loads NIfTI and multi-frame DICOM files into (axial, coronal, sagittal) ordered arrays with their voxel spacing.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dicom::core::Tag;
use dicom::object::open_file;
use dicom::pixeldata::PixelDecoder;
use ndarray::{Array3, ArrayView3, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::debug;

use crate::dicom_access::ElementAccess;
use crate::error::AuditError;
use crate::spacing::Spacing;

const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
const SPACING_BETWEEN_SLICES: Tag = Tag(0x0018, 0x0088);

/// A 3D volume resident in memory, indexed (axial, coronal, sagittal).
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub data: Array3<f32>,
    pub spacing: Spacing,
}

/// Supported on-disk formats, in lookup priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    NiftiGz,
    Nifti,
    Dicom,
}

impl VolumeFormat {
    pub const ALL: [VolumeFormat; 3] = [VolumeFormat::NiftiGz, VolumeFormat::Nifti, VolumeFormat::Dicom];

    pub fn extension(self) -> &'static str {
        match self {
            VolumeFormat::NiftiGz => "nii.gz",
            VolumeFormat::Nifti => "nii",
            VolumeFormat::Dicom => "dcm",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| name.ends_with(&format!(".{}", format.extension())))
    }
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: Spacing) -> Self {
        Self { data, spacing }
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    pub fn shape(&self) -> [usize; 3] {
        let s = self.data.shape();
        [s[0], s[1], s[2]]
    }

    /// Opens a volume file, choosing the reader from the file extension.
    pub fn open(path: &Path) -> Result<Self> {
        let format = VolumeFormat::from_path(path)
            .ok_or_else(|| AuditError::UnsupportedFormat(path.to_path_buf()))?;
        debug!("Loading {:?} as {:?}", path, format);
        match format {
            VolumeFormat::NiftiGz | VolumeFormat::Nifti => open_nifti(path),
            VolumeFormat::Dicom => open_dicom(path),
        }
    }

    /// Writes the volume as NIfTI, gzip-compressed when `path` ends in `.gz`.
    ///
    /// Axes and spacing are stored in NIfTI (x, y, z) order, so [`Volume::open`] reads back the same volume.
    pub fn save_nifti(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let spacing = self.spacing;
        let header = NiftiHeader {
            pixdim: [
                1.0,
                spacing.sagittal as f32,
                spacing.coronal as f32,
                spacing.axial as f32,
                1.0,
                1.0,
                1.0,
                1.0,
            ],
            ..NiftiHeader::default()
        };
        // [z, y, x] -> [x, y, z].
        let data = self.data.view().permuted_axes([2, 1, 0]);
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&data)
            .with_context(|| format!("Failed to write NIfTI file {:?}", path))?;
        debug!("Wrote {:?} with shape {:?}", path, self.shape());
        Ok(())
    }
}

fn open_nifti(path: &Path) -> Result<Volume> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {:?}", path))?;
    let pixdim = obj.header().pixdim;

    let mut data = obj
        .into_volume()
        .into_ndarray::<f32>()
        .context("Failed to convert NIfTI volume to ndarray")?;

    // Trailing singleton dimensions (time, components) carry no voxels.
    while data.ndim() > 3 && data.shape()[data.ndim() - 1] == 1 {
        let last = Axis(data.ndim() - 1);
        data = data.index_axis_move(last, 0);
    }
    if data.ndim() != 3 {
        return Err(AuditError::NotVolumetric(data.shape().to_vec()).into());
    }

    // [x, y, z] -> [z, y, x].
    let data = data
        .into_dimensionality::<Ix3>()?
        .permuted_axes([2, 1, 0])
        .as_standard_layout()
        .into_owned();

    let spacing =
        Spacing::new(pixdim[3] as f64, pixdim[2] as f64, pixdim[1] as f64).sanitized();
    Ok(Volume::new(data, spacing))
}

fn open_dicom(path: &Path) -> Result<Volume> {
    let obj = open_file(path).with_context(|| format!("Failed to open DICOM file {:?}", path))?;
    let decoded = obj
        .decode_pixel_data()
        .context("Failed to decode pixel data")?;
    // [frames, rows, columns, samples] with the modality LUT applied.
    let pixels = decoded
        .to_ndarray::<f32>()
        .context("Failed to convert to f32 ndarray")?;
    if pixels.ndim() != 4 {
        return Err(AuditError::NotVolumetric(pixels.shape().to_vec()).into());
    }
    let data = pixels
        .index_axis(Axis(3), 0)
        .to_owned()
        .into_dimensionality::<Ix3>()?;

    let in_plane = obj.element_f64s(PIXEL_SPACING).unwrap_or_default();
    let row = in_plane.first().copied().unwrap_or(1.0);
    let column = in_plane.get(1).copied().unwrap_or(row);
    let axial = obj
        .element_f64(SPACING_BETWEEN_SLICES)
        .or_else(|| obj.element_f64(SLICE_THICKNESS))
        .unwrap_or(1.0);

    Ok(Volume::new(data, Spacing::new(axial, row, column).sanitized()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            VolumeFormat::from_path(&PathBuf::from("a/BraTS_001_t1.nii.gz")),
            Some(VolumeFormat::NiftiGz)
        );
        assert_eq!(
            VolumeFormat::from_path(&PathBuf::from("a/b_seg.NII")),
            Some(VolumeFormat::Nifti)
        );
        assert_eq!(
            VolumeFormat::from_path(&PathBuf::from("a/b.dcm")),
            Some(VolumeFormat::Dicom)
        );
        assert_eq!(VolumeFormat::from_path(&PathBuf::from("a/b.png")), None);
    }

    #[test]
    fn nifti_save_and_open_keep_voxels_and_spacing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut data = Array3::<f32>::zeros((3, 4, 5));
        data[[2, 3, 4]] = 9.5;
        data[[0, 1, 2]] = -3.0;
        data[[1, 0, 4]] = 0.25;
        let volume = Volume::new(data, Spacing::new(3.0, 0.75, 0.5));

        for name in ["P01/P01_seg.nii.gz", "P01/P01_t1.nii"] {
            let path = dir.path().join(name);
            volume.save_nifti(&path).expect("save");
            let read = Volume::open(&path).expect("open");
            assert_eq!(read.shape(), [3, 4, 5]);
            assert_eq!(read.data, volume.data);
            assert_eq!(read.spacing, volume.spacing);
        }
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = Volume::open(&PathBuf::from("missing/volume.mha")).unwrap_err();
        assert!(err.to_string().contains("unsupported volume format"));
    }
}
