use dicom::core::Tag;
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

/// Small helper trait to pull string and numeric values from different DICOM object shapes.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn has_element(&self, tag: Tag) -> bool;

    /// Parses a backslash separated decimal string (e.g. `0.5\0.5`).
    fn element_f64s(&self, tag: Tag) -> Option<Vec<f64>> {
        let raw = self.element_str(tag)?;
        raw.split('\\')
            .map(|part| part.trim().parse::<f64>().ok())
            .collect()
    }

    fn element_f64(&self, tag: Tag) -> Option<f64> {
        self.element_f64s(tag).and_then(|v| v.first().copied())
    }
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.into_owned())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.into_owned())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}
