use dicom::core::Tag;
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::InMemDicomObject;

/// Small helper trait to pull text, numbers and nested items out of a DICOM dataset.
pub trait ElementAccess: Sized {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn element_f64(&self, tag: Tag) -> Option<f64>;
    fn sequence_items(&self, tag: Tag) -> &[Self];
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches(['\0', ' ']).trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn element_f64(&self, tag: Tag) -> Option<f64> {
        self.element(tag).ok().and_then(|e| e.to_float64().ok())
    }

    fn sequence_items(&self, tag: Tag) -> &[Self] {
        self.element(tag)
            .ok()
            .and_then(|e| e.items())
            .unwrap_or(&[])
    }
}
