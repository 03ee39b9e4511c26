use data_model::MediaType;

#[derive(Debug)]
pub struct ClassifiedDocument {
    pub value: serde_json::Value,
    pub media_type: MediaType,
}

/// Classifies uploaded content by parsing it. JSON is tried first so that
/// documents valid in both syntaxes land on the stricter media type; YAML
/// is the fallback. Returns `None` when neither parser accepts the bytes.
pub fn classify(content: &[u8]) -> Option<ClassifiedDocument> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(content) {
        return Some(ClassifiedDocument {
            value,
            media_type: MediaType::Json,
        });
    }
    if let Ok(value) = serde_yaml::from_slice::<serde_json::Value>(content) {
        return Some(ClassifiedDocument {
            value,
            media_type: MediaType::Yaml,
        });
    }
    None
}
