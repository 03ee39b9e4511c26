use serde::{Deserialize, Serialize};

/// How much of an uploaded document gets checked before it is accepted.
/// Selected in the server config; `lenient` is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStrategy {
    /// Requires a top level `openapi` or `swagger` version key, nothing else.
    #[default]
    Lenient,
    /// Additionally requires the `info` and `paths` sections tools consume.
    Structural,
}

#[derive(Debug, Clone)]
pub struct Verdict {
    pub accepted: bool,
    pub detail: Option<String>,
}

impl Verdict {
    fn accept() -> Self {
        Verdict {
            accepted: true,
            detail: None,
        }
    }

    fn reject(detail: impl Into<String>) -> Self {
        Verdict {
            accepted: false,
            detail: Some(detail.into()),
        }
    }
}

impl ValidationStrategy {
    pub fn validate(&self, document: &serde_json::Value) -> Verdict {
        let Some(object) = document.as_object() else {
            return Verdict::reject("document is not an object");
        };
        if !object.contains_key("openapi") && !object.contains_key("swagger") {
            return Verdict::reject("missing top level openapi or swagger key");
        }
        match self {
            ValidationStrategy::Lenient => Verdict::accept(),
            ValidationStrategy::Structural => {
                if !object.get("info").map(|v| v.is_object()).unwrap_or(false) {
                    return Verdict::reject("missing info object");
                }
                if !object.get("paths").map(|v| v.is_object()).unwrap_or(false) {
                    return Verdict::reject("missing paths object");
                }
                Verdict::accept()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use data_model::test_objects::tests::OPENAPI_JSON_DOC;
    use serde_json::json;

    use super::ValidationStrategy;

    #[test]
    fn test_lenient_accepts_version_marker_alone() {
        let verdict = ValidationStrategy::Lenient.validate(&json!({"openapi": "3.1.0"}));
        assert!(verdict.accepted);
        let verdict = ValidationStrategy::Lenient.validate(&json!({"swagger": "2.0"}));
        assert!(verdict.accepted);
    }

    #[test]
    fn test_lenient_rejects_unmarked_document() {
        let verdict = ValidationStrategy::Lenient.validate(&json!({"title": "not a schema"}));
        assert!(!verdict.accepted);
        assert!(verdict.detail.unwrap().contains("openapi or swagger"));
    }

    #[test]
    fn test_non_object_document_rejected() {
        let verdict = ValidationStrategy::Lenient.validate(&json!(["openapi"]));
        assert!(!verdict.accepted);
        let verdict = ValidationStrategy::Lenient.validate(&json!(null));
        assert!(!verdict.accepted);
    }

    #[test]
    fn test_structural_requires_info_and_paths() {
        let strategy = ValidationStrategy::Structural;
        let verdict = strategy.validate(&json!({"openapi": "3.0.0"}));
        assert!(!verdict.accepted);
        assert!(verdict.detail.unwrap().contains("info"));

        let verdict = strategy.validate(&json!({"openapi": "3.0.0", "info": {"title": "t"}}));
        assert!(!verdict.accepted);
        assert!(verdict.detail.unwrap().contains("paths"));

        let full: serde_json::Value = serde_json::from_str(OPENAPI_JSON_DOC).unwrap();
        assert!(strategy.validate(&full).accepted);
    }

    #[test]
    fn test_strategy_names_deserialize_lowercase() {
        let strategy: ValidationStrategy = serde_json::from_str("\"structural\"").unwrap();
        assert_eq!(strategy, ValidationStrategy::Structural);
        let strategy: ValidationStrategy = serde_json::from_str("\"lenient\"").unwrap();
        assert_eq!(strategy, ValidationStrategy::Lenient);
    }
}
