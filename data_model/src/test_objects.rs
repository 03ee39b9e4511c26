pub mod tests {
    use rand::Rng;

    use crate::{MediaType, SchemaVersion, SchemaVersionBuilder};

    pub const TEST_APPLICATION: &str = "demoapp";
    pub const TEST_SERVICE: &str = "svc1";

    pub const OPENAPI_JSON_DOC: &str =
        r#"{"openapi":"3.0.0","info":{"title":"demo","version":"1.0.0"},"paths":{}}"#;

    pub const OPENAPI_YAML_DOC: &str = r#"openapi: "3.0.0"
info:
  title: demo
  version: "1.0.0"
paths: {}
"#;

    pub fn mock_sha256_hash() -> String {
        let mut rng = rand::rng();
        (0..64)
            .map(|_| char::from_digit(rng.random_range(0..16), 16).unwrap())
            .collect()
    }

    pub fn mock_schema_version(version: u64) -> SchemaVersion {
        SchemaVersionBuilder::default()
            .application(TEST_APPLICATION.to_string())
            .service(Some(TEST_SERVICE.to_string()))
            .version(version)
            .filename("openapi.json".to_string())
            .path(format!(
                "{}/{}/v{}__openapi.json",
                TEST_APPLICATION, TEST_SERVICE, version
            ))
            .size(OPENAPI_JSON_DOC.len() as u64)
            .sha256_hash(mock_sha256_hash())
            .media_type(MediaType::Json)
            .uploaded_by(Some("cli".to_string()))
            .build()
            .unwrap()
    }

    pub fn mock_app_scope_schema_version(version: u64) -> SchemaVersion {
        SchemaVersionBuilder::default()
            .application(TEST_APPLICATION.to_string())
            .service(None)
            .version(version)
            .filename("openapi.json".to_string())
            .path(format!(
                "{}/_app/v{}__openapi.json",
                TEST_APPLICATION, version
            ))
            .size(OPENAPI_JSON_DOC.len() as u64)
            .sha256_hash(mock_sha256_hash())
            .media_type(MediaType::Json)
            .uploaded_by(Some("cli".to_string()))
            .build()
            .unwrap()
    }
}
