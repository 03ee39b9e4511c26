use data_model::SchemaVersion;

pub struct StateMachineUpdateRequest {
    pub payload: RequestPayload,
}

#[derive(Debug, Clone, strum::Display)]
pub enum RequestPayload {
    UpsertApplication(UpsertApplicationRequest),
    UpsertService(UpsertServiceRequest),
    CommitSchemaVersion(CommitSchemaVersionRequest),
}

#[derive(Debug, Clone)]
pub struct UpsertApplicationRequest {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct UpsertServiceRequest {
    pub application: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CommitSchemaVersionRequest {
    pub schema_version: SchemaVersion,
}
