use serde::Serialize;

/// Calling platform resolved by the auth middleware.
#[derive(Debug, Clone, Serialize)]
pub struct Platform {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub is_active: bool,
    pub notification_url: Option<String>,
}
