use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}
