use serde::{Deserialize, Serialize};

/// Body of `POST /emails`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SendEmailRequest {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

#[derive(Deserialize, Debug)]
pub struct SendEmailResponse {
    pub id: String,
}
