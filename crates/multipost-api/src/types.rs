use serde::{Deserialize, Serialize};

// -- Requests --

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub phone: String,
    /// Client-side login name; carried for parity with the frontend,
    /// not used by the gateway itself.
    pub login: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub phone: String,
    pub code: String,
    pub password: Option<String>,
    pub login: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelsRequest {
    pub phone: String,
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub phone: String,
}

// -- Responses --

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub status: String,
    pub message: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub status: String,
    pub channels: Vec<ChannelEntry>,
}

#[derive(Debug, Serialize)]
pub struct ChannelEntry {
    pub title: String,
    pub main_username: String,
}
