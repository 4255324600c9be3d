use std::time::Duration;

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use tracing::info;

use multipost_core::{
    channels::writable_channels,
    domain::AccountId,
    links::ChannelLink,
    publish::{PublishOutcome, Submission},
    Error,
};

use crate::{
    error::ApiError,
    middleware::{bearer_token, unauthorized, Bearer},
    types::{
        ChannelEntry, ChannelsRequest, ChannelsResponse, CodeRequest, LogoutRequest,
        StatusResponse, VerifyCodeRequest, VerifyResponse,
    },
    AppState,
};

pub async fn request_code(
    State(state): State<AppState>,
    Json(req): Json<CodeRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    bounded(state.cfg.transport_timeout, state.login.request_code(&req.phone)).await?;
    info!(phone = %req.phone, "login code sent");
    Ok(Json(StatusResponse::success("code sent")))
}

pub async fn verify_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    // Observed contract: an unknown phone reports 404 even before the
    // token check.
    if state.registry.get(&req.phone).await.is_none() {
        return Err(Error::SessionNotFound.into());
    }
    let _bearer = bearer_token(&headers).ok_or_else(unauthorized)?;

    let identity = bounded(
        state.cfg.transport_timeout,
        state
            .login
            .verify_code(&req.phone, &req.code, req.password.as_deref()),
    )
    .await
    .map_err(|e| {
        // This route reports generic verification failures as 400; the
        // authentication kinds keep their own statuses.
        if e.status() == StatusCode::UNAUTHORIZED || e.status() == StatusCode::NOT_FOUND {
            e
        } else {
            ApiError::new(StatusCode::BAD_REQUEST, e.message().to_string())
        }
    })?;

    Ok(Json(VerifyResponse {
        status: "success".to_string(),
        message: "authorization successful".to_string(),
        username: identity.username.unwrap_or_default(),
    }))
}

pub async fn channels(
    State(state): State<AppState>,
    Extension(bearer): Extension<Bearer>,
    Json(req): Json<ChannelsRequest>,
) -> Result<Json<ChannelsResponse>, ApiError> {
    let session = state
        .registry
        .get(&req.phone)
        .await
        .ok_or(Error::SessionNotFound)?;

    let authorized = match tokio::time::timeout(
        state.cfg.transport_timeout,
        session.transport().is_authorized(),
    )
    .await
    {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => return Err(Error::Transport(e.to_string()).into()),
        Err(_) => return Err(Error::Timeout.into()),
    };
    if !authorized {
        // Revoked authorization: the session is destroyed on detection.
        session.close().await;
        state.registry.remove(&req.phone).await;
        return Err(Error::NotAuthenticated.into());
    }

    let account = req
        .account_id
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| Error::malformed("account_id", "required to list channels"))?;

    let channels = bounded(
        state.cfg.transport_timeout,
        writable_channels(session.transport()),
    )
    .await?;

    let links: Vec<ChannelLink> = channels
        .iter()
        .map(|c| ChannelLink {
            title: c.title.clone(),
            main_username: c.main_username.clone(),
        })
        .collect();
    state
        .links
        .record(&AccountId(account), &links, &bearer.0)
        .await?;

    info!(phone = %req.phone, count = channels.len(), "listed writable channels");
    Ok(Json(ChannelsResponse {
        status: "success".to_string(),
        channels: channels
            .into_iter()
            .map(|c| ChannelEntry {
                title: c.title,
                main_username: c.main_username,
            })
            .collect(),
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(bearer): Extension<Bearer>,
    multipart: Multipart,
) -> Result<Json<StatusResponse>, ApiError> {
    let submission = parse_submission(multipart).await?;
    let outcome = state.publish.create_post(submission, &bearer.0).await?;
    let message = match outcome {
        PublishOutcome::Published => "post published",
        PublishOutcome::Deferred => "post scheduled",
    };
    Ok(Json(StatusResponse::success(message)))
}

pub async fn save_draft(
    State(state): State<AppState>,
    Extension(bearer): Extension<Bearer>,
    multipart: Multipart,
) -> Result<Json<StatusResponse>, ApiError> {
    let submission = parse_submission(multipart).await?;
    state.publish.save_draft(submission, &bearer.0).await?;
    Ok(Json(StatusResponse::success("draft saved")))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.login.logout(&req.phone).await?;
    Ok(Json(StatusResponse::success("logged out")))
}

/// Collect the multipart form into a [`Submission`]. Unknown fields are
/// drained and ignored.
async fn parse_submission(mut multipart: Multipart) -> Result<Submission, ApiError> {
    let mut phone = None;
    let mut account_id = None;
    let mut targets_json = None;
    let mut title = None;
    let mut description = None;
    let mut schedule_date = None;
    let mut images: Vec<Vec<u8>> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::malformed("form", e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "phone" => phone = Some(text(field, "phone").await?),
            "account_id" => account_id = Some(text(field, "account_id").await?),
            "chat_usernames" => targets_json = Some(text(field, "chat_usernames").await?),
            "title" => title = Some(text(field, "title").await?),
            "description" => description = Some(text(field, "description").await?),
            "schedule_date" => {
                let raw = text(field, "schedule_date").await?;
                if !raw.trim().is_empty() {
                    schedule_date = Some(raw);
                }
            }
            "images" | "images[]" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::malformed("images", e.to_string()))?;
                if !bytes.is_empty() {
                    images.push(bytes.to_vec());
                }
            }
            _ => {
                // Drain and ignore (e.g. the client's `login` field).
                let _ = field.bytes().await;
            }
        }
    }

    Ok(Submission {
        phone: require(phone, "phone")?,
        account: AccountId(require(account_id, "account_id")?),
        targets_json: require(targets_json, "chat_usernames")?,
        title: require(title, "title")?,
        description: require(description, "description")?,
        images,
        schedule_date,
    })
}

async fn text(field: axum::extract::multipart::Field<'_>, name: &'static str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::from(Error::malformed(name, e.to_string())))
}

fn require(value: Option<String>, field: &'static str) -> Result<String, ApiError> {
    value.ok_or_else(|| ApiError::from(Error::malformed(field, "missing form field")))
}

async fn bounded<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = multipost_core::Result<T>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => Err(ApiError::from(Error::Timeout)),
    }
}
