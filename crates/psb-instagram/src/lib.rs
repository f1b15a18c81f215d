//! Instagram scraping backend.
//!
//! Talks to the public web endpoints the Instagram web app uses. Parsing is kept
//! in pure functions so it can be tested against captured JSON bodies.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    cookie::{CookieStore, Jar},
    header, StatusCode, Url,
};
use serde::Deserialize;
use tracing::{debug, info};

use psb_core::{
    domain::{Credentials, Profile},
    errors::Error,
    ports::{BackendError, ProfileBackend},
    Result,
};

const BASE_URL: &str = "https://www.instagram.com";
const PROFILE_URL: &str = "https://i.instagram.com/api/v1/users/web_profile_info/";
const APP_ID: &str = "936619743392459";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Clone, Debug)]
pub struct InstagramClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
}

impl InstagramClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("instagram client build error: {e}")))?;
        Ok(Self { http, jar })
    }

    async fn csrf_token(&self) -> std::result::Result<String, BackendError> {
        let login_page = format!("{BASE_URL}/accounts/login/");
        let resp = self
            .http
            .get(&login_page)
            .send()
            .await
            .map_err(request_error)?;
        if !resp.status().is_success() {
            return Err(BackendError::Request(format!(
                "login page returned {}",
                resp.status()
            )));
        }

        let url = Url::parse(BASE_URL).map_err(|e| BackendError::Malformed(e.to_string()))?;
        self.jar
            .cookies(&url)
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .and_then(|c| cookie_value(c, "csrftoken"))
            .ok_or_else(|| BackendError::Malformed("no csrftoken cookie".to_string()))
    }
}

#[async_trait]
impl ProfileBackend for InstagramClient {
    async fn login(&self, credentials: &Credentials) -> std::result::Result<(), BackendError> {
        let csrf = self.csrf_token().await?;
        let enc_password = format!(
            "#PWD_INSTAGRAM_BROWSER:0:{}:{}",
            chrono::Utc::now().timestamp(),
            credentials.password
        );

        let resp = self
            .http
            .post(format!("{BASE_URL}/accounts/login/ajax/"))
            .header("X-CSRFToken", csrf)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("x-ig-app-id", APP_ID)
            .header(header::REFERER, format!("{BASE_URL}/accounts/login/"))
            .form(&[
                ("username", credentials.username.as_str()),
                ("enc_password", enc_password.as_str()),
                ("queryParams", "{}"),
                ("optIntoOneTap", "false"),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(request_error)?;
        debug!(%status, "instagram login response");
        parse_login_response(&body)?;

        info!(username = %credentials.username, "instagram login succeeded");
        Ok(())
    }

    async fn load_profile(&self, username: &str) -> std::result::Result<Profile, BackendError> {
        let resp = self
            .http
            .get(PROFILE_URL)
            .query(&[("username", username)])
            .header("x-ig-app-id", APP_ID)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound);
        }
        let body = resp.text().await.map_err(request_error)?;
        if !status.is_success() {
            return Err(BackendError::Request(format!(
                "HTTP {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        parse_profile_response(&body)
    }
}

fn request_error(e: reqwest::Error) -> BackendError {
    BackendError::Request(e.to_string())
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name && !v.is_empty()).then(|| v.to_string())
    })
}

// ============== Wire format ==============

#[derive(Deserialize)]
struct ProfileEnvelope {
    data: Option<ProfileData>,
}

#[derive(Deserialize)]
struct ProfileData {
    user: Option<WireUser>,
}

#[derive(Deserialize)]
struct Count {
    count: u64,
}

#[derive(Deserialize)]
struct WireUser {
    username: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    biography: Option<String>,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    external_url: Option<String>,
    edge_followed_by: Count,
    edge_follow: Count,
    edge_owner_to_timeline_media: Count,
}

/// Parse a `web_profile_info` body. A null `data.user` means the profile does not exist.
pub fn parse_profile_response(body: &str) -> std::result::Result<Profile, BackendError> {
    let envelope: ProfileEnvelope =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;
    let user = envelope
        .data
        .and_then(|d| d.user)
        .ok_or(BackendError::NotFound)?;

    Ok(Profile {
        profile_url: Profile::url_for(&user.username),
        full_name: user.full_name.unwrap_or_default(),
        biography: user.biography.unwrap_or_default(),
        follower_count: user.edge_followed_by.count,
        following_count: user.edge_follow.count,
        post_count: user.edge_owner_to_timeline_media.count,
        is_private: user.is_private,
        external_url: user.external_url.filter(|u| !u.trim().is_empty()),
        username: user.username,
    })
}

#[derive(Deserialize)]
struct LoginReply {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    two_factor_required: bool,
    #[serde(default)]
    checkpoint_url: Option<String>,
}

pub fn parse_login_response(body: &str) -> std::result::Result<(), BackendError> {
    let reply: LoginReply =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;
    if reply.authenticated {
        return Ok(());
    }

    let reason = if reply.two_factor_required {
        "two-factor authentication required".to_string()
    } else if reply.checkpoint_url.is_some() {
        "checkpoint challenge required".to_string()
    } else {
        reply
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "bad credentials".to_string())
    };
    Err(BackendError::Rejected(reason))
}
