//! Instagram adapter (profile directory).
//!
//! Talks to the same web endpoints the Instagram site uses: a cookie-backed
//! login, `web_profile_info` for the profile id, and GraphQL query-hash
//! pagination for followers/followees.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use reqwest::{
    cookie::{CookieStore, Jar},
    header, RequestBuilder, StatusCode, Url,
};
use serde::Deserialize;
use serde_json::{json, Value};

use nfb_core::{
    config::Config,
    directory::{
        AuthError, ConnectionPage, DirectoryError, DirectorySession, Profile, ProfileDirectory,
        Relation,
    },
};

const BASE_URL: &str = "https://www.instagram.com/";
const LOGIN_URL: &str = "https://www.instagram.com/api/v1/web/accounts/login/ajax/";
const PROFILE_URL: &str = "https://i.instagram.com/api/v1/users/web_profile_info/";
const GRAPHQL_URL: &str = "https://www.instagram.com/graphql/query/";
const WEB_APP_ID: &str = "936619743392459";

const FOLLOWERS_QUERY_HASH: &str = "37479f2b8209594dde7facb0d904896a";
const FOLLOWEES_QUERY_HASH: &str = "58712303d941c6855d4e888c5f0cd22f";

#[derive(Clone, Debug)]
pub struct InstagramConfig {
    pub user_agent: String,
    pub page_size: u32,
    pub page_delay: Duration,
    pub timeout: Duration,
}

impl InstagramConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            user_agent: cfg.instagram_user_agent.clone(),
            page_size: cfg.instagram_page_size,
            page_delay: cfg.instagram_page_delay,
            timeout: cfg.instagram_timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub struct InstagramDirectory {
    cfg: InstagramConfig,
}

impl InstagramDirectory {
    pub fn new(cfg: InstagramConfig) -> Self {
        Self { cfg }
    }

    fn http_client(&self, jar: Arc<Jar>) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .cookie_provider(jar)
            .user_agent(self.cfg.user_agent.clone())
            .timeout(self.cfg.timeout)
            .build()
    }
}

#[async_trait]
impl ProfileDirectory for InstagramDirectory {
    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn DirectorySession>, AuthError> {
        let jar = Arc::new(Jar::default());
        let http = self
            .http_client(jar.clone())
            .map_err(|e| AuthError::Other(format!("http client: {e}")))?;

        // Bootstrap: the home page sets the csrftoken cookie.
        http.get(BASE_URL)
            .send()
            .await
            .map_err(|e| AuthError::Connection(e.to_string()))?;
        let csrf = csrf_token(&jar)
            .ok_or_else(|| AuthError::Connection("no csrftoken cookie issued".to_string()))?;

        let enc_password = format!(
            "#PWD_INSTAGRAM_BROWSER:0:{}:{password}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        );
        let resp = http
            .post(LOGIN_URL)
            .header("X-CSRFToken", csrf)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(header::REFERER, BASE_URL)
            .form(&[("enc_password", enc_password.as_str()), ("username", username)])
            .send()
            .await
            .map_err(|e| AuthError::Connection(e.to_string()))?;
        drop(enc_password);

        let status = resp.status();
        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Connection(format!("login returned {status}: {e}")))?;
        classify_login(username, &body)?;

        tracing::debug!(username, "instagram session established");
        Ok(Box::new(InstagramSession {
            http,
            jar,
            page_size: self.cfg.page_size,
            page_delay: self.cfg.page_delay,
        }))
    }
}

pub struct InstagramSession {
    http: reqwest::Client,
    jar: Arc<Jar>,
    page_size: u32,
    page_delay: Duration,
}

impl InstagramSession {
    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match csrf_token(&self.jar) {
            Some(csrf) => req.header("X-CSRFToken", csrf),
            None => req,
        }
    }

    async fn get_json(&self, req: RequestBuilder) -> Result<Value, DirectoryError> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| DirectoryError::Connection(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(format!("HTTP {status}")));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(DirectoryError::Connection(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(DirectoryError::Other(format!("HTTP {status}")));
        }

        resp.json()
            .await
            .map_err(|e| DirectoryError::Other(format!("invalid JSON response: {e}")))
    }
}

#[async_trait]
impl DirectorySession for InstagramSession {
    async fn load_profile(&self, username: &str) -> Result<Profile, DirectoryError> {
        let req = self
            .http
            .get(PROFILE_URL)
            .query(&[("username", username)])
            .header("x-ig-app-id", WEB_APP_ID);

        match self.get_json(req).await {
            Ok(body) => parse_profile(username, &body),
            Err(DirectoryError::NotFound(_)) => Err(not_found(username)),
            Err(e) => Err(e),
        }
    }

    async fn list_page(
        &self,
        profile: &Profile,
        relation: Relation,
        cursor: Option<&str>,
    ) -> Result<ConnectionPage, DirectoryError> {
        if cursor.is_some() && !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }

        let (query_hash, _) = relation_query(relation);
        let variables = page_variables(&profile.id, self.page_size, cursor);
        let req = self
            .http
            .get(GRAPHQL_URL)
            .query(&[("query_hash", query_hash), ("variables", variables.as_str())]);

        let body = self.get_json(req).await?;
        let page = parse_page(relation, &body)?;
        tracing::debug!(
            profile = %profile.username,
            ?relation,
            count = page.usernames.len(),
            more = page.next_cursor.is_some(),
            "fetched connection page"
        );
        Ok(page)
    }
}

fn not_found(username: &str) -> DirectoryError {
    DirectoryError::NotFound(format!("Profile {username} does not exist."))
}

fn relation_query(relation: Relation) -> (&'static str, &'static str) {
    match relation {
        Relation::Followers => (FOLLOWERS_QUERY_HASH, "edge_followed_by"),
        Relation::Followees => (FOLLOWEES_QUERY_HASH, "edge_follow"),
    }
}

fn csrf_token(jar: &Jar) -> Option<String> {
    let url: Url = BASE_URL.parse().ok()?;
    let cookies = jar.cookies(&url)?;
    csrf_from_cookie_header(cookies.to_str().ok()?)
}

/// Extract `csrftoken` from a `Cookie:` header value (`a=1; csrftoken=x`).
fn csrf_from_cookie_header(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "csrftoken")
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

/// Body of the web login endpoint. Every field is optional; which ones appear
/// depends on the outcome.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    status: Option<String>,
    message: Option<String>,
    authenticated: Option<bool>,
    user: Option<bool>,
    two_factor_required: Option<bool>,
    checkpoint_url: Option<String>,
}

/// Map the login response to success or a typed failure.
fn classify_login(username: &str, body: &LoginResponse) -> Result<(), AuthError> {
    if body.two_factor_required == Some(true) {
        return Err(AuthError::TwoFactorRequired);
    }
    if body.checkpoint_url.is_some() {
        return Err(AuthError::Connection(
            "checkpoint required; complete it in the Instagram app and try again".to_string(),
        ));
    }

    let status = body.status.as_deref().unwrap_or("");
    let message = body.message.as_deref();
    if status != "ok" {
        return Err(AuthError::Connection(match message {
            Some(m) => format!("login error: \"{status}\" status, message \"{m}\""),
            None => format!("login error: \"{status}\" status"),
        }));
    }

    let Some(authenticated) = body.authenticated else {
        return Err(AuthError::Connection(match message {
            Some(m) => format!("login error: {m}"),
            None => "login error: unexpected response".to_string(),
        }));
    };
    if authenticated {
        return Ok(());
    }
    if body.user == Some(true) {
        return Err(AuthError::InvalidCredentials);
    }
    Err(AuthError::Other(format!(
        "Login error: User {username} does not exist."
    )))
}

fn parse_profile(username: &str, body: &Value) -> Result<Profile, DirectoryError> {
    let user = body.pointer("/data/user").filter(|u| !u.is_null());
    let Some(user) = user else {
        return Err(not_found(username));
    };
    let id = match user.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(DirectoryError::Other(
                "profile response is missing the user id".to_string(),
            ))
        }
    };
    let username = user
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or(username)
        .to_string();
    Ok(Profile { id, username })
}

fn page_variables(profile_id: &str, first: u32, after: Option<&str>) -> String {
    let mut vars = json!({ "id": profile_id, "first": first });
    if let Some(after) = after {
        vars["after"] = Value::String(after.to_string());
    }
    vars.to_string()
}

fn parse_page(relation: Relation, body: &Value) -> Result<ConnectionPage, DirectoryError> {
    let (_, edge_key) = relation_query(relation);
    let Some(edge) = body.pointer(&format!("/data/user/{edge_key}")) else {
        let detail = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unexpected response");
        return Err(DirectoryError::Other(format!(
            "{relation:?} listing failed: {detail}"
        )));
    };

    let usernames = edge
        .get("edges")
        .and_then(Value::as_array)
        .map(|edges| {
            edges
                .iter()
                .filter_map(|e| e.pointer("/node/username").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let has_next = edge
        .pointer("/page_info/has_next_page")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let next_cursor = if has_next {
        edge.pointer("/page_info/end_cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    Ok(ConnectionPage {
        usernames,
        next_cursor,
    })
}
