use crate::domain::truncate;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use std::{fmt, time::Duration};
use tracing::debug;
use url::Url;

pub const BASE_URL: &str = "https://backend.staralign.me/endpoint/v1/models";
const GET_NOTIFICATIONS_PATH: &str = "/notifications/get_notifications";

/// Tried in order until one of them reports success.
pub const CANDIDATE_DELETE_PATHS: &[&str] = &[
    "/notifications/delete",
    "/notifications/delete_notification",
    "/notifications/remove_notification",
    "/notifications/remove",
    "/notifications/mark_as_read",
    "/notifications/mark_as_seen",
    "/notifications/seen",
];

pub const CANDIDATE_ID_PARAMS: &[&str] = &["id", "notification_id"];

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const DELETE_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_CODE: i64 = 200;
const RAW_BODY_LOG_LIMIT: usize = 1000;
const FAILURE_BODY_LIMIT: usize = 200;

#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 1000,
            offset: 0,
        }
    }
}

/// Identifiers show up as strings on some records and numbers on others.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn to_id(&self) -> Option<NotificationId> {
        match self {
            RawId::Text(s) if s.is_empty() => None,
            RawId::Text(s) => Some(NotificationId(s.clone())),
            RawId::Number(n) if n.as_f64() == Some(0.0) => None,
            RawId::Number(n) => Some(NotificationId(n.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    id: Option<RawId>,
    notification_id: Option<RawId>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    notifier: Option<Notifier>,
}

/// Reads a display-only field, treating any unexpected shape (such as `[]`
/// standing in for an empty object) as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notifier {
    #[serde(default, deserialize_with = "lenient")]
    username: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    full_name: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

impl Notification {
    pub fn id(&self) -> Option<NotificationId> {
        self.id
            .as_ref()
            .and_then(RawId::to_id)
            .or_else(|| self.notification_id.as_ref().and_then(RawId::to_id))
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    pub fn notifier_name(&self) -> &str {
        self.notifier
            .as_ref()
            .and_then(|n| non_empty(&n.username).or_else(|| non_empty(&n.full_name)))
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: Option<Value>,
    status: Option<Value>,
    data: Option<Value>,
}

impl Envelope {
    fn is_success(&self) -> bool {
        let reports_success = |v: &Option<Value>| v.as_ref().and_then(Value::as_i64) == Some(SUCCESS_CODE);
        reports_success(&self.code) || reports_success(&self.status)
    }
}

/// Some deployments wrap the JSON payload in an HTML page.
pub fn extract_json(body: &str) -> &str {
    if !body.contains('<') {
        return body;
    }

    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => body,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inbox {
    /// Entries in the response, including ones that couldn't be decoded.
    pub received: usize,
    pub notifications: Vec<Notification>,
}

pub fn parse_notifications(body: &str) -> Result<Inbox> {
    let envelope: Envelope =
        serde_json::from_str(extract_json(body)).context(UnableToDeserializeNotificationsSnafu)?;

    if !envelope.is_success() || envelope.data.is_none() {
        return NotificationsRequestFailedSnafu {
            code: envelope.code,
            status: envelope.status,
        }
        .fail();
    }

    let items = match envelope.data {
        Some(Value::Array(items)) => items,
        _ => return NotificationsDataNotAListSnafu.fail(),
    };

    let notifications = items
        .iter()
        .filter_map(|item| match Notification::deserialize(item) {
            Ok(n) => Some(n),
            Err(e) => {
                debug!("Skipping undecodable notification {}: {}", item, e);
                None
            }
        })
        .collect();

    Ok(Inbox {
        received: items.len(),
        notifications,
    })
}

/// What a single delete attempt looked like from the outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteResponse {
    /// HTTP 200 and the body reported a success code.
    Confirmed,
    /// HTTP 200 with a body that isn't a JSON object, or whose code isn't
    /// a number.
    Assumed,
    Rejected { code: String, body: String },
    HttpFailure { status: u16, body: String },
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn numeric_code(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn render_code(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => String::from("0"),
    }
}

pub fn classify_delete_response(status: u16, body: &str) -> DeleteResponse {
    if status != 200 {
        return DeleteResponse::HttpFailure {
            status,
            body: truncate(body, FAILURE_BODY_LIMIT).to_owned(),
        };
    }

    let object = match serde_json::from_str(body) {
        Ok(Value::Object(object)) => object,
        _ => return DeleteResponse::Assumed,
    };

    let reported = object
        .get("code")
        .filter(|v| is_truthy(v))
        .or_else(|| object.get("status").filter(|v| is_truthy(v)));

    let code = match reported {
        Some(v) => match numeric_code(v) {
            Some(code) => code,
            // A code we can't read as a number says nothing about failure.
            None => return DeleteResponse::Assumed,
        },
        None => 0,
    };

    if code == SUCCESS_CODE {
        DeleteResponse::Confirmed
    } else {
        DeleteResponse::Rejected {
            code: render_code(reported),
            body: truncate(body, RAW_BODY_LOG_LIMIT).to_owned(),
        }
    }
}

//--

#[derive(Debug, Clone)]
pub struct Config {
    base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(BASE_URL)
    }
}

impl Config {
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let url = format!("{}{}", self.base, path);
        Url::parse(&url).context(InvalidEndpointSnafu { url })
    }

    pub fn into_client(self, access_token: AccessToken) -> Client {
        Client {
            client: reqwest::Client::new(),
            config: self,
            access_token,
        }
    }
}

pub struct Client {
    client: reqwest::Client,
    config: Config,
    access_token: AccessToken,
}

impl Client {
    pub async fn notifications(
        &self,
        page: Page,
        user_id: Option<&UserId>,
    ) -> Result<Inbox> {
        let Self {
            client,
            config,
            access_token,
        } = self;

        #[derive(Debug, Serialize)]
        struct NotificationsParams<'a> {
            access_token: &'a AccessToken,
            limit: u32,
            offset: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            user_id: Option<&'a UserId>,
        }

        let params = NotificationsParams {
            access_token,
            limit: page.limit,
            offset: page.offset,
            user_id,
        };

        let res = client
            .post(config.endpoint(GET_NOTIFICATIONS_PATH)?)
            .form(&params)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .context(UnableToExecuteNotificationsRequestSnafu)?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context(UnableToReadNotificationsResponseSnafu)?;

        debug!(
            status = status.as_u16(),
            body = truncate(&body, RAW_BODY_LOG_LIMIT),
            "Notifications response"
        );

        parse_notifications(&body)
    }

    pub async fn delete(
        &self,
        path: &str,
        param: &str,
        id: &NotificationId,
    ) -> Result<DeleteResponse> {
        let Self {
            client,
            config,
            access_token,
        } = self;

        let params = [("access_token", &*access_token.0), (param, &*id.0)];

        let res = client
            .post(config.endpoint(path)?)
            .form(&params)
            .timeout(DELETE_TIMEOUT)
            .send()
            .await
            .context(UnableToExecuteDeleteRequestSnafu { path })?;

        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .context(UnableToReadDeleteResponseSnafu { path })?;

        debug!(
            status,
            path,
            param,
            body = truncate(&body, RAW_BODY_LOG_LIMIT),
            "Delete response"
        );

        Ok(classify_delete_response(status, &body))
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{} is not a valid URL", url))]
    InvalidEndpoint {
        source: url::ParseError,
        url: String,
    },

    #[snafu(display("Unable to request notifications: {}", source))]
    UnableToExecuteNotificationsRequest {
        source: reqwest::Error,
    },

    #[snafu(display("Unable to read the notifications response: {}", source))]
    UnableToReadNotificationsResponse {
        source: reqwest::Error,
    },

    #[snafu(display("The notifications response is not JSON: {}", source))]
    UnableToDeserializeNotifications {
        source: serde_json::Error,
    },

    #[snafu(display(
        "The notifications response did not report success (code={:?}, status={:?}) or had no data",
        code,
        status
    ))]
    NotificationsRequestFailed {
        code: Option<Value>,
        status: Option<Value>,
    },

    #[snafu(display("The notifications response data is not a list"))]
    NotificationsDataNotAList,

    #[snafu(display("Unable to POST to {}: {}", path, source))]
    UnableToExecuteDeleteRequest {
        source: reqwest::Error,
        path: String,
    },

    #[snafu(display("Unable to read the response from {}: {}", path, source))]
    UnableToReadDeleteResponse {
        source: reqwest::Error,
        path: String,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;
