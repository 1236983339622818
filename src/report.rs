use rand::Rng;
use reqwest::Method;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// W3C WebDriver element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Pause after submitting the login form so the redirect lands before the
/// flag cookie is planted.
const LOGIN_SETTLE: Duration = Duration::from_millis(300);

/// Margin added to the dwell time for session setup, login, and navigation.
const VISIT_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum VisitError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("webdriver error: {0}")]
    Protocol(String),
    #[error("visit timed out")]
    Timeout,
}

// ── Report cooldown ───────────────────────────────────────────────────────────

/// Per-session cooldown on the report trigger. A rejected call never
/// reaches the browser automation.
#[derive(Clone)]
pub struct ReportGate {
    cooldown: Duration,
    last: Arc<Mutex<HashMap<String, Instant>>>,
}

impl ReportGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt and report whether it may proceed. Keyed by the
    /// caller's session token; callers without one share a single bucket.
    pub async fn try_pass(&self, session: Option<&str>) -> bool {
        let key = session.unwrap_or("").to_string();
        let mut last = self.last.lock().await;
        let now = Instant::now();
        if let Some(prev) = last.get(&key) {
            if now.duration_since(*prev) < self.cooldown {
                return false;
            }
        }
        last.insert(key, now);
        true
    }
}

// ── Visitor ───────────────────────────────────────────────────────────────────

/// Drives a remote headless browser through the W3C WebDriver wire
/// protocol to simulate a moderator reviewing a reported shared note:
/// log in as a throwaway account, plant the flag cookie, then sit on the
/// shared-note viewer while its scripts run.
#[derive(Clone)]
pub struct Visitor {
    webdriver: Url,
    public: Url,
    flag: String,
    dwell: Duration,
    client: reqwest::Client,
}

impl Visitor {
    pub fn new(webdriver: Url, public: Url, flag: String, dwell: Duration) -> Self {
        Self {
            webdriver,
            public,
            flag,
            dwell,
            client: reqwest::Client::new(),
        }
    }

    /// Run one visit under a bounded overall timeout. The caller observes
    /// only success or a generic failure; details are logged server-side.
    pub async fn visit(&self, id: &str, username: &str) -> Result<(), VisitError> {
        tracing::info!("visiting note {id} as {username}");
        match tokio::time::timeout(self.dwell + VISIT_MARGIN, self.run(id, username)).await {
            Ok(result) => result,
            Err(_) => Err(VisitError::Timeout),
        }
    }

    async fn run(&self, id: &str, username: &str) -> Result<(), VisitError> {
        let session = self.new_session().await?;
        let outcome = self.drive(&session, id, username).await;
        // Teardown runs on every path; a teardown failure must not mask
        // the drive outcome.
        if let Err(e) = self.delete_session(&session).await {
            tracing::warn!("webdriver session teardown failed: {e}");
        }
        outcome
    }

    async fn drive(&self, session: &str, id: &str, username: &str) -> Result<(), VisitError> {
        // Register-on-first-login turns random credentials into a
        // disposable authenticated account.
        self.navigate(session, self.public.join("/login")?.as_str())
            .await?;
        let field = self.find_element(session, "#username").await?;
        self.send_keys(session, &field, &random_string(10)).await?;
        let field = self.find_element(session, "#password").await?;
        self.send_keys(session, &field, &random_string(20)).await?;
        let submit = self.find_element(session, "#submit").await?;
        self.click(session, &submit).await?;
        tokio::time::sleep(LOGIN_SETTLE).await;

        self.add_flag_cookie(session).await?;

        let target = share_read_url(&self.public, id, username)?;
        self.navigate(session, target.as_str()).await?;
        tokio::time::sleep(self.dwell).await;
        Ok(())
    }

    // ── WebDriver commands ────────────────────────────────────────────────

    async fn new_session(&self) -> Result<String, VisitError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": {
                        "args": ["--headless", "--no-sandbox", "--disable-gpu"]
                    }
                }
            }
        });
        let value = self
            .command(Method::POST, "/session", Some(capabilities))
            .await?;
        value["value"]["sessionId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VisitError::Protocol("no sessionId in response".to_string()))
    }

    async fn delete_session(&self, session: &str) -> Result<(), VisitError> {
        self.command(Method::DELETE, &format!("/session/{session}"), None)
            .await?;
        Ok(())
    }

    async fn navigate(&self, session: &str, url: &str) -> Result<(), VisitError> {
        self.command(
            Method::POST,
            &format!("/session/{session}/url"),
            Some(json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    async fn find_element(&self, session: &str, selector: &str) -> Result<String, VisitError> {
        let value = self
            .command(
                Method::POST,
                &format!("/session/{session}/element"),
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        value["value"][ELEMENT_KEY]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VisitError::Protocol(format!("no element matching {selector}")))
    }

    async fn send_keys(&self, session: &str, element: &str, text: &str) -> Result<(), VisitError> {
        self.command(
            Method::POST,
            &format!("/session/{session}/element/{element}/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, session: &str, element: &str) -> Result<(), VisitError> {
        self.command(
            Method::POST,
            &format!("/session/{session}/element/{element}/click"),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    /// Plant the secret flag cookie on the app's domain. Not HttpOnly: the
    /// viewer's scripts are meant to be able to read it.
    async fn add_flag_cookie(&self, session: &str) -> Result<(), VisitError> {
        self.command(
            Method::POST,
            &format!("/session/{session}/cookie"),
            Some(json!({
                "cookie": {
                    "name": "FLAG",
                    "value": self.flag,
                    "path": "/",
                    "httpOnly": false,
                    "sameSite": "Strict"
                }
            })),
        )
        .await?;
        Ok(())
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, VisitError> {
        let url = self.webdriver.join(path)?;
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(VisitError::Protocol(format!("{status}: {text}")));
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Shared-note viewer URL with id and target username in the fragment,
/// where only the page's own scripts can see them.
fn share_read_url(public: &Url, id: &str, username: &str) -> Result<Url, url::ParseError> {
    let mut url = public.join("/share/read")?;
    url.set_fragment(Some(&format!("id={id}&username={username}")));
    Ok(url)
}

fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gate_blocks_within_cooldown() {
        let gate = ReportGate::new(Duration::from_secs(3600));
        assert!(gate.try_pass(Some("tok")).await);
        assert!(!gate.try_pass(Some("tok")).await);
        // Other sessions have their own bucket.
        assert!(gate.try_pass(Some("other")).await);
    }

    #[tokio::test]
    async fn anonymous_callers_share_a_bucket() {
        let gate = ReportGate::new(Duration::from_secs(3600));
        assert!(gate.try_pass(None).await);
        assert!(!gate.try_pass(None).await);
    }

    #[tokio::test]
    async fn zero_cooldown_never_blocks() {
        let gate = ReportGate::new(Duration::ZERO);
        assert!(gate.try_pass(Some("tok")).await);
        assert!(gate.try_pass(Some("tok")).await);
    }

    #[test]
    fn share_read_url_carries_fragment() {
        let public = Url::parse("http://localhost:3000").unwrap();
        let url = share_read_url(&public, "2", "alice123").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/share/read#id=2&username=alice123"
        );
    }

    #[test]
    fn random_string_is_alphanumeric() {
        let s = random_string(20);
        assert_eq!(s.len(), 20);
        assert!(s.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_ne!(random_string(20), random_string(20));
    }
}
