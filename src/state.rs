use crate::captcha::Turnstile;
use crate::report::{ReportGate, Visitor};
use crate::session::SessionStore;
use crate::store::NoteStore;

#[derive(Clone)]
pub struct AppState {
    pub store: NoteStore,
    pub sessions: SessionStore,
    pub reports: ReportGate,
    /// Server-side CAPTCHA verifier; `None` skips the check entirely.
    pub captcha: Option<Turnstile>,
    /// Site key rendered into the shared viewer page, independent of
    /// whether server-side verification is configured.
    pub turnstile_site_key: Option<String>,
    pub visitor: Visitor,
}
