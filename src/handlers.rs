use axum::{
    Form, Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{any, get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    session,
    state::AppState,
    store::LoginOutcome,
    template,
};

/// Username length bounds for login.
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 4..=10;
/// Minimum password length for login.
const PASSWORD_MIN: usize = 6;
/// Titles must be shorter than this.
const TITLE_MAX: usize = 30;
/// Note contents must be shorter than this.
const CONTENT_MAX: usize = 10240;

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(index))
        .route("/login", get(login_form).post(login))
        .route("/write", post(write))
        .route("/read", get(read_viewer))
        .route("/read/{id}", get(read_note))
        .route("/share_diary/{id}", get(share_diary))
        .route("/share", any(share_summary))
        .route("/share/read", get(shared_viewer))
        .route("/share/read/{id}", get(read_shared_note))
        .route("/logout", any(logout))
        .route("/report", post(report))
        .layer(middleware::from_fn(set_security_headers))
        .with_state(state)
}

async fn set_security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store"),
    );
    response
}

// ── Index and login ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct IndexQuery {
    error: Option<String>,
}

async fn index(
    State(state): State<AppState>,
    Query(query): Query<IndexQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(username) = current_user(&state, &headers).await else {
        return Redirect::to("/login").into_response();
    };
    let notes = state.store.notes_of(&username).await;
    render(template::index_page(
        &session::new_nonce(),
        &username,
        &notes,
        query.error.as_deref(),
    ))
}

async fn login_form(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if current_user(&state, &headers).await.is_some() {
        return Redirect::to("/").into_response();
    }
    render(template::login_page(&session::new_nonce(), None))
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    if current_user(&state, &headers).await.is_some() {
        return Redirect::to("/").into_response();
    }

    if !USERNAME_LEN.contains(&form.username.chars().count())
        || form.password.chars().count() < PASSWORD_MIN
    {
        return render(template::login_page(
            &session::new_nonce(),
            Some("invalid data"),
        ));
    }

    match state
        .store
        .login_or_register(&form.username, &form.password)
        .await
    {
        LoginOutcome::SignedIn | LoginOutcome::Registered => {
            let token = state.sessions.open(&form.username).await;
            (
                StatusCode::SEE_OTHER,
                [
                    (header::SET_COOKIE, session::session_cookie(&token)),
                    (header::LOCATION, "/".to_string()),
                ],
            )
                .into_response()
        }
        LoginOutcome::WrongPassword => render(template::login_page(
            &session::new_nonce(),
            Some("Invalid Password"),
        )),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session::extract_session_cookie(&headers) {
        state.sessions.close(&token).await;
    }
    (
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, session::clear_session_cookie()),
            (header::LOCATION, "/".to_string()),
        ],
    )
        .into_response()
}

// ── Writing and reading notes ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct WriteForm {
    title: String,
    content: String,
}

async fn write(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<WriteForm>,
) -> Response {
    let Some(username) = current_user(&state, &headers).await else {
        return Redirect::to("/").into_response();
    };

    if form.title.chars().count() >= TITLE_MAX {
        return redirect_with_error("Title is too long");
    }
    if form.content.chars().count() >= CONTENT_MAX {
        return redirect_with_error("Content is too long");
    }

    state
        .store
        .add_note(&username, form.title, form.content)
        .await;
    Redirect::to("/").into_response()
}

async fn read_viewer(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if current_user(&state, &headers).await.is_none() {
        return Redirect::to("/").into_response();
    }
    render(template::read_page(&session::new_nonce()))
}

#[derive(Serialize)]
struct NoteBody {
    title: String,
    content: String,
}

async fn read_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(username) = current_user(&state, &headers).await else {
        return Redirect::to("/").into_response();
    };
    let index = match parse_note_id(&id) {
        Ok(index) => index,
        Err(e) => return e.into_response(),
    };

    let note = match index {
        Some(i) => state.store.note(&username, i).await,
        None => None,
    };
    match note {
        Some(note) => Json(NoteBody {
            title: note.title,
            content: note.content,
        })
        .into_response(),
        None => AppError::NoSuchNote.into_response(),
    }
}

// ── Sharing ───────────────────────────────────────────────────────────────────

async fn share_diary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(username) = current_user(&state, &headers).await else {
        return Redirect::to("/").into_response();
    };
    let index = match parse_note_id(&id) {
        Ok(index) => index,
        Err(e) => return e.into_response(),
    };

    let shared = match index {
        Some(i) => state.store.share(&username, i).await,
        None => false,
    };
    if shared {
        Redirect::to("/share").into_response()
    } else {
        redirect_with_error("No such note")
    }
}

async fn share_summary(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(username) = current_user(&state, &headers).await else {
        return Redirect::to("/login").into_response();
    };
    let notes = state.store.shared_of(&username).await;
    render(template::share_page(&session::new_nonce(), &notes))
}

async fn shared_viewer(State(state): State<AppState>) -> Response {
    render(template::share_read_page(
        &session::new_nonce(),
        state.turnstile_site_key.as_deref(),
    ))
}

#[derive(Deserialize)]
struct SharedReadQuery {
    username: Option<String>,
}

#[derive(Serialize)]
struct SharedNoteBody {
    title: String,
    content: String,
    username: String,
}

/// Public lookup: the target username comes from the query string, falling
/// back to the caller's own session. Nothing ties the caller's identity to
/// the target — shared notes are readable by anyone who names the owner.
async fn read_shared_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SharedReadQuery>,
    headers: HeaderMap,
) -> Response {
    let index = match parse_note_id(&id) {
        Ok(index) => index,
        Err(e) => return e.into_response(),
    };

    let target = match query.username {
        Some(username) => Some(username),
        None => current_user(&state, &headers).await,
    };
    let note = match (target, index) {
        (Some(username), Some(i)) => state.store.shared_note(&username, i).await,
        _ => None,
    };
    match note {
        Some(note) => Json(SharedNoteBody {
            title: note.title,
            content: note.content,
            username: note.username,
        })
        .into_response(),
        None => AppError::NoSuchNote.into_response(),
    }
}

// ── Report trigger ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ReportForm {
    id: String,
    username: String,
    #[serde(rename = "cf-turnstile-response")]
    captcha_token: Option<String>,
}

async fn report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ReportForm>,
) -> Response {
    if let Some(captcha) = &state.captcha {
        let Some(token) = form.captcha_token.as_deref() else {
            return AppError::BadRequest("bad request").into_response();
        };
        if !captcha.verify(token).await {
            return AppError::BadRequest("invalid captcha").into_response();
        }
    }

    if parse_note_id(&form.id).is_err() {
        return AppError::BadRequest("bad url").into_response();
    }

    let token = session::extract_session_cookie(&headers);
    if !state.reports.try_pass(token.as_deref()).await {
        return AppError::RateLimited.into_response();
    }

    match state.visitor.visit(&form.id, &form.username).await {
        Ok(()) => Json(serde_json::json!({ "msg": "visited" })).into_response(),
        Err(e) => AppError::Visit(e).into_response(),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let token = session::extract_session_cookie(headers)?;
    state.sessions.username(&token).await
}

fn render(markup: maud::Markup) -> Response {
    Html(markup.into_string()).into_response()
}

fn redirect_with_error(msg: &str) -> Response {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("error", msg)
        .finish();
    Redirect::to(&format!("/?{query}")).into_response()
}

/// Ids must be decimal digit strings. A digit string too large for `usize`
/// addresses nothing and maps to `None`.
fn parse_note_id(id: &str) -> Result<Option<usize>, AppError> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidParameter);
    }
    Ok(id.parse().ok())
}
