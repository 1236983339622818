use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::store::Note;

// ── Shared page shell ─────────────────────────────────────────────────────────

/// Page shell. The CSP meta tag pins inline scripts to the per-request
/// nonce passed in by the handler.
fn shell(nonce: &str, title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta http-equiv="Content-Security-Policy"
                    content=(format!("script-src 'nonce-{nonce}';"));
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " — diary" }
                style { (PreEscaped(BASE_CSS)) }
            }
            body {
                main {
                    (body)
                }
            }
        }
    }
}

// ── Pages ─────────────────────────────────────────────────────────────────────

/// Login form. The element ids are part of the report bot's contract.
pub fn login_page(nonce: &str, msg: Option<&str>) -> Markup {
    shell(
        nonce,
        "Login",
        html! {
            h1 { "Diary" }
            @if let Some(msg) = msg {
                p class="error" { (msg) }
            }
            form method="post" action="/login" {
                label for="username" { "Username" }
                input id="username" name="username" type="text" autocomplete="username" required;
                label for="password" { "Password" }
                input id="password" name="password" type="password" autocomplete="current-password" required;
                button id="submit" type="submit" { "Sign in" }
            }
            p class="hint" { "Unknown usernames are registered on first login." }
        },
    )
}

pub fn index_page(nonce: &str, username: &str, notes: &[Note], error: Option<&str>) -> Markup {
    shell(
        nonce,
        "My diary",
        html! {
            h1 { "Diary of " (username) }
            nav {
                a href="/share" { "Shared notes" }
                " · "
                a href="/logout" { "Log out" }
            }
            @if let Some(error) = error {
                p class="error" { (error) }
            }
            form method="post" action="/write" {
                label for="title" { "Title" }
                input id="title" name="title" type="text" required;
                label for="content" { "Content" }
                textarea id="content" name="content" rows="6" {}
                button type="submit" { "Write" }
            }
            h2 { "Notes" }
            @if notes.is_empty() {
                p { em { "Nothing written yet." } }
            } @else {
                ul {
                    @for (id, note) in notes.iter().enumerate() {
                        li {
                            a href=(format!("/read#id={id}")) { (note.title) }
                            " "
                            a class="share" href=(format!("/share_diary/{id}")) { "[share]" }
                        }
                    }
                }
            }
        },
    )
}

pub fn share_page(nonce: &str, notes: &[Note]) -> Markup {
    shell(
        nonce,
        "Shared notes",
        html! {
            h1 { "Shared notes" }
            nav {
                a href="/" { "Back" }
            }
            @if notes.is_empty() {
                p { em { "Nothing shared yet." } }
            } @else {
                ul {
                    @for (id, note) in notes.iter().enumerate() {
                        li {
                            a href=(format!("/share/read#id={id}&username={}", note.username)) {
                                (note.title)
                            }
                        }
                    }
                }
            }
        },
    )
}

/// Private note viewer. The nonce'd inline script resolves the id from the
/// URL fragment and fetches the JSON endpoint.
pub fn read_page(nonce: &str) -> Markup {
    shell(
        nonce,
        "Read note",
        html! {
            nav {
                a href="/" { "Back" }
            }
            article {
                h1 id="title" {}
                div id="content" {}
            }
            script nonce=(nonce) { (PreEscaped(READ_JS)) }
        },
    )
}

/// Public shared-note viewer, including the report form. When a Turnstile
/// site key is configured the widget is rendered into the form.
pub fn share_read_page(nonce: &str, sitekey: Option<&str>) -> Markup {
    shell(
        nonce,
        "Shared note",
        html! {
            article {
                h1 id="title" {}
                p class="author" id="author" {}
                div id="content" {}
            }
            form id="report-form" method="post" action="/report" {
                input id="report-id" name="id" type="hidden";
                input id="report-username" name="username" type="hidden";
                @if let Some(key) = sitekey {
                    div class="cf-turnstile" data-sitekey=(key) {}
                }
                button type="submit" { "Report to admin" }
            }
            script nonce=(nonce) { (PreEscaped(SHARE_READ_JS)) }
            @if sitekey.is_some() {
                script src="https://challenges.cloudflare.com/turnstile/v0/api.js"
                    nonce=(nonce) defer {}
            }
        },
    )
}

// ── Assets ────────────────────────────────────────────────────────────────────

const BASE_CSS: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f6f5f2; color: #222; }
main { max-width: 42rem; margin: 2rem auto; padding: 0 1rem; }
nav { margin-bottom: 1rem; }
label { display: block; margin-top: .6rem; font-size: .85rem; }
input[type=text], input[type=password], textarea { width: 100%; padding: .4rem; box-sizing: border-box; }
button { margin-top: .8rem; padding: .4rem 1rem; }
.error { color: #a33; }
.hint { color: #777; font-size: .85rem; }
.author { color: #777; font-size: .85rem; }
a.share { font-size: .8rem; }
"#;

const READ_JS: &str = r#"
const params = new URLSearchParams(location.hash.slice(1));
const id = params.get("id") || "0";
fetch("/read/" + encodeURIComponent(id))
  .then((resp) => resp.json())
  .then((note) => {
    document.getElementById("title").innerHTML = note.title;
    document.getElementById("content").innerHTML = note.content;
  });
"#;

const SHARE_READ_JS: &str = r#"
const params = new URLSearchParams(location.hash.slice(1));
const id = params.get("id") || "0";
const username = params.get("username");
let url = "/share/read/" + encodeURIComponent(id);
if (username) {
  url += "?username=" + encodeURIComponent(username);
}
fetch(url)
  .then((resp) => resp.json())
  .then((note) => {
    document.getElementById("title").innerHTML = note.title;
    document.getElementById("author").textContent = note.username || "";
    document.getElementById("content").innerHTML = note.content;
    document.getElementById("report-id").value = id;
    document.getElementById("report-username").value = note.username || username || "";
  });
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_page_exposes_bot_selectors() {
        let page = login_page("abc", None).into_string();
        assert!(page.contains(r#"id="username""#));
        assert!(page.contains(r#"id="password""#));
        assert!(page.contains(r#"id="submit""#));
    }

    #[test]
    fn shell_pins_scripts_to_nonce() {
        let page = read_page("d00dfeed").into_string();
        assert!(page.contains("script-src 'nonce-d00dfeed';"));
        assert!(page.contains(r#"nonce="d00dfeed""#));
    }

    #[test]
    fn note_titles_are_escaped_in_listings() {
        let notes = vec![Note {
            title: "<script>x</script>".into(),
            content: "c".into(),
            username: "alice123".into(),
        }];
        let page = index_page("n", "alice123", &notes, None).into_string();
        assert!(!page.contains("<script>x</script>"));
    }

    #[test]
    fn turnstile_widget_only_when_configured() {
        let with = share_read_page("n", Some("sitekey-1")).into_string();
        assert!(with.contains("cf-turnstile"));
        assert!(with.contains("sitekey-1"));

        let without = share_read_page("n", None).into_string();
        assert!(!without.contains("cf-turnstile"));
    }
}
