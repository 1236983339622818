use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A single diary entry. Notes are append-only; a note's position in its
/// owner's list is its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub title: String,
    pub content: String,
    pub username: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Known username, digest matched.
    SignedIn,
    /// Unknown username, registered with the supplied password's digest.
    Registered,
    /// Known username, digest mismatch. The stored digest is untouched.
    WrongPassword,
}

/// Process-lifetime note storage: users, private notes, and shared notes.
///
/// Everything lives behind a single `RwLock` so a racing registration or
/// share cannot tear a map; restart loses all data.
#[derive(Clone, Default)]
pub struct NoteStore {
    inner: Arc<RwLock<Maps>>,
}

#[derive(Default)]
struct Maps {
    users: HashMap<String, String>,
    notes: HashMap<String, Vec<Note>>,
    shared: HashMap<String, Vec<Note>>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register-on-first-login: an unseen username is created with the
    /// supplied password's digest and signed in, in one step.
    pub async fn login_or_register(&self, username: &str, password: &str) -> LoginOutcome {
        let mut maps = self.inner.write().await;
        match maps.users.get(username) {
            Some(stored) if *stored == digest(password) => LoginOutcome::SignedIn,
            Some(_) => LoginOutcome::WrongPassword,
            None => {
                maps.users.insert(username.to_string(), digest(password));
                LoginOutcome::Registered
            }
        }
    }

    pub async fn add_note(&self, username: &str, title: String, content: String) {
        let mut maps = self.inner.write().await;
        maps.notes.entry(username.to_string()).or_default().push(Note {
            title,
            content,
            username: username.to_string(),
        });
    }

    pub async fn notes_of(&self, username: &str) -> Vec<Note> {
        let maps = self.inner.read().await;
        maps.notes.get(username).cloned().unwrap_or_default()
    }

    pub async fn note(&self, username: &str, index: usize) -> Option<Note> {
        let maps = self.inner.read().await;
        maps.notes.get(username)?.get(index).cloned()
    }

    /// Copy the caller's `index`-th note onto their shared list.
    /// Returns `false` when there is no such note.
    pub async fn share(&self, username: &str, index: usize) -> bool {
        let mut maps = self.inner.write().await;
        let Some(note) = maps.notes.get(username).and_then(|n| n.get(index)).cloned() else {
            return false;
        };
        maps.shared.entry(username.to_string()).or_default().push(note);
        true
    }

    pub async fn shared_of(&self, username: &str) -> Vec<Note> {
        let maps = self.inner.read().await;
        maps.shared.get(username).cloned().unwrap_or_default()
    }

    /// Shared notes are looked up by owner name alone; the caller's own
    /// identity is deliberately not consulted.
    pub async fn shared_note(&self, username: &str, index: usize) -> Option<Note> {
        let maps = self.inner.read().await;
        maps.shared.get(username)?.get(index).cloned()
    }
}

/// Fixed password digest: SHA-256 hex.
pub fn digest(password: &str) -> String {
    let hash = Sha256::digest(password.as_bytes());
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let d = digest("secret1");
        assert_eq!(d.len(), 64);
        assert!(d.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(d, digest("secret1"));
        assert_ne!(d, digest("secret2"));
    }

    #[tokio::test]
    async fn first_login_registers_second_must_match() {
        let store = NoteStore::new();
        assert_eq!(
            store.login_or_register("alice123", "secret1").await,
            LoginOutcome::Registered
        );
        assert_eq!(
            store.login_or_register("alice123", "hunter22").await,
            LoginOutcome::WrongPassword
        );
        // The failed attempt must not have overwritten the digest.
        assert_eq!(
            store.login_or_register("alice123", "secret1").await,
            LoginOutcome::SignedIn
        );
    }

    #[tokio::test]
    async fn notes_come_back_in_insertion_order() {
        let store = NoteStore::new();
        for i in 0..3 {
            store
                .add_note("alice123", format!("t{i}"), format!("c{i}"))
                .await;
        }
        for i in 0..3 {
            let note = store.note("alice123", i).await.unwrap();
            assert_eq!(note.title, format!("t{i}"));
            assert_eq!(note.content, format!("c{i}"));
            assert_eq!(note.username, "alice123");
        }
        assert!(store.note("alice123", 3).await.is_none());
        assert!(store.note("nobody", 0).await.is_none());
    }

    #[tokio::test]
    async fn share_copies_verbatim_and_is_independent() {
        let store = NoteStore::new();
        store.add_note("alice123", "T".into(), "C".into()).await;
        assert!(store.share("alice123", 0).await);
        assert!(!store.share("alice123", 1).await);

        let shared = store.shared_note("alice123", 0).await.unwrap();
        assert_eq!(
            shared,
            Note {
                title: "T".into(),
                content: "C".into(),
                username: "alice123".into()
            }
        );

        // Sharing twice appends a second copy.
        assert!(store.share("alice123", 0).await);
        assert_eq!(store.shared_of("alice123").await.len(), 2);
    }
}
