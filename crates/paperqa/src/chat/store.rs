//! In-memory session store keyed by reconnection credential.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use thiserror::Error;

use super::models::Message;

/// Number of transcript entries handed to the generator as context.
pub const CONTEXT_WINDOW: usize = 10;

/// Entropy of a reconnection credential, before encoding.
const CREDENTIAL_BYTES: usize = 32;

/// Errors raised by session operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
}

/// Process-wide store mapping reconnection credentials to transcripts.
///
/// A credential is the only external handle to a session and is never
/// reused: reconnecting rotates the session onto a fresh credential and
/// retires the old one. Transcripts are append-only while the session lives;
/// there is no eviction, sessions stay resident until process exit.
pub struct SessionStore {
    sessions: DashMap<String, Vec<Message>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create a new empty session and return its credential.
    pub fn create(&self) -> String {
        self.insert_new(Vec::new())
    }

    /// Transcript for a live credential, or `None` for an unknown one.
    /// Callers treat `None` the same as "no prior session".
    pub fn resume(&self, credential: &str) -> Option<Vec<Message>> {
        self.sessions.get(credential).map(|entry| entry.value().clone())
    }

    /// Re-key a live session under a freshly minted credential.
    ///
    /// Returns the new credential and the transcript at rotation time. The
    /// old credential stops resolving immediately.
    pub fn rotate(&self, credential: &str) -> Option<(String, Vec<Message>)> {
        let (_, transcript) = self.sessions.remove(credential)?;
        let history = transcript.clone();
        Some((self.insert_new(transcript), history))
    }

    /// Append a message to a live session's transcript.
    pub fn append(&self, credential: &str, message: Message) -> Result<(), SessionError> {
        match self.sessions.get_mut(credential) {
            Some(mut transcript) => {
                transcript.push(message);
                Ok(())
            }
            None => Err(SessionError::NotFound),
        }
    }

    /// Last `n` transcript entries, oldest first. Empty for an unknown
    /// credential.
    pub fn recent_context(&self, credential: &str, n: usize) -> Vec<Message> {
        match self.sessions.get(credential) {
            Some(transcript) => {
                let skip = transcript.len().saturating_sub(n);
                transcript[skip..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Insert a transcript under a freshly minted credential, retrying on
    /// the (practically unreachable) collision with a live session.
    fn insert_new(&self, transcript: Vec<Message>) -> String {
        let mut transcript = transcript;
        loop {
            let credential = mint_credential();
            if let Entry::Vacant(slot) = self.sessions.entry(credential.clone()) {
                slot.insert(std::mem::take(&mut transcript));
                return credential;
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// URL-safe credential from 32 bytes of CSPRNG output. Possession of the
/// credential is the sole proof of session ownership, so the entropy source
/// matters here.
fn mint_credential() -> String {
    let mut bytes = [0u8; CREDENTIAL_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn created_credentials_are_distinct_and_resolve_empty() {
        let store = SessionStore::new();
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let credential = store.create();
            assert!(seen.insert(credential.clone()), "credential reused");
            assert_eq!(store.resume(&credential), Some(Vec::new()));
        }
    }

    #[test]
    fn credentials_are_url_safe() {
        let credential = SessionStore::new().create();
        assert!(credential.len() >= 43, "32 bytes must encode to >= 43 chars");
        assert!(
            credential
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn append_preserves_order() {
        let store = SessionStore::new();
        let credential = store.create();
        store.append(&credential, Message::user("one")).unwrap();
        store.append(&credential, Message::user("two")).unwrap();
        store.append(&credential, Message::user("three")).unwrap();

        let transcript = store.resume(&credential).unwrap();
        let texts: Vec<String> = transcript.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn append_to_unknown_credential_fails() {
        let store = SessionStore::new();
        assert_eq!(
            store.append("missing", Message::user("x")),
            Err(SessionError::NotFound)
        );
    }

    #[test]
    fn resume_unknown_credential_is_none() {
        assert_eq!(SessionStore::new().resume("missing"), None);
    }

    #[test]
    fn rotate_moves_transcript_to_new_credential() {
        let store = SessionStore::new();
        let old = store.create();
        store.append(&old, Message::user("kept")).unwrap();

        let (new, history) = store.rotate(&old).unwrap();
        assert_ne!(new, old);
        assert_eq!(history.len(), 1);
        assert_eq!(store.resume(&old), None);
        assert_eq!(store.resume(&new).unwrap().len(), 1);
    }

    #[test]
    fn rotate_unknown_credential_is_none() {
        assert!(SessionStore::new().rotate("missing").is_none());
    }

    #[test]
    fn recent_context_returns_tail_oldest_first() {
        let store = SessionStore::new();
        let credential = store.create();
        for i in 0..15 {
            store
                .append(&credential, Message::user(format!("m{i}")))
                .unwrap();
        }

        let context = store.recent_context(&credential, CONTEXT_WINDOW);
        assert_eq!(context.len(), 10);
        assert_eq!(context.first().unwrap().text(), "m5");
        assert_eq!(context.last().unwrap().text(), "m14");
    }

    #[test]
    fn recent_context_for_unknown_credential_is_empty() {
        assert!(
            SessionStore::new()
                .recent_context("missing", CONTEXT_WINDOW)
                .is_empty()
        );
    }
}
