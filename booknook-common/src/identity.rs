//! Anonymous identity
//!
//! Sessions are issued without credentials and serve only as the
//! attribution of new reviews. [`SessionRegistry`] is the issuing side
//! (held by the web service); [`AnonymousClient`] is a per-visitor
//! provider that remembers the session it was handed.
//!
//! Issuing is unauthenticated, so the registry is bounded: sessions
//! expire after a time-to-live and the oldest is dropped once the
//! registry is full.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::AnonymousSession;
use crate::{Error, Result};

/// Source of anonymous sessions
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Session the provider already holds, if any
    async fn current_user(&self) -> Option<AnonymousSession>;

    /// Obtain a fresh anonymous session and make it current
    async fn sign_in_anonymously(&self) -> Result<AnonymousSession>;
}

/// Reuse the provider's existing session, or sign in anonymously
pub async fn ensure_anonymous_session(provider: &dyn IdentityProvider) -> Result<AnonymousSession> {
    if let Some(session) = provider.current_user().await {
        debug!(uid = %session.uid, "Reusing existing anonymous session");
        return Ok(session);
    }

    let session = provider.sign_in_anonymously().await?;
    info!(uid = %session.uid, "Signed in anonymously");
    Ok(session)
}

/// Lifetime of an issued session
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// Sessions held before the oldest is dropped
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct IssuedSession {
    session: AnonymousSession,
    issued_at: Instant,
}

/// Issuer and validator of anonymous sessions
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, IssuedSession>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose sessions live for `ttl`, holding at most
    /// `max_sessions` (minimum 1)
    pub fn with_limits(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Issue a new session with a random uid
    pub async fn issue(&self) -> AnonymousSession {
        let session = AnonymousSession {
            uid: Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
        };

        let mut sessions = self.sessions.write().await;
        let ttl = self.ttl;
        sessions.retain(|_, issued| issued.issued_at.elapsed() < ttl);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, issued)| issued.issued_at)
                .map(|(uid, _)| uid.clone());
            match oldest {
                Some(uid) => {
                    debug!(uid = %uid, "Session registry full, dropping oldest session");
                    sessions.remove(&uid);
                }
                None => break,
            }
        }

        sessions.insert(
            session.uid.clone(),
            IssuedSession {
                session: session.clone(),
                issued_at: Instant::now(),
            },
        );
        session
    }

    /// Look up a previously issued, unexpired session
    pub async fn lookup(&self, uid: &str) -> Option<AnonymousSession> {
        self.sessions
            .read()
            .await
            .get(uid)
            .filter(|issued| issued.issued_at.elapsed() < self.ttl)
            .map(|issued| issued.session.clone())
    }

    /// Resolve a uid into its session or fail as unauthenticated
    pub async fn require(&self, uid: Option<&str>) -> Result<AnonymousSession> {
        let uid = uid.ok_or_else(|| Error::Unauthenticated("no session presented".to_string()))?;
        self.lookup(uid)
            .await
            .ok_or_else(|| Error::Unauthenticated(format!("unknown session {}", uid)))
    }

    /// Sessions held, expired ones not yet swept included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Per-visitor identity provider backed by a [`SessionRegistry`]
pub struct AnonymousClient {
    registry: SessionRegistry,
    current: RwLock<Option<AnonymousSession>>,
}

impl AnonymousClient {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            registry,
            current: RwLock::new(None),
        }
    }

    /// Client that already holds `session`
    pub fn with_session(registry: SessionRegistry, session: AnonymousSession) -> Self {
        Self {
            registry,
            current: RwLock::new(Some(session)),
        }
    }
}

#[async_trait]
impl IdentityProvider for AnonymousClient {
    async fn current_user(&self) -> Option<AnonymousSession> {
        self.current.read().await.clone()
    }

    async fn sign_in_anonymously(&self) -> Result<AnonymousSession> {
        let session = self.registry.issue().await;
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }
}

/// Identity bootstrap state of a widget
///
/// Moves only `Unresolved → Resolving → {Resolved, Failed}`; `Resolving`
/// is entered at most once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    #[default]
    Unresolved,
    Resolving,
    Resolved(AnonymousSession),
    Failed(String),
}

impl IdentityState {
    /// Enter `Resolving`; false if resolution already started
    pub fn begin(&mut self) -> bool {
        if matches!(self, IdentityState::Unresolved) {
            *self = IdentityState::Resolving;
            true
        } else {
            false
        }
    }

    /// Complete resolution; ignored unless currently `Resolving`
    pub fn resolve(&mut self, session: AnonymousSession) -> bool {
        if matches!(self, IdentityState::Resolving) {
            *self = IdentityState::Resolved(session);
            true
        } else {
            false
        }
    }

    /// Record failure; ignored unless currently `Resolving`
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if matches!(self, IdentityState::Resolving) {
            *self = IdentityState::Failed(message.into());
            true
        } else {
            false
        }
    }

    pub fn session(&self) -> Option<&AnonymousSession> {
        match self {
            IdentityState::Resolved(session) => Some(session),
            _ => None,
        }
    }
}
