use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lex::ports::SessionRepository;
use crate::store::{abort, keys, Store, StoreError};

/// A generated session as handed to the student. Completion is accepted only
/// for these question ids, and only once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub id: String,
    pub student_id: String,
    pub question_ids: Vec<String>,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl IssuedSession {
    pub fn contains(&self, question_id: &str) -> bool {
        self.question_ids.iter().any(|id| id == question_id)
    }
}

impl SessionRepository for Store {
    fn insert_issued_session(&self, session: &IssuedSession) -> Result<(), StoreError> {
        let key = keys::issued_session_key(&session.student_id, &session.id)?;
        let cas = self.lex_sessions.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(Self::serialize(session)?),
        )?;
        if cas.is_err() {
            return Err(StoreError::conflict("session", &session.id));
        }
        Ok(())
    }

    fn get_issued_session(
        &self,
        student_id: &str,
        session_id: &str,
    ) -> Result<Option<IssuedSession>, StoreError> {
        let key = keys::issued_session_key(student_id, session_id)?;
        match self.lex_sessions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn close_issued_session(
        &self,
        student_id: &str,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<IssuedSession, StoreError> {
        let key = keys::issued_session_key(student_id, session_id)?;
        self.lex_sessions
            .transaction(|tx| {
                let Some(raw) = tx.get(key.as_bytes())? else {
                    return abort(StoreError::not_found("session", session_id));
                };
                let mut session: IssuedSession = match Self::deserialize(&raw) {
                    Ok(s) => s,
                    Err(e) => return abort(e),
                };
                if session.completed_at.is_some() {
                    return abort(StoreError::conflict("session", session_id));
                }
                session.completed_at = Some(at);
                let bytes = match Self::serialize(&session) {
                    Ok(b) => b,
                    Err(e) => return abort(e),
                };
                tx.insert(key.as_bytes(), bytes)?;
                Ok(session)
            })
            .map_err(crate::store::flatten_tx_error)
    }
}
