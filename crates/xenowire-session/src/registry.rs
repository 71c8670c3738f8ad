use std::collections::BTreeMap;

use tracing::info;
use xenowire_frame::{Dispatcher, ProtocolConfig, SessionId};

use crate::error::{Result, SessionError};
use crate::session::Session;

/// Owns every open session of a process and hands out their ids.
///
/// Ids start at 1 and are never reused, so a stale id can only ever miss.
pub struct SessionRegistry<D> {
    config: ProtocolConfig,
    dispatcher: D,
    sessions: BTreeMap<SessionId, Session<D>>,
    next_id: u32,
}

impl<D: Dispatcher + Clone> SessionRegistry<D> {
    pub fn new(dispatcher: D, config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            dispatcher,
            sessions: BTreeMap::new(),
            next_id: 1,
        })
    }

    /// Open a new session sharing this registry's dispatcher and config.
    pub fn open(&mut self) -> Result<SessionId> {
        let id = SessionId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(SessionError::IdsExhausted)?;
        let session = Session::new(id, self.dispatcher.clone(), &self.config)?;
        self.sessions.insert(id, session);
        info!(session = %id, "session opened");
        Ok(id)
    }

    pub fn get(&self, id: SessionId) -> Result<&Session<D>> {
        self.sessions
            .get(&id)
            .ok_or(SessionError::UnknownSession(id))
    }

    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut Session<D>> {
        self.sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))
    }

    /// Tear the session down and forget it. Returns the records reclaimed.
    pub fn close(&mut self, id: SessionId) -> Result<usize> {
        let mut session = self
            .sessions
            .remove(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        let reclaimed = session.teardown();
        info!(session = %id, reclaimed, "session closed");
        Ok(reclaimed)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use xenowire_frame::{MessageRegistry, RawEvent};

    use super::*;
    use crate::session::Delivery;

    fn registry() -> SessionRegistry<Arc<MessageRegistry>> {
        let dispatcher = Arc::new(MessageRegistry::new().with(0x0100, "data", false));
        SessionRegistry::new(dispatcher, ProtocolConfig::default()).unwrap()
    }

    #[test]
    fn ids_are_sequential_and_never_reused() {
        let mut sessions = registry();
        let first = sessions.open().unwrap();
        let second = sessions.open().unwrap();
        assert_eq!(first, SessionId(1));
        assert_eq!(second, SessionId(2));

        sessions.close(first).unwrap();
        assert_eq!(sessions.open().unwrap(), SessionId(3));
        assert_eq!(sessions.ids(), vec![SessionId(2), SessionId(3)]);
    }

    #[test]
    fn closed_session_is_unknown() {
        let mut sessions = registry();
        let id = sessions.open().unwrap();
        sessions.close(id).unwrap();

        assert!(matches!(
            sessions.get(id),
            Err(SessionError::UnknownSession(missing)) if missing == id
        ));
        assert!(matches!(
            sessions.close(id),
            Err(SessionError::UnknownSession(_))
        ));
        assert!(sessions.is_empty());
    }

    #[test]
    fn sessions_are_independent() {
        let mut sessions = registry();
        let a = sessions.open().unwrap();
        let b = sessions.open().unwrap();

        sessions
            .get_mut(a)
            .unwrap()
            .send(&RawEvent::new(0x0100, &b"to-b"[..]))
            .unwrap();
        let wire = sessions.get_mut(a).unwrap().poll_transmit().unwrap();

        let partial = &wire[..5];
        assert!(sessions.get_mut(a).unwrap().receive(partial).unwrap().is_empty());
        let deliveries = sessions.get_mut(b).unwrap().receive(&wire).unwrap();
        assert!(matches!(deliveries[..], [Delivery::Message { unique_id: 1, .. }]));

        assert_eq!(sessions.close(a).unwrap(), 1);
        assert_eq!(sessions.close(b).unwrap(), 0);
    }

    #[test]
    fn ids_exhaust_instead_of_wrapping() {
        let mut sessions = registry();
        sessions.next_id = u32::MAX;
        assert!(matches!(sessions.open(), Err(SessionError::IdsExhausted)));
    }
}
