use std::fmt;

use crate::errors::CanopyError;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Called with the alias of a role after it has been removed.
pub type RoleDeletedHandler = Box<dyn Fn(&str) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Ordered list of role-deleted subscribers.
#[derive(Default)]
pub struct RoleEvents {
    next_id: u64,
    handlers: Vec<(HandlerId, RoleDeletedHandler)>,
}

impl RoleEvents {
    pub fn subscribe(&mut self, handler: RoleDeletedHandler) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, handler));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(hid, _)| *hid != id);
        self.handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run every handler in subscription order. The first failure stops the
    /// walk and is returned to the caller.
    pub fn publish(&self, alias: &str) -> Result<(), CanopyError> {
        for (id, handler) in &self.handlers {
            handler(alias).map_err(|e| {
                tracing::warn!(role = alias, handler = ?id, error = %e, "Role-deleted handler failed");
                CanopyError::Hook(e.to_string())
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for RoleEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleEvents")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> RoleDeletedHandler {
        let log = Arc::clone(log);
        Box::new(move |alias: &str| -> Result<(), HandlerError> {
            log.lock().unwrap().push(format!("{tag}:{alias}"));
            Ok(())
        })
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut events = RoleEvents::default();
        events.subscribe(recorder(&log, "a"));
        events.subscribe(recorder(&log, "b"));

        events.publish("editor").unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a:editor", "b:editor"]);
    }

    #[test]
    fn test_unsubscribe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut events = RoleEvents::default();
        let first = events.subscribe(recorder(&log, "a"));
        events.subscribe(recorder(&log, "b"));

        assert!(events.unsubscribe(first));
        assert!(!events.unsubscribe(first));
        assert_eq!(events.len(), 1);

        events.publish("x").unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b:x"]);
    }

    #[test]
    fn test_failure_stops_later_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut events = RoleEvents::default();
        events.subscribe(Box::new(|_: &str| -> Result<(), HandlerError> {
            Err("audit store offline".into())
        }));
        events.subscribe(recorder(&log, "late"));

        let err = events.publish("x").unwrap_err();
        assert!(matches!(err, CanopyError::Hook(ref msg) if msg == "audit store offline"));
        assert!(log.lock().unwrap().is_empty());
    }
}
