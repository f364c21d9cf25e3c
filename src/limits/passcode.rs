use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::limits::error::ActionError;
use crate::limits::store::PreferenceStore;

/// Shared-secret gate for unlocking and for editing restrictions
///
/// Exact string comparison against the stored passcode. Without a stored passcode
/// every gated action goes through.
#[derive(Clone)]
pub struct PasscodeGate {
    store: Arc<dyn PreferenceStore>,
}

impl PasscodeGate {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn is_configured(&self) -> Result<bool> {
        Ok(self.store.load_passcode()?.is_some())
    }

    pub fn verify(&self, candidate: &str) -> Result<bool> {
        Ok(match self.store.load_passcode()? {
            Some(passcode) => passcode == candidate,
            None => true,
        })
    }

    /// Check a gated action against the passcode the user entered, if any
    pub fn authorize(&self, candidate: Option<&str>) -> Result<(), ActionError> {
        let Some(passcode) = self.store.load_passcode()? else {
            debug!("No passcode configured, allowing action");
            return Ok(());
        };

        match candidate {
            None => Err(ActionError::PasscodeRequired),
            Some(candidate) if candidate == passcode => Ok(()),
            Some(_) => Err(ActionError::IncorrectPasscode),
        }
    }

    /// Set a new passcode
    ///
    /// Checked in order: new and confirmation present, equal, then the current
    /// passcode when one is already set.
    pub fn change(
        &self,
        current: Option<&str>,
        new: &str,
        confirm: &str,
    ) -> Result<(), ActionError> {
        if new.is_empty() || confirm.is_empty() {
            return Err(ActionError::EmptyPasscode);
        }

        if new != confirm {
            return Err(ActionError::PasscodeMismatch);
        }

        if let Some(existing) = self.store.load_passcode()? {
            if current != Some(existing.as_str()) {
                return Err(ActionError::CurrentPasscodeIncorrect);
            }
        }

        self.store.save_passcode(new)?;
        info!("Passcode updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::clock::SystemClock;
    use crate::limits::store::LocalStore;

    fn gate() -> (PasscodeGate, Arc<LocalStore>) {
        let store = Arc::new(LocalStore::in_memory(Arc::new(SystemClock)));
        (PasscodeGate::new(store.clone()), store)
    }

    #[test]
    fn test_verify_with_passcode() {
        let (gate, store) = gate();
        store.save_passcode("1234").unwrap();

        assert!(gate.verify("1234").unwrap());
        assert!(!gate.verify("0000").unwrap());
        assert!(!gate.verify("").unwrap());
    }

    #[test]
    fn test_no_passcode_bypasses_gate() {
        let (gate, _) = gate();

        assert!(!gate.is_configured().unwrap());
        assert!(gate.verify("anything").unwrap());
        assert!(gate.authorize(None).is_ok());
    }

    #[test]
    fn test_authorize_requires_passcode() {
        let (gate, store) = gate();
        store.save_passcode("1234").unwrap();

        assert!(matches!(gate.authorize(None), Err(ActionError::PasscodeRequired)));
        assert!(matches!(
            gate.authorize(Some("9999")),
            Err(ActionError::IncorrectPasscode)
        ));
        assert!(gate.authorize(Some("1234")).is_ok());
    }

    #[test]
    fn test_first_passcode_needs_no_current() {
        let (gate, _) = gate();

        gate.change(None, "1234", "1234").unwrap();
        assert!(gate.is_configured().unwrap());
        assert!(gate.verify("1234").unwrap());
    }

    #[test]
    fn test_change_validation_order() {
        let (gate, store) = gate();
        store.save_passcode("1234").unwrap();

        assert!(matches!(
            gate.change(Some("wrong"), "", "5678"),
            Err(ActionError::EmptyPasscode)
        ));
        assert!(matches!(
            gate.change(Some("wrong"), "5678", "8765"),
            Err(ActionError::PasscodeMismatch)
        ));
        assert!(matches!(
            gate.change(Some("wrong"), "5678", "5678"),
            Err(ActionError::CurrentPasscodeIncorrect)
        ));
        assert!(matches!(
            gate.change(None, "5678", "5678"),
            Err(ActionError::CurrentPasscodeIncorrect)
        ));

        gate.change(Some("1234"), "5678", "5678").unwrap();
        assert!(gate.verify("5678").unwrap());
        assert!(!gate.verify("1234").unwrap());
    }
}
