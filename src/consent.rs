//! Client-side consent gate.
//!
//! Store and retrieve actions go through [`ConsentGate::ensure`]. Without
//! consent the action is parked in a single slot and the consent dialog is
//! opened; granting consent hands the parked action back exactly once.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentState {
    /// The first status check has not completed.
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl ConsentState {
    pub fn from_flag(has_consent: bool) -> Self {
        if has_consent {
            Self::Granted
        } else {
            Self::Denied
        }
    }
}

/// What the caller should do with an action passed to [`ConsentGate::ensure`].
#[derive(Debug, PartialEq, Eq)]
pub enum Gate<Op> {
    /// Consent is held; run the action now.
    Proceed(Op),
    /// The action is parked until consent is granted.
    Deferred,
    /// Status still unresolved; the action was dropped.
    NotReady,
}

#[derive(Debug, Clone)]
pub struct ConsentGate<Op> {
    state: ConsentState,
    pending: Option<Op>,
    dialog_open: bool,
}

impl<Op> Default for ConsentGate<Op> {
    fn default() -> Self {
        Self {
            state: ConsentState::Unknown,
            pending: None,
            dialog_open: false,
        }
    }
}

impl<Op> ConsentGate<Op> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConsentState {
        self.state
    }

    pub fn dialog_open(&self) -> bool {
        self.dialog_open
    }

    pub fn pending(&self) -> Option<&Op> {
        self.pending.as_ref()
    }

    pub fn ensure(&mut self, op: Op) -> Gate<Op> {
        match self.state {
            ConsentState::Unknown => Gate::NotReady,
            ConsentState::Granted => Gate::Proceed(op),
            ConsentState::Denied => {
                // one slot: a newer action replaces the parked one
                self.pending = Some(op);
                self.dialog_open = true;
                Gate::Deferred
            }
        }
    }

    /// Records the outcome of a status check.
    pub fn resolve(&mut self, has_consent: bool) {
        self.state = ConsentState::from_flag(has_consent);
    }

    /// Consent was granted by the service. Returns the parked action, which
    /// the caller must run once.
    pub fn granted(&mut self) -> Option<Op> {
        self.state = ConsentState::Granted;
        self.dialog_open = false;
        self.pending.take()
    }

    /// The grant call failed: close the dialog and forget the parked action.
    /// The consent state is left as it was.
    pub fn grant_failed(&mut self) {
        self.dialog_open = false;
        self.pending = None;
    }

    pub fn cancel(&mut self) {
        self.dialog_open = false;
        self.pending = None;
    }

    pub fn revoked(&mut self) {
        self.state = ConsentState::Denied;
    }

    /// Opens the dialog without parking anything.
    pub fn request_dialog(&mut self) {
        self.dialog_open = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_status_neither_runs_nor_queues() {
        let mut gate = ConsentGate::new();
        assert_eq!(gate.ensure("store"), Gate::NotReady);
        assert!(gate.pending().is_none());
        assert!(!gate.dialog_open());
    }

    #[test]
    fn granted_status_proceeds_immediately() {
        let mut gate = ConsentGate::new();
        gate.resolve(true);
        assert_eq!(gate.ensure("store"), Gate::Proceed("store"));
        assert!(gate.pending().is_none());
    }

    #[test]
    fn denied_status_parks_and_opens_dialog() {
        let mut gate = ConsentGate::new();
        gate.resolve(false);
        assert_eq!(gate.ensure("store"), Gate::Deferred);
        assert_eq!(gate.pending(), Some(&"store"));
        assert!(gate.dialog_open());
    }

    #[test]
    fn second_deferral_overwrites_first() {
        let mut gate = ConsentGate::new();
        gate.resolve(false);
        gate.ensure("first");
        gate.ensure("second");
        assert_eq!(gate.granted(), Some("second"));
    }

    #[test]
    fn grant_hands_back_pending_once() {
        let mut gate = ConsentGate::new();
        gate.resolve(false);
        gate.ensure(7);
        assert_eq!(gate.granted(), Some(7));
        assert_eq!(gate.state(), ConsentState::Granted);
        assert!(!gate.dialog_open());
        assert_eq!(gate.granted(), None);
    }

    #[test]
    fn cancel_discards_pending() {
        let mut gate = ConsentGate::new();
        gate.resolve(false);
        gate.ensure(1);
        gate.cancel();
        assert!(gate.pending().is_none());
        assert!(!gate.dialog_open());
        assert_eq!(gate.state(), ConsentState::Denied);
        assert_eq!(gate.granted(), None);
    }

    #[test]
    fn failed_grant_keeps_state() {
        let mut gate = ConsentGate::new();
        gate.resolve(false);
        gate.ensure(1);
        gate.grant_failed();
        assert_eq!(gate.state(), ConsentState::Denied);
        assert!(gate.pending().is_none());
        assert!(!gate.dialog_open());
    }

    #[test]
    fn revoke_moves_to_denied() {
        let mut gate: ConsentGate<()> = ConsentGate::new();
        gate.resolve(true);
        gate.revoked();
        assert_eq!(gate.state(), ConsentState::Denied);
    }
}
