// 📣 Service signals
// Listeners registered by name are notified before and after every
// create-or-update. Notification is fire-and-forget: a failing listener is
// logged and never changes the outcome of the mutation.

use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::warn;

use crate::entities::RecordKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Before,
    After,
}

/// How the wrapped call ended (only set for `Phase::After`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Saved { uuid: String, version: i64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    /// e.g. "medication_item.create_or_update"
    pub name: &'static str,
    pub phase: Phase,
    pub kind: RecordKind,
    pub audit_user_id: i64,

    /// Incoming field set, uuid included
    pub data: serde_json::Value,

    pub outcome: Option<Outcome>,
}

pub type Listener = Arc<dyn Fn(&Signal) -> anyhow::Result<()> + Send + Sync>;

struct Registration {
    name: String,
    phase: Phase,
    listener: Listener,
}

/// Observer list shared between the services of one application
#[derive(Clone, Default)]
pub struct SignalBus {
    registrations: Arc<RwLock<Vec<Registration>>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `phase` of the signal called `name`
    pub fn connect(&self, name: &str, phase: Phase, listener: Listener) {
        match self.registrations.write() {
            Ok(mut registrations) => registrations.push(Registration {
                name: name.to_string(),
                phase,
                listener,
            }),
            Err(_) => warn!(signal = name, "signal bus poisoned, listener dropped"),
        }
    }

    pub fn connect_before(&self, name: &str, listener: Listener) {
        self.connect(name, Phase::Before, listener);
    }

    pub fn connect_after(&self, name: &str, listener: Listener) {
        self.connect(name, Phase::After, listener);
    }

    /// Number of listeners registered for `name` (any phase)
    pub fn listener_count(&self, name: &str) -> usize {
        self.registrations
            .read()
            .map(|r| r.iter().filter(|reg| reg.name == name).count())
            .unwrap_or(0)
    }

    pub fn emit(&self, signal: &Signal) {
        // Clone the matching listeners so none runs while the lock is held
        let listeners: Vec<Listener> = match self.registrations.read() {
            Ok(registrations) => registrations
                .iter()
                .filter(|reg| reg.name == signal.name && reg.phase == signal.phase)
                .map(|reg| Arc::clone(&reg.listener))
                .collect(),
            Err(_) => {
                warn!(signal = signal.name, "signal bus poisoned, nothing emitted");
                return;
            }
        };

        for listener in listeners {
            if let Err(err) = listener(signal) {
                warn!(signal = signal.name, phase = ?signal.phase, error = %err, "signal listener failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn signal(phase: Phase) -> Signal {
        Signal {
            name: "medication_item.create_or_update",
            phase,
            kind: RecordKind::Item,
            audit_user_id: 1,
            data: serde_json::json!({"code": "A1"}),
            outcome: None,
        }
    }

    #[test]
    fn test_emit_reaches_matching_phase_only() {
        let bus = SignalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.connect_before(
            "medication_item.create_or_update",
            Arc::new(move |s: &Signal| -> anyhow::Result<()> {
                sink.lock().unwrap().push(s.phase);
                Ok(())
            }),
        );

        bus.emit(&signal(Phase::Before));
        bus.emit(&signal(Phase::After));

        assert_eq!(*seen.lock().unwrap(), vec![Phase::Before]);
    }

    #[test]
    fn test_emit_ignores_other_signal_names() {
        let bus = SignalBus::new();
        let calls = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&calls);
        bus.connect_after(
            "medication_service.create_or_update",
            Arc::new(move |_: &Signal| -> anyhow::Result<()> {
                *counter.lock().unwrap() += 1;
                Ok(())
            }),
        );

        bus.emit(&signal(Phase::After));

        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(bus.listener_count("medication_service.create_or_update"), 1);
    }

    #[test]
    fn test_failing_listener_does_not_stop_others() {
        let bus = SignalBus::new();
        let calls = Arc::new(Mutex::new(0));

        bus.connect_after(
            "medication_item.create_or_update",
            Arc::new(|_: &Signal| -> anyhow::Result<()> { anyhow::bail!("listener down") }),
        );
        let counter = Arc::clone(&calls);
        bus.connect_after(
            "medication_item.create_or_update",
            Arc::new(move |_: &Signal| -> anyhow::Result<()> {
                *counter.lock().unwrap() += 1;
                Ok(())
            }),
        );

        bus.emit(&signal(Phase::After));

        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
