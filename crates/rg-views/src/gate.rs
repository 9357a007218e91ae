//! Guard against losing unsaved record edits

use rg_data::{Model, ModelHandle};
use tracing::info;

use crate::host::DialogHost;

/// Outcome of passing the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Nothing unsaved, or the check was skipped
    Proceed,
    /// The user chose to discard; edits were cancelled
    Discarded,
    /// The user kept the edits; the operation must not run
    Kept,
}

impl GateDecision {
    pub fn may_proceed(&self) -> bool {
        !matches!(self, GateDecision::Kept)
    }
}

pub struct DirtyGate {
    message: String,
}

impl DirtyGate {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Check the edit-capable active model before a destructive operation
    pub async fn check(
        &self,
        model: Option<&ModelHandle>,
        skip_check: bool,
        dialogs: &dyn DialogHost,
    ) -> GateDecision {
        let Some(model) = model else {
            return GateDecision::Proceed;
        };
        if skip_check || !model.is_changed() {
            return GateDecision::Proceed;
        }

        if dialogs.confirm(&self.message).await {
            info!("Discarding unsaved changes in {}", model.key());
            // Edit mode goes off before the operation runs
            model.cancel_edits();
            GateDecision::Discarded
        } else {
            info!("Keeping unsaved changes in {}", model.key());
            GateDecision::Kept
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rg_core::{GridConfig, ModelKey, Record, RecordId};
    use rg_data::{MemoryModelStore, ModelOptions, ModelStore};
    use std::sync::Arc;

    struct ScriptedDialogs {
        answer: bool,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DialogHost for ScriptedDialogs {
        async fn confirm(&self, message: &str) -> bool {
            self.asked.lock().push(message.to_string());
            self.answer
        }

        fn open_view_setup(&self, _view_id: &str) {}

        fn notify_failure(&self, _message: &str) {}
    }

    async fn dirty_model() -> (Arc<MemoryModelStore>, ModelHandle) {
        let store = Arc::new(MemoryModelStore::new());
        store.set_rows("emp", vec![Record::new("1").with_field("ENAME", "A")]);
        let mut config = GridConfig::new("emp");
        config.editable = true;
        let key = ModelKey::new("emp", "grid");
        let model = store
            .create(key.clone(), ModelOptions::merge(&config, "R1", &[], true), None)
            .unwrap();
        model.fetch().await.unwrap();
        store
            .model(&key)
            .unwrap()
            .edit(&RecordId::from("1"), "ENAME", "B")
            .unwrap();
        (store, model)
    }

    #[tokio::test]
    async fn test_clean_model_never_asks() {
        let gate = DirtyGate::new("discard?");
        let dialogs = ScriptedDialogs { answer: false, asked: Mutex::new(Vec::new()) };
        assert_eq!(gate.check(None, false, &dialogs).await, GateDecision::Proceed);
        assert!(dialogs.asked.lock().is_empty());
    }

    #[tokio::test]
    async fn test_keep_blocks_and_discard_cancels_edits() {
        let gate = DirtyGate::new("discard?");
        let (_store, model) = dirty_model().await;

        let keep = ScriptedDialogs { answer: false, asked: Mutex::new(Vec::new()) };
        assert_eq!(gate.check(Some(&model), false, &keep).await, GateDecision::Kept);
        assert!(model.is_changed());
        assert_eq!(*keep.asked.lock(), vec!["discard?".to_string()]);

        assert_eq!(gate.check(Some(&model), true, &keep).await, GateDecision::Proceed);

        let discard = ScriptedDialogs { answer: true, asked: Mutex::new(Vec::new()) };
        assert_eq!(gate.check(Some(&model), false, &discard).await, GateDecision::Discarded);
        assert!(!model.is_changed());
    }
}
