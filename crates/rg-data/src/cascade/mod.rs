//! Master to detail selection cascade
//!
//! A detail region follows the selection of its master region. Selections
//! settle for a short delay first; a newer selection replaces the pending one,
//! so rapid clicking rebinds the detail model once.

use std::time::{Duration, Instant};

use rg_core::{Record, RecordId};
use serde_json::{Map, Value};
use tracing::debug;

/// What the detail model should show
#[derive(Debug, Clone, PartialEq)]
pub enum DetailTarget {
    /// Exactly one master record is selected
    Record {
        record_id: RecordId,
        parent_values: Map<String, Value>,
    },
    /// Zero or several master records are selected
    Null,
}

impl DetailTarget {
    pub fn from_selection(selection: &[Record]) -> Self {
        match selection {
            [record] => DetailTarget::Record {
                record_id: record.id.clone(),
                parent_values: record.fields.clone(),
            },
            _ => DetailTarget::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DetailTarget::Null)
    }
}

#[derive(Debug, Clone)]
enum CascadeState {
    Idle,
    Settling { deadline: Instant, selection: Vec<Record> },
}

/// Settle stage between master selection changes and detail rebinds
#[derive(Debug)]
pub struct DetailCascade {
    delay: Duration,
    state: CascadeState,
    /// Target the detail model is currently bound to
    current: Option<DetailTarget>,
}

impl DetailCascade {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: CascadeState::Idle,
            current: None,
        }
    }

    /// Record a master selection; it replaces any selection still settling
    pub fn on_master_selection(&mut self, selection: Vec<Record>, now: Instant) {
        if matches!(self.state, CascadeState::Settling { .. }) {
            debug!("Master selection superseded a pending one");
        }
        self.state = CascadeState::Settling {
            deadline: now + self.delay,
            selection,
        };
    }

    pub fn is_settling(&self) -> bool {
        matches!(self.state, CascadeState::Settling { .. })
    }

    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            CascadeState::Settling { deadline, .. } => Some(*deadline),
            CascadeState::Idle => None,
        }
    }

    /// Settled target, if the delay has passed and it differs from the bound one.
    ///
    /// The caller binds the model and then calls [`commit`](Self::commit).
    pub fn poll(&mut self, now: Instant) -> Option<DetailTarget> {
        let target = match &self.state {
            CascadeState::Settling { deadline, selection } if now >= *deadline => {
                DetailTarget::from_selection(selection)
            }
            _ => return None,
        };
        self.state = CascadeState::Idle;
        if self.current.as_ref() == Some(&target) {
            return None;
        }
        Some(target)
    }

    /// Wait out the settle delay on the tokio clock
    pub async fn settled(&mut self) -> Option<DetailTarget> {
        while let Some(deadline) = self.deadline() {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            if let Some(target) = self.poll(tokio::time::Instant::now().into_std()) {
                return Some(target);
            }
        }
        None
    }

    pub fn commit(&mut self, target: DetailTarget) {
        self.current = Some(target);
    }

    pub fn current(&self) -> Option<&DetailTarget> {
        self.current.as_ref()
    }

    /// Forget the bound target, e.g. after the detail models were torn down
    pub fn reset(&mut self) {
        self.state = CascadeState::Idle;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_millis(300);

    fn dept(id: &str) -> Record {
        Record::new(id).with_field("DEPTNO", id)
    }

    #[test]
    fn test_superseded_selection_rebinds_once() {
        let start = Instant::now();
        let mut cascade = DetailCascade::new(SETTLE);

        cascade.on_master_selection(vec![dept("10")], start);
        assert_eq!(cascade.poll(start + Duration::from_millis(100)), None);
        cascade.on_master_selection(vec![dept("10"), dept("20")], start + Duration::from_millis(150));

        // Deadline moved with the newer selection
        assert_eq!(cascade.poll(start + Duration::from_millis(350)), None);

        let mut rebinds = Vec::new();
        for ms in [460, 500, 900] {
            if let Some(target) = cascade.poll(start + Duration::from_millis(ms)) {
                cascade.commit(target.clone());
                rebinds.push(target);
            }
        }
        assert_eq!(rebinds, vec![DetailTarget::Null]);
    }

    #[test]
    fn test_single_selection_targets_record_with_snapshot() {
        let start = Instant::now();
        let mut cascade = DetailCascade::new(SETTLE);
        cascade.on_master_selection(vec![dept("10")], start);

        let target = cascade.poll(start + SETTLE).unwrap();
        match &target {
            DetailTarget::Record { record_id, parent_values } => {
                assert_eq!(record_id, &RecordId::from("10"));
                assert_eq!(parent_values["DEPTNO"], Value::from("10"));
            }
            DetailTarget::Null => panic!("expected a record target"),
        }
        cascade.commit(target);
        assert!(!cascade.is_settling());
    }

    #[test]
    fn test_unchanged_target_needs_no_rebind() {
        let start = Instant::now();
        let mut cascade = DetailCascade::new(SETTLE);
        cascade.commit(DetailTarget::Null);

        cascade.on_master_selection(Vec::new(), start);
        assert_eq!(cascade.poll(start + SETTLE), None);
        assert!(!cascade.is_settling());
    }

    #[test]
    fn test_exclusivity_over_selection_sizes() {
        for size in 0..4 {
            let selection: Vec<Record> = (0..size).map(|i| dept(&i.to_string())).collect();
            let target = DetailTarget::from_selection(&selection);
            assert_eq!(!target.is_null(), size == 1);
        }
    }

    #[tokio::test]
    async fn test_settled_waits_for_deadline() {
        let delay = Duration::from_millis(20);
        let mut cascade = DetailCascade::new(delay);
        let start = Instant::now();
        cascade.on_master_selection(vec![dept("10")], start);

        let target = cascade.settled().await;
        assert!(matches!(target, Some(DetailTarget::Record { .. })));
        assert!(start.elapsed() >= delay);
        assert_eq!(cascade.settled().await, None);
    }
}
