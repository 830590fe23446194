// ── Read-diff-write ──
//
// Every configuration write follows the same shape: read the current
// settings, compare them field by field against the desired ones, write
// only when something differs, then run the device's follow-up step.
// Vendors supply a `ConfigPlan`; `read_diff_write` drives it.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Error;
use crate::fields::{self, DesiredField, FieldBag, FieldChange};
use crate::types::{ApplyOutcome, SecondaryStep};

/// What a vendor write reported back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReceipt {
    pub restart_required: bool,
}

impl WriteReceipt {
    pub fn merge(self, other: WriteReceipt) -> Self {
        Self {
            restart_required: self.restart_required || other.restart_required,
        }
    }
}

#[async_trait]
pub trait ConfigPlan: Send + Sync {
    /// Current settings, with whatever raw state the write step needs.
    type Snapshot: AsRef<FieldBag> + Send + Sync;

    async fn read(&self) -> Result<Self::Snapshot, Error>;

    /// The fields to compare, built against the snapshot (some keys depend
    /// on it, e.g. the active interface name).
    fn desired_fields(&self, snapshot: &Self::Snapshot) -> Vec<DesiredField>;

    /// Write `changes`; only called when at least one field differs.
    async fn write(
        &self,
        snapshot: &Self::Snapshot,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error>;

    /// Runs after a write whose receipt asked for a restart.
    async fn follow_up(&self) -> Result<(), Error> {
        Ok(())
    }
}

pub async fn read_diff_write<P: ConfigPlan + ?Sized>(plan: &P) -> Result<ApplyOutcome, Error> {
    let snapshot = plan.read().await?;
    let fields = plan.desired_fields(&snapshot);
    let changes = fields::diff(snapshot.as_ref(), &fields);

    if changes.is_empty() {
        debug!(compared = fields.len(), "configuration already matches, skipping write");
        return Ok(ApplyOutcome::unchanged());
    }

    debug!(
        changed = changes.len(),
        fields = ?changes.iter().map(|c| c.field.as_str()).collect::<Vec<_>>(),
        "writing configuration"
    );
    let receipt = plan.write(&snapshot, &changes).await?;

    let restart = if receipt.restart_required {
        match plan.follow_up().await {
            Ok(()) => SecondaryStep::Completed,
            Err(e) => {
                warn!(error = %e, "write applied but follow-up step failed");
                SecondaryStep::Failed(e.to_string())
            }
        }
    } else {
        SecondaryStep::NotNeeded
    };

    Ok(ApplyOutcome::applied(changes, restart))
}

/// Whether any change touches one of `names`.
pub fn touches(changes: &[FieldChange], names: &[&str]) -> bool {
    changes.iter().any(|c| names.contains(&c.field.as_str()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::fields::Comparison;

    struct FakePlan {
        current: FieldBag,
        desired: &'static str,
        restart: bool,
        follow_up_fails: bool,
        writes: Mutex<Vec<Vec<FieldChange>>>,
    }

    #[async_trait]
    impl ConfigPlan for FakePlan {
        type Snapshot = FieldBag;

        async fn read(&self) -> Result<FieldBag, Error> {
            Ok(self.current.clone())
        }

        fn desired_fields(&self, _snapshot: &FieldBag) -> Vec<DesiredField> {
            vec![DesiredField::new(
                "ip",
                &["ip"],
                self.desired,
                Comparison::Address,
            )]
        }

        async fn write(
            &self,
            _snapshot: &FieldBag,
            changes: &[FieldChange],
        ) -> Result<WriteReceipt, Error> {
            self.writes.lock().unwrap().push(changes.to_vec());
            Ok(WriteReceipt {
                restart_required: self.restart,
            })
        }

        async fn follow_up(&self) -> Result<(), Error> {
            if self.follow_up_fails {
                Err(Error::Timeout)
            } else {
                Ok(())
            }
        }
    }

    fn plan(desired: &'static str, restart: bool, follow_up_fails: bool) -> FakePlan {
        FakePlan {
            current: [("ip", "10.0.0.5")].into_iter().collect(),
            desired,
            restart,
            follow_up_fails,
            writes: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn skips_write_when_nothing_differs() {
        let p = plan("10.0.0.5", false, false);
        let outcome = read_diff_write(&p).await.unwrap();
        assert!(!outcome.changed);
        assert!(p.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_changed_fields_once() {
        let p = plan("10.0.0.9", false, false);
        let outcome = read_diff_write(&p).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.restart, SecondaryStep::NotNeeded);
        let writes = p.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0][0].desired, "10.0.0.9");
    }

    #[tokio::test]
    async fn failed_follow_up_keeps_write_success() {
        let p = plan("10.0.0.9", true, true);
        let outcome = read_diff_write(&p).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(
            outcome.restart,
            SecondaryStep::Failed("Connection timeout".into())
        );
    }
}
