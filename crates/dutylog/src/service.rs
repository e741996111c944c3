//! The duty log state machine.
//!
//! A duty is created `active` by [`DutyService::start_duty`], collects
//! incidents while active, and is moved once to `completed` by
//! [`DutyService::end_duty`]. Every operation is keyed by officer name and
//! only ever touches that officer's active duty.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::duty::{DutyLog, Incident, NewDuty, Post};
use crate::error::{DutyError, DutyResult};
use crate::storage::{DutyFilter, DutyStore, DutySummary};

/// Enforces the duty lifecycle on top of a [`DutyStore`].
#[derive(Debug)]
pub struct DutyService<S> {
    store: S,
}

impl<S: DutyStore> DutyService<S> {
    /// Create a service backed by `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a duty for `name` at `post` and return the new duty's id.
    ///
    /// # Errors
    ///
    /// - [`DutyError::InvalidArgument`] if `post` is not a known post.
    /// - [`DutyError::Conflict`] if `name` already has an active duty.
    /// - [`DutyError::StoreUnavailable`] if the store fails.
    pub fn start_duty(&self, name: &str, badge_number: &str, post: &str) -> DutyResult<i64> {
        let post: Post = post.parse().map_err(|e| {
            debug!("Rejecting duty start for {}: {}", name, e);
            DutyError::InvalidArgument
        })?;

        if self.store.find_active(name)?.is_some() {
            debug!("{} already has an active duty", name);
            return Err(DutyError::Conflict);
        }

        let duty = NewDuty {
            name: name.to_string(),
            badge_number: badge_number.to_string(),
            post,
            start_time: Utc::now(),
        };

        // The store's unique index catches a concurrent start that slipped
        // past the check above.
        let id = self.store.insert_duty(&duty).map_err(|e| {
            if e.is_constraint_violation() {
                warn!("Concurrent duty start for {} rejected by store", name);
                DutyError::Conflict
            } else {
                DutyError::StoreUnavailable(e)
            }
        })?;

        info!(duty_id = id, name, post = %post, "Duty started");
        Ok(id)
    }

    /// Append `incident` to the active duty for `name`.
    ///
    /// # Errors
    ///
    /// - [`DutyError::NotFound`] if `name` has no active duty.
    /// - [`DutyError::WriteFailed`] if the duty matched but the incident was
    ///   not stored (its id is already used within the duty).
    /// - [`DutyError::StoreUnavailable`] if the store fails.
    pub fn add_incident(&self, name: &str, incident: &Incident) -> DutyResult<()> {
        let outcome = self.store.push_incident(name, incident)?;

        if !outcome.is_matched() {
            return Err(DutyError::NotFound);
        }
        if !outcome.is_modified() {
            warn!(
                "Incident {} not added to duty of {}: nothing modified",
                incident.id, name
            );
            return Err(DutyError::write_failed("add incident"));
        }

        info!(name, incident_id = %incident.id, "Incident added");
        Ok(())
    }

    /// Remove the incident `incident_id` from the active duty for `name`.
    ///
    /// # Errors
    ///
    /// - [`DutyError::NotFound`] if `name` has no active duty.
    /// - [`DutyError::IncidentNotFound`] if the active duty has no such incident.
    /// - [`DutyError::StoreUnavailable`] if the store fails.
    pub fn remove_incident(&self, name: &str, incident_id: &str) -> DutyResult<()> {
        let outcome = self.store.pull_incident(name, incident_id)?;

        if !outcome.is_matched() {
            return Err(DutyError::NotFound);
        }
        if !outcome.is_modified() {
            return Err(DutyError::IncidentNotFound);
        }

        info!(name, incident_id, "Incident removed");
        Ok(())
    }

    /// End the active duty for `name`.
    ///
    /// # Errors
    ///
    /// - [`DutyError::NotFound`] if `name` has no active duty.
    /// - [`DutyError::WriteFailed`] if the transition did not persist.
    /// - [`DutyError::StoreUnavailable`] if the store fails.
    pub fn end_duty(&self, name: &str) -> DutyResult<()> {
        let Some(duty) = self.store.find_active(name)? else {
            return Err(DutyError::NotFound);
        };

        let outcome = self.store.complete_duty(duty.id, Utc::now())?;
        if !outcome.is_modified() {
            warn!("Duty {} for {} matched but was not completed", duty.id, name);
            return Err(DutyError::write_failed("end duty"));
        }

        info!(
            duty_id = duty.id,
            name,
            incidents = duty.incidents.len(),
            "Duty ended"
        );
        Ok(())
    }

    /// All duties, most recently started first.
    ///
    /// # Errors
    ///
    /// Returns [`DutyError::StoreUnavailable`] if the store fails.
    pub fn list_duties(&self) -> DutyResult<Vec<DutyLog>> {
        self.list_duties_matching(&DutyFilter::default())
    }

    /// Duties matching `filter`, most recently started first.
    ///
    /// # Errors
    ///
    /// Returns [`DutyError::StoreUnavailable`] if the store fails.
    pub fn list_duties_matching(&self, filter: &DutyFilter) -> DutyResult<Vec<DutyLog>> {
        Ok(self.store.list_duties(filter)?)
    }

    /// The active duty for `name`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`DutyError::StoreUnavailable`] if the store fails.
    pub fn active_duty(&self, name: &str) -> DutyResult<Option<DutyLog>> {
        Ok(self.store.find_active(name)?)
    }

    /// Aggregate counts over all duties.
    ///
    /// # Errors
    ///
    /// Returns [`DutyError::StoreUnavailable`] if the store fails.
    pub fn summary(&self) -> DutyResult<DutySummary> {
        Ok(self.store.summary()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duty::DutyStatus;
    use crate::error::Result;
    use crate::storage::{Storage, UpdateOutcome};
    use chrono::{DateTime, Utc};

    fn service() -> DutyService<Storage> {
        DutyService::new(Storage::open_in_memory().expect("failed to create test storage"))
    }

    fn incident(id: &str) -> Incident {
        Incident {
            id: id.to_string(),
            description: "Unbadged visitor".to_string(),
            time: "2024-03-01T10:15".to_string(),
            location: "Main gate".to_string(),
            action: "Escorted to reception".to_string(),
        }
    }

    /// Store that matches writes but never modifies anything.
    #[derive(Debug)]
    struct StaleStore(Storage);

    impl DutyStore for StaleStore {
        fn find_active(&self, name: &str) -> Result<Option<DutyLog>> {
            self.0.find_active(name)
        }

        fn insert_duty(&self, duty: &NewDuty) -> Result<i64> {
            self.0.insert_duty(duty)
        }

        fn push_incident(&self, name: &str, _incident: &Incident) -> Result<UpdateOutcome> {
            Ok(self.0.find_active(name)?.map_or_else(UpdateOutcome::unmatched, |_| {
                UpdateOutcome::matched_one(0)
            }))
        }

        fn pull_incident(&self, name: &str, incident_id: &str) -> Result<UpdateOutcome> {
            self.0.pull_incident(name, incident_id)
        }

        fn complete_duty(&self, _id: i64, _end_time: DateTime<Utc>) -> Result<UpdateOutcome> {
            Ok(UpdateOutcome::matched_one(0))
        }

        fn list_duties(&self, filter: &DutyFilter) -> Result<Vec<DutyLog>> {
            self.0.list_duties(filter)
        }

        fn summary(&self) -> Result<DutySummary> {
            self.0.summary()
        }
    }

    /// Store whose lookups never see an active duty, as if another start
    /// raced in between the check and the insert.
    #[derive(Debug)]
    struct BlindStore(Storage);

    impl DutyStore for BlindStore {
        fn find_active(&self, _name: &str) -> Result<Option<DutyLog>> {
            Ok(None)
        }

        fn insert_duty(&self, duty: &NewDuty) -> Result<i64> {
            self.0.insert_duty(duty)
        }

        fn push_incident(&self, name: &str, incident: &Incident) -> Result<UpdateOutcome> {
            self.0.push_incident(name, incident)
        }

        fn pull_incident(&self, name: &str, incident_id: &str) -> Result<UpdateOutcome> {
            self.0.pull_incident(name, incident_id)
        }

        fn complete_duty(&self, id: i64, end_time: DateTime<Utc>) -> Result<UpdateOutcome> {
            self.0.complete_duty(id, end_time)
        }

        fn list_duties(&self, filter: &DutyFilter) -> Result<Vec<DutyLog>> {
            self.0.list_duties(filter)
        }

        fn summary(&self) -> Result<DutySummary> {
            self.0.summary()
        }
    }

    #[test]
    fn test_start_duty_creates_active_record() {
        let svc = service();
        let id = svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();

        let duty = svc.store().get(id).unwrap().unwrap();
        assert_eq!(duty.status, DutyStatus::Active);
        assert_eq!(duty.post, Post::Cal1BadgeCheck);
        assert_eq!(duty.badge_number, "B1");
        assert!(duty.end_time.is_none());
        assert!(duty.incidents.is_empty());
    }

    #[test]
    fn test_start_duty_twice_conflicts() {
        let svc = service();
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();

        let err = svc.start_duty("A", "B1", "CAL2-Bag Check").unwrap_err();
        assert!(matches!(err, DutyError::Conflict));
        assert_eq!(svc.list_duties().unwrap().len(), 1);
    }

    #[test]
    fn test_start_duty_racing_insert_conflicts() {
        let svc = DutyService::new(BlindStore(
            Storage::open_in_memory().expect("failed to create test storage"),
        ));
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();

        let err = svc.start_duty("A", "B2", "CAL2-Bag Check").unwrap_err();
        assert!(matches!(err, DutyError::Conflict));
        assert_eq!(svc.store().0.count().unwrap(), 1);

        let active = svc.list_duties_matching(&DutyFilter::active()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].post, Post::Cal1BadgeCheck);
    }

    #[test]
    fn test_start_duty_other_officers_independent() {
        let svc = service();
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        svc.start_duty("B", "B2", "CAL1-Badge Check").unwrap();

        assert_eq!(svc.summary().unwrap().active_duties, 2);
    }

    #[test]
    fn test_start_duty_invalid_post_creates_nothing() {
        let svc = service();

        let err = svc.start_duty("A", "B1", "Front Desk").unwrap_err();
        assert!(matches!(err, DutyError::InvalidArgument));
        assert!(svc.list_duties().unwrap().is_empty());
    }

    #[test]
    fn test_start_duty_invalid_post_wins_over_conflict() {
        let svc = service();
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();

        let err = svc.start_duty("A", "B1", "Front Desk").unwrap_err();
        assert!(matches!(err, DutyError::InvalidArgument));
    }

    #[test]
    fn test_restart_after_end() {
        let svc = service();
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        svc.end_duty("A").unwrap();
        svc.start_duty("A", "B1", "CAL1-Supervisor").unwrap();

        let duties = svc.list_duties().unwrap();
        assert_eq!(duties.len(), 2);
        assert_eq!(duties.iter().filter(|d| d.is_active()).count(), 1);
    }

    #[test]
    fn test_full_duty_scenario() {
        let svc = service();

        let id = svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        svc.add_incident("A", &incident("i1")).unwrap();
        assert_eq!(svc.store().get(id).unwrap().unwrap().incidents.len(), 1);

        svc.end_duty("A").unwrap();
        let duty = svc.store().get(id).unwrap().unwrap();
        assert_eq!(duty.status, DutyStatus::Completed);
        assert!(duty.end_time.is_some());

        let err = svc.add_incident("A", &incident("i2")).unwrap_err();
        assert!(matches!(err, DutyError::NotFound));

        let logs = svc.list_duties().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].name, "A");
        assert_eq!(logs[0].status, DutyStatus::Completed);
        assert_eq!(logs[0].incidents, vec![incident("i1")]);
    }

    #[test]
    fn test_add_incident_without_duty() {
        let svc = service();
        let err = svc.add_incident("A", &incident("i1")).unwrap_err();
        assert!(matches!(err, DutyError::NotFound));
    }

    #[test]
    fn test_add_incident_duplicate_id_write_fails() {
        let svc = service();
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        svc.add_incident("A", &incident("i1")).unwrap();

        let err = svc.add_incident("A", &incident("i1")).unwrap_err();
        assert!(matches!(err, DutyError::WriteFailed { .. }));
        assert_eq!(err.to_string(), "Failed to add incident");
    }

    #[test]
    fn test_remove_incident() {
        let svc = service();
        let id = svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        svc.add_incident("A", &incident("i1")).unwrap();
        svc.add_incident("A", &incident("i2")).unwrap();

        svc.remove_incident("A", "i1").unwrap();

        let duty = svc.store().get(id).unwrap().unwrap();
        assert_eq!(duty.incidents, vec![incident("i2")]);
    }

    #[test]
    fn test_remove_incident_failures() {
        let svc = service();

        let err = svc.remove_incident("A", "i1").unwrap_err();
        assert!(matches!(err, DutyError::NotFound));

        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        let err = svc.remove_incident("A", "i1").unwrap_err();
        assert!(matches!(err, DutyError::IncidentNotFound));
    }

    #[test]
    fn test_incidents_frozen_after_end() {
        let svc = service();
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        svc.add_incident("A", &incident("i1")).unwrap();
        svc.end_duty("A").unwrap();

        assert!(matches!(
            svc.add_incident("A", &incident("i2")),
            Err(DutyError::NotFound)
        ));
        assert!(matches!(
            svc.remove_incident("A", "i1"),
            Err(DutyError::NotFound)
        ));
        assert_eq!(svc.list_duties().unwrap()[0].incidents.len(), 1);
    }

    #[test]
    fn test_end_duty_twice() {
        let svc = service();
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        svc.end_duty("A").unwrap();

        assert!(matches!(svc.end_duty("A"), Err(DutyError::NotFound)));
    }

    #[test]
    fn test_end_duty_without_duty() {
        let svc = service();
        assert!(matches!(svc.end_duty("A"), Err(DutyError::NotFound)));
    }

    #[test]
    fn test_end_duty_write_failed() {
        let svc = DutyService::new(StaleStore(Storage::open_in_memory().unwrap()));
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();

        let err = svc.end_duty("A").unwrap_err();
        assert!(matches!(err, DutyError::WriteFailed { .. }));
        assert_eq!(err.to_string(), "Failed to end duty");
        assert!(svc.active_duty("A").unwrap().is_some());
    }

    #[test]
    fn test_add_incident_write_failed() {
        let svc = DutyService::new(StaleStore(Storage::open_in_memory().unwrap()));

        assert!(matches!(
            svc.add_incident("A", &incident("i1")),
            Err(DutyError::NotFound)
        ));

        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        assert!(matches!(
            svc.add_incident("A", &incident("i1")),
            Err(DutyError::WriteFailed { .. })
        ));
    }

    #[test]
    fn test_active_duty() {
        let svc = service();
        assert!(svc.active_duty("A").unwrap().is_none());

        let id = svc.start_duty("A", "B1", "CAL2-Supervisor").unwrap();
        assert_eq!(svc.active_duty("A").unwrap().unwrap().id, id);
    }

    #[test]
    fn test_at_most_one_active_per_name() {
        let svc = service();
        for post in ["CAL1-Badge Check", "CAL1-Bag Check", "CAL2-Bag Check"] {
            let _ = svc.start_duty("A", "B1", post);
            let _ = svc.start_duty("B", "B2", post);
        }
        svc.end_duty("B").unwrap();
        let _ = svc.start_duty("B", "B2", "CAL2-Supervisor");

        for name in ["A", "B"] {
            let active = svc
                .list_duties()
                .unwrap()
                .into_iter()
                .filter(|d| d.name == name && d.is_active())
                .count();
            assert_eq!(active, 1, "officer {name}");
        }
    }

    #[test]
    fn test_list_duties_matching() {
        let svc = service();
        svc.start_duty("A", "B1", "CAL1-Badge Check").unwrap();
        svc.start_duty("B", "B2", "CAL2-Bag Check").unwrap();
        svc.end_duty("A").unwrap();

        let active = svc.list_duties_matching(&DutyFilter::active()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "B");
    }
}
