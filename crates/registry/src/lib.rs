//! Concurrent equipment status registry.
//!
//! The set of equipment is fixed by a single `initialize` call. After that the
//! outer map is read-only and every record sits behind its own mutex, so
//! transitions on different equipment never contend with each other and
//! readers only ever hold one entry's lock long enough to clone it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info};

use dm_core::equipment::whole_minutes_between;
use dm_core::{
    Clock, EquipmentStatus, MonitorError, Result, RosterEntry, StatusRecord, SystemClock,
    TransitionTarget,
};

pub struct StatusRegistry {
    clock: Arc<dyn Clock>,
    entries: OnceLock<HashMap<String, Mutex<StatusRecord>>>,
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl StatusRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: OnceLock::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Loads the roster. Succeeds at most once per registry.
    ///
    /// A roster that repeats an equipment id is rejected and leaves the
    /// registry uninitialized.
    pub fn initialize<I>(&self, roster: I) -> Result<usize>
    where
        I: IntoIterator<Item = RosterEntry>,
    {
        if self.entries.get().is_some() {
            return Err(MonitorError::AlreadyInitialized);
        }

        let now = self.clock.now();
        let mut map = HashMap::new();
        for entry in roster {
            if map.contains_key(&entry.equipment_id) {
                return Err(MonitorError::DuplicateEquipment(entry.equipment_id));
            }
            let record = StatusRecord::new(
                entry.equipment_id.clone(),
                entry.equipment_name,
                entry.initial_status,
                now,
            );
            map.insert(entry.equipment_id, Mutex::new(record));
        }

        let loaded = map.len();
        self.entries
            .set(map)
            .map_err(|_| MonitorError::AlreadyInitialized)?;
        info!(equipment = loaded, "status registry initialized");
        Ok(loaded)
    }

    pub fn is_initialized(&self) -> bool {
        self.entries.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.get().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, equipment_id: &str) -> bool {
        self.cell(equipment_id).is_ok()
    }

    pub fn equipment_ids(&self) -> Vec<String> {
        self.entries
            .get()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a copy of one record.
    pub fn get_status(&self, equipment_id: &str) -> Result<StatusRecord> {
        Ok(self.cell(equipment_id)?.lock().clone())
    }

    /// Copies every record. Entries are captured one at a time, so two
    /// records in the result may reflect slightly different instants.
    pub fn list_all(&self) -> Vec<StatusRecord> {
        match self.entries.get() {
            Some(map) => map.values().map(|cell| cell.lock().clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Moves one piece of equipment to a new status.
    ///
    /// The time spent in the status being left is credited to the matching
    /// accumulator, the change timestamp is reset and the change counter is
    /// bumped, all under the entry's lock. Setting the status it already has
    /// still counts as a transition.
    pub fn transition(
        &self,
        equipment_id: &str,
        target: impl Into<TransitionTarget>,
    ) -> Result<StatusRecord> {
        let target = target.into();
        let cell = self.cell(equipment_id)?;
        let mut record = cell.lock();

        let now = self.clock.now();
        let previous = record.current_status;
        let elapsed = whole_minutes_between(record.status_changed_at, now);
        match previous {
            EquipmentStatus::Working => record.uptime_minutes += elapsed,
            EquipmentStatus::Downtime => record.downtime_minutes += elapsed,
        }
        record.current_status = target.resolve(previous);
        record.status_changed_at = now;
        record.status_changes_count += 1;

        debug!(
            equipment_id,
            from = %previous,
            to = %record.current_status,
            elapsed_minutes = elapsed,
            changes = record.status_changes_count,
            "equipment status changed"
        );
        Ok(record.clone())
    }

    fn cell(&self, equipment_id: &str) -> Result<&Mutex<StatusRecord>> {
        self.entries
            .get()
            .and_then(|map| map.get(equipment_id))
            .ok_or_else(|| MonitorError::NotFound(equipment_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use dm_core::{default_roster, ManualClock};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;

    fn manual_registry() -> (Arc<ManualClock>, StatusRegistry) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        ));
        let registry = StatusRegistry::new(clock.clone());
        (clock, registry)
    }

    fn single(id: &str, status: EquipmentStatus) -> Vec<RosterEntry> {
        vec![RosterEntry::new(id, "Test machine", status)]
    }

    #[test]
    fn toggle_scenario_accumulates_exited_status() {
        let (clock, registry) = manual_registry();
        registry.initialize(single("EQ001", EquipmentStatus::Working)).unwrap();

        clock.advance(Duration::minutes(5));
        let first = registry.transition("EQ001", TransitionTarget::Toggle).unwrap();
        assert_eq!(first.current_status, EquipmentStatus::Downtime);
        assert_eq!(first.uptime_minutes, 5);
        assert_eq!(first.downtime_minutes, 0);
        assert_eq!(first.status_changes_count, 1);

        clock.advance(Duration::minutes(3));
        let second = registry.transition("EQ001", TransitionTarget::Toggle).unwrap();
        assert_eq!(second.current_status, EquipmentStatus::Working);
        assert_eq!(second.uptime_minutes, 5);
        assert_eq!(second.downtime_minutes, 3);
        assert_eq!(second.status_changes_count, 2);
        assert_eq!(second.status_changed_at, clock.now());
    }

    #[test]
    fn explicit_target_to_same_status_is_still_counted() {
        let (clock, registry) = manual_registry();
        registry.initialize(single("EQ001", EquipmentStatus::Working)).unwrap();

        clock.advance(Duration::minutes(2));
        let record = registry.transition("EQ001", EquipmentStatus::Working).unwrap();
        assert_eq!(record.current_status, EquipmentStatus::Working);
        assert_eq!(record.uptime_minutes, 2);
        assert_eq!(record.status_changes_count, 1);
    }

    #[test]
    fn accumulators_cover_elapsed_time() {
        let (clock, registry) = manual_registry();
        registry.initialize(single("EQ001", EquipmentStatus::Downtime)).unwrap();

        let steps = [7, 1, 12, 4, 30, 2];
        for minutes in steps {
            clock.advance(Duration::minutes(minutes));
            registry.transition("EQ001", TransitionTarget::Toggle).unwrap();
        }
        let record = registry.get_status("EQ001").unwrap();
        assert_eq!(
            record.uptime_minutes + record.downtime_minutes,
            steps.iter().sum::<i64>() as u64
        );
        assert_eq!(record.downtime_minutes, 7 + 12 + 30);
        assert_eq!(record.status_changes_count, steps.len() as u64);
    }

    #[test]
    fn sub_minute_intervals_are_truncated() {
        let (clock, registry) = manual_registry();
        registry.initialize(single("EQ001", EquipmentStatus::Working)).unwrap();

        clock.advance(Duration::seconds(59));
        let record = registry.transition("EQ001", TransitionTarget::Toggle).unwrap();
        assert_eq!(record.uptime_minutes, 0);
        assert_eq!(record.status_changes_count, 1);
    }

    #[test]
    fn unknown_equipment_leaves_registry_untouched() {
        let (clock, registry) = manual_registry();
        registry.initialize(default_roster()).unwrap();
        let before = {
            let mut all = registry.list_all();
            all.sort_by(|a, b| a.equipment_id.cmp(&b.equipment_id));
            all
        };

        clock.advance(Duration::minutes(10));
        let err = registry.transition("EQ999", TransitionTarget::Toggle).unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(ref id) if id == "EQ999"));
        assert!(matches!(registry.get_status("EQ999"), Err(MonitorError::NotFound(_))));

        let mut after = registry.list_all();
        after.sort_by(|a, b| a.equipment_id.cmp(&b.equipment_id));
        assert_eq!(before, after);
        assert_eq!(registry.len(), 5);
        assert!(!registry.contains("EQ999"));
    }

    #[test]
    fn second_initialize_is_rejected() {
        let (_clock, registry) = manual_registry();
        assert_eq!(registry.initialize(default_roster()).unwrap(), 5);
        let err = registry.initialize(default_roster()).unwrap_err();
        assert!(matches!(err, MonitorError::AlreadyInitialized));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn duplicate_ids_reject_the_roster() {
        let (_clock, registry) = manual_registry();
        let mut roster = default_roster();
        roster.push(RosterEntry::new("EQ002", "Second mill", EquipmentStatus::Working));

        let err = registry.initialize(roster).unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateEquipment(ref id) if id == "EQ002"));
        assert!(!registry.is_initialized());
        assert!(registry.initialize(default_roster()).is_ok());
    }

    #[test]
    fn uninitialized_registry_reads_as_empty() {
        let (_clock, registry) = manual_registry();
        assert!(registry.is_empty());
        assert!(registry.list_all().is_empty());
        assert!(registry.equipment_ids().is_empty());
        assert!(matches!(
            registry.transition("EQ001", TransitionTarget::Toggle),
            Err(MonitorError::NotFound(_))
        ));
    }

    #[test]
    fn snapshots_are_detached_copies() {
        let (_clock, registry) = manual_registry();
        registry.initialize(default_roster()).unwrap();

        let mut snapshot = registry.get_status("EQ001").unwrap();
        snapshot.status_changes_count = 99;
        snapshot.current_status = EquipmentStatus::Downtime;

        let fresh = registry.get_status("EQ001").unwrap();
        assert_eq!(fresh.status_changes_count, 0);
        assert_eq!(fresh.current_status, EquipmentStatus::Working);
    }

    #[test]
    fn concurrent_toggles_on_one_id_are_all_counted() {
        let registry = Arc::new(StatusRegistry::default());
        registry.initialize(single("EQ001", EquipmentStatus::Working)).unwrap();

        let threads = 8;
        let per_thread = 250;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        registry.transition("EQ001", TransitionTarget::Toggle).unwrap();
                        assert_eq!(registry.list_all().len(), 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let record = registry.get_status("EQ001").unwrap();
        let total = (threads * per_thread) as u64;
        assert_eq!(record.status_changes_count, total);
        // An even number of toggles lands back where it started.
        assert_eq!(record.current_status, EquipmentStatus::Working);
    }

    /// Every copy a reader takes must be internally consistent: the
    /// accumulators plus the open interval cover all time since start, and
    /// the change count's parity matches the status.
    fn assert_consistent(
        record: &StatusRecord,
        now: chrono::DateTime<Utc>,
        start: chrono::DateTime<Utc>,
        initial: EquipmentStatus,
    ) {
        let covered = record.uptime_minutes
            + record.downtime_minutes
            + record.minutes_in_current_status(now);
        assert_eq!(covered, whole_minutes_between(start, now), "torn record: {record:?}");

        let expected = if record.status_changes_count % 2 == 0 {
            initial
        } else {
            initial.toggled()
        };
        assert_eq!(record.current_status, expected, "torn record: {record:?}");
    }

    #[test]
    fn readers_never_observe_a_partial_transition() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let registry = Arc::new(StatusRegistry::new(clock.clone()));
        registry.initialize(default_roster()).unwrap();
        let initial: Arc<HashMap<String, EquipmentStatus>> = Arc::new(
            default_roster()
                .into_iter()
                .map(|e| (e.equipment_id, e.initial_status))
                .collect(),
        );
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|reader| {
                let registry = Arc::clone(&registry);
                let clock = Arc::clone(&clock);
                let initial = Arc::clone(&initial);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut checked = 0usize;
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        if reader % 2 == 0 {
                            for record in registry.list_all() {
                                let now = clock.now();
                                assert_consistent(&record, now, start, initial[&record.equipment_id]);
                                checked += 1;
                            }
                        } else {
                            for (id, status) in initial.iter() {
                                let record = registry.get_status(id).unwrap();
                                assert_consistent(&record, clock.now(), start, *status);
                                checked += 1;
                            }
                        }
                        if finished {
                            break;
                        }
                    }
                    checked
                })
            })
            .collect();

        let rounds = 400u64;
        let writers: Vec<_> = registry
            .equipment_ids()
            .into_iter()
            .map(|id| {
                let registry = Arc::clone(&registry);
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    for _ in 0..rounds {
                        clock.advance(Duration::minutes(1));
                        registry.transition(&id, TransitionTarget::Toggle).unwrap();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }

        for record in registry.list_all() {
            assert_eq!(record.status_changes_count, rounds);
            assert_consistent(&record, clock.now(), start, initial[&record.equipment_id]);
        }
    }

    #[test]
    fn busy_entry_does_not_block_other_equipment() {
        let (_clock, registry) = manual_registry();
        registry.initialize(default_roster()).unwrap();
        let registry = Arc::new(registry);

        let held = registry.entries.get().unwrap()["EQ001"].lock();

        let (tx, rx) = mpsc::channel();
        let worker = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let record = registry.transition("EQ002", TransitionTarget::Toggle);
                tx.send(record.map(|r| r.status_changes_count)).unwrap();
            })
        };

        let result = rx
            .recv_timeout(std::time::Duration::from_secs(2))
            .expect("transition on EQ002 blocked behind EQ001");
        assert_eq!(result.unwrap(), 1);
        drop(held);
        worker.join().unwrap();
    }
}
