//! Timed tasks: a work timer followed by a fixed grace window.
//!
//! Phase is never counted in ticks. It is always recomputed from the stored
//! `start_time` and the wall clock, so a restarted session lands in exactly
//! the phase it would have reached had it kept running.

use crate::error::{GameError, GameResult};
use crate::model::{
    from_millis, to_millis, BASE_TASK_REWARD, GRACE_WINDOW_SECS, LONG_TASK_REWARD, LONG_TASK_SECS,
};
use crate::store::{write_through, KeyValueStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub(crate) const KEY_TASKS: &str = "tasks";

// Keeps duration_secs inside u32 with room to spare.
const MAX_DURATION_MINUTES: i64 = 60 * 24 * 365;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub duration_secs: u32,
    pub start_time: DateTime<Utc>,
    pub completion_window_start: Option<DateTime<Utc>>,
    pub completed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskPhase {
    Running { time_left_secs: i64 },
    GraceWindow { time_left_secs: i64 },
    Completed,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Running,
    GraceWindow,
    Completed,
    Expired,
}

impl TaskPhase {
    pub fn kind(self) -> PhaseKind {
        match self {
            TaskPhase::Running { .. } => PhaseKind::Running,
            TaskPhase::GraceWindow { .. } => PhaseKind::GraceWindow,
            TaskPhase::Completed => PhaseKind::Completed,
            TaskPhase::Expired => PhaseKind::Expired,
        }
    }

    /// `MM:SS` while a timer is live, otherwise the terminal state.
    pub fn label(self) -> String {
        match self {
            TaskPhase::Running { time_left_secs } | TaskPhase::GraceWindow { time_left_secs } => {
                let s = time_left_secs.max(0);
                format!("{:02}:{:02}", s / 60, s % 60)
            }
            TaskPhase::Completed => "DONE".to_string(),
            TaskPhase::Expired => "EXPIRED".to_string(),
        }
    }
}

fn ceil_secs(ms: i64) -> i64 {
    (ms + 999).div_euclid(1000)
}

impl Task {
    fn duration_ms(&self) -> i64 {
        i64::from(self.duration_secs) * 1000
    }

    /// Start of the grace window: when the work timer hits zero.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.completion_window_start
            .unwrap_or(self.start_time + ChronoDuration::milliseconds(self.duration_ms()))
    }

    pub fn reward(&self) -> u32 {
        reward_for(self.duration_secs)
    }

    pub fn phase(&self, now: DateTime<Utc>) -> TaskPhase {
        if self.completed {
            return TaskPhase::Completed;
        }
        let elapsed_ms = (now - self.start_time).num_milliseconds();
        if elapsed_ms < self.duration_ms() {
            return TaskPhase::Running {
                time_left_secs: ceil_secs(self.duration_ms() - elapsed_ms),
            };
        }
        let in_window_ms = (now - self.window_start()).num_milliseconds();
        let grace_ms = GRACE_WINDOW_SECS * 1000;
        if in_window_ms <= grace_ms {
            TaskPhase::GraceWindow {
                time_left_secs: ceil_secs(grace_ms - in_window_ms),
            }
        } else {
            TaskPhase::Expired
        }
    }

    /// Whether completing at `now` still counts, judged against the deadline
    /// of whichever timer is current.
    pub fn is_on_time(&self, now: DateTime<Utc>) -> bool {
        match self.phase(now) {
            TaskPhase::Running { .. } => {
                (now - self.start_time).num_milliseconds() <= self.duration_ms()
            }
            TaskPhase::GraceWindow { .. } => {
                (now - self.window_start()).num_milliseconds() <= GRACE_WINDOW_SECS * 1000
            }
            TaskPhase::Completed | TaskPhase::Expired => false,
        }
    }

    /// `MM:SS` left on the current timer, or `DONE` / `EXPIRED`.
    pub fn countdown_label(&self, now: DateTime<Utc>) -> String {
        self.phase(now).label()
    }
}

/// Hour-long tasks are worth double.
pub fn reward_for(duration_secs: u32) -> u32 {
    if duration_secs >= LONG_TASK_SECS {
        LONG_TASK_REWARD
    } else {
        BASE_TASK_REWARD
    }
}

/// Parses a whole, positive number of minutes typed by the player.
pub fn parse_duration_minutes(raw: &str) -> GameResult<i64> {
    let trimmed = raw.trim();
    let minutes = trimmed.parse::<i64>().map_err(|_| {
        GameError::validation(format!(
            "duration '{trimmed}' is not a whole number of minutes"
        ))
    })?;
    if minutes <= 0 {
        return Err(GameError::validation("duration must be greater than zero"));
    }
    Ok(minutes)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    OnTime { points: u32 },
    AlreadyCompleted,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskEvent {
    EnteredGrace { id: String },
    Expired { id: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    text: String,
    duration: u32,
    start_time: i64,
    completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion_window_start: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct TaskEngine {
    tasks: BTreeMap<String, Task>,
    // Phase seen on the previous tick; only used to report transitions.
    seen: BTreeMap<String, PhaseKind>,
}

impl TaskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(store: &mut dyn KeyValueStore, now: DateTime<Utc>) -> Self {
        let mut engine = Self::new();
        if let Some(raw) = store.get(KEY_TASKS) {
            match serde_json::from_str::<BTreeMap<String, StoredTask>>(&raw) {
                Ok(stored) => {
                    for (id, st) in stored {
                        match task_from_stored(&id, st) {
                            Some(task) => {
                                engine.tasks.insert(id, task);
                            }
                            None => warn!(%id, "dropping unreadable task record"),
                        }
                    }
                }
                Err(err) => warn!(%err, "corrupt task list, starting empty"),
            }
        }

        // Anything that ran out while we were away gets its window recorded
        // now; no events are reported for it.
        let mut dirty = false;
        for task in engine.tasks.values_mut() {
            let kind = task.phase(now).kind();
            if matches!(kind, PhaseKind::GraceWindow | PhaseKind::Expired)
                && task.completion_window_start.is_none()
            {
                task.completion_window_start = Some(task.window_start());
                dirty = true;
            }
            engine.seen.insert(task.id.clone(), kind);
        }
        if dirty {
            engine.save(store);
        }
        engine
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) {
        let stored: BTreeMap<&str, StoredTask> = self
            .tasks
            .iter()
            .map(|(id, t)| (id.as_str(), stored_from_task(t)))
            .collect();
        match serde_json::to_string(&stored) {
            Ok(json) => write_through(store, KEY_TASKS, json),
            Err(err) => warn!(%err, "failed to encode task list"),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks oldest first.
    pub fn list(&self) -> Vec<&Task> {
        let mut v: Vec<&Task> = self.tasks.values().collect();
        v.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        v
    }

    pub fn add_task(
        &mut self,
        store: &mut dyn KeyValueStore,
        text: &str,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> GameResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GameError::validation("task text cannot be empty"));
        }
        if duration_minutes <= 0 {
            return Err(GameError::validation("duration must be greater than zero"));
        }
        if duration_minutes > MAX_DURATION_MINUTES {
            return Err(GameError::validation("duration is too long"));
        }

        let id = self.fresh_id(now);
        let task = Task {
            id: id.clone(),
            text: text.to_string(),
            duration_secs: (duration_minutes * 60) as u32,
            start_time: now,
            completion_window_start: None,
            completed: false,
        };
        debug!(%id, minutes = duration_minutes, "task added");
        self.seen.insert(id.clone(), PhaseKind::Running);
        self.tasks.insert(id.clone(), task);
        self.save(store);
        Ok(id)
    }

    /// Same as [`TaskEngine::add_task`] but takes the duration as typed.
    pub fn add_task_from_input(
        &mut self,
        store: &mut dyn KeyValueStore,
        text: &str,
        raw_minutes: &str,
        now: DateTime<Utc>,
    ) -> GameResult<String> {
        let minutes = parse_duration_minutes(raw_minutes)?;
        self.add_task(store, text, minutes, now)
    }

    fn fresh_id(&self, now: DateTime<Utc>) -> String {
        let base = format!("task-{}", to_millis(now));
        if !self.tasks.contains_key(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.tasks.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Marks the task done. Awards only once; late or repeated completions
    /// change nothing.
    pub fn complete_task(
        &mut self,
        store: &mut dyn KeyValueStore,
        id: &str,
        now: DateTime<Utc>,
    ) -> GameResult<Completion> {
        let Some(task) = self.tasks.get_mut(id) else {
            warn!(%id, "complete on unknown task");
            return Err(GameError::NotFound(id.to_string()));
        };

        let outcome = match task.phase(now) {
            TaskPhase::Completed => Completion::AlreadyCompleted,
            TaskPhase::Expired => Completion::Expired,
            TaskPhase::Running { .. } | TaskPhase::GraceWindow { .. } => {
                if task.is_on_time(now) {
                    task.completed = true;
                    Completion::OnTime {
                        points: task.reward(),
                    }
                } else {
                    Completion::Expired
                }
            }
        };

        // A late attempt settles the expiry now so tick stays quiet about it.
        let mut window_recorded = false;
        if outcome == Completion::Expired && task.completion_window_start.is_none() {
            task.completion_window_start = Some(task.window_start());
            window_recorded = true;
        }

        match &outcome {
            Completion::OnTime { points } => {
                info!(%id, points, "task completed on time");
                self.seen.insert(id.to_string(), PhaseKind::Completed);
                self.save(store);
            }
            Completion::Expired => {
                debug!(%id, "task completed too late");
                self.seen.insert(id.to_string(), PhaseKind::Expired);
                if window_recorded {
                    self.save(store);
                }
            }
            Completion::AlreadyCompleted => debug!(%id, "task already completed"),
        }
        Ok(outcome)
    }

    /// Removes a live or expired task. Completed tasks stay on record.
    pub fn delete_task(
        &mut self,
        store: &mut dyn KeyValueStore,
        id: &str,
        now: DateTime<Utc>,
    ) -> GameResult<Task> {
        let Some(task) = self.tasks.get(id) else {
            warn!(%id, "delete on unknown task");
            return Err(GameError::NotFound(id.to_string()));
        };
        if task.phase(now) == TaskPhase::Completed {
            return Err(GameError::validation("completed tasks cannot be deleted"));
        }
        let removed = self
            .tasks
            .remove(id)
            .ok_or_else(|| GameError::NotFound(id.to_string()))?;
        self.seen.remove(id);
        debug!(%id, "task deleted");
        self.save(store);
        Ok(removed)
    }

    /// One step of the 1-second cycle. Reports each task that crossed into
    /// its grace window or expired since the previous tick.
    pub fn tick(&mut self, store: &mut dyn KeyValueStore, now: DateTime<Utc>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        let mut dirty = false;

        for task in self.tasks.values_mut() {
            let kind = task.phase(now).kind();
            let before = self
                .seen
                .insert(task.id.clone(), kind)
                .unwrap_or(PhaseKind::Running);
            if before == kind {
                continue;
            }

            if matches!(kind, PhaseKind::GraceWindow | PhaseKind::Expired)
                && task.completion_window_start.is_none()
            {
                task.completion_window_start = Some(task.window_start());
                dirty = true;
            }

            match kind {
                PhaseKind::GraceWindow => {
                    debug!(id = %task.id, "task entered grace window");
                    events.push(TaskEvent::EnteredGrace {
                        id: task.id.clone(),
                    });
                }
                PhaseKind::Expired => {
                    info!(id = %task.id, "task expired");
                    events.push(TaskEvent::Expired {
                        id: task.id.clone(),
                    });
                }
                PhaseKind::Running | PhaseKind::Completed => {}
            }
        }

        if dirty {
            self.save(store);
        }
        events
    }
}

fn stored_from_task(t: &Task) -> StoredTask {
    StoredTask {
        text: t.text.clone(),
        duration: t.duration_secs,
        start_time: to_millis(t.start_time),
        completed: t.completed,
        completion_window_start: t.completion_window_start.map(to_millis),
    }
}

fn task_from_stored(id: &str, st: StoredTask) -> Option<Task> {
    if st.duration == 0 {
        return None;
    }
    let start_time = from_millis(st.start_time)?;
    let completion_window_start = match st.completion_window_start {
        Some(ms) => Some(from_millis(ms)?),
        None => None,
    };
    Some(Task {
        id: id.to_string(),
        text: st.text,
        duration_secs: st.duration,
        start_time,
        completion_window_start,
        completed: st.completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn at(mins: i64, secs: i64) -> DateTime<Utc> {
        t0() + ChronoDuration::minutes(mins) + ChronoDuration::seconds(secs)
    }

    fn engine_with_task(minutes: i64) -> (TaskEngine, MemoryStore, String) {
        let mut store = MemoryStore::new();
        let mut engine = TaskEngine::new();
        let id = engine
            .add_task(&mut store, "water the ferns", minutes, t0())
            .unwrap();
        (engine, store, id)
    }

    #[test]
    fn phases_follow_the_clock() {
        let (engine, _store, id) = engine_with_task(5);
        let task = engine.get(&id).unwrap();

        assert_eq!(
            task.phase(t0()),
            TaskPhase::Running {
                time_left_secs: 300
            }
        );
        assert_eq!(
            task.phase(at(4, 59)),
            TaskPhase::Running { time_left_secs: 1 }
        );
        assert_eq!(
            task.phase(at(5, 0)),
            TaskPhase::GraceWindow {
                time_left_secs: 1800
            }
        );
        assert_eq!(
            task.phase(at(35, 0)),
            TaskPhase::GraceWindow { time_left_secs: 0 }
        );
        assert_eq!(task.phase(at(35, 1)), TaskPhase::Expired);
    }

    #[test]
    fn on_time_completion_awards_once() {
        let (mut engine, mut store, id) = engine_with_task(5);

        let first = engine.complete_task(&mut store, &id, at(4, 59)).unwrap();
        assert_eq!(first, Completion::OnTime { points: 10 });
        assert_eq!(engine.get(&id).unwrap().phase(at(4, 59)), TaskPhase::Completed);

        let second = engine.complete_task(&mut store, &id, at(5, 30)).unwrap();
        assert_eq!(second, Completion::AlreadyCompleted);
    }

    #[test]
    fn completion_inside_grace_window_counts() {
        let (mut engine, mut store, id) = engine_with_task(5);
        let outcome = engine.complete_task(&mut store, &id, at(20, 0)).unwrap();
        assert_eq!(outcome, Completion::OnTime { points: 10 });
    }

    #[test]
    fn late_completion_expires_without_points() {
        let (mut engine, mut store, id) = engine_with_task(5);
        let outcome = engine.complete_task(&mut store, &id, at(35, 1)).unwrap();
        assert_eq!(outcome, Completion::Expired);

        let task = engine.get(&id).unwrap();
        assert!(!task.completed);
        assert_eq!(task.phase(at(35, 1)), TaskPhase::Expired);

        let again = engine.complete_task(&mut store, &id, at(36, 0)).unwrap();
        assert_eq!(again, Completion::Expired);
    }

    #[test]
    fn hour_long_tasks_pay_double() {
        let (mut engine, mut store, id) = engine_with_task(60);
        let outcome = engine.complete_task(&mut store, &id, at(10, 0)).unwrap();
        assert_eq!(outcome, Completion::OnTime { points: 20 });

        assert_eq!(reward_for(3599), 10);
        assert_eq!(reward_for(3600), 20);
    }

    #[test]
    fn rejects_bad_input() {
        let mut store = MemoryStore::new();
        let mut engine = TaskEngine::new();

        assert!(matches!(
            engine.add_task(&mut store, "   ", 5, t0()),
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            engine.add_task(&mut store, "repot", 0, t0()),
            Err(GameError::Validation(_))
        ));
        for raw in ["", "abc", "-3", "2.5", "0"] {
            assert!(
                matches!(
                    engine.add_task_from_input(&mut store, "repot", raw, t0()),
                    Err(GameError::Validation(_))
                ),
                "accepted {raw:?}"
            );
        }
        assert!(engine.is_empty());
        assert_eq!(store.get(KEY_TASKS), None);
    }

    #[test]
    fn ids_are_unique_within_a_millisecond() {
        let mut store = MemoryStore::new();
        let mut engine = TaskEngine::new();
        let a = engine.add_task(&mut store, "one", 5, t0()).unwrap();
        let b = engine.add_task(&mut store, "two", 5, t0()).unwrap();
        assert_ne!(a, b);
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn delete_removes_and_reports_missing() {
        let (mut engine, mut store, id) = engine_with_task(5);
        engine.delete_task(&mut store, &id, at(1, 0)).unwrap();
        assert!(engine.get(&id).is_none());

        let err = engine.delete_task(&mut store, &id, at(1, 0)).unwrap_err();
        assert_eq!(err, GameError::NotFound(id.clone()));

        // A deleted task never shows up in later ticks.
        assert!(engine.tick(&mut store, at(6, 0)).is_empty());
        assert!(engine.tick(&mut store, at(40, 0)).is_empty());
    }

    #[test]
    fn completed_tasks_cannot_be_deleted() {
        let (mut engine, mut store, id) = engine_with_task(5);
        engine.complete_task(&mut store, &id, at(1, 0)).unwrap();
        assert!(matches!(
            engine.delete_task(&mut store, &id, at(2, 0)),
            Err(GameError::Validation(_))
        ));
    }

    #[test]
    fn grace_window_tasks_can_be_deleted() {
        let (mut engine, mut store, id) = engine_with_task(5);
        assert_eq!(
            engine.tick(&mut store, at(6, 0)),
            vec![TaskEvent::EnteredGrace { id: id.clone() }]
        );

        let removed = engine.delete_task(&mut store, &id, at(10, 0)).unwrap();
        assert_eq!(removed.id, id);
        assert!(engine.is_empty());
        assert_eq!(store.get(KEY_TASKS).as_deref(), Some("{}"));
        assert!(engine.tick(&mut store, at(40, 0)).is_empty());
    }

    #[test]
    fn late_completion_settles_expiry_quietly() {
        let (mut engine, mut store, id) = engine_with_task(5);
        assert_eq!(
            engine.complete_task(&mut store, &id, at(40, 0)).unwrap(),
            Completion::Expired
        );
        assert_eq!(
            engine.get(&id).unwrap().completion_window_start,
            Some(at(5, 0))
        );
        assert!(store.get(KEY_TASKS).unwrap().contains("completionWindowStart"));

        assert!(engine.tick(&mut store, at(40, 1)).is_empty());
        assert!(engine.tick(&mut store, at(50, 0)).is_empty());
    }

    #[test]
    fn tick_reports_each_transition_once() {
        let (mut engine, mut store, id) = engine_with_task(5);

        assert!(engine.tick(&mut store, at(4, 0)).is_empty());
        assert_eq!(
            engine.tick(&mut store, at(5, 0)),
            vec![TaskEvent::EnteredGrace { id: id.clone() }]
        );
        assert!(engine.tick(&mut store, at(5, 1)).is_empty());
        assert_eq!(
            engine.get(&id).unwrap().completion_window_start,
            Some(at(5, 0))
        );
        assert_eq!(
            engine.tick(&mut store, at(35, 1)),
            vec![TaskEvent::Expired { id: id.clone() }]
        );
        assert!(engine.tick(&mut store, at(50, 0)).is_empty());
    }

    #[test]
    fn reload_reconstructs_phase_from_timestamps() {
        let (mut engine, mut store, _) = engine_with_task(5);
        let done = engine.add_task(&mut store, "prune", 10, t0()).unwrap();
        engine.complete_task(&mut store, &done, at(2, 0)).unwrap();

        // Nothing ticked while the session was closed.
        let now = at(12, 0);
        let reloaded = TaskEngine::load(&mut store, now);
        assert_eq!(reloaded.len(), 2);
        for task in engine.list() {
            let restored = reloaded.get(&task.id).unwrap();
            assert_eq!(restored.phase(now), task.phase(now));
            assert_eq!(restored.text, task.text);
        }
    }

    #[test]
    fn stored_layout_uses_documented_fields() {
        let (_engine, store, id) = engine_with_task(5);
        let raw = store.get(KEY_TASKS).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &value[&id];
        assert_eq!(entry["text"], "water the ferns");
        assert_eq!(entry["duration"], 300);
        assert_eq!(entry["startTime"], to_millis(t0()));
        assert_eq!(entry["completed"], false);
    }

    #[test]
    fn corrupt_task_list_loads_empty() {
        let mut store = MemoryStore::new();
        store.set(KEY_TASKS, "[1, 2").unwrap();
        assert!(TaskEngine::load(&mut store, t0()).is_empty());
    }

    #[test]
    fn labels() {
        assert_eq!(TaskPhase::Running { time_left_secs: 299 }.label(), "04:59");
        assert_eq!(TaskPhase::GraceWindow { time_left_secs: 1800 }.label(), "30:00");
        assert_eq!(TaskPhase::Expired.label(), "EXPIRED");

        let (engine, _, id) = engine_with_task(5);
        let task = engine.get(&id).unwrap();
        assert_eq!(task.countdown_label(at(0, 0)), "05:00");
        assert_eq!(task.countdown_label(at(5, 0)), "30:00");
        assert_eq!(task.countdown_label(at(40, 0)), "EXPIRED");
    }
}
