//! Per-conversation dialogue state.
//!
//! One session = one sequential turn stream; there is no concurrent writer
//! within a session, and cross-session isolation comes from keying on the
//! session identity owned by the turn event source.

use crate::scheduling::{DayOfWeekRule, RecurrenceWindow};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Periodicity {
    OneTime,
    Recurring,
}

/// The service the user picked, as folded out of a slot resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelection {
    pub id: String,
    pub spoken_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// In-progress service request, accumulated across turns.
///
/// Exactly one of the one-time slot or the recurrence window is populated,
/// matching `periodicity`; the setters below keep that invariant so no
/// other component needs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    service: Option<ServiceSelection>,
    periodicity: Option<Periodicity>,
    one_time: Option<OneTimeSlot>,
    window: Option<RecurrenceWindow>,
    rules: Vec<DayOfWeekRule>,
}

impl SessionState {
    pub fn service(&self) -> Option<&ServiceSelection> {
        self.service.as_ref()
    }

    pub fn periodicity(&self) -> Option<Periodicity> {
        self.periodicity
    }

    pub fn one_time(&self) -> Option<OneTimeSlot> {
        self.one_time
    }

    pub fn window(&self) -> Option<RecurrenceWindow> {
        self.window
    }

    pub fn rules(&self) -> &[DayOfWeekRule] {
        &self.rules
    }

    pub fn set_service(&mut self, selection: ServiceSelection) {
        self.service = Some(selection);
    }

    /// Switch to a one-time request; any accumulated recurrence data is
    /// dropped.
    pub fn set_one_time(&mut self, slot: OneTimeSlot) {
        self.periodicity = Some(Periodicity::OneTime);
        self.one_time = Some(slot);
        self.window = None;
        self.rules.clear();
    }

    /// Switch to a recurring request over the given window.
    pub fn set_recurrence_window(&mut self, window: RecurrenceWindow) {
        self.periodicity = Some(Periodicity::Recurring);
        self.window = Some(window);
        self.one_time = None;
    }

    /// Append a weekday rule. Order of insertion is presentation order.
    pub fn push_rule(&mut self, rule: DayOfWeekRule) {
        self.one_time = None;
        self.rules.push(rule);
    }

    /// Clear the scheduling half of the request after a successful
    /// submission, keeping the selected service so the user can start a
    /// fresh request in the same session.
    pub fn clear_after_submission(&mut self) {
        self.periodicity = None;
        self.one_time = None;
        self.window = None;
        self.rules.clear();
    }
}

/// Session-keyed state store. States are created empty on first touch and
/// dropped when the turn source reports the session ended.
pub struct SessionManager {
    states: Mutex<HashMap<String, SessionState>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Run a closure against the (possibly fresh) state for a session.
    pub fn with_session<T>(&self, session_id: &str, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = states.entry(session_id.to_string()).or_default();
        f(state)
    }

    /// Clone the current state for read-only use outside the lock.
    pub fn snapshot(&self, session_id: &str) -> SessionState {
        self.with_session(session_id, |state| state.clone())
    }

    pub fn end_session(&self, session_id: &str) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::DayOfWeekRule;
    use chrono::{Duration, NaiveDate, NaiveTime, Weekday};

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, day).unwrap()
    }

    fn accompaniment() -> ServiceSelection {
        ServiceSelection {
            id: "61000".into(),
            spoken_name: "acompañamiento".into(),
        }
    }

    #[test]
    fn one_time_clears_recurrence_data() {
        let mut state = SessionState::default();
        state.set_recurrence_window(RecurrenceWindow { since: d(8), until: d(20) });
        state.push_rule(DayOfWeekRule::new(Weekday::Mon, "lunes", t(9), Duration::hours(2)));

        state.set_one_time(OneTimeSlot { date: d(10), start: t(9), end: t(11) });

        assert_eq!(state.periodicity(), Some(Periodicity::OneTime));
        assert!(state.window().is_none());
        assert!(state.rules().is_empty());
    }

    #[test]
    fn recurrence_window_clears_one_time_date() {
        let mut state = SessionState::default();
        state.set_one_time(OneTimeSlot { date: d(10), start: t(9), end: t(11) });
        state.set_recurrence_window(RecurrenceWindow { since: d(8), until: d(20) });

        assert_eq!(state.periodicity(), Some(Periodicity::Recurring));
        assert!(state.one_time().is_none());
    }

    #[test]
    fn rules_preserve_insertion_order() {
        let mut state = SessionState::default();
        state.push_rule(DayOfWeekRule::new(Weekday::Wed, "miércoles", t(9), Duration::hours(2)));
        state.push_rule(DayOfWeekRule::new(Weekday::Mon, "lunes", t(16), Duration::hours(1)));

        assert_eq!(state.rules()[0].weekday, Weekday::Wed);
        assert_eq!(state.rules()[1].weekday, Weekday::Mon);
    }

    #[test]
    fn clear_after_submission_keeps_service() {
        let mut state = SessionState::default();
        state.set_service(accompaniment());
        state.set_recurrence_window(RecurrenceWindow { since: d(8), until: d(20) });
        state.push_rule(DayOfWeekRule::new(Weekday::Mon, "lunes", t(9), Duration::hours(2)));

        state.clear_after_submission();

        assert!(state.service().is_some());
        assert!(state.rules().is_empty());
        assert!(state.window().is_none());
        assert!(state.periodicity().is_none());
    }

    #[test]
    fn manager_isolates_sessions_by_id() {
        let manager = SessionManager::new();
        manager.with_session("a", |state| state.set_service(accompaniment()));

        assert!(manager.snapshot("a").service().is_some());
        assert!(manager.snapshot("b").service().is_none());
    }

    #[test]
    fn end_session_drops_state() {
        let manager = SessionManager::new();
        manager.with_session("a", |state| state.set_service(accompaniment()));
        manager.end_session("a");
        assert!(manager.snapshot("a").service().is_none());
    }
}
