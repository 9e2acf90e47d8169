//! crates/grading_core/src/admission.rs
//!
//! Tiered sliding-window admission control with a per-user cooldown.
//!
//! Each controller owns the windows for one action type. Windows are keyed by
//! `(user, action)` and each sits behind its own mutex, so `admit` can check
//! and record atomically for one user without blocking any other user.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::domain::{ActionType, AuditEvent, UserId};
use crate::ports::{AuditSink, Clock};

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;
pub const DEFAULT_COOLDOWN_MS: i64 = 60_000;

//=========================================================================================
// Limits
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionLimits {
    pub hourly: u32,
    pub daily: u32,
    pub cooldown_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitTier {
    pub name: &'static str,
    /// Lowest rating (inclusive) this tier applies to.
    pub min_rating: i32,
    pub limits: ActionLimits,
}

/// Limits keyed by the user's current rating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitTable {
    /// Sorted by ascending `min_rating`; the first tier is the baseline.
    tiers: Vec<LimitTier>,
}

impl LimitTable {
    pub fn new(mut tiers: Vec<LimitTier>) -> Self {
        tiers.sort_by_key(|tier| tier.min_rating);
        Self { tiers }
    }

    /// The submission tiers: more attempts for stronger users, same cooldown.
    pub fn submissions() -> Self {
        let tier = |name, min_rating, hourly, daily| LimitTier {
            name,
            min_rating,
            limits: ActionLimits {
                hourly,
                daily,
                cooldown_ms: DEFAULT_COOLDOWN_MS,
            },
        };
        Self::new(vec![
            tier("baseline", i32::MIN, 5, 20),
            tier("specialist", 1400, 6, 25),
            tier("expert", 1600, 8, 30),
            tier("master", 2000, 10, 40),
        ])
    }

    /// A single tier applied to everyone.
    pub fn flat(limits: ActionLimits) -> Self {
        Self::new(vec![LimitTier {
            name: "flat",
            min_rating: i32::MIN,
            limits,
        }])
    }

    pub fn tier_for(&self, rating: i32) -> Option<&LimitTier> {
        self.tiers.iter().rev().find(|tier| rating >= tier.min_rating)
    }

    /// Limits for `rating`. Ratings below every tier get the lowest tier.
    pub fn limits_for(&self, rating: i32) -> ActionLimits {
        self.tier_for(rating)
            .or_else(|| self.tiers.first())
            .map(|tier| tier.limits)
            .unwrap_or(ActionLimits {
                hourly: 0,
                daily: 0,
                cooldown_ms: DEFAULT_COOLDOWN_MS,
            })
    }
}

//=========================================================================================
// Decisions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    Allowed,
    CooldownBlocked,
    HourlyBlocked,
    DailyBlocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub state: AdmissionState,
    pub allowed: bool,
    pub remaining_hourly: u32,
    pub remaining_daily: u32,
    pub retry_after_seconds: Option<u64>,
    pub limits: ActionLimits,
}

impl AdmissionDecision {
    fn allowed(limits: ActionLimits, remaining_hourly: u32, remaining_daily: u32) -> Self {
        Self {
            state: AdmissionState::Allowed,
            allowed: true,
            remaining_hourly,
            remaining_daily,
            retry_after_seconds: None,
            limits,
        }
    }

    fn blocked(
        state: AdmissionState,
        limits: ActionLimits,
        remaining_hourly: u32,
        remaining_daily: u32,
        retry_after_ms: i64,
    ) -> Self {
        Self {
            state,
            allowed: false,
            remaining_hourly,
            remaining_daily,
            retry_after_seconds: Some(ceil_seconds(retry_after_ms)),
            limits,
        }
    }

    /// User-facing explanation for a rejection.
    pub fn message(&self) -> String {
        match self.retry_after_seconds {
            None => "Submission allowed.".to_string(),
            Some(seconds) if seconds < 120 => {
                format!("Please wait {seconds} seconds before submitting again")
            }
            Some(_) => {
                "You have reached your submission limit. Please try again later.".to_string()
            }
        }
    }
}

/// Rounds a positive millisecond span up to whole seconds, never below one.
fn ceil_seconds(ms: i64) -> u64 {
    let seconds = (ms.max(0) + 999) / 1000;
    seconds.max(1) as u64
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Rate-limit state for user {0} is poisoned")]
    Poisoned(UserId),
}

//=========================================================================================
// Windows
//=========================================================================================

/// Recent action timestamps for one `(user, action)` key, oldest first.
#[derive(Debug, Default)]
struct RateLimitWindow {
    timestamps: VecDeque<DateTime<Utc>>,
    last_action: Option<DateTime<Utc>>,
}

impl RateLimitWindow {
    fn evaluate(&self, limits: ActionLimits, now: DateTime<Utc>) -> AdmissionDecision {
        if let Some(last) = self.last_action {
            let elapsed = (now - last).num_milliseconds();
            if elapsed < limits.cooldown_ms {
                return AdmissionDecision::blocked(
                    AdmissionState::CooldownBlocked,
                    limits,
                    0,
                    0,
                    limits.cooldown_ms - elapsed,
                );
            }
        }

        let hour_ago = now - Duration::milliseconds(HOUR_MS);
        let day_ago = now - Duration::milliseconds(DAY_MS);
        let hourly: Vec<&DateTime<Utc>> = self
            .timestamps
            .iter()
            .filter(|ts| **ts > hour_ago)
            .collect();
        let daily: Vec<&DateTime<Utc>> = self
            .timestamps
            .iter()
            .filter(|ts| **ts > day_ago)
            .collect();
        let hourly_count = hourly.len() as u32;
        let daily_count = daily.len() as u32;

        if hourly_count >= limits.hourly {
            let retry = hourly
                .first()
                .map(|oldest| (**oldest + Duration::milliseconds(HOUR_MS) - now).num_milliseconds())
                .unwrap_or(HOUR_MS);
            return AdmissionDecision::blocked(
                AdmissionState::HourlyBlocked,
                limits,
                0,
                limits.daily.saturating_sub(daily_count),
                retry,
            );
        }

        if daily_count >= limits.daily {
            let retry = daily
                .first()
                .map(|oldest| (**oldest + Duration::milliseconds(DAY_MS) - now).num_milliseconds())
                .unwrap_or(DAY_MS);
            return AdmissionDecision::blocked(
                AdmissionState::DailyBlocked,
                limits,
                limits.hourly.saturating_sub(hourly_count),
                0,
                retry,
            );
        }

        // Remaining counts already account for the action about to be recorded.
        AdmissionDecision::allowed(
            limits,
            limits.hourly.saturating_sub(hourly_count + 1),
            limits.daily.saturating_sub(daily_count + 1),
        )
    }

    fn record(&mut self, now: DateTime<Utc>) {
        self.timestamps.push_back(now);
        self.last_action = Some(now);
    }

    /// Drops timestamps at or before `cutoff`; returns true when nothing recent is left.
    fn prune(&mut self, cutoff: DateTime<Utc>) -> bool {
        while self.timestamps.front().is_some_and(|ts| *ts <= cutoff) {
            self.timestamps.pop_front();
        }
        self.timestamps.is_empty() && self.last_action.map_or(true, |last| last <= cutoff)
    }
}

//=========================================================================================
// The Controller
//=========================================================================================

type WindowKey = (UserId, ActionType);

pub struct AdmissionController {
    action_type: ActionType,
    limits: LimitTable,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    windows: RwLock<HashMap<WindowKey, Arc<Mutex<RateLimitWindow>>>>,
}

impl AdmissionController {
    pub fn new(
        action_type: ActionType,
        limits: LimitTable,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            action_type,
            limits,
            clock,
            audit,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn limits(&self) -> &LimitTable {
        &self.limits
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read-only check. Does not record anything.
    pub fn check_admission(
        &self,
        user_id: UserId,
        rating: i32,
        now: DateTime<Utc>,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let limits = self.limits.limits_for(rating);
        let Some(window) = self.existing_window(user_id, self.action_type)? else {
            return Ok(RateLimitWindow::default().evaluate(limits, now));
        };
        let guard = window.lock().map_err(|_| AdmissionError::Poisoned(user_id))?;
        Ok(guard.evaluate(limits, now))
    }

    /// Appends `now` to the user's window and emits an audit event.
    pub fn record_action(
        &self,
        user_id: UserId,
        rate_limit_hit: bool,
        now: DateTime<Utc>,
    ) -> Result<(), AdmissionError> {
        let window = self.window(user_id, self.action_type)?;
        window
            .lock()
            .map_err(|_| AdmissionError::Poisoned(user_id))?
            .record(now);
        self.emit(user_id, self.action_type, rate_limit_hit, now);
        Ok(())
    }

    /// Checks and, when allowed, records in one step under the user's lock.
    ///
    /// Fails open: if the rate-limit state cannot be read the request is
    /// admitted with the tier's full allowance.
    pub fn admit(&self, user_id: UserId, rating: i32) -> AdmissionDecision {
        let now = self.clock.now();
        match self.try_admit(user_id, rating, now) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(
                    error = %err,
                    %user_id,
                    action = self.action_type.as_str(),
                    "Admission check failed; allowing request."
                );
                let limits = self.limits.limits_for(rating);
                AdmissionDecision::allowed(limits, limits.hourly, limits.daily)
            }
        }
    }

    fn try_admit(
        &self,
        user_id: UserId,
        rating: i32,
        now: DateTime<Utc>,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let limits = self.limits.limits_for(rating);
        let window = self.window(user_id, self.action_type)?;
        let decision = {
            let mut guard = window.lock().map_err(|_| AdmissionError::Poisoned(user_id))?;
            let decision = guard.evaluate(limits, now);
            if decision.allowed {
                guard.record(now);
            }
            decision
        };

        if decision.allowed {
            debug!(
                %user_id,
                action = self.action_type.as_str(),
                remaining_hourly = decision.remaining_hourly,
                "Action admitted."
            );
        } else {
            debug!(
                %user_id,
                action = self.action_type.as_str(),
                state = ?decision.state,
                "Action blocked."
            );
        }
        self.emit(user_id, self.action_type, !decision.allowed, now);
        Ok(decision)
    }

    /// Drops timestamps older than the longest window and forgets idle users.
    /// Returns the number of users removed.
    ///
    /// A window some caller still holds is never removed, so an admission in
    /// flight cannot record into a window the map no longer owns.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::milliseconds(DAY_MS);
        let mut windows = match self.windows.write() {
            Ok(windows) => windows,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = windows.len();
        windows.retain(|_, window| {
            if Arc::strong_count(window) > 1 {
                return true;
            }
            match window.lock() {
                Ok(mut guard) => !guard.prune(cutoff),
                // A poisoned window carries no trustworthy state.
                Err(_) => false,
            }
        });
        before - windows.len()
    }

    /// Number of tracked `(user, action)` keys.
    pub fn tracked_keys(&self) -> usize {
        self.windows.read().map(|windows| windows.len()).unwrap_or(0)
    }

    fn existing_window(
        &self,
        user_id: UserId,
        action_type: ActionType,
    ) -> Result<Option<Arc<Mutex<RateLimitWindow>>>, AdmissionError> {
        let windows = self
            .windows
            .read()
            .map_err(|_| AdmissionError::Poisoned(user_id))?;
        Ok(windows.get(&(user_id, action_type)).cloned())
    }

    fn window(
        &self,
        user_id: UserId,
        action_type: ActionType,
    ) -> Result<Arc<Mutex<RateLimitWindow>>, AdmissionError> {
        if let Some(window) = self.existing_window(user_id, action_type)? {
            return Ok(window);
        }
        let mut windows = self
            .windows
            .write()
            .map_err(|_| AdmissionError::Poisoned(user_id))?;
        Ok(windows
            .entry((user_id, action_type))
            .or_insert_with(|| Arc::new(Mutex::new(RateLimitWindow::default())))
            .clone())
    }

    fn emit(
        &self,
        user_id: UserId,
        action_type: ActionType,
        rate_limit_hit: bool,
        now: DateTime<Utc>,
    ) {
        let event = AuditEvent {
            user_id,
            action_type,
            rate_limit_hit,
            timestamp: now,
        };
        if let Err(err) = self.audit.enqueue(event) {
            warn!(error = %err, "Failed to enqueue admission audit event.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ManualClock, PortError, PortResult};
    use chrono::TimeZone;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditSink for RecordingSink {
        fn enqueue(&self, event: AuditEvent) -> PortResult<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn enqueue(&self, _event: AuditEvent) -> PortResult<()> {
            Err(PortError::Unexpected("audit store offline".to_string()))
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn controller(clock: Arc<ManualClock>, sink: Arc<dyn AuditSink>) -> AdmissionController {
        AdmissionController::new(ActionType::Submission, LimitTable::submissions(), clock, sink)
    }

    #[test]
    fn tiers_follow_rating() {
        let table = LimitTable::submissions();
        assert_eq!(table.limits_for(1000).hourly, 5);
        assert_eq!(table.limits_for(1000).daily, 20);
        assert_eq!(table.limits_for(1399).hourly, 5);
        assert_eq!(table.limits_for(1400).daily, 25);
        assert_eq!(table.limits_for(1599).hourly, 6);
        assert_eq!(table.limits_for(1600).hourly, 8);
        assert_eq!(table.limits_for(1999).daily, 30);
        assert_eq!(table.limits_for(2000).hourly, 10);
        assert_eq!(table.limits_for(2000).daily, 40);
        for rating in [0, 1400, 1600, 2000, 3000] {
            assert_eq!(table.limits_for(rating).cooldown_ms, 60_000);
        }
    }

    #[test]
    fn tier_allowances_strictly_increase() {
        let table = LimitTable::submissions();
        for pair in table.tiers.windows(2) {
            assert!(pair[1].limits.hourly > pair[0].limits.hourly);
            assert!(pair[1].limits.daily > pair[0].limits.daily);
        }
    }

    #[test]
    fn sixth_action_in_an_hour_is_blocked() {
        let clock = Arc::new(ManualClock::new(start()));
        let sink = Arc::new(RecordingSink::default());
        let gate = controller(clock.clone(), sink.clone());
        let user = Uuid::new_v4();

        for call in 1..=5 {
            let decision = gate.admit(user, 1000);
            assert!(decision.allowed, "call {call} should be allowed");
            assert_eq!(decision.remaining_hourly, 5 - call);
            clock.advance(Duration::minutes(2));
        }

        let decision = gate.admit(user, 1000);
        assert!(!decision.allowed);
        assert_eq!(decision.state, AdmissionState::HourlyBlocked);
        // Oldest action was 10 minutes ago, so it expires in 50 minutes.
        assert_eq!(decision.retry_after_seconds, Some(50 * 60));
        assert_eq!(decision.remaining_daily, 15);
        assert_eq!(
            decision.message(),
            "You have reached your submission limit. Please try again later."
        );

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 6);
        assert!(events[..5].iter().all(|event| !event.rate_limit_hit));
        assert!(events[5].rate_limit_hit);
    }

    #[test]
    fn cooldown_applies_before_hourly_count() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = controller(clock.clone(), Arc::new(RecordingSink::default()));
        let user = Uuid::new_v4();

        for _ in 0..4 {
            assert!(gate.admit(user, 1000).allowed);
            clock.advance(Duration::minutes(2));
        }
        assert!(gate.admit(user, 1000).allowed);

        clock.advance(Duration::milliseconds(800));
        let decision = gate.admit(user, 1000);
        assert_eq!(decision.state, AdmissionState::CooldownBlocked);
        assert_eq!(decision.retry_after_seconds, Some(60));
        assert_eq!(decision.message(), "Please wait 60 seconds before submitting again");
    }

    #[test]
    fn blocked_attempts_do_not_extend_the_window() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = controller(clock.clone(), Arc::new(RecordingSink::default()));
        let user = Uuid::new_v4();

        assert!(gate.admit(user, 1000).allowed);
        clock.advance(Duration::seconds(30));
        assert!(!gate.admit(user, 1000).allowed);
        clock.advance(Duration::seconds(30));
        assert!(gate.admit(user, 1000).allowed);
    }

    #[test]
    fn daily_limit_blocks_after_hourly_windows_roll_over() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = controller(clock.clone(), Arc::new(RecordingSink::default()));
        let user = Uuid::new_v4();

        for _ in 0..20 {
            assert!(gate.admit(user, 1000).allowed);
            clock.advance(Duration::minutes(61));
        }
        let decision = gate.admit(user, 1000);
        assert_eq!(decision.state, AdmissionState::DailyBlocked);
        assert_eq!(decision.remaining_daily, 0);
        assert!(decision.retry_after_seconds.unwrap() > 0);
    }

    #[test]
    fn check_admission_is_read_only() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = controller(clock.clone(), Arc::new(RecordingSink::default()));
        let user = Uuid::new_v4();

        let first = gate.check_admission(user, 1000, clock.now()).unwrap();
        let second = gate.check_admission(user, 1000, clock.now()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.remaining_hourly, 4);
        assert_eq!(gate.tracked_keys(), 0);

        gate.record_action(user, false, clock.now()).unwrap();
        let after = gate.check_admission(user, 1000, clock.now()).unwrap();
        assert_eq!(after.state, AdmissionState::CooldownBlocked);
    }

    #[test]
    fn users_do_not_share_windows() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = controller(clock.clone(), Arc::new(RecordingSink::default()));

        assert!(gate.admit(Uuid::new_v4(), 1000).allowed);
        assert!(gate.admit(Uuid::new_v4(), 1000).allowed);
    }

    #[test]
    fn audit_failures_do_not_affect_admission() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = controller(clock.clone(), Arc::new(FailingSink));
        assert!(gate.admit(Uuid::new_v4(), 1000).allowed);
    }

    #[test]
    fn prune_forgets_idle_users() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = controller(clock.clone(), Arc::new(RecordingSink::default()));
        let idle = Uuid::new_v4();
        let active = Uuid::new_v4();

        assert!(gate.admit(idle, 1000).allowed);
        clock.advance(Duration::hours(23));
        assert!(gate.admit(active, 1000).allowed);
        clock.advance(Duration::hours(2));

        assert_eq!(gate.prune(clock.now()), 1);
        assert_eq!(gate.tracked_keys(), 1);

        // The active user's history survived pruning.
        let decision = gate.check_admission(active, 1000, clock.now()).unwrap();
        assert_eq!(decision.remaining_hourly, 4);
        assert_eq!(decision.remaining_daily, 18);
    }

    #[test]
    fn prune_keeps_windows_held_by_an_admission_in_flight() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = controller(clock.clone(), Arc::new(RecordingSink::default()));
        let user = Uuid::new_v4();

        assert!(gate.admit(user, 1000).allowed);
        clock.advance(Duration::hours(25));

        // An admission has looked up the window but not yet locked it.
        let held = gate.window(user, ActionType::Submission).unwrap();
        assert_eq!(gate.prune(clock.now()), 0);
        assert_eq!(gate.tracked_keys(), 1);

        held.lock().unwrap().record(clock.now());
        drop(held);

        // The record landed in the live window, so the cooldown applies.
        let decision = gate.admit(user, 1000);
        assert_eq!(decision.state, AdmissionState::CooldownBlocked);

        // Once released, an idle window is pruned as usual.
        clock.advance(Duration::hours(25));
        assert_eq!(gate.prune(clock.now()), 1);
    }

    #[test]
    fn poisoned_window_fails_open() {
        let clock = Arc::new(ManualClock::new(start()));
        let gate = Arc::new(controller(clock.clone(), Arc::new(RecordingSink::default())));
        let user = Uuid::new_v4();
        assert!(gate.admit(user, 1000).allowed);

        let window = gate.window(user, ActionType::Submission).unwrap();
        let _ = std::thread::spawn(move || {
            let _guard = window.lock().unwrap();
            panic!("poison the window");
        })
        .join();

        let decision = gate.admit(user, 1000);
        assert!(decision.allowed);
        assert_eq!(decision.remaining_hourly, 5);
    }

    #[test]
    fn concurrent_admits_for_one_user_never_over_admit() {
        let clock = Arc::new(ManualClock::new(start()));
        let limits = LimitTable::flat(ActionLimits {
            hourly: 3,
            daily: 10,
            cooldown_ms: 0,
        });
        let gate = Arc::new(AdmissionController::new(
            ActionType::OracleEvaluation,
            limits,
            clock,
            Arc::new(RecordingSink::default()),
        ));
        let user = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || gate.admit(user, 1500).allowed)
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 3);
    }
}
