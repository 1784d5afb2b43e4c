//! Box controller.
//!
//! Owns every piece of box state (timer, emergency counters, gatekeeper
//! session, state machine, hardware) and is driven by `tick()`. Each tick
//! handles at most one button edge, one timer update, one display refresh
//! decision and one flush decision, in that order.
//!
//! Operations and ticks both take `&mut self`; callers sharing a
//! controller serialize access (see [`crate::service::BoxService`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::api::{ConfigResponse, ConfigUpdate, StatusResponse};
use crate::clock::Clock;
use crate::emergency::{AdmissionController, Grant, GrantKind};
use crate::error::{CoreError, Denial, ValidationError};
use crate::events::{Cause, Event};
use crate::gatekeeper::{
    ChatPrompt, ChatTurn, Gatekeeper, Personality, ReflectionStep, ReflectionTurn,
    RemoteResponder, SessionStarted,
};
use crate::hardware::{Actuator, Screen, StatusDisplay};
use crate::limits::{MAX_TIMER_MINUTES, MIN_TIMER_MINUTES};
use crate::machine::{BoxState, BoxStateMachine};
use crate::progress::Progress;
use crate::settings::{AiProvider, BoxSettings};
use crate::storage::{keys, Config, KeyValueStore, StoreValue};
use crate::timer::{TimerEngine, TimerEvent, TimerMode};

/// How long a transient notice stays on the display.
const NOTICE_MS: u64 = 2000;

/// Actuator and display the controller drives.
pub struct Hardware {
    pub actuator: Box<dyn Actuator>,
    pub display: Box<dyn StatusDisplay>,
}

/// Session handed back by [`Controller::start_ai_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiSession {
    pub session_id: String,
    pub min_duration_seconds: u64,
    pub fresh: bool,
}

/// Everything a remote reply needs, captured under the controller lock.
#[derive(Debug, Clone)]
pub struct RemoteReplyJob {
    pub responder: RemoteResponder,
    pub personality: Personality,
    pub trigger: crate::gatekeeper::Trigger,
    pub message: String,
}

impl RemoteReplyJob {
    pub fn prompt(&self) -> ChatPrompt<'_> {
        ChatPrompt {
            personality: self.personality,
            trigger: self.trigger,
            message: &self.message,
        }
    }
}

pub struct Controller {
    store: Box<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: Config,
    settings: BoxSettings,
    engine: TimerEngine,
    admission: AdmissionController,
    gatekeeper: Gatekeeper,
    machine: BoxStateMachine,
    progress: Progress,
    actuator: Box<dyn Actuator>,
    display: Box<dyn StatusDisplay>,
    /// End of a scheduled unlock window.
    relock_at_ms: Option<u64>,
    notice: Option<(String, u64)>,
    button_pending: bool,
    /// Writes that failed twice, retried on the next flush.
    pending_writes: BTreeMap<&'static str, StoreValue>,
    last_flush_ms: u64,
    outbox: Vec<Event>,
}

impl Controller {
    /// Initialise hardware, restore persisted state and leave SETUP.
    ///
    /// # Errors
    /// Returns [`CoreError::Hardware`] when the actuator or display cannot
    /// be initialised.
    pub fn boot(
        store: Box<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: Config,
        mut hardware: Hardware,
    ) -> Result<Self, CoreError> {
        hardware.actuator.init()?;
        hardware.display.init()?;

        let now = clock.uptime_ms();
        let wall = clock.wall_clock();
        let settings = BoxSettings::load(store.as_ref());
        hardware.actuator.set_calibration(settings.servo);

        let mut controller = Self {
            engine: TimerEngine::load(store.as_ref()),
            admission: AdmissionController::load(
                store.as_ref(),
                config.device.emergency_reset,
                now,
            ),
            gatekeeper: Gatekeeper::new(settings.ai.gatekeeper()),
            progress: Progress::load(store.as_ref()),
            machine: BoxStateMachine::new(),
            actuator: hardware.actuator,
            display: hardware.display,
            settings,
            config,
            clock,
            store,
            relock_at_ms: None,
            notice: None,
            button_pending: false,
            pending_writes: BTreeMap::new(),
            last_flush_ms: now,
            outbox: Vec::new(),
        };

        let setup = controller.setup_screen();
        controller.display.render(&setup);

        if let Some(StoreValue::Text(id)) = controller.store.lookup(keys::AI_SESSION_ID) {
            tracing::warn!(id = %id, "gatekeeper session lost across restart");
            controller.remove_key(keys::AI_SESSION_ID);
        }

        let stored = controller.store.get_i64(keys::CURRENT_STATE, BoxState::Unlocked.as_i64());
        let was_locked = BoxState::from_i64(stored)
            .map(BoxState::is_locked)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "unreadable stored box state, booting unlocked");
                false
            });

        if was_locked {
            if controller.engine.mode().uses_interval() {
                let remaining = controller.resume_remaining_ms(wall.as_ref());
                tracing::info!(remaining_ms = remaining, "resuming lockout");
                controller.engine.start(now, remaining);
            }
            controller.enter(BoxState::Locked, Cause::Boot, now);
        } else {
            if let Some(left) = controller.resume_window_ms(wall.as_ref()) {
                tracing::info!(left_ms = left, "resuming scheduled unlock window");
                controller.relock_at_ms = Some(now + left);
            }
            controller.enter(BoxState::Unlocked, Cause::Boot, now);
        }
        controller.persist(controller.lock_entries(now, wall.as_ref()));
        Ok(controller)
    }

    /// Countdown left from before the restart. Prefers the wall-clock
    /// deadline; without one, the last flushed remainder (never shorter
    /// than the real one); without either, a full interval.
    fn resume_remaining_ms(&self, wall: Option<&DateTime<FixedOffset>>) -> u64 {
        let lock_until = self.store.get_u64(keys::LOCK_UNTIL, 0);
        let remaining = self.store.get_u64(keys::REMAINING_MS, 0);
        match wall {
            Some(wall) if lock_until > 0 => {
                (lock_until.saturating_mul(1000)).saturating_sub(epoch_ms(wall))
            }
            _ if remaining > 0 => remaining,
            _ => self.engine.interval_ms(),
        }
    }

    /// Scheduled unlock window left from before the restart, resolved the
    /// same way as the lockout. `Some(0)` re-locks on the first tick.
    fn resume_window_ms(&self, wall: Option<&DateTime<FixedOffset>>) -> Option<u64> {
        let relock_at = self.store.get_u64(keys::RELOCK_AT, 0);
        let remaining = self.store.get_u64(keys::RELOCK_REMAINING_MS, 0);
        match wall {
            Some(wall) if relock_at > 0 => {
                Some((relock_at.saturating_mul(1000)).saturating_sub(epoch_ms(wall)))
            }
            _ if remaining > 0 => Some(remaining),
            _ => None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> BoxState {
        self.machine.state()
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    pub fn settings(&self) -> &BoxSettings {
        &self.settings
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Writes waiting for the next flush.
    pub fn pending_write_count(&self) -> usize {
        self.pending_writes.len()
    }

    pub fn get_status(&self) -> StatusResponse {
        let now = self.clock.uptime_ms();
        let wall = self.clock.wall_clock();
        let mode = self.engine.mode();
        let session = self.gatekeeper.status(now);
        StatusResponse {
            box_state: self.machine.state(),
            timer_mode: mode,
            timer_active: self.engine.is_running(),
            emergency_count: self.admission.state().emergency_count_today,
            max_emergency: self.admission.max_per_day(),
            time_remaining_seconds: self.engine.time_remaining_ms(now).div_ceil(1000),
            total_cigarettes: self.progress.total_cigarettes,
            today_count: self.progress.today_count,
            daily_limit: self.settings.daily_limit,
            smoke_free_days: self.progress.smoke_free_days,
            longest_streak: self.progress.longest_streak,
            money_saved: self.settings.cost.money_saved(self.progress.total_cigarettes),
            currency: self.settings.cost.currency.clone(),
            total_days: now / 86_400_000,
            is_scheduled: mode.uses_schedule() && self.engine.schedule().is_active,
            next_unlock: self.engine.time_until_next_scheduled_unlock(wall.as_ref()),
            active_session: session.as_ref().map(|s| s.session_id.clone()),
            session_elapsed: session.as_ref().map(|s| s.elapsed_seconds),
            message_count: session.as_ref().map(|s| s.message_count),
            network_connected: self.network_connected(),
        }
    }

    pub fn get_config(&self) -> ConfigResponse {
        ConfigResponse {
            timer_mode: self.engine.mode(),
            interval_minutes: self.engine.interval_minutes(),
            daily_limit: self.settings.daily_limit,
            emergency_unlocks: self.admission.max_per_day(),
            schedule: *self.engine.schedule(),
            settings: self.settings.clone(),
        }
    }

    /// Screen for the current state, ignoring the refresh cadence.
    pub fn current_screen(&self) -> Screen {
        let now = self.clock.uptime_ms();
        if let Some((message, until)) = &self.notice {
            if now < *until {
                return Screen::Notice {
                    message: message.clone(),
                };
            }
        }
        match self.machine.state() {
            BoxState::Setup => self.setup_screen(),
            BoxState::Unlocked => Screen::Unlocked,
            _ if self.engine.is_running() => Screen::Countdown {
                remaining_seconds: self.engine.time_remaining_ms(now).div_ceil(1000),
            },
            _ if self.engine.mode().uses_schedule() => {
                let schedule = self.engine.schedule();
                Screen::Scheduled {
                    mode: self.engine.mode(),
                    until_next_seconds: self
                        .engine
                        .time_until_next_scheduled_unlock(self.clock.wall_clock().as_ref()),
                    hour: schedule.hour,
                    minute: schedule.minute,
                }
            }
            _ => Screen::Locked,
        }
    }

    fn setup_screen(&self) -> Screen {
        Screen::Setup {
            network_connected: self.network_connected(),
        }
    }

    fn network_connected(&self) -> bool {
        self.config.network.ap_mode || !self.config.network.ssid.is_empty()
    }

    // ── Loop ─────────────────────────────────────────────────────────

    /// Queue a button edge for the next tick.
    pub fn press_button(&mut self) {
        self.button_pending = true;
    }

    /// One pass of the control loop. Returns the events it produced,
    /// together with any left by operations since the last tick.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.uptime_ms();
        let wall = self.clock.wall_clock();

        if std::mem::take(&mut self.button_pending) {
            self.handle_button(now, wall.as_ref());
        }

        for event in self.engine.tick(now, wall.as_ref()) {
            match event {
                TimerEvent::CountdownExpired => {
                    if self.engine.consume_triggered() {
                        self.on_countdown_expired(now, wall.as_ref());
                    }
                }
                TimerEvent::ScheduledUnlock {
                    unlock_duration_minutes,
                } => self.on_scheduled_unlock(unlock_duration_minutes, now, wall.as_ref()),
            }
        }

        if let Some(at) = self.relock_at_ms {
            if now >= at && self.machine.state() == BoxState::Unlocked {
                self.relock_at_ms = None;
                self.enter(BoxState::Locked, Cause::UnlockWindowClosed, now);
                self.persist(self.lock_entries(now, wall.as_ref()));
            }
        }

        if self.admission.roll_window(now, wall.as_ref()) {
            self.progress.today_count = 0;
            self.outbox.push(Event::EmergencyWindowReset { at_ms: now });
            let mut entries = self.admission.entries();
            entries.push((keys::TODAY_COUNT, StoreValue::Int(0)));
            self.persist(entries);
        }

        if let Some((_, until)) = &self.notice {
            if now >= *until {
                self.notice = None;
                self.machine.force_refresh();
            }
        }

        if self.machine.display_due(now) {
            let screen = self.current_screen();
            self.display.render(&screen);
            self.machine
                .mark_rendered(now, self.config.device.display_refresh_ms);
        }

        if now.saturating_sub(self.last_flush_ms) >= self.config.device.flush_interval_secs * 1000 {
            self.flush_at(now, wall.as_ref());
        }

        self.drain_events()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    fn handle_button(&mut self, now: u64, wall: Option<&DateTime<FixedOffset>>) {
        if self.machine.is_locked() {
            tracing::info!("button pressed while locked: emergency request");
            if let Err(Denial::LimitExceeded) = self.grant(GrantKind::Manual, Cause::Button) {
                self.show_notice("Emergency limit reached!", now);
            }
        } else if self.machine.state() == BoxState::Unlocked {
            tracing::info!("button pressed while unlocked: closing box");
            self.start_lockout(now, wall, Cause::Button);
        }
    }

    fn on_countdown_expired(&mut self, now: u64, wall: Option<&DateTime<FixedOffset>>) {
        self.progress.record_unlock(wall.map(epoch_ms));
        let next = self.engine.apply_policy(self.progress.total_cigarettes);
        tracing::info!(
            total = self.progress.total_cigarettes,
            next_interval = ?next,
            "countdown finished, unlocking"
        );
        self.enter(BoxState::Unlocked, Cause::TimerExpired, now);
        self.outbox.push(Event::TimerUnlocked {
            total_cigarettes: self.progress.total_cigarettes,
            next_interval_minutes: next,
            at_ms: now,
        });

        let mut entries = self.progress.entries();
        entries.extend(self.engine.config_entries());
        entries.extend(self.lock_entries(now, wall));
        self.persist(entries);
    }

    fn on_scheduled_unlock(
        &mut self,
        unlock_duration_minutes: u32,
        now: u64,
        wall: Option<&DateTime<FixedOffset>>,
    ) {
        // The watermark must land before anything else can fail.
        self.persist(vec![self.engine.watermark_entry()]);
        self.outbox.push(Event::ScheduledUnlock {
            unlock_duration_minutes,
            at_ms: now,
        });
        self.relock_at_ms = Some(now + unlock_duration_minutes as u64 * 60_000);
        if self.machine.is_locked() {
            self.enter(BoxState::Unlocked, Cause::Schedule, now);
        }
        self.persist(self.lock_entries(now, wall));
    }

    /// Close the box and start whatever lockout the mode prescribes.
    fn start_lockout(&mut self, now: u64, wall: Option<&DateTime<FixedOffset>>, cause: Cause) {
        self.relock_at_ms = None;
        if self.engine.mode().uses_interval() {
            let duration_ms = self.engine.interval_ms();
            self.engine.start(now, duration_ms);
            self.admission.clear_pending_penalty();
            self.outbox.push(Event::CountdownStarted {
                duration_ms,
                at_ms: now,
            });
        } else {
            self.engine.stop();
        }
        self.enter(BoxState::Locked, cause, now);
        let mut entries = self.lock_entries(now, wall);
        entries.extend(self.admission.entries());
        self.persist(entries);
    }

    fn enter(&mut self, to: BoxState, cause: Cause, now: u64) {
        if let Some(t) = self.machine.transition(to, now, self.actuator.as_mut()) {
            self.outbox.push(Event::StateChanged {
                from: t.from,
                to: t.to,
                cause,
                at_ms: t.at_ms,
            });
        }
    }

    fn show_notice(&mut self, message: &str, now: u64) {
        self.notice = Some((message.to_string(), now + NOTICE_MS));
        self.machine.force_refresh();
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Open the box without a grant. No penalty, no usage counted.
    pub fn manual_unlock(&mut self) -> Result<(), Denial> {
        if self.machine.state() == BoxState::Unlocked {
            return Err(Denial::AlreadyUnlocked);
        }
        let now = self.clock.uptime_ms();
        let wall = self.clock.wall_clock();
        self.engine.stop();
        self.relock_at_ms = None;
        self.enter(BoxState::Unlocked, Cause::Manual, now);
        self.persist(self.lock_entries(now, wall.as_ref()));
        Ok(())
    }

    /// Close the box and start the next lockout. Returns false when the
    /// box was already locked.
    pub fn lock(&mut self) -> bool {
        if self.machine.is_locked() {
            return false;
        }
        let now = self.clock.uptime_ms();
        let wall = self.clock.wall_clock();
        self.start_lockout(now, wall.as_ref(), Cause::Manual);
        true
    }

    pub fn emergency_unlock(&mut self) -> Result<Grant, Denial> {
        self.grant(GrantKind::Manual, Cause::Emergency)
    }

    fn grant(&mut self, kind: GrantKind, cause: Cause) -> Result<Grant, Denial> {
        let now = self.clock.uptime_ms();
        let wall = self.clock.wall_clock();
        let result = if !self.machine.is_locked() && self.admission.remaining_today() > 0 {
            Err(Denial::AlreadyUnlocked)
        } else {
            self.admission.request(kind)
        };

        match result {
            Ok(grant) => {
                self.engine.add_penalty(grant.penalty_minutes);
                self.engine.stop();
                self.relock_at_ms = None;
                self.enter(BoxState::Unlocked, cause, now);
                self.outbox.push(Event::EmergencyGranted {
                    kind,
                    penalty_minutes: grant.penalty_minutes,
                    count_today: grant.count_today,
                    at_ms: now,
                });
                let mut entries = self.admission.entries();
                entries.extend(self.engine.config_entries());
                entries.extend(self.lock_entries(now, wall.as_ref()));
                self.persist(entries);
                Ok(grant)
            }
            Err(reason) => {
                self.outbox.push(Event::EmergencyDenied { reason, at_ms: now });
                Err(reason)
            }
        }
    }

    pub fn start_ai_session(&mut self, trigger: &str) -> Result<AiSession, Denial> {
        let now = self.clock.uptime_ms();
        let network = &self.config.network;
        let allowed = self
            .settings
            .network
            .is_allowed_on_current_network(&network.ssid, network.ap_mode);

        let (session, SessionStarted { min_duration_seconds, fresh }) =
            self.gatekeeper.start_session(trigger, now, allowed)?;
        let session_id = session.id.clone();

        if fresh {
            self.outbox.push(Event::SessionStarted {
                session_id: session_id.clone(),
                at_ms: now,
            });
            self.persist(vec![(keys::AI_SESSION_ID, StoreValue::Text(session_id.clone()))]);
        }
        Ok(AiSession {
            session_id,
            min_duration_seconds,
            fresh,
        })
    }

    /// Count a chat message and return the scripted reply.
    pub fn ai_chat(&mut self, message: &str) -> Result<ChatTurn, Denial> {
        let now = self.clock.uptime_ms();
        let result = self.gatekeeper.submit_message(message, now);
        self.forget_expired_session(&result);
        result
    }

    /// Remote provider call to make for the chat message just counted,
    /// when the remote provider is configured.
    pub fn remote_reply_job(&self, message: &str) -> Option<RemoteReplyJob> {
        let ai = &self.settings.ai;
        if ai.provider != AiProvider::OpenAi || !ai.has_api_key() {
            return None;
        }
        let session = self.gatekeeper.session()?;
        Some(RemoteReplyJob {
            responder: RemoteResponder::from_config(&self.config.ai, &ai.api_key),
            personality: session.personality,
            trigger: session.trigger_kind,
            message: message.to_string(),
        })
    }

    /// Restart the reflection, optionally for another trigger or voice.
    pub fn start_reflection(
        &mut self,
        trigger: &str,
        personality: Option<Personality>,
    ) -> Result<ReflectionStep, Denial> {
        let now = self.clock.uptime_ms();
        let result = self.gatekeeper.start_reflection(trigger, personality, now);
        self.forget_expired_session(&result);
        result
    }

    pub fn reflection_question(&mut self) -> Result<ReflectionStep, Denial> {
        let now = self.clock.uptime_ms();
        let result = self.gatekeeper.next_question(now);
        self.forget_expired_session(&result);
        result
    }

    pub fn reflection_answer(&mut self, answer: &str) -> Result<ReflectionTurn, Denial> {
        let now = self.clock.uptime_ms();
        let result = self.gatekeeper.record_response(answer, now);
        self.forget_expired_session(&result);
        result
    }

    /// Grant an emergency unlock for a completed gatekeeper session, at
    /// double penalty. Eligibility is re-checked here.
    pub fn complete_ai_session(&mut self) -> Result<Grant, Denial> {
        let now = self.clock.uptime_ms();
        let check = self.gatekeeper.check_completion(now);
        self.forget_expired_session(&check);
        check?;

        let grant = self.grant(GrantKind::AiGated, Cause::Gatekeeper)?;
        if let Some(session) = self.gatekeeper.finish() {
            self.outbox.push(Event::SessionCompleted {
                session_id: session.id,
                message_count: session.message_count,
                at_ms: now,
            });
        }
        self.remove_key(keys::AI_SESSION_ID);
        Ok(grant)
    }

    /// Walk away from the running session. No grant, nothing counted.
    pub fn abandon_ai_session(&mut self) -> Result<(), Denial> {
        let now = self.clock.uptime_ms();
        let session = self.gatekeeper.abandon().ok_or(Denial::NoActiveSession)?;
        self.outbox.push(Event::SessionAbandoned {
            session_id: session.id,
            message_count: session.message_count,
            at_ms: now,
        });
        self.remove_key(keys::AI_SESSION_ID);
        Ok(())
    }

    fn forget_expired_session<T>(&mut self, result: &Result<T, Denial>) {
        if let Err(Denial::SessionExpired) = result {
            self.remove_key(keys::AI_SESSION_ID);
        }
    }

    pub fn set_config(&mut self, update: ConfigUpdate) -> Result<ConfigResponse, CoreError> {
        if let Some(minutes) = update.interval_minutes {
            if !(MIN_TIMER_MINUTES..=MAX_TIMER_MINUTES).contains(&minutes) {
                return Err(ValidationError::OutOfRange {
                    field: "interval_minutes".into(),
                    value: minutes as i64,
                    min: MIN_TIMER_MINUTES as i64,
                    max: MAX_TIMER_MINUTES as i64,
                }
                .into());
            }
        }

        let mode = update.timer_mode.unwrap_or(self.engine.mode());
        if let Some(s) = update.schedule {
            if mode == TimerMode::WeeklySchedule {
                let week_day = s.week_day.unwrap_or(self.engine.schedule().week_day);
                self.engine
                    .set_weekly_schedule(week_day, s.hour, s.minute, s.unlock_duration_minutes)?;
            } else {
                self.engine
                    .set_daily_schedule(s.hour, s.minute, s.unlock_duration_minutes)?;
            }
        }
        if let Some(minutes) = update.interval_minutes {
            self.engine.set_interval_minutes(minutes);
        }
        if let Some(limit) = update.daily_limit {
            self.settings.daily_limit = limit;
        }

        let now = self.clock.uptime_ms();
        let wall = self.clock.wall_clock();
        if mode != self.engine.mode() {
            tracing::info!(from = ?self.engine.mode(), to = ?mode, "timer mode changed");
            self.engine.set_mode(mode);
            if self.machine.is_locked() {
                if mode.uses_interval() && !self.engine.is_running() {
                    self.engine.start(now, self.engine.interval_ms());
                } else if !mode.uses_interval() {
                    self.engine.stop();
                }
            }
        }

        let mut entries = self.engine.config_entries();
        entries.extend(self.engine.schedule_entries());
        entries.push((keys::DAILY_LIMIT, StoreValue::Int(self.settings.daily_limit as i64)));
        entries.extend(self.lock_entries(now, wall.as_ref()));
        self.persist(entries);
        self.machine.force_refresh();
        Ok(self.get_config())
    }

    /// Change one device setting by its store key.
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.settings.apply(key, value)?;
        self.actuator.set_calibration(self.settings.servo);
        self.gatekeeper.set_settings(self.settings.ai.gatekeeper());
        let entries = self
            .settings
            .entries()
            .into_iter()
            .filter(|(k, _)| *k == key)
            .collect();
        self.persist(entries);
        Ok(())
    }

    /// Update the host's view of the joined network.
    pub fn set_network(&mut self, ssid: &str, ap_mode: bool) {
        self.config.network.ssid = ssid.to_string();
        self.config.network.ap_mode = ap_mode;
    }

    /// Clear every persisted key and return to an unlocked, unconfigured box.
    pub fn reset_progress(&mut self) -> Result<(), CoreError> {
        let now = self.clock.uptime_ms();
        let wall = self.clock.wall_clock();
        self.store.clear()?;
        self.pending_writes.clear();

        self.settings = BoxSettings::default();
        self.engine = TimerEngine::default();
        self.admission = AdmissionController::new(self.config.device.emergency_reset);
        self.admission.roll_window(now, wall.as_ref());
        self.gatekeeper = Gatekeeper::new(self.settings.ai.gatekeeper());
        self.progress = Progress::default();
        self.relock_at_ms = None;
        self.notice = None;
        self.actuator.set_calibration(self.settings.servo);

        self.enter(BoxState::Unlocked, Cause::Reset, now);
        self.outbox.push(Event::ProgressReset { at_ms: now });
        tracing::info!("progress reset");
        self.persist(self.lock_entries(now, wall.as_ref()));
        Ok(())
    }

    /// End positions a test sweep visits: unlocked, then locked.
    pub fn servo_sweep_ends(&self) -> [u8; 2] {
        let cal = self.settings.servo;
        [cal.unlocked_angle, cal.locked_angle]
    }

    pub fn drive_servo(&mut self, angle: u8) {
        self.actuator.move_to(angle);
    }

    /// Put the latch where the current state needs it, whatever moved it
    /// last. Returns the angle driven to.
    pub fn rest_servo(&mut self) -> u8 {
        let cal = self.settings.servo;
        let angle = if self.machine.state() == BoxState::Unlocked {
            cal.unlocked_angle
        } else {
            cal.locked_angle
        };
        self.actuator.move_to(angle);
        angle
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Write periodic state now.
    pub fn flush(&mut self) {
        let now = self.clock.uptime_ms();
        let wall = self.clock.wall_clock();
        self.flush_at(now, wall.as_ref());
    }

    fn flush_at(&mut self, now: u64, wall: Option<&DateTime<FixedOffset>>) {
        self.last_flush_ms = now;
        let mut entries: Vec<_> = std::mem::take(&mut self.pending_writes).into_iter().collect();
        if let Some(wall) = wall {
            self.progress.refresh_smoke_free(epoch_ms(wall));
        }
        entries.extend(self.machine.entries(wall.map(epoch_ms).unwrap_or(0)));
        entries.push((
            keys::REMAINING_MS,
            StoreValue::U64(self.engine.time_remaining_ms(now)),
        ));
        entries.extend(self.window_entries(now, wall));
        entries.push((keys::DAYS_SMOKE_FREE, StoreValue::U64(self.progress.smoke_free_days)));
        entries.push((keys::LONGEST_STREAK, StoreValue::U64(self.progress.longest_streak)));
        tracing::debug!(entries = entries.len(), "flushing state");
        self.persist(entries);
    }

    /// Entries describing the lock: state, deadline, remainder.
    fn lock_entries(
        &self,
        now: u64,
        wall: Option<&DateTime<FixedOffset>>,
    ) -> Vec<(&'static str, StoreValue)> {
        let remaining = self.engine.time_remaining_ms(now);
        let lock_until = match wall {
            Some(wall) if self.engine.is_running() => {
                (epoch_ms(wall) + remaining).div_ceil(1000)
            }
            _ => 0,
        };
        let mut entries = self.machine.entries(wall.map(epoch_ms).unwrap_or(0));
        entries.push((keys::LOCK_UNTIL, StoreValue::U64(lock_until)));
        entries.push((keys::REMAINING_MS, StoreValue::U64(remaining)));
        entries.extend(self.window_entries(now, wall));
        entries
    }

    /// Entries describing an open scheduled unlock window.
    fn window_entries(
        &self,
        now: u64,
        wall: Option<&DateTime<FixedOffset>>,
    ) -> [(&'static str, StoreValue); 2] {
        // A window still open keeps a non-zero remainder so a reboot finds it.
        let left = self.relock_at_ms.map(|at| at.saturating_sub(now).max(1));
        let relock_at = match (left, wall) {
            (Some(left), Some(wall)) => (epoch_ms(wall) + left).div_ceil(1000),
            _ => 0,
        };
        [
            (keys::RELOCK_AT, StoreValue::U64(relock_at)),
            (keys::RELOCK_REMAINING_MS, StoreValue::U64(left.unwrap_or(0))),
        ]
    }

    /// Write entries, retrying each once. Entries that still fail are
    /// queued for the next flush.
    fn persist(&mut self, entries: Vec<(&'static str, StoreValue)>) {
        let mut failed = false;
        for (key, value) in entries {
            let first = self.store.put(key, value.clone());
            let result = match first {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::warn!(key, error = %e, "store write failed, retrying");
                    self.store.put(key, value.clone())
                }
            };
            match result {
                Ok(()) => {
                    self.pending_writes.remove(key);
                }
                Err(e) => {
                    tracing::error!(key, error = %e, "store write failed twice, queued for next flush");
                    self.pending_writes.insert(key, value);
                    failed = true;
                }
            }
        }
        if failed {
            self.outbox.push(Event::PersistenceFailed {
                pending_keys: self.pending_writes.len(),
                at_ms: self.clock.uptime_ms(),
            });
        }
    }

    fn remove_key(&mut self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "store remove failed");
        }
    }
}

fn epoch_ms(wall: &DateTime<FixedOffset>) -> u64 {
    wall.timestamp_millis().max(0) as u64
}
