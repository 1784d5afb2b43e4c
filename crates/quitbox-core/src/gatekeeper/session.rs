//! Gatekeeper session state machine.
//!
//! ```text
//! Idle -> Active(0) -> Active(n) -> Eligible -> Completed (back to Idle)
//! ```
//!
//! A session becomes eligible once it has lasted `delay_minutes` and seen
//! `AI_MIN_MESSAGES` user messages. Eligibility is recomputed on every
//! message and again, authoritatively, at completion.
//!
//! Chat messages and reflection answers share one counter; only reflection
//! answers move the reflection cursor. The reflection runs alongside the
//! chat and can be restarted for another trigger or voice without touching
//! the session clock.

use serde::{Deserialize, Serialize};

use super::reflection::{Reflection, ReflectionStep};
use super::script::{scripted_reply, Personality, Trigger};
use crate::error::Denial;
use crate::limits::{AI_EMERGENCY_DELAY_MINUTES, AI_MAX_SESSION_SECS, AI_MIN_MESSAGES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatekeeperSettings {
    pub enabled: bool,
    pub personality: Personality,
    /// Minimum session length before an unlock can be earned.
    pub delay_minutes: u32,
}

impl Default for GatekeeperSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            personality: Personality::default(),
            delay_minutes: AI_EMERGENCY_DELAY_MINUTES,
        }
    }
}

impl GatekeeperSettings {
    pub fn required_secs(&self) -> u64 {
        self.delay_minutes as u64 * 60
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatekeeperSession {
    pub id: String,
    pub trigger: String,
    pub trigger_kind: Trigger,
    pub personality: Personality,
    pub started_ms: u64,
    pub message_count: u32,
    /// Set once the user has entered the reflection.
    pub reflection_mode: bool,
    pub reflection: Reflection,
}

impl GatekeeperSession {
    pub fn elapsed_secs(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_ms) / 1000
    }

    fn is_expired(&self, now_ms: u64) -> bool {
        self.elapsed_secs(now_ms) > AI_MAX_SESSION_SECS
    }
}

/// Reply to a submitted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub reply: String,
    pub elapsed_seconds: u64,
    pub required_seconds: u64,
    pub can_unlock: bool,
    pub message_count: u32,
}

/// Result of a reflection answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionTurn {
    pub next: ReflectionStep,
    pub can_unlock: bool,
    pub message_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub min_duration_seconds: u64,
    /// False when an already running session was handed back.
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub trigger: String,
    pub elapsed_seconds: u64,
    pub required_seconds: u64,
    pub message_count: u32,
    pub can_unlock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionStatus {
    pub reflection_mode: bool,
    pub trigger: Trigger,
    pub personality: Personality,
    pub current_question: usize,
    pub responses: Vec<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Gatekeeper {
    settings: GatekeeperSettings,
    session: Option<GatekeeperSession>,
}

impl Gatekeeper {
    pub fn new(settings: GatekeeperSettings) -> Self {
        Self {
            settings,
            session: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> GatekeeperSettings {
        self.settings
    }

    pub fn session(&self) -> Option<&GatekeeperSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Eligibility of the current session at `now_ms`.
    pub fn can_unlock(&self, now_ms: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| self.meets_requirements(s, now_ms))
    }

    pub fn status(&self, now_ms: u64) -> Option<SessionStatus> {
        self.session.as_ref().map(|s| SessionStatus {
            session_id: s.id.clone(),
            trigger: s.trigger.clone(),
            elapsed_seconds: s.elapsed_secs(now_ms),
            required_seconds: self.settings.required_secs(),
            message_count: s.message_count,
            can_unlock: self.meets_requirements(s, now_ms),
        })
    }

    pub fn reflection_status(&self) -> Option<ReflectionStatus> {
        self.session.as_ref().map(|s| ReflectionStatus {
            reflection_mode: s.reflection_mode,
            trigger: s.reflection.trigger(),
            personality: s.reflection.personality(),
            current_question: s.reflection.cursor(),
            responses: s.reflection.answers().to_vec(),
            completed: s.reflection.is_complete(),
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_settings(&mut self, settings: GatekeeperSettings) {
        self.settings = settings;
    }

    /// Open a session, or hand back the one already running. An expired
    /// session is replaced.
    pub fn start_session(
        &mut self,
        trigger: &str,
        now_ms: u64,
        network_allowed: bool,
    ) -> Result<(&GatekeeperSession, SessionStarted), Denial> {
        if !self.settings.enabled {
            return Err(Denial::AiDisabled);
        }
        if !network_allowed {
            tracing::warn!("gatekeeper session refused on this network");
            return Err(Denial::NetworkBlocked);
        }

        let min_duration_seconds = self.settings.required_secs();
        let reuse = self.session.as_ref().is_some_and(|s| !s.is_expired(now_ms));
        if !reuse {
            let trigger_kind = Trigger::classify(trigger);
            let session = GatekeeperSession {
                id: uuid::Uuid::new_v4().to_string(),
                trigger: trigger.trim().to_string(),
                trigger_kind,
                personality: self.settings.personality,
                started_ms: now_ms,
                message_count: 0,
                reflection_mode: false,
                reflection: Reflection::start(trigger_kind, self.settings.personality),
            };
            tracing::info!(id = %session.id, trigger = trigger_kind.as_str(), "gatekeeper session started");
            self.session = Some(session);
        }

        let session = self.session.as_ref().ok_or(Denial::NoActiveSession)?;
        Ok((
            session,
            SessionStarted {
                min_duration_seconds,
                fresh: !reuse,
            },
        ))
    }

    /// Count a user chat message and produce the scripted reply.
    pub fn submit_message(&mut self, text: &str, now_ms: u64) -> Result<ChatTurn, Denial> {
        let required_seconds = self.settings.required_secs();
        let session = self.live_session(now_ms)?;
        session.message_count += 1;
        let prompt = session.reflection.next_question();
        let reply = scripted_reply(
            session.personality,
            session.trigger_kind,
            session.message_count,
            text,
            prompt.text(),
        );
        let elapsed_seconds = session.elapsed_secs(now_ms);
        let message_count = session.message_count;
        Ok(ChatTurn {
            reply,
            elapsed_seconds,
            required_seconds,
            can_unlock: self.can_unlock(now_ms),
            message_count,
        })
    }

    /// Restart the reflection from its first question. An empty `trigger`
    /// keeps the session's trigger, `None` keeps the session's voice.
    pub fn start_reflection(
        &mut self,
        trigger: &str,
        personality: Option<Personality>,
        now_ms: u64,
    ) -> Result<ReflectionStep, Denial> {
        let session = self.live_session(now_ms)?;
        let trigger_kind = if trigger.trim().is_empty() {
            session.trigger_kind
        } else {
            Trigger::classify(trigger)
        };
        let personality = personality.unwrap_or(session.personality);
        session.reflection = Reflection::start(trigger_kind, personality);
        session.reflection_mode = true;
        tracing::info!(id = %session.id, trigger = trigger_kind.as_str(), "reflection started");
        Ok(session.reflection.next_question())
    }

    /// Current reflection step for the live session.
    pub fn next_question(&mut self, now_ms: u64) -> Result<ReflectionStep, Denial> {
        let session = self.live_session(now_ms)?;
        session.reflection_mode = true;
        Ok(session.reflection.next_question())
    }

    /// Record a reflection answer. Counts as a message.
    pub fn record_response(&mut self, text: &str, now_ms: u64) -> Result<ReflectionTurn, Denial> {
        let session = self.live_session(now_ms)?;
        session.reflection_mode = true;
        session.message_count += 1;
        session.reflection.record_response(text);
        let next = session.reflection.next_question();
        let message_count = session.message_count;
        Ok(ReflectionTurn {
            next,
            can_unlock: self.can_unlock(now_ms),
            message_count,
        })
    }

    /// Authoritative eligibility check before a grant. Leaves the session
    /// running so a refused grant can be retried.
    pub fn check_completion(&mut self, now_ms: u64) -> Result<(), Denial> {
        let session = self.live_session(now_ms)?;
        let session = session.clone();
        if !self.meets_requirements(&session, now_ms) {
            tracing::warn!(
                elapsed = session.elapsed_secs(now_ms),
                messages = session.message_count,
                "gatekeeper completion refused: requirements not met"
            );
            return Err(Denial::RequirementsNotMet);
        }
        Ok(())
    }

    /// Close the session after its grant went through.
    pub fn finish(&mut self) -> Option<GatekeeperSession> {
        let session = self.session.take();
        if let Some(s) = &session {
            tracing::info!(id = %s.id, messages = s.message_count, "gatekeeper session completed");
        }
        session
    }

    /// Drop the session without granting.
    pub fn abandon(&mut self) -> Option<GatekeeperSession> {
        let session = self.session.take();
        if let Some(s) = &session {
            tracing::info!(id = %s.id, messages = s.message_count, "gatekeeper session abandoned");
        }
        session
    }

    fn live_session(&mut self, now_ms: u64) -> Result<&mut GatekeeperSession, Denial> {
        let expired = match &self.session {
            None => return Err(Denial::NoActiveSession),
            Some(s) => s.is_expired(now_ms),
        };
        if expired {
            if let Some(s) = self.session.take() {
                tracing::warn!(id = %s.id, "gatekeeper session expired");
            }
            return Err(Denial::SessionExpired);
        }
        self.session.as_mut().ok_or(Denial::NoActiveSession)
    }

    fn meets_requirements(&self, session: &GatekeeperSession, now_ms: u64) -> bool {
        !session.is_expired(now_ms)
            && session.elapsed_secs(now_ms) >= self.settings.required_secs()
            && session.message_count >= AI_MIN_MESSAGES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: u64 = 60_000;

    fn gatekeeper() -> Gatekeeper {
        Gatekeeper::new(GatekeeperSettings::default())
    }

    #[test]
    fn disabled_or_blocked_sessions_are_refused() {
        let mut gk = Gatekeeper::new(GatekeeperSettings {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(gk.start_session("stress", 0, true).unwrap_err(), Denial::AiDisabled);

        let mut gk = gatekeeper();
        assert_eq!(gk.start_session("stress", 0, false).unwrap_err(), Denial::NetworkBlocked);
        assert!(!gk.is_active());
    }

    #[test]
    fn operations_without_session_are_denied() {
        let mut gk = gatekeeper();
        assert_eq!(gk.submit_message("hi", 0).unwrap_err(), Denial::NoActiveSession);
        assert_eq!(gk.check_completion(0).unwrap_err(), Denial::NoActiveSession);
        assert_eq!(gk.record_response("x", 0).unwrap_err(), Denial::NoActiveSession);
    }

    #[test]
    fn restarting_reuses_the_live_session() {
        let mut gk = gatekeeper();
        let (first, started) = gk.start_session("stress at work", 0, true).unwrap();
        let first_id = first.id.clone();
        assert!(started.fresh);
        assert_eq!(started.min_duration_seconds, 600);
        gk.submit_message("hello", MIN).unwrap();

        let (again, started) = gk.start_session("boredom", 2 * MIN, true).unwrap();
        assert!(!started.fresh);
        assert_eq!(again.id, first_id);
        assert_eq!(again.trigger, "stress at work");
        assert_eq!(again.message_count, 1);
    }

    #[test]
    fn expired_session_is_denied_then_replaced() {
        let mut gk = gatekeeper();
        gk.start_session("habit", 0, true).unwrap();
        let late = (AI_MAX_SESSION_SECS + 1) * 1000;
        assert_eq!(gk.submit_message("hi", late).unwrap_err(), Denial::SessionExpired);
        assert!(!gk.is_active());

        gk.start_session("habit", 0, true).unwrap();
        let (fresh, started) = gk.start_session("anger", late, true).unwrap();
        assert!(started.fresh);
        assert_eq!(fresh.trigger_kind, Trigger::Anger);
    }

    #[test]
    fn completion_requires_time_and_messages() {
        let mut gk = gatekeeper();
        gk.start_session("stress", 0, true).unwrap();
        for i in 0..5 {
            gk.submit_message("msg", i * MIN).unwrap();
        }
        // enough messages, not enough time
        for _ in 0..3 {
            assert_eq!(gk.check_completion(9 * MIN).unwrap_err(), Denial::RequirementsNotMet);
        }
        assert!(gk.is_active());
        assert!(gk.check_completion(10 * MIN).is_ok());
        let closed = gk.finish().unwrap();
        assert_eq!(closed.message_count, 5);
        assert!(!gk.is_active());
    }

    #[test]
    fn time_alone_is_not_enough() {
        let mut gk = gatekeeper();
        gk.start_session("stress", 0, true).unwrap();
        for _ in 0..4 {
            gk.submit_message("msg", 0).unwrap();
        }
        assert!(!gk.can_unlock(20 * MIN));
        assert_eq!(gk.check_completion(20 * MIN).unwrap_err(), Denial::RequirementsNotMet);
    }

    #[test]
    fn chat_turn_reports_progress() {
        let mut gk = gatekeeper();
        gk.start_session("stress", 0, true).unwrap();
        let mut turn = gk.submit_message("hi", 0).unwrap();
        for i in 1..5 {
            turn = gk.submit_message("more", 11 * MIN + i).unwrap();
        }
        assert_eq!(turn.message_count, 5);
        assert_eq!(turn.required_seconds, 600);
        assert_eq!(turn.elapsed_seconds, 660);
        assert!(turn.can_unlock);
    }

    #[test]
    fn third_message_asks_the_current_reflection_question() {
        let mut gk = gatekeeper();
        gk.start_session("so stressed", 0, true).unwrap();
        let question = gk.next_question(0).unwrap();
        gk.submit_message("a", 0).unwrap();
        gk.submit_message("b", 0).unwrap();
        let third = gk.submit_message("c", 0).unwrap();
        assert_eq!(third.reply, question.text());
    }

    #[test]
    fn chat_then_reflection_share_one_counter() {
        let mut gk = gatekeeper();
        gk.start_session("bored", 0, true).unwrap();
        gk.submit_message("a", 0).unwrap();
        gk.submit_message("b", 0).unwrap();
        let turn = gk.record_response("answer", 0).unwrap();
        assert_eq!(turn.message_count, 3);
        assert_eq!(gk.session().unwrap().reflection.cursor(), 1);
    }

    #[test]
    fn start_reflection_resets_cursor_and_retargets() {
        let mut gk = gatekeeper();
        gk.start_session("stress", 0, true).unwrap();
        assert!(!gk.reflection_status().unwrap().reflection_mode);
        gk.record_response("deadline", 0).unwrap();
        gk.record_response("shoulders", 0).unwrap();

        let first = gk
            .start_reflection("just bored", Some(Personality::Strict), MIN)
            .unwrap();
        assert!(matches!(first, ReflectionStep::Question { index: 0, .. }));
        let status = gk.reflection_status().unwrap();
        assert!(status.reflection_mode);
        assert_eq!(status.trigger, Trigger::Boredom);
        assert_eq!(status.personality, Personality::Strict);
        assert_eq!(status.current_question, 0);
        assert!(status.responses.is_empty());
        // Counter and session trigger are untouched.
        let session = gk.session().unwrap();
        assert_eq!(session.message_count, 2);
        assert_eq!(session.trigger_kind, Trigger::Stress);
    }

    #[test]
    fn reflection_completes_after_five_answers() {
        let mut gk = gatekeeper();
        gk.start_session("habit", 0, true).unwrap();
        gk.start_reflection("", None, 0).unwrap();
        for i in 0..4 {
            gk.record_response(&format!("a{i}"), 0).unwrap();
            assert!(!gk.reflection_status().unwrap().completed);
        }
        let turn = gk.record_response("a4", 0).unwrap();
        assert!(matches!(turn.next, ReflectionStep::Summary { .. }));
        let status = gk.reflection_status().unwrap();
        assert!(status.completed);
        assert_eq!(status.current_question, 5);
        assert_eq!(status.responses.len(), 5);
    }

    #[test]
    fn start_reflection_needs_a_session() {
        let mut gk = gatekeeper();
        assert_eq!(gk.start_reflection("stress", None, 0).unwrap_err(), Denial::NoActiveSession);
    }

    #[test]
    fn abandoned_session_is_gone() {
        let mut gk = gatekeeper();
        gk.start_session("stress", 0, true).unwrap();
        let dropped = gk.abandon().unwrap();
        assert_eq!(dropped.trigger, "stress");
        assert!(gk.abandon().is_none());
        assert_eq!(gk.submit_message("hi", 0).unwrap_err(), Denial::NoActiveSession);
        let (_, started) = gk.start_session("stress", 0, true).unwrap();
        assert!(started.fresh);
    }

    #[test]
    fn reflection_then_chat_share_one_counter() {
        let mut gk = gatekeeper();
        gk.start_session("bored", 0, true).unwrap();
        for _ in 0..4 {
            gk.record_response("answer", 0).unwrap();
        }
        let turn = gk.submit_message("still here", 10 * MIN).unwrap();
        assert_eq!(turn.message_count, 5);
        assert!(turn.can_unlock);
        assert_eq!(gk.session().unwrap().reflection.cursor(), 4);
    }
}
