//! Async host for a [`Controller`].
//!
//! A spawned task ticks the controller at `device.tick_interval_ms` and
//! feeds it button edges. Operations from other tasks take the same lock,
//! so ticks and operations never interleave. Remote AI replies are
//! fetched after the lock is released.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{ConfigResponse, ConfigUpdate, StatusResponse};
use crate::controller::{AiSession, Controller};
use crate::emergency::Grant;
use crate::error::{CoreError, Denial};
use crate::events::Event;
use crate::gatekeeper::{ChatTurn, Personality, ReflectionStep, ReflectionTurn};

/// Buffered button edges before presses are dropped.
const BUTTON_QUEUE: usize = 8;

#[derive(Clone)]
pub struct BoxService {
    controller: Arc<Mutex<Controller>>,
    buttons: mpsc::Sender<()>,
    shutdown: Arc<watch::Sender<bool>>,
    servo_settle: Duration,
}

impl BoxService {
    /// Start the control loop. Events produced by ticks are sent to the
    /// returned receiver; the loop keeps running if it is dropped.
    pub fn spawn(controller: Controller) -> (Self, mpsc::UnboundedReceiver<Event>, JoinHandle<()>) {
        let device = controller.config().device.clone();
        let controller = Arc::new(Mutex::new(controller));
        let (button_tx, button_rx) = mpsc::channel(BUTTON_QUEUE);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_loop(
            Arc::clone(&controller),
            button_rx,
            shutdown_rx,
            event_tx,
            Duration::from_millis(device.tick_interval_ms.max(1)),
        ));

        let service = Self {
            controller,
            buttons: button_tx,
            shutdown: Arc::new(shutdown_tx),
            servo_settle: Duration::from_millis(device.servo_settle_ms),
        };
        (service, event_rx, task)
    }

    /// Stop the loop after a final flush.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Queue a physical button edge.
    pub fn press_button(&self) {
        if self.buttons.try_send(()).is_err() {
            tracing::warn!("button queue full, press dropped");
        }
    }

    pub async fn status(&self) -> StatusResponse {
        self.controller.lock().await.get_status()
    }

    pub async fn config(&self) -> ConfigResponse {
        self.controller.lock().await.get_config()
    }

    pub async fn set_config(&self, update: ConfigUpdate) -> Result<ConfigResponse, CoreError> {
        self.controller.lock().await.set_config(update)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.controller.lock().await.set_setting(key, value)
    }

    pub async fn manual_unlock(&self) -> Result<(), Denial> {
        self.controller.lock().await.manual_unlock()
    }

    pub async fn lock(&self) -> bool {
        self.controller.lock().await.lock()
    }

    pub async fn emergency_unlock(&self) -> Result<Grant, Denial> {
        self.controller.lock().await.emergency_unlock()
    }

    pub async fn start_ai_session(&self, trigger: &str) -> Result<AiSession, Denial> {
        self.controller.lock().await.start_ai_session(trigger)
    }

    /// Count a chat message. With a remote provider configured the reply
    /// comes from it, falling back to the scripted reply on any failure.
    pub async fn ai_chat(&self, message: &str) -> Result<ChatTurn, Denial> {
        let (mut turn, job) = {
            let mut controller = self.controller.lock().await;
            let turn = controller.ai_chat(message)?;
            (turn, controller.remote_reply_job(message))
        };
        if let Some(job) = job {
            let fallback = std::mem::take(&mut turn.reply);
            turn.reply = job.responder.reply_or(job.prompt(), fallback).await;
        }
        Ok(turn)
    }

    pub async fn start_reflection(
        &self,
        trigger: &str,
        personality: Option<Personality>,
    ) -> Result<ReflectionStep, Denial> {
        self.controller.lock().await.start_reflection(trigger, personality)
    }

    pub async fn reflection_question(&self) -> Result<ReflectionStep, Denial> {
        self.controller.lock().await.reflection_question()
    }

    pub async fn reflection_answer(&self, answer: &str) -> Result<ReflectionTurn, Denial> {
        self.controller.lock().await.reflection_answer(answer)
    }

    pub async fn complete_ai_session(&self) -> Result<Grant, Denial> {
        self.controller.lock().await.complete_ai_session()
    }

    pub async fn abandon_ai_session(&self) -> Result<(), Denial> {
        self.controller.lock().await.abandon_ai_session()
    }

    pub async fn reset_progress(&self) -> Result<(), CoreError> {
        self.controller.lock().await.reset_progress()
    }

    /// Sweep the servo through both end positions and back, pausing for
    /// it to settle between moves. The lock is released while waiting, so
    /// the final position is read from the state at the last step.
    pub async fn test_servo_sweep(&self) -> Vec<u8> {
        let ends = self.controller.lock().await.servo_sweep_ends();
        tracing::info!(?ends, "servo test sweep");
        let mut moves = Vec::with_capacity(3);
        for angle in ends {
            self.controller.lock().await.drive_servo(angle);
            moves.push(angle);
            tokio::time::sleep(self.servo_settle).await;
        }
        moves.push(self.controller.lock().await.rest_servo());
        moves
    }

    /// Events left by operations since the last tick.
    pub async fn drain_events(&self) -> Vec<Event> {
        self.controller.lock().await.drain_events()
    }
}

async fn run_loop(
    controller: Arc<Mutex<Controller>>,
    mut buttons: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<Event>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            Some(()) = buttons.recv() => {
                controller.lock().await.press_button();
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }

        let produced = controller.lock().await.tick();
        for event in produced {
            tracing::debug!(?event, "controller event");
            let _ = events.send(event);
        }
    }

    controller.lock().await.flush();
    tracing::debug!("control loop stopped");
}
