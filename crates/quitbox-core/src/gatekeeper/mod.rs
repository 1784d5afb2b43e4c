//! AI gatekeeper: a timed conversation that must be held before an
//! emergency unlock is granted through it.

mod reflection;
mod remote;
mod script;
mod session;

pub use reflection::{Reflection, ReflectionStep, REFLECTION_QUESTIONS};
pub use remote::{ChatPrompt, RemoteError, RemoteResponder};
pub use script::{scripted_reply, system_prompt, Personality, Trigger};
pub use session::{
    ChatTurn, Gatekeeper, GatekeeperSession, GatekeeperSettings, ReflectionStatus, ReflectionTurn,
    SessionStarted, SessionStatus,
};
