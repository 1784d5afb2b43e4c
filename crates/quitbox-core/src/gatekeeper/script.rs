//! Scripted gatekeeper replies.
//!
//! The conversation is keyed by how many user messages the session has
//! seen:
//!
//! | count | stage                  |
//! |-------|------------------------|
//! | 1     | welcome                |
//! | 2     | trigger analysis       |
//! | 3     | first reflection ask   |
//! | 4     | reflect on the answer  |
//! | 5     | coping strategy        |
//! | 6+    | encouragement loop     |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Voice of the gatekeeper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    #[default]
    Supportive,
    Strict,
    Humorous,
    Motivational,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Supportive,
        Personality::Strict,
        Personality::Humorous,
        Personality::Motivational,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Personality::Supportive => "supportive",
            Personality::Strict => "strict",
            Personality::Humorous => "humorous",
            Personality::Motivational => "motivational",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            Personality::Supportive => {
                "You are a warm, patient coach helping someone resist a cigarette craving."
            }
            Personality::Strict => {
                "You are a firm, no-nonsense coach. Hold the user accountable for their goal to quit smoking."
            }
            Personality::Humorous => {
                "You are a light-hearted coach who uses gentle humour to defuse cigarette cravings."
            }
            Personality::Motivational => {
                "You are an energetic coach who reminds the user how far they have come in quitting smoking."
            }
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supportive" => Ok(Personality::Supportive),
            "strict" => Ok(Personality::Strict),
            "humorous" | "funny" => Ok(Personality::Humorous),
            "motivational" => Ok(Personality::Motivational),
            other => Err(ValidationError::InvalidValue {
                field: "ai_personality".into(),
                message: format!("unknown personality '{other}'"),
            }),
        }
    }
}

/// Category of the craving the user reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Stress,
    Boredom,
    Anger,
    Habit,
    #[default]
    Other,
}

impl Trigger {
    /// Classify free text by keyword. Anything unrecognised is `Other`.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has(&["stress", "anxious", "anxiety", "pressure", "overwhelm", "worried"]) {
            Trigger::Stress
        } else if has(&["bored", "boring", "nothing to do", "idle"]) {
            Trigger::Boredom
        } else if has(&["angry", "anger", "mad", "furious", "annoyed", "frustrat"]) {
            Trigger::Anger
        } else if has(&["habit", "always", "after meal", "coffee", "routine", "usual"]) {
            Trigger::Habit
        } else {
            Trigger::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Stress => "stress",
            Trigger::Boredom => "boredom",
            Trigger::Anger => "anger",
            Trigger::Habit => "habit",
            Trigger::Other => "other",
        }
    }
}

fn welcome(p: Personality) -> &'static str {
    match p {
        Personality::Supportive => {
            "Hi, I'm here with you. Cravings pass. Tell me what's going on right now."
        }
        Personality::Strict => "You asked to open the box early. Explain why.",
        Personality::Humorous => {
            "Ah, the box and I have been expecting you. What's the cigarette whispering today?"
        }
        Personality::Motivational => {
            "You reached out instead of giving in. That's already a win. What's happening?"
        }
    }
}

fn trigger_analysis(p: Personality, trigger: Trigger) -> String {
    let cause = match trigger {
        Trigger::Stress => "It sounds like stress is driving this.",
        Trigger::Boredom => "Sounds like boredom is doing the talking.",
        Trigger::Anger => "It sounds like you're angry, and smoking feels like a release.",
        Trigger::Habit => "This looks like a habit loop kicking in on autopilot.",
        Trigger::Other => "Every craving has a cause, even when it's not obvious.",
    };
    let push = match p {
        Personality::Supportive => "That's completely understandable.",
        Personality::Strict => "Understanding it doesn't mean obeying it.",
        Personality::Humorous => "Classic move by the craving, honestly.",
        Personality::Motivational => "Naming it is how you beat it.",
    };
    format!("{cause} {push}")
}

fn answer_reflection(p: Personality, answer: &str) -> String {
    let lower = answer.to_lowercase();
    let insight = if lower.contains("better") || lower.contains("calm") || lower.contains("relax") {
        "You expect relief, but that relief mostly comes from ending the withdrawal the last cigarette caused."
    } else if lower.contains("worse") || lower.contains("guilt") || lower.contains("regret") {
        "You already know how you'll feel afterwards. Hold on to that."
    } else {
        "Thanks for being honest. Noticing the pattern is the first step to breaking it."
    };
    let tail = match p {
        Personality::Supportive => "Take a slow breath with me.",
        Personality::Strict => "Keep going.",
        Personality::Humorous => "Your lungs just sent a thank-you card.",
        Personality::Motivational => "You're stronger than this urge.",
    };
    format!("{insight} {tail}")
}

fn coping_strategy(p: Personality, trigger: Trigger) -> String {
    let strategy = match trigger {
        Trigger::Stress => "Try box breathing: in for 4, hold for 4, out for 4, hold for 4. Repeat four times.",
        Trigger::Boredom => "Give your hands something to do for five minutes: a walk, a glass of water, a quick tidy-up.",
        Trigger::Anger => "Step away and let the anger cool. A brisk walk or cold water on your face helps.",
        Trigger::Habit => "Change one piece of the routine: different seat, different drink, different order.",
        Trigger::Other => "Wait it out. Most cravings fade within ten minutes if you don't feed them.",
    };
    let lead = match p {
        Personality::Supportive => "Here's something that might help.",
        Personality::Strict => "Do this now.",
        Personality::Humorous => "Doctor's orders (I'm not a doctor).",
        Personality::Motivational => "Let's turn this around.",
    };
    format!("{lead} {strategy}")
}

fn encouragement(p: Personality, message_count: u32) -> &'static str {
    const SUPPORTIVE: [&str; 3] = [
        "You're doing really well. How is the craving now?",
        "Every minute you wait, the craving loses strength.",
        "I'm proud of you for staying with this conversation.",
    ];
    const STRICT: [&str; 3] = [
        "The craving is temporary. Your goal isn't.",
        "You've made it this far. Don't throw it away.",
        "Is this really an emergency?",
    ];
    const HUMOROUS: [&str; 3] = [
        "Still here? The cigarette is getting impatient. Good.",
        "Fun fact: nobody ever said 'I wish I'd smoked more'.",
        "Your wallet just did a little happy dance.",
    ];
    const MOTIVATIONAL: [&str; 3] = [
        "Each time you ride this out, the next one gets easier.",
        "Think of the money and the breath you're winning back.",
        "You're proving to yourself that you're in charge.",
    ];
    let lines = match p {
        Personality::Supportive => &SUPPORTIVE,
        Personality::Strict => &STRICT,
        Personality::Humorous => &HUMOROUS,
        Personality::Motivational => &MOTIVATIONAL,
    };
    lines[(message_count as usize) % lines.len()]
}

/// Reply for the `message_count`-th user message.
///
/// `reflection_prompt` is the question asked at stage 3.
pub fn scripted_reply(
    personality: Personality,
    trigger: Trigger,
    message_count: u32,
    message: &str,
    reflection_prompt: &str,
) -> String {
    match message_count {
        0 | 1 => welcome(personality).to_string(),
        2 => trigger_analysis(personality, trigger),
        3 => reflection_prompt.to_string(),
        4 => answer_reflection(personality, message),
        5 => coping_strategy(personality, trigger),
        n => encouragement(personality, n).to_string(),
    }
}

/// System prompt handed to a remote chat model.
pub fn system_prompt(personality: Personality, trigger: Trigger) -> String {
    format!(
        "{} The user reported '{}' as the trigger. Keep replies under three sentences and never encourage smoking.",
        personality.system_prompt(),
        trigger.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_message_count() {
        let p = Personality::Supportive;
        assert_eq!(scripted_reply(p, Trigger::Stress, 1, "hi", "Q?"), welcome(p));
        assert!(scripted_reply(p, Trigger::Stress, 2, "", "Q?").contains("stress"));
        assert_eq!(scripted_reply(p, Trigger::Stress, 3, "", "Q?"), "Q?");
        assert!(scripted_reply(p, Trigger::Stress, 5, "", "Q?").contains("box breathing"));
    }

    #[test]
    fn encouragement_loops_past_five() {
        let p = Personality::Strict;
        let a = scripted_reply(p, Trigger::Other, 6, "", "");
        let b = scripted_reply(p, Trigger::Other, 9, "", "");
        assert_eq!(a, b);
    }

    #[test]
    fn every_personality_has_a_distinct_welcome() {
        let seen: std::collections::HashSet<&str> =
            Personality::ALL.iter().map(|p| welcome(*p)).collect();
        assert_eq!(seen.len(), Personality::ALL.len());
    }

    #[test]
    fn personality_parses_case_insensitively() {
        assert_eq!("Strict".parse::<Personality>().unwrap(), Personality::Strict);
        assert!("grumpy".parse::<Personality>().is_err());
    }

    #[test]
    fn trigger_classification() {
        assert_eq!(Trigger::classify("Work stress is killing me"), Trigger::Stress);
        assert_eq!(Trigger::classify("so bored"), Trigger::Boredom);
        assert_eq!(Trigger::classify("I'm furious"), Trigger::Anger);
        assert_eq!(Trigger::classify("always after meal"), Trigger::Habit);
        assert_eq!(Trigger::classify("dunno"), Trigger::Other);
    }
}
