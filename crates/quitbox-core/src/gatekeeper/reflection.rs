//! Guided reflection: five questions per trigger, then a summary.

use serde::{Deserialize, Serialize};

use super::script::{Personality, Trigger};

pub const REFLECTION_QUESTIONS: usize = 5;

const STRESS: [&str; REFLECTION_QUESTIONS] = [
    "What exactly is stressing you right now?",
    "Where do you feel that stress in your body?",
    "Will a cigarette change the situation that's causing it?",
    "What is one small thing you could do about it in the next hour?",
    "How did you handle stress before you started smoking?",
];

const BOREDOM: [&str; REFLECTION_QUESTIONS] = [
    "What were you doing just before the craving started?",
    "Is it the cigarette you want, or a break?",
    "What's something you enjoy that takes five minutes?",
    "Who could you message right now instead?",
    "What would make the next hour more interesting?",
];

const ANGER: [&str; REFLECTION_QUESTIONS] = [
    "What happened that made you angry?",
    "On a scale of 1 to 10, how strong is the anger right now?",
    "Would smoking solve what made you angry?",
    "What would you tell a friend who felt like this?",
    "How could you let some of this anger out safely?",
];

const HABIT: [&str; REFLECTION_QUESTIONS] = [
    "What usually happens right before you light up at this time?",
    "Do you actually want a cigarette, or is it just the routine?",
    "Which part of the routine could you change today?",
    "What could replace the cigarette in this moment?",
    "How will you feel tonight if you skip this one?",
];

const DEFAULT: [&str; REFLECTION_QUESTIONS] = [
    "What made you want a cigarette right now?",
    "How strong is the craving from 1 to 10?",
    "How do you expect to feel after smoking?",
    "What's your main reason for quitting?",
    "What can you do for the next ten minutes instead?",
];

fn questions(trigger: Trigger) -> &'static [&'static str; REFLECTION_QUESTIONS] {
    match trigger {
        Trigger::Stress => &STRESS,
        Trigger::Boredom => &BOREDOM,
        Trigger::Anger => &ANGER,
        Trigger::Habit => &HABIT,
        Trigger::Other => &DEFAULT,
    }
}

/// What the reflection wants to show next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReflectionStep {
    Question { index: usize, text: String },
    Summary { text: String },
}

impl ReflectionStep {
    pub fn text(&self) -> &str {
        match self {
            ReflectionStep::Question { text, .. } | ReflectionStep::Summary { text } => text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    trigger: Trigger,
    personality: Personality,
    cursor: usize,
    answers: Vec<String>,
}

impl Reflection {
    pub fn start(trigger: Trigger, personality: Personality) -> Self {
        Self {
            trigger,
            personality,
            cursor: 0,
            answers: Vec::with_capacity(REFLECTION_QUESTIONS),
        }
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn personality(&self) -> Personality {
        self.personality
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= REFLECTION_QUESTIONS
    }

    pub fn next_question(&self) -> ReflectionStep {
        match questions(self.trigger).get(self.cursor) {
            Some(text) => ReflectionStep::Question {
                index: self.cursor,
                text: (*text).to_string(),
            },
            None => ReflectionStep::Summary {
                text: self.summary(),
            },
        }
    }

    /// Store an answer and move to the next question. Answers past the
    /// last question are ignored.
    pub fn record_response(&mut self, text: &str) {
        if self.is_complete() {
            return;
        }
        self.answers.push(text.trim().to_string());
        self.cursor += 1;
    }

    fn summary(&self) -> String {
        let opener = match self.personality {
            Personality::Supportive => "Thank you for reflecting with me.",
            Personality::Strict => "Reflection done.",
            Personality::Humorous => "Congratulations, you out-thought a cigarette.",
            Personality::Motivational => "Look at that, five honest answers!",
        };
        let reason = self
            .answers
            .get(3)
            .filter(|a| !a.is_empty())
            .map(|a| format!(" Remember what you said matters most: \"{a}\"."))
            .unwrap_or_default();
        format!(
            "{opener} You answered {} questions about {}.{reason} The craving will pass whether or not you smoke.",
            self.answers.len(),
            self.trigger.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_five_questions_then_summarises() {
        let mut r = Reflection::start(Trigger::Stress, Personality::Supportive);
        for i in 0..REFLECTION_QUESTIONS {
            match r.next_question() {
                ReflectionStep::Question { index, text } => {
                    assert_eq!(index, i);
                    assert_eq!(text, STRESS[i]);
                }
                other => panic!("expected question, got {other:?}"),
            }
            r.record_response(&format!("answer {i}"));
        }
        assert!(r.is_complete());
        let summary = r.next_question();
        assert!(matches!(summary, ReflectionStep::Summary { .. }));
        assert!(summary.text().contains("answer 3"));
    }

    #[test]
    fn each_trigger_has_its_own_set() {
        let first = |t| Reflection::start(t, Personality::Strict).next_question();
        assert_eq!(first(Trigger::Anger).text(), ANGER[0]);
        assert_eq!(first(Trigger::Other).text(), DEFAULT[0]);
    }

    #[test]
    fn extra_answers_do_not_move_cursor() {
        let mut r = Reflection::start(Trigger::Habit, Personality::Humorous);
        for _ in 0..7 {
            r.record_response("x");
        }
        assert_eq!(r.cursor(), REFLECTION_QUESTIONS);
        assert_eq!(r.answers().len(), REFLECTION_QUESTIONS);
    }
}
