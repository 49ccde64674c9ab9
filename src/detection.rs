// src/detection.rs
// Detection decision engine: hidden-field state + timing verdict -> Detection.

use serde::Serialize;

use crate::signals::botness::{BotSignal, SignalAccumulator};
use crate::timing::TimingIssue;

const WEIGHT_HONEYPOT_FIELD: u8 = 50;
const WEIGHT_TOO_FAST: u8 = 30;
const WEIGHT_MISSING_USER_AGENT: u8 = 20;

/// Outcome of one submission. Immutable; the risk score is derived on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    honeypot_triggered: bool,
    timing_issue: TimingIssue,
    elapsed_seconds: Option<f64>,
    user_agent_present: bool,
}

impl Detection {
    pub fn honeypot_triggered(&self) -> bool {
        self.honeypot_triggered
    }

    pub fn timing_issue(&self) -> TimingIssue {
        self.timing_issue
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.elapsed_seconds
    }

    pub fn user_agent_present(&self) -> bool {
        self.user_agent_present
    }

    /// Scored contributions in evaluation order.
    pub fn signals(&self) -> Vec<BotSignal> {
        self.accumulate().1
    }

    /// 0..=100: +50 hidden field filled, +30 too fast, +20 no user agent.
    pub fn risk_score(&self) -> u8 {
        self.accumulate().0
    }

    /// Too-slow alone is an abandoned form, not a bot.
    pub fn is_bot(&self) -> bool {
        self.honeypot_triggered || self.timing_issue == TimingIssue::TooFast
    }

    fn accumulate(&self) -> (u8, Vec<BotSignal>) {
        let mut accumulator = SignalAccumulator::with_capacity(3);
        accumulator.push(BotSignal::scored(
            "honeypot_field",
            "Hidden field filled",
            self.honeypot_triggered,
            WEIGHT_HONEYPOT_FIELD,
        ));
        accumulator.push(BotSignal::scored(
            "timing_too_fast",
            "Submitted too fast after render",
            self.timing_issue == TimingIssue::TooFast,
            WEIGHT_TOO_FAST,
        ));
        accumulator.push(BotSignal::scored(
            "user_agent_missing",
            "No user agent",
            !self.user_agent_present,
            WEIGHT_MISSING_USER_AGENT,
        ));
        accumulator.finish()
    }
}

/// True when the hidden field holds anything but whitespace.
pub fn honeypot_triggered(hidden_field_value: &str) -> bool {
    !hidden_field_value.trim().is_empty()
}

pub fn evaluate(
    hidden_field_value: &str,
    timing_issue: TimingIssue,
    elapsed_seconds: Option<f64>,
    user_agent_present: bool,
) -> Detection {
    Detection {
        honeypot_triggered: honeypot_triggered(hidden_field_value),
        timing_issue,
        elapsed_seconds,
        user_agent_present,
    }
}
