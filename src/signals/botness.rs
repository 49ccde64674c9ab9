use serde::Serialize;

/// Upper bound of the risk score.
pub const RISK_SCORE_CAP: u8 = 100;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BotSignal {
    pub key: &'static str,
    pub label: &'static str,
    pub active: bool,
    pub contribution: u8,
}

impl BotSignal {
    pub fn scored(key: &'static str, label: &'static str, active: bool, weight: u8) -> Self {
        let contribution = if active { weight } else { 0 };
        Self {
            key,
            label,
            active,
            contribution,
        }
    }
}

#[derive(Debug, Default)]
pub struct SignalAccumulator {
    score: u8,
    signals: Vec<BotSignal>,
}

impl SignalAccumulator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            score: 0,
            signals: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, signal: BotSignal) {
        self.score = self.score.saturating_add(signal.contribution);
        self.signals.push(signal);
    }

    pub fn finish(self) -> (u8, Vec<BotSignal>) {
        (self.score.min(RISK_SCORE_CAP), self.signals)
    }
}
