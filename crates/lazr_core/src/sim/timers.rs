use std::time::Duration;

/// Banner stage shown while counting back into play after a death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStage {
    Three,
    Two,
    One,
    Go,
}

impl CountdownStage {
    pub const ALL: [CountdownStage; 4] = [Self::Three, Self::Two, Self::One, Self::Go];

    pub fn banner(self) -> &'static str {
        match self {
            Self::Three => "3",
            Self::Two => "2",
            Self::One => "1",
            Self::Go => "GO!",
        }
    }
}

/// Work the session postpones to a later tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredEffect {
    ReadyBannerDone,
    RespawnEnemy(usize),
    DeathReset,
    CountdownStage(CountdownStage),
    CountdownFinished,
    GameOverFinalize,
}

#[derive(Debug, Clone, Copy)]
struct PendingEffect {
    due_at: Duration,
    epoch: u64,
    sequence: u64,
    effect: DeferredEffect,
}

/// One-shot deadlines on the world clock, tagged with the epoch they were scheduled in.
///
/// Bumping the epoch invalidates everything still pending; stale entries are dropped the
/// next time the wheel is drained.
#[derive(Debug, Default)]
pub struct TimerWheel {
    pending: Vec<PendingEffect>,
    epoch: u64,
    next_sequence: u64,
}

impl TimerWheel {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    pub fn schedule(&mut self, due_at: Duration, effect: DeferredEffect) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.pending.push(PendingEffect {
            due_at,
            epoch: self.epoch,
            sequence,
            effect,
        });
    }

    /// Removes and returns every current-epoch effect due at `now`, earliest first and in
    /// scheduling order for equal deadlines.
    pub fn drain_due(&mut self, now: Duration) -> Vec<DeferredEffect> {
        let epoch = self.epoch;
        self.pending.retain(|pending| pending.epoch == epoch);

        let mut due = Vec::new();
        self.pending.retain(|pending| {
            if pending.due_at <= now {
                due.push(*pending);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|pending| (pending.due_at, pending.sequence));
        due.into_iter().map(|pending| pending.effect).collect()
    }

    pub fn is_scheduled(&self, effect: DeferredEffect) -> bool {
        self.pending
            .iter()
            .any(|pending| pending.epoch == self.epoch && pending.effect == effect)
    }

    pub fn pending_len(&self) -> usize {
        self.pending
            .iter()
            .filter(|pending| pending.epoch == self.epoch)
            .count()
    }
}
