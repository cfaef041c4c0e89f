//! Wake-ups for queries blocked in `WaitTrigger:`/`WaitCondition:`.
//!
//! The core calls [`Triggers::notify_all`] when something changes; waiting
//! queries re-evaluate their condition on every wake-up.

use std::str::FromStr;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    All,
    Check,
    State,
    Log,
    Downtime,
    Comment,
    Command,
    Program,
}

impl Trigger {
    const COUNT: usize = 8;

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Trigger::All => "all",
            Trigger::Check => "check",
            Trigger::State => "state",
            Trigger::Log => "log",
            Trigger::Downtime => "downtime",
            Trigger::Comment => "comment",
            Trigger::Command => "command",
            Trigger::Program => "program",
        }
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "all" => Trigger::All,
            "check" => Trigger::Check,
            "state" => Trigger::State,
            "log" => Trigger::Log,
            "downtime" => Trigger::Downtime,
            "comment" => Trigger::Comment,
            "command" => Trigger::Command,
            "program" => Trigger::Program,
            _ => {
                return Err(format!(
                    "invalid trigger '{s}', allowed: all, check, state, log, downtime, comment, command, program"
                ));
            }
        })
    }
}

/// One condition variable per trigger kind, sharing a mutex.
pub struct Triggers {
    lock: Mutex<()>,
    conditions: [Condvar; Trigger::COUNT],
}

impl Default for Triggers {
    fn default() -> Self {
        Self {
            lock: Mutex::new(()),
            conditions: std::array::from_fn(|_| Condvar::new()),
        }
    }
}

impl Triggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes every waiter on `trigger` and every waiter on `all`.
    pub fn notify_all(&self, trigger: Trigger) {
        let _guard = self.lock.lock();
        self.conditions[Trigger::All.index()].notify_all();
        if trigger != Trigger::All {
            self.conditions[trigger.index()].notify_all();
        }
    }

    /// Waits until `predicate` holds or `timeout` expires; `None` waits forever.
    ///
    /// The predicate is checked first and after every wake-up. Returns its
    /// final value.
    pub fn wait_for(
        &self,
        trigger: Trigger,
        timeout: Option<Duration>,
        mut predicate: impl FnMut() -> bool,
    ) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let condition = &self.conditions[trigger.index()];
        let mut guard = self.lock.lock();
        loop {
            if predicate() {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if condition.wait_until(&mut guard, deadline).timed_out() {
                        return predicate();
                    }
                }
                None => condition.wait(&mut guard),
            }
        }
    }
}
