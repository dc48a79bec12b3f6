use std::collections::VecDeque;

use crate::model::InputCommand;

/// Roughly one second of input at 60 Hz.
pub const DEFAULT_PENDING_CAPACITY: usize = 60;

/// Inputs applied locally but not yet acknowledged by the server, oldest
/// first.
#[derive(Debug, Clone)]
pub struct PendingInputQueue {
    inputs: VecDeque<InputCommand>,
    capacity: usize,
}

impl Default for PendingInputQueue {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_CAPACITY)
    }
}

impl PendingInputQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inputs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the tail, dropping from the head whatever exceeds capacity.
    pub fn push(&mut self, input: InputCommand) {
        debug_assert!(
            self.inputs.back().is_none_or(|last| last.tick <= input.tick),
            "pending inputs must be pushed in tick order"
        );
        self.inputs.push_back(input);
        while self.inputs.len() > self.capacity {
            self.inputs.pop_front();
        }
    }

    /// Keep only inputs with `tick > last_processed_tick`. Returns how many
    /// were discarded.
    pub fn filter_acknowledged(&mut self, last_processed_tick: u32) -> usize {
        let before = self.inputs.len();
        self.inputs.retain(|input| input.tick > last_processed_tick);
        before - self.inputs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputCommand> {
        self.inputs.iter()
    }

    pub fn oldest_tick(&self) -> Option<u32> {
        self.inputs.front().map(|input| input.tick)
    }

    pub fn latest_tick(&self) -> Option<u32> {
        self.inputs.back().map(|input| input.tick)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Buttons;

    fn input(tick: u32) -> InputCommand {
        InputCommand::new(tick, tick as f64 * 16.0).with_buttons(Buttons::FORWARD)
    }

    #[test]
    fn bounded_by_capacity() {
        let mut queue = PendingInputQueue::new(60);
        for tick in 0..500 {
            queue.push(input(tick));
            assert!(queue.len() <= 60);
        }
        assert_eq!(queue.oldest_tick(), Some(440));
        assert_eq!(queue.latest_tick(), Some(499));
    }

    #[test]
    fn filter_keeps_strictly_newer() {
        let mut queue = PendingInputQueue::new(60);
        for tick in 101..=103 {
            queue.push(input(tick));
        }

        assert_eq!(queue.filter_acknowledged(102), 2);
        let ticks: Vec<u32> = queue.iter().map(|i| i.tick).collect();
        assert_eq!(ticks, vec![103]);
    }

    #[test]
    fn filter_is_idempotent() {
        let mut queue = PendingInputQueue::new(60);
        for tick in 1..=10 {
            queue.push(input(tick));
        }

        queue.filter_acknowledged(6);
        assert_eq!(queue.filter_acknowledged(6), 0);
        assert_eq!(queue.filter_acknowledged(3), 0);
        assert_eq!(queue.len(), 4);
        assert!(queue.iter().all(|i| i.tick > 6));
    }
}
