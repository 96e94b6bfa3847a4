// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Blocking FIFO carrying one instance's input stream.
//!
//! A [`Channel`] is an unbounded queue guarded by a mutex and a condition
//! variable. Sending never blocks; receiving blocks until a value arrives.
//! Clones share the same queue, so a [`Sender`] handed to another instance's
//! output handler feeds this channel directly.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Queue {
    values: VecDeque<i64>,
    /// Set while the consumer is parked in `recv`.
    waiting: bool,
}

#[derive(Debug, Default)]
struct Inner {
    queue: Mutex<Queue>,
    ready: Condvar,
}

/// Unbounded blocking queue of Intcode words.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    inner: Arc<Inner>,
}

/// Send-only handle to a [`Channel`].
#[derive(Debug, Clone)]
pub struct Sender {
    channel: Channel,
}

impl Sender {
    pub fn send(&self, value: i64) {
        self.channel.send(value);
    }
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel pre-loaded with `values`, in order.
    pub fn with_values(values: impl IntoIterator<Item = i64>) -> Self {
        let channel = Self::new();
        channel.lock().values.extend(values);
        channel
    }

    // Critical sections never panic, so a poisoned lock still holds a
    // consistent queue.
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sender(&self) -> Sender {
        Sender {
            channel: self.clone(),
        }
    }

    /// Append a value and wake the consumer.
    pub fn send(&self, value: i64) {
        self.lock().values.push_back(value);
        self.inner.ready.notify_one();
    }

    /// Remove the oldest value, blocking until one is available.
    pub fn recv(&self) -> i64 {
        let mut queue = self.lock();
        loop {
            if let Some(value) = queue.values.pop_front() {
                queue.waiting = false;
                return value;
            }
            queue.waiting = true;
            queue = self
                .inner
                .ready
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`recv`](Self::recv), but give up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<i64> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        loop {
            if let Some(value) = queue.values.pop_front() {
                queue.waiting = false;
                return Some(value);
            }
            let now = Instant::now();
            if now >= deadline {
                queue.waiting = false;
                return None;
            }
            queue.waiting = true;
            queue = self
                .inner
                .ready
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Remove the oldest value if there is one.
    pub fn try_recv(&self) -> Option<i64> {
        self.lock().values.pop_front()
    }

    /// True while the consumer is blocked in a receive with nothing queued.
    pub fn is_waiting(&self) -> bool {
        let queue = self.lock();
        queue.waiting && queue.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values.is_empty()
    }

    /// Take every queued value.
    pub fn drain(&self) -> Vec<i64> {
        self.lock().values.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..2_000 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("condition never became true");
    }

    #[test]
    fn preserves_fifo_order() {
        let channel = Channel::new();
        for value in [3, 1, 4, 1, 5] {
            channel.send(value);
        }
        let drained: Vec<i64> = (0..5).map(|_| channel.recv()).collect();
        assert_eq!(drained, vec![3, 1, 4, 1, 5]);
        assert!(channel.is_empty());
    }

    #[test]
    fn recv_blocks_until_send() {
        let channel = Channel::new();
        let consumer = {
            let channel = channel.clone();
            thread::spawn(move || channel.recv())
        };

        wait_until(|| channel.is_waiting());
        channel.sender().send(9);
        assert_eq!(consumer.join().unwrap(), 9);
        assert!(!channel.is_waiting());
    }

    #[test]
    fn fifo_across_threads() {
        let channel = Channel::new();
        let consumer = {
            let channel = channel.clone();
            thread::spawn(move || (0..100).map(|_| channel.recv()).collect::<Vec<_>>())
        };
        let sender = channel.sender();
        for value in 0..100 {
            sender.send(value);
        }
        assert_eq!(consumer.join().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn not_waiting_once_value_is_queued() {
        let channel = Channel::new();
        let consumer = {
            let channel = channel.clone();
            thread::spawn(move || {
                let first = channel.recv();
                (first, channel.recv())
            })
        };
        wait_until(|| channel.is_waiting());
        channel.send(1);
        channel.send(2);
        assert_eq!(consumer.join().unwrap(), (1, 2));
    }

    #[test]
    fn recv_timeout_gives_up() {
        let channel = Channel::new();
        assert_eq!(channel.recv_timeout(Duration::from_millis(10)), None);
        assert!(!channel.is_waiting());

        channel.send(4);
        assert_eq!(channel.recv_timeout(Duration::from_millis(10)), Some(4));
    }

    #[test]
    fn with_values_and_drain() {
        let channel = Channel::with_values([7, 8]);
        channel.send(9);
        assert_eq!(channel.len(), 3);
        assert_eq!(channel.try_recv(), Some(7));
        assert_eq!(channel.drain(), vec![8, 9]);
        assert_eq!(channel.try_recv(), None);
    }
}
