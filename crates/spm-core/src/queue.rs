use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::component::PortRef;
use crate::packet::{Request, Response};
use crate::time::Tick;

#[derive(Debug)]
pub(crate) enum Delivery {
    Request {
        to: PortRef,
        req: Request,
        reply_to: PortRef,
    },
    Response {
        to: PortRef,
        resp: Response,
    },
}

#[derive(Debug)]
struct Scheduled {
    when: Tick,
    seq: u64,
    delivery: Delivery,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so `BinaryHeap` pops the earliest event; ties go to the first scheduled.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .when
            .cmp(&self.when)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending deliveries ordered by time, then by insertion order.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

impl EventQueue {
    pub(crate) fn push(&mut self, when: Tick, delivery: Delivery) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled {
            when,
            seq,
            delivery,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<(Tick, Delivery)> {
        self.heap.pop().map(|s| (s.when, s.delivery))
    }

    pub(crate) fn peek_time(&self) -> Option<Tick> {
        self.heap.peek().map(|s| s.when)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}
