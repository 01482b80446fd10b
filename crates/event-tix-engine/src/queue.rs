//! Implementation of the request queue
//!
//! A priority-ordered, FIFO-within-priority queue of pending ticket requests.
//! VIP entries strictly dominate Regular ones. The queue is a pure ordering
//! structure; it holds no capacity opinion.

use std::collections::VecDeque;

use chrono::Utc;
use dashmap::DashMap;
use event_tix_core::{PriorityClass, RequestStatus, TicketRequest};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Lanes {
    vip: VecDeque<Uuid>,
    regular: VecDeque<Uuid>,
}

/// In-memory queue of pending ticket requests with position lookup
///
/// Safe under many concurrent enqueuers and a single consumer (the
/// processor). Terminal requests stay in the tracker for status polling; only
/// the queue entry is removed on dequeue.
pub struct RequestQueue {
    lanes: Mutex<Lanes>,
    tracker: DashMap<Uuid, TicketRequest>,
}

impl RequestQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Lanes::default()),
            tracker: DashMap::new(),
        }
    }

    /// Enqueue a request and return `(request_id, position)`
    ///
    /// The returned position is the 1-based rank within the caller's priority
    /// class at enqueue time.
    pub fn enqueue(&self, user_id: Uuid, event_id: Uuid, class: PriorityClass) -> (Uuid, usize) {
        let request = TicketRequest {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            class,
            enqueued_at: Utc::now(),
            status: RequestStatus::Queued,
            result_order_id: None,
            failure_reason: None,
        };
        let id = request.id;

        let mut lanes = self.lanes.lock();
        let position = match class {
            PriorityClass::Vip => {
                lanes.vip.push_back(id);
                lanes.vip.len()
            }
            PriorityClass::Regular => {
                lanes.regular.push_back(id);
                lanes.regular.len()
            }
        };
        // insert under the lane lock so a concurrent dequeue cannot observe
        // a queued id with no tracker entry
        self.tracker.insert(id, request);
        (id, position)
    }

    /// Dequeue the next request, VIP first, FIFO within a class
    ///
    /// The request is marked `processing` in the tracker before it is handed
    /// out.
    pub fn dequeue(&self) -> Option<TicketRequest> {
        let id = {
            let mut lanes = self.lanes.lock();
            lanes
                .vip
                .pop_front()
                .or_else(|| lanes.regular.pop_front())?
        };
        let mut entry = self.tracker.get_mut(&id)?;
        entry.status = RequestStatus::Processing;
        Some(entry.clone())
    }

    /// Current drain rank of a still-queued request
    ///
    /// Recomputed on demand: requests of a higher class that are ahead count
    /// towards the position, requests of a lower class never do. Returns
    /// [`None`] once the request has left the queue.
    pub fn position_of(&self, request_id: Uuid) -> Option<usize> {
        let lanes = self.lanes.lock();
        if let Some(idx) = lanes.vip.iter().position(|id| *id == request_id) {
            return Some(idx + 1);
        }
        lanes
            .regular
            .iter()
            .position(|id| *id == request_id)
            .map(|idx| lanes.vip.len() + idx + 1)
    }

    /// Look up a request's record, queued or terminal
    pub fn get(&self, request_id: Uuid) -> Option<TicketRequest> {
        self.tracker.get(&request_id).map(|r| r.clone())
    }

    /// Mark a request done with its confirmed order
    pub fn mark_done(&self, request_id: Uuid, order_id: Uuid) {
        if let Some(mut entry) = self.tracker.get_mut(&request_id) {
            entry.status = RequestStatus::Done;
            entry.result_order_id = Some(order_id);
        }
    }

    /// Mark a request failed with a reason
    pub fn mark_failed(&self, request_id: Uuid, reason: &str) {
        if let Some(mut entry) = self.tracker.get_mut(&request_id) {
            entry.status = RequestStatus::Failed;
            entry.failure_reason = Some(reason.to_owned());
        }
    }

    /// Number of requests currently waiting
    pub fn len(&self) -> usize {
        let lanes = self.lanes.lock();
        lanes.vip.len() + lanes.regular.len()
    }

    /// Whether no request is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
