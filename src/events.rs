//! Change notification for kinematic trees.
//!
//! Interested subsystems subscribe and receive events through a channel, so no callback
//! ever runs inside a tree mutation.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::kinematic_tree::JointId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    BranchAdded { parent: JointId, branch: JointId },
    BranchRemoved { parent: JointId, branch: JointId },
    /// DH parameters, joint type or solver name of the joint changed. Not sent for q changes.
    Reconfigured(JointId),
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<TreeEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<TreeEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Sends the event to every live subscriber, dropping those whose receiver is gone.
    pub fn publish(&mut self, event: TreeEvent) {
        self.subscribers.retain(|subscriber| subscriber.send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// A copied tree starts without subscribers.
impl Clone for EventBus {
    fn clone(&self) -> Self {
        EventBus::default()
    }
}
