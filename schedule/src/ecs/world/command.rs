//! Deferred world mutations.
//!
//! Systems that only hold shared access to the [`World`] queue structural changes as commands
//! instead of applying them. Commands are applied at sync points, in FIFO order.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Schedule                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  System A ──push──► queue A ─┐                               │
//! │  System B ──push──► queue B ─┼──► ApplyDeferred ──► World    │
//! │  System C ──push──► queue C ─┘                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each system owns its own [`CommandQueue`]. A system that cannot be given `&mut World` can
//! still hand its queue over to the world's queue with `queue_deferred`, since pushing only needs
//! shared access.

use std::fmt;

use crossbeam::queue::SegQueue;

use crate::ecs::{component::Resource, world::World};

/// A queued mutation.
pub type Command = Box<dyn FnOnce(&mut World) + Send + 'static>;

/// Lock-free FIFO of deferred commands.
///
/// Pushing is wait-free and needs only `&self`, so any number of producers may share a queue.
/// Applying needs `&mut World` and drains the queue on the calling thread.
#[derive(Default)]
pub struct CommandQueue {
    commands: SegQueue<Command>,
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("len", &self.commands.len())
            .finish()
    }
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            commands: SegQueue::new(),
        }
    }

    /// Queue a command.
    #[inline]
    pub fn push<F>(&self, command: F)
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.commands.push(Box::new(command));
    }

    /// Number of queued commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Move every command of `other` to the back of this queue.
    pub fn append(&self, other: &CommandQueue) {
        while let Some(command) = other.commands.pop() {
            self.commands.push(command);
        }
    }

    /// Apply every queued command to the world, in FIFO order.
    ///
    /// Commands pushed to this queue while applying are applied too.
    pub fn apply(&self, world: &mut World) {
        while let Some(command) = self.commands.pop() {
            command(world);
        }
    }
}

/// A handle for queuing commands from a system.
pub struct Commands<'q> {
    queue: &'q CommandQueue,
}

impl<'q> Commands<'q> {
    /// Wrap a queue.
    #[inline]
    pub fn new(queue: &'q CommandQueue) -> Self {
        Self { queue }
    }

    /// Queue an arbitrary mutation.
    pub fn queue<F>(&mut self, command: F)
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.queue.push(command);
    }

    /// Insert or replace a resource.
    pub fn insert_resource<R: Resource>(&mut self, value: R) {
        self.queue(move |world: &mut World| world.insert_resource(value));
    }

    /// Insert a resource's default value if it is missing.
    pub fn init_resource<R: Resource + Default>(&mut self) {
        self.queue(|world: &mut World| {
            world.init_resource::<R>();
        });
    }

    /// Remove a resource.
    pub fn remove_resource<R: Resource>(&mut self) {
        self.queue(|world: &mut World| {
            world.remove_resource::<R>();
        });
    }
}
