//! Device actor and the capability interface exposed to accessory layers.
//!
//! Each device runs as one tokio task that exclusively owns its
//! [`DeviceController`]. Callers talk to it through a cloneable
//! [`DeviceHandle`]:
//!
//! - intents travel over an `mpsc` channel and are decided as soon as they
//!   arrive, so the busy gate sees them in arrival order;
//! - dispatches run concurrently inside the task and their outcomes are
//!   applied when they complete, each replying to its caller exactly once;
//! - reported state is published on a `watch` channel, so reads never wait
//!   on the task.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::controller::{DeviceController, DeviceShape, DeviceState, Effect, Intent, PendingDispatch, Step};
use crate::error::{DeviceError, Result};

/// The control surface an accessory layer needs from a device.
#[async_trait]
pub trait Appliance: Send + Sync {
    fn name(&self) -> &str;

    fn shape(&self) -> DeviceShape;

    /// Switch the appliance on or off.
    async fn set_power(&self, on: bool) -> Result<()>;

    /// Move the appliance to `level` percent. Level-capable devices only.
    async fn set_level(&self, level: u8) -> Result<()>;

    /// Reported power, no I/O.
    fn power(&self) -> bool;

    /// Reported level, no I/O.
    fn level(&self) -> u8;
}

const COMMAND_BUFFER: usize = 32;

struct Command {
    intent: Intent,
    reply: oneshot::Sender<Result<()>>,
}

enum Event {
    Completed {
        effect: Effect,
        outcome: Result<u16>,
        reply: oneshot::Sender<Result<()>>,
    },
    AutoReset {
        generation: u64,
    },
}

/// Cloneable handle to a running device task.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    name: String,
    shape: DeviceShape,
    tx: mpsc::Sender<Command>,
    state: watch::Receiver<DeviceState>,
}

impl DeviceHandle {
    /// Move `controller` into a new task and return its handle.
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// handle is dropped and no dispatch or timer is outstanding.
    pub fn spawn(controller: DeviceController) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(controller.state().clone());
        let handle = Self {
            name: controller.name().to_string(),
            shape: controller.shape(),
            tx,
            state: state_rx,
        };

        let actor = DeviceActor {
            controller,
            rx,
            state_tx,
            pending: FuturesUnordered::new(),
            reset_generation: 0,
        };
        tokio::spawn(actor.run());
        handle
    }

    /// Submit an intent and wait for its outcome.
    pub async fn send(&self, intent: Intent) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command { intent, reply })
            .await
            .map_err(|_| DeviceError::Stopped)?;
        rx.await.map_err(|_| DeviceError::Stopped)?
    }

    /// Current reported state.
    pub fn state(&self) -> DeviceState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every reported-state change.
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state.clone()
    }
}

#[async_trait]
impl Appliance for DeviceHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> DeviceShape {
        self.shape
    }

    async fn set_power(&self, on: bool) -> Result<()> {
        self.send(Intent::SetPower(on)).await
    }

    async fn set_level(&self, level: u8) -> Result<()> {
        self.send(Intent::SetLevel(level)).await
    }

    fn power(&self) -> bool {
        self.state.borrow().power
    }

    fn level(&self) -> u8 {
        self.state.borrow().level
    }
}

struct DeviceActor {
    controller: DeviceController,
    rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<DeviceState>,
    pending: FuturesUnordered<BoxFuture<'static, Event>>,
    reset_generation: u64,
}

impl DeviceActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                Some(command) = self.rx.recv() => self.on_command(command),
                Some(event) = self.pending.next() => self.on_event(event),
                else => break,
            }
        }
        debug!(device = %self.controller.name(), "Device task finished");
    }

    fn on_command(&mut self, Command { intent, reply }: Command) {
        match self.controller.handle(intent) {
            Ok(Step::Pending(PendingDispatch { effect, future, .. })) => {
                self.pending.push(
                    async move {
                        Event::Completed {
                            effect,
                            outcome: future.await,
                            reply,
                        }
                    }
                    .boxed(),
                );
            }
            Ok(Step::Done) => {
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Completed {
                effect,
                outcome,
                reply,
            } => {
                let result = self.controller.complete(effect, outcome);
                if result.is_ok() && effect == Effect::Toggled {
                    self.schedule_reset();
                }
                // Readers must see the new state once the caller is answered.
                self.publish();
                let _ = reply.send(result);
            }
            Event::AutoReset { generation } => {
                // A later toggle restarted the timer.
                if generation == self.reset_generation {
                    self.controller.reset_momentary();
                    self.publish();
                }
            }
        }
    }

    fn schedule_reset(&mut self) {
        let Some(after) = self.controller.auto_reset_after() else {
            return;
        };
        self.reset_generation += 1;
        let generation = self.reset_generation;
        self.pending.push(
            async move {
                tokio::time::sleep(after).await;
                Event::AutoReset { generation }
            }
            .boxed(),
        );
    }

    fn publish(&self) {
        let current = self.controller.state();
        self.state_tx.send_if_modified(|state| {
            if state != current {
                *state = current.clone();
                true
            } else {
                false
            }
        });
    }
}
