// Copyright 2020-2022 The NATS Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;

use crate::context::{JetStream, ResolvedSubscription};
use crate::message::Message;
use crate::types::{AckPolicy, ConsumerInfo, ConsumerOwnership};
use crate::DEFAULT_FLUSH_TIMEOUT;

#[derive(Debug)]
pub(crate) struct Inner {
    /// Subscription ID.
    pub(crate) sid: u64,

    /// MSG operations received from the server.
    pub(crate) messages: channel::Receiver<Message>,

    /// The subject messages actually arrive on. May differ from the
    /// logical subscription subject.
    pub(crate) deliver_subject: String,

    /// Name of the stream associated with the subscription.
    pub(crate) stream: String,

    /// Name of the consumer associated with the subscription.
    pub(crate) consumer: String,

    /// Ack policy used while processing messages.
    pub(crate) consumer_ack_policy: AckPolicy,

    /// Whether handler-based processing acknowledges messages after the
    /// handler returns successfully.
    pub(crate) auto_ack: bool,

    /// Indicates if we own the consumer and are responsible for deleting
    /// it or not.
    pub(crate) consumer_ownership: ConsumerOwnership,

    /// Set once the subscription has been torn down.
    pub(crate) unsubscribed: AtomicBool,

    /// Context associated with the subscription.
    pub(crate) context: JetStream,
}

impl Inner {
    // Idempotent: the first caller tears the subscription down, everyone
    // else is a no-op.
    fn shutdown(&self) -> io::Result<()> {
        if self.unsubscribed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.context.connection.unsubscribe(self.sid)?;

        // Delete the consumer, if we own it.
        if self.consumer_ownership == ConsumerOwnership::Yes {
            self.context
                .delete_consumer(&self.stream, &self.consumer)
                .ok();
        }

        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown().ok();
    }
}

/// A `PushSubscription` receives messages the server streams to its
/// delivery subject.
#[derive(Clone, Debug)]
pub struct PushSubscription(pub(crate) Arc<Inner>);

impl PushSubscription {
    /// Creates a subscription out of the orchestrator's resolution.
    pub(crate) fn new(resolved: ResolvedSubscription, context: JetStream) -> PushSubscription {
        PushSubscription(Arc::new(Inner {
            sid: resolved.sid,
            messages: resolved.messages,
            deliver_subject: resolved.deliver_subject,
            stream: resolved.stream,
            consumer: resolved.consumer,
            consumer_ack_policy: resolved.ack_policy,
            auto_ack: resolved.auto_ack,
            consumer_ownership: resolved.ownership,
            unsubscribed: AtomicBool::new(false),
            context,
        }))
    }

    /// Preprocesses the given message.
    /// Returns true if the message was handled and should be filtered out
    /// from the user's view.
    fn preprocess(&self, message: &Message) -> bool {
        if message.is_flow_control() {
            message.respond(b"").ok();

            return true;
        }

        if message.is_idle_heartbeat() {
            return true;
        }

        false
    }

    /// Get the next message, or `None` if the subscription has been
    /// unsubscribed or the connection closed.
    pub fn next(&self) -> Option<Message> {
        loop {
            return match self.0.messages.recv().ok() {
                Some(message) => {
                    if self.preprocess(&message) {
                        continue;
                    }

                    Some(message)
                }
                None => None,
            };
        }
    }

    /// Try to get the next message, or `None` if none are present or if
    /// the subscription has been unsubscribed or the connection closed.
    pub fn try_next(&self) -> Option<Message> {
        loop {
            return match self.0.messages.try_recv().ok() {
                Some(message) => {
                    if self.preprocess(&message) {
                        continue;
                    }

                    Some(message)
                }
                None => None,
            };
        }
    }

    /// Get the next message, or a timeout error if none arrive in time.
    /// A zero timeout is a non-blocking poll.
    pub fn next_timeout(&self, mut timeout: Duration) -> io::Result<Message> {
        loop {
            let start = Instant::now();
            return match self.0.messages.recv_timeout(timeout) {
                Ok(message) => {
                    if self.preprocess(&message) {
                        timeout = timeout.saturating_sub(start.elapsed());
                        continue;
                    }

                    Ok(message)
                }
                Err(channel::RecvTimeoutError::Timeout) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "next_timeout: timed out",
                )),
                Err(channel::RecvTimeoutError::Disconnected) => Err(io::Error::new(
                    io::ErrorKind::Other,
                    "next_timeout: unsubscribed",
                )),
            };
        }
    }

    /// Returns a blocking message iterator. Same as calling `iter()`.
    pub fn messages(&self) -> Iter<'_> {
        Iter { subscription: self }
    }

    /// Returns a blocking message iterator.
    pub fn iter(&self) -> Iter<'_> {
        Iter { subscription: self }
    }

    /// Returns a non-blocking message iterator.
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { subscription: self }
    }

    /// Returns a blocking message iterator with a time deadline for
    /// blocking.
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            subscription: self,
            to: timeout,
        }
    }

    /// Attach a closure to handle messages. The closure runs on a
    /// dedicated thread.
    ///
    /// When the subscription was created with `auto_ack` (the default) and
    /// the consumer acknowledges messages, each message is acknowledged
    /// after the closure returns `Ok`. A closure error skips the
    /// acknowledgement, leaving redelivery to the server, and is logged.
    ///
    /// The result of this call is a [`Handler`] which can not be iterated
    /// and must be unsubscribed or closed directly to unregister interest.
    /// A `Handler` will not unregister interest with the server when
    /// `drop(&mut self)` is called.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
    /// # let context = jetstream::new(nc)?;
    /// context.subscribe("events")?.with_handler(move |message| {
    ///     println!("received {}", message);
    ///     Ok(())
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_handler<F>(self, handler: F) -> Handler
    where
        F: Fn(&Message) -> io::Result<()> + Send + 'static,
    {
        let auto_ack = self.0.auto_ack && self.0.consumer_ack_policy != AckPolicy::None;

        // This will allow us to not have to capture the return. When it is
        // dropped it will not unsubscribe from the server.
        let sub = self.clone();
        thread::Builder::new()
            .name(format!(
                "jetstream_push_subscriber_{}_{}",
                self.0.stream, self.0.consumer,
            ))
            .spawn(move || {
                for message in &sub {
                    match handler(&message) {
                        Ok(()) => {
                            if auto_ack {
                                if let Err(err) = message.ack() {
                                    log::error!("failed to ack message: {:?}", err);
                                }
                            }
                        }
                        // The ack is skipped so the server redelivers.
                        Err(err) => log::error!("error in message handler: {:?}", err),
                    }
                }
            })
            .expect("threads should be spawnable");

        Handler { subscription: self }
    }

    /// Process and acknowledge a single message, waiting indefinitely for
    /// one to arrive.
    ///
    /// Does not acknowledge the processed message if the closure returns
    /// an `Err`.
    pub fn process<R, F: Fn(&Message) -> io::Result<R>>(&mut self, f: F) -> io::Result<R> {
        let next = self.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "process: unsubscribed")
        })?;

        let result = f(&next)?;
        if self.0.consumer_ack_policy != AckPolicy::None {
            next.ack()?;
        }

        Ok(result)
    }

    /// Process and acknowledge a single message, waiting up to `timeout`
    /// before returning a timeout error.
    ///
    /// Does not acknowledge the processed message if the closure returns
    /// an `Err`.
    pub fn process_timeout<R, F: Fn(&Message) -> io::Result<R>>(
        &mut self,
        timeout: Duration,
        f: F,
    ) -> io::Result<R> {
        let next = self.next_timeout(timeout)?;

        let ret = f(&next)?;
        if self.0.consumer_ack_policy != AckPolicy::None {
            next.ack()?;
        }

        Ok(ret)
    }

    /// Sends a request to fetch current information about the target
    /// consumer.
    pub fn consumer_info(&self) -> io::Result<ConsumerInfo> {
        self.0
            .context
            .consumer_info(&self.0.stream, &self.0.consumer)
    }

    /// The subject messages are delivered on.
    pub fn deliver_subject(&self) -> &str {
        &self.0.deliver_subject
    }

    /// Unsubscribe a subscription immediately without draining.
    /// Use `drain` instead if you want any pending messages to be
    /// processed by a handler, if one is configured.
    ///
    /// An ephemeral consumer created for this subscription is deleted; a
    /// durable or attached consumer persists on the server.
    pub fn unsubscribe(self) -> io::Result<()> {
        self.0.shutdown()?;

        // Discard all queued messages.
        while self.0.messages.try_recv().is_ok() {}

        Ok(())
    }

    /// Close a subscription. Same as `unsubscribe`.
    pub fn close(self) -> io::Result<()> {
        self.unsubscribe()
    }

    /// Send an unsubscription then flush the connection, allowing any
    /// unprocessed messages to be handled by a handler if one is
    /// configured.
    pub fn drain(&self) -> io::Result<()> {
        self.0.context.connection.flush_timeout(DEFAULT_FLUSH_TIMEOUT)?;
        self.0.shutdown()
    }
}

impl IntoIterator for PushSubscription {
    type Item = Message;
    type IntoIter = IntoIter;

    fn into_iter(self) -> IntoIter {
        IntoIter { subscription: self }
    }
}

impl<'a> IntoIterator for &'a PushSubscription {
    type Item = Message;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        Iter { subscription: self }
    }
}

/// A `Handler` may be used to unsubscribe a handler thread.
pub struct Handler {
    subscription: PushSubscription,
}

impl Handler {
    /// Unsubscribe a subscription, stopping its handler thread.
    pub fn unsubscribe(self) -> io::Result<()> {
        self.subscription.unsubscribe()
    }
}

/// A non-blocking iterator over messages from a `PushSubscription`.
pub struct TryIter<'a> {
    subscription: &'a PushSubscription,
}

impl<'a> Iterator for TryIter<'a> {
    type Item = Message;
    fn next(&mut self) -> Option<Self::Item> {
        self.subscription.try_next()
    }
}

/// An iterator over messages from a `PushSubscription`.
pub struct Iter<'a> {
    subscription: &'a PushSubscription,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Message;
    fn next(&mut self) -> Option<Self::Item> {
        self.subscription.next()
    }
}

/// An owned iterator over messages from a `PushSubscription`.
pub struct IntoIter {
    subscription: PushSubscription,
}

impl Iterator for IntoIter {
    type Item = Message;
    fn next(&mut self) -> Option<Self::Item> {
        self.subscription.next()
    }
}

/// An iterator over messages from a `PushSubscription` where `None` will
/// be returned if a new message has not been received by the end of a
/// timeout.
pub struct TimeoutIter<'a> {
    subscription: &'a PushSubscription,
    to: Duration,
}

impl<'a> Iterator for TimeoutIter<'a> {
    type Item = Message;
    fn next(&mut self) -> Option<Self::Item> {
        self.subscription.next_timeout(self.to).ok()
    }
}
