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

//! The transport collaborator consumed by the `JetStream` core.
//!
//! This crate does not speak the NATS wire protocol itself. Everything it
//! needs from the underlying connection is captured by the [`Transport`]
//! trait: request/reply, publish with an optional reply subject, plain
//! subscriptions that deliver into a channel, inbox generation and
//! flushing. A [`Connection`] is a cheap clone-able handle over a
//! `Transport` implementation and is what the rest of the crate works
//! against.

use std::{fmt, io, sync::Arc, time::Duration};

use crossbeam_channel::Receiver;

use crate::message::Message;

/// The interface a NATS transport has to provide for the `JetStream` core.
///
/// Implementations are expected to be fully thread safe: a reader thread
/// delivers inbound messages into the subscription channels while
/// application threads publish and request concurrently.
///
/// Messages handed to subscription channels and request replies should be
/// bound to the owning [`Connection`] (see [`Message::connection`]) so that
/// acknowledgements can be sent on their reply subjects.
pub trait Transport: Send + Sync {
    /// Publish `payload` on `subject` and wait up to `timeout` for a single
    /// reply on a fresh reply subject.
    ///
    /// Returns an error of kind [`io::ErrorKind::TimedOut`] when no reply
    /// arrives within the timeout.
    fn request(&self, subject: &str, payload: &[u8], timeout: Duration) -> io::Result<Message>;

    /// Publish `payload` on `subject`, with an optional reply subject.
    fn publish(&self, subject: &str, reply: Option<&str>, payload: &[u8]) -> io::Result<()>;

    /// Register a subscription on `subject` (optionally as part of a queue
    /// group) and return its subscription id together with the channel the
    /// transport delivers matching messages into.
    fn subscribe(
        &self,
        subject: &str,
        queue: Option<&str>,
    ) -> io::Result<(u64, Receiver<Message>)>;

    /// Remove a subscription previously created with
    /// [`Transport::subscribe`]. Dropping the sending side of the
    /// subscription channel is part of the contract.
    fn unsubscribe(&self, sid: u64) -> io::Result<()>;

    /// Create a new, unique and unpredictable reply subject.
    fn new_inbox(&self) -> String;

    /// Flush the outbound buffer and await a server round trip, failing
    /// with [`io::ErrorKind::TimedOut`] when the server does not respond in
    /// time.
    fn flush(&self, timeout: Duration) -> io::Result<()>;

    /// Flush the outbound buffer without waiting for the server and without
    /// reporting failures. Used on latency-sensitive paths where a lost
    /// flush is recovered by the next write.
    fn lenient_flush_buffer(&self);

    /// Switch the request/reply machinery between the shared muxed inbox
    /// and one reply subject per request. `JetStream` requires the old,
    /// per-request style: attach and pull flows make replies arrive
    /// concurrently on distinct inboxes.
    fn set_old_request_style(&self, enabled: bool);

    /// The number of messages a local subscription may buffer before the
    /// transport considers it slow.
    fn pending_message_limit(&self) -> i64 {
        65_536
    }
}

/// A handle to a NATS connection, usable from the `JetStream` context and
/// from every subscription derived from it.
///
/// Cloning is cheap and all clones refer to the same transport.
#[derive(Clone)]
pub struct Connection(Arc<dyn Transport>);

impl Connection {
    /// Wrap a [`Transport`] implementation.
    pub fn new<T: Transport + 'static>(transport: T) -> Connection {
        Connection(Arc::new(transport))
    }

    /// Publish a message on the given subject as a request and wait up to
    /// `timeout` for the response.
    pub fn request_timeout(
        &self,
        subject: &str,
        payload: impl AsRef<[u8]>,
        timeout: Duration,
    ) -> io::Result<Message> {
        self.0.request(subject, payload.as_ref(), timeout)
    }

    /// Publish a message on the given subject.
    pub fn publish(&self, subject: &str, payload: impl AsRef<[u8]>) -> io::Result<()> {
        self.0.publish(subject, None, payload.as_ref())
    }

    /// Publish a message on the given subject with a reply subject for
    /// responses.
    pub fn publish_with_reply(
        &self,
        subject: &str,
        reply: &str,
        payload: impl AsRef<[u8]>,
    ) -> io::Result<()> {
        self.0.publish(subject, Some(reply), payload.as_ref())
    }

    /// Create a new globally unique inbox which can be used for replies.
    pub fn new_inbox(&self) -> String {
        self.0.new_inbox()
    }

    /// Flush the connection, waiting up to `timeout` for a server round
    /// trip.
    pub fn flush_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.0.flush(timeout)
    }

    pub(crate) fn subscribe(
        &self,
        subject: &str,
        queue: Option<&str>,
    ) -> io::Result<(u64, Receiver<Message>)> {
        self.0.subscribe(subject, queue)
    }

    pub(crate) fn unsubscribe(&self, sid: u64) -> io::Result<()> {
        self.0.unsubscribe(sid)
    }

    pub(crate) fn lenient_flush_buffer(&self) {
        self.0.lenient_flush_buffer();
    }

    pub(crate) fn set_old_request_style(&self, enabled: bool) {
        self.0.set_old_request_style(enabled);
    }

    pub(crate) fn pending_message_limit(&self) -> i64 {
        self.0.pending_message_limit()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
