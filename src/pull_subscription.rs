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
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use time::OffsetDateTime;

use crate::context::{JetStream, ResolvedSubscription};
use crate::message::Message;
use crate::types::{AckPolicy, BatchOptions, ConsumerInfo, ConsumerOwnership, MAX_PULL_BATCH};

#[derive(Debug)]
pub(crate) struct Inner {
    /// Subscription ID of the inbox subscription.
    pub(crate) sid: u64,

    /// Messages channel for this subscription.
    pub(crate) messages: channel::Receiver<Message>,

    /// The inbox batches are delivered to.
    pub(crate) inbox: String,

    /// Name of the stream associated with the subscription.
    pub(crate) stream: String,

    /// Name of the consumer associated with the subscription.
    pub(crate) consumer: String,

    /// Ack policy used in methods that automatically ack.
    pub(crate) consumer_ack_policy: AckPolicy,

    /// Indicates if we own the consumer and are responsible for deleting
    /// it or not.
    pub(crate) consumer_ownership: ConsumerOwnership,

    /// Set once the subscription has been torn down. Later pulls must not
    /// reach the server.
    pub(crate) unsubscribed: AtomicBool,

    /// Context associated with the subscription.
    pub(crate) context: JetStream,
}

impl Inner {
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

/// A `PullSubscription` delivers messages only when the client asks for
/// them: each [`PullSubscription::pull`] (or its `no_wait`/`expires`
/// variants) requests one batch from the server.
#[derive(Clone, Debug)]
pub struct PullSubscription(pub(crate) Arc<Inner>);

impl PullSubscription {
    /// Creates a subscription out of the orchestrator's resolution.
    pub(crate) fn new(resolved: ResolvedSubscription, context: JetStream) -> PullSubscription {
        PullSubscription(Arc::new(Inner {
            sid: resolved.sid,
            messages: resolved.messages,
            inbox: resolved.deliver_subject,
            stream: resolved.stream,
            consumer: resolved.consumer,
            consumer_ack_policy: resolved.ack_policy,
            consumer_ownership: resolved.ownership,
            unsubscribed: AtomicBool::new(false),
            context,
        }))
    }

    /// Request a batch of up to `batch` messages.
    ///
    /// The server delivers up to `batch` messages to the subscription's
    /// inbox; fewer may arrive. Batch sizes must be between 1 and 256.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
    /// # let context = jetstream::new(nc)?;
    /// let subscription = context.pull_subscribe("work")?;
    /// subscription.pull(10)?;
    /// let message = subscription.next();
    /// println!("received {:?}", message);
    /// # Ok(())
    /// # }
    /// ```
    pub fn pull(&self, batch: usize) -> io::Result<()> {
        self.request_batch(batch)
    }

    /// Request a batch of up to `batch` messages, instructing the server
    /// to answer immediately. When no messages are available the server
    /// sends a 404-status marker instead of holding the request.
    pub fn pull_no_wait(&self, batch: usize) -> io::Result<()> {
        self.request_batch(BatchOptions {
            batch,
            expires: None,
            no_wait: true,
        })
    }

    /// Request a batch of up to `batch` messages with an expiry. The
    /// server forgets the request once `expires_in` has elapsed, measured
    /// from now and sent as an absolute timestamp.
    pub fn pull_expires_in(&self, batch: usize, expires_in: Duration) -> io::Result<()> {
        let expires = OffsetDateTime::now_utc() + expires_in;
        let expires = u64::try_from(expires.unix_timestamp_nanos())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "expiry out of range"))?;

        self.request_batch(BatchOptions {
            batch,
            expires: Some(expires),
            no_wait: false,
        })
    }

    /// Sends a request for a batch of messages. This method does not return
    /// any messages; it gives more granular control over how many requests
    /// are sent and when.
    ///
    /// It accepts either a `usize` batch size or full [`BatchOptions`].
    pub fn request_batch<I: Into<BatchOptions>>(&self, batch: I) -> io::Result<()> {
        let batch_opts = batch.into();

        if batch_opts.batch == 0 || batch_opts.batch > MAX_PULL_BATCH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("pull batch size must be between 1 and {MAX_PULL_BATCH}"),
            ));
        }

        if self.0.unsubscribed.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "subscription has been unsubscribed",
            ));
        }

        let subject = format!(
            "{}CONSUMER.MSG.NEXT.{}.{}",
            self.0.context.api_prefix(),
            self.0.stream,
            self.0.consumer,
        );

        let request = serde_json::to_vec(&batch_opts)?;

        self.0.context.connection.publish_with_reply(
            &subject,
            self.0.inbox.as_str(),
            request,
        )?;
        self.0.context.connection.lenient_flush_buffer();
        Ok(())
    }

    /// Fetch up to `batch` messages and return a blocking iterator over
    /// them. The iterator ends after `batch` messages, or earlier when the
    /// server signals that the request is exhausted.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
    /// # let context = jetstream::new(nc)?;
    /// let subscription = context.pull_subscribe("work")?;
    /// for message in subscription.fetch(10)? {
    ///     println!("received {:?}", message);
    ///     message.ack()?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn fetch<I: Into<BatchOptions>>(&self, batch: I) -> io::Result<BatchIter<'_>> {
        let batch_options = batch.into();
        self.request_batch(batch_options)?;
        Ok(BatchIter {
            batch_size: batch_options.batch,
            processed: 0,
            subscription: self,
        })
    }

    /// Fetch up to `batch` messages, waiting up to `timeout` for each one.
    pub fn timeout_fetch<I: Into<BatchOptions>>(
        &self,
        batch: I,
        timeout: Duration,
    ) -> io::Result<TimeoutBatchIter<'_>> {
        let batch_options = batch.into();
        self.request_batch(batch_options)?;
        Ok(TimeoutBatchIter {
            timeout,
            batch_size: batch_options.batch,
            processed: 0,
            subscription: self,
        })
    }

    /// Fetch a batch of messages, process each with `handler` and
    /// acknowledge them according to the consumer's ack policy: each
    /// message under `Explicit`, only the last one under `All`.
    pub fn fetch_with_handler<F, I>(&self, batch: I, mut handler: F) -> io::Result<()>
    where
        F: FnMut(&Message) -> io::Result<()>,
        I: Into<BatchOptions> + Copy,
    {
        let consumer_ack_policy = self.0.consumer_ack_policy;
        let mut last_message = None;

        for message in self.fetch(batch)? {
            handler(&message)?;
            if consumer_ack_policy == AckPolicy::Explicit {
                message.ack()?;
            }
            last_message = Some(message);
        }

        if consumer_ack_policy == AckPolicy::All {
            if let Some(last_message) = last_message {
                last_message.ack()?;
            }
        }

        Ok(())
    }

    /// Pull the next available message, blocking indefinitely. Requires a
    /// prior batch request. Server markers that end a batch make this
    /// return `None`.
    pub fn next(&self) -> Option<Message> {
        self.preprocess(self.0.messages.recv().ok())
    }

    /// Pull the next available message without blocking, yielding `None`
    /// when the queue is empty. Requires a prior batch request.
    pub fn try_next(&self) -> Option<Message> {
        self.preprocess(self.0.messages.try_recv().ok())
    }

    /// Pull the next available message, waiting up to `timeout`. Requires
    /// a prior batch request.
    ///
    /// A 404 no-messages marker is skipped (the request was drained); a
    /// 408 marker means the pull request itself expired on the server.
    pub fn next_timeout(&self, mut timeout: Duration) -> io::Result<Message> {
        loop {
            let start = Instant::now();
            return match self.0.messages.recv_timeout(timeout) {
                Ok(message) => {
                    if message.is_no_messages() {
                        timeout = timeout.saturating_sub(start.elapsed());
                        continue;
                    }
                    if message.is_request_timeout() {
                        return Err(io::Error::new(
                            io::ErrorKind::Other,
                            "next_timeout: pull request timed out",
                        ));
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

    /// Returns an iterator over incoming messages. Yields nothing unless a
    /// batch was requested first.
    pub fn iter(&self) -> Iter<'_> {
        Iter { subscription: self }
    }

    /// Sends a request to fetch current information about the target
    /// consumer.
    pub fn consumer_info(&self) -> io::Result<ConsumerInfo> {
        self.0
            .context
            .consumer_info(&self.0.stream, &self.0.consumer)
    }

    /// The inbox batches are delivered to.
    pub fn deliver_subject(&self) -> &str {
        &self.0.inbox
    }

    /// Unsubscribe from the server and stop the flow of messages. Once
    /// unsubscribed, batch requests fail without reaching the server.
    ///
    /// An ephemeral consumer created for this subscription is deleted; a
    /// durable consumer persists and must be removed with
    /// [`JetStream::delete_consumer`] when it is no longer wanted.
    pub fn unsubscribe(self) -> io::Result<()> {
        self.0.shutdown()?;

        // Discard all queued messages.
        while self.0.messages.try_recv().is_ok() {}

        Ok(())
    }

    /// Utility to stop iterators when an end-of-request marker is
    /// encountered.
    fn preprocess(&self, message: Option<Message>) -> Option<Message> {
        if let Some(message) = message {
            if message.is_no_messages() {
                return None;
            }
            if message.is_request_timeout() {
                return None;
            }
            return Some(message);
        }
        message
    }
}

/// Iterator that endlessly waits for messages, unless an end-of-request
/// marker is encountered.
pub struct Iter<'a> {
    subscription: &'a PullSubscription,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Message;
    fn next(&mut self) -> Option<Self::Item> {
        self.subscription.next()
    }
}

/// Iterator for handling batches of messages. Works like `Iter` except it
/// stops after yielding the number of messages requested in the batch.
pub struct BatchIter<'a> {
    batch_size: usize,
    processed: usize,
    subscription: &'a PullSubscription,
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = Message;
    fn next(&mut self) -> Option<Self::Item> {
        if self.processed >= self.batch_size {
            None
        } else {
            self.processed += 1;
            self.subscription.next()
        }
    }
}

/// Iterator for handling batches of messages with a per-message timeout.
pub struct TimeoutBatchIter<'a> {
    batch_size: usize,
    processed: usize,
    timeout: Duration,
    subscription: &'a PullSubscription,
}

impl<'a> Iterator for TimeoutBatchIter<'a> {
    type Item = io::Result<Message>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.processed >= self.batch_size {
            None
        } else {
            self.processed += 1;
            Some(self.subscription.next_timeout(self.timeout))
        }
    }
}

impl From<usize> for BatchOptions {
    fn from(batch: usize) -> Self {
        BatchOptions {
            batch,
            expires: None,
            no_wait: false,
        }
    }
}
