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

use std::{
    collections::VecDeque,
    convert::TryFrom,
    fmt::Debug,
    io::{self, ErrorKind},
};

use crossbeam_channel::Receiver;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::api::{ApiResponse, Error};
use crate::connection::Connection;
use crate::message::Message;
use crate::options::JetStreamOptions;
use crate::pull_subscription::PullSubscription;
use crate::push_subscription::PushSubscription;
use crate::types::*;

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
struct PagedRequest {
    offset: i64,
}

// The server also reports `total`, `offset` and `limit`; paging here
// advances by the number of items received, so only the items matter.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct PagedResponse<T> {
    #[serde(default, alias = "streams", alias = "consumers")]
    pub items: Option<VecDeque<T>>,
}

/// An iterator over paged `JetStream` API operations.
#[derive(Debug)]
pub struct PagedIterator<'a, T> {
    manager: &'a JetStream,
    subject: String,
    offset: i64,
    items: VecDeque<T>,
    done: bool,
}

impl<'a, T> std::iter::FusedIterator for PagedIterator<'a, T> where T: DeserializeOwned + Debug {}

impl<'a, T> Iterator for PagedIterator<'a, T>
where
    T: DeserializeOwned + Debug,
{
    type Item = io::Result<T>;

    fn next(&mut self) -> Option<io::Result<T>> {
        if self.done {
            return None;
        }
        if !self.items.is_empty() {
            return Some(Ok(self.items.pop_front().unwrap()));
        }
        let req = serde_json::ser::to_vec(&PagedRequest {
            offset: self.offset,
        })
        .unwrap();

        let res: io::Result<PagedResponse<T>> = self.manager.js_request(&self.subject, &req);

        let mut page = match res {
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
            Ok(page) => page,
        };

        if page.items.is_none() {
            self.done = true;
            return None;
        }

        let items = page.items.take().unwrap();

        self.offset += i64::try_from(items.len()).unwrap();
        self.items = items;

        if self.items.is_empty() {
            self.done = true;
            None
        } else {
            Some(Ok(self.items.pop_front().unwrap()))
        }
    }
}

/// The identities and plumbing the orchestrator resolves before handing a
/// subscription to its delivery handle.
pub(crate) struct ResolvedSubscription {
    pub(crate) sid: u64,
    pub(crate) messages: Receiver<Message>,
    pub(crate) deliver_subject: String,
    pub(crate) stream: String,
    pub(crate) consumer: String,
    pub(crate) ack_policy: AckPolicy,
    pub(crate) auto_ack: bool,
    pub(crate) ownership: ConsumerOwnership,
}

/// A context for performing `JetStream` operations.
#[derive(Clone, Debug)]
pub struct JetStream {
    pub(crate) connection: Connection,
    pub(crate) options: JetStreamOptions,
    prefix: String,
}

impl JetStream {
    /// Create a new `JetStream` context over the given connection.
    ///
    /// The constructor switches the connection's request/reply machinery to
    /// one reply subject per request and probes the account with
    /// `<prefix>INFO`. It fails with [`ErrorKind::TimedOut`] when the
    /// server does not answer and with a downcastable [`Error`] when
    /// `JetStream` is not enabled for the account.
    pub fn new(connection: Connection, options: JetStreamOptions) -> io::Result<JetStream> {
        // Attach and pull flows receive replies concurrently on distinct
        // inboxes, which the muxed request style cannot route.
        connection.set_old_request_style(true);

        let mut prefix = options.prefix.clone();
        if !prefix.ends_with('.') {
            prefix.push('.');
        }

        let context = JetStream {
            connection,
            options,
            prefix,
        };

        context.account_info()?;

        Ok(context)
    }

    /// Publishes a message to `JetStream` and waits for the acknowledgment.
    pub fn publish(&self, subject: &str, data: impl AsRef<[u8]>) -> io::Result<PublishAck> {
        self.publish_with_options(subject, data, &PublishOptions::default())
    }

    /// Publishes a message to `JetStream` with the given options.
    ///
    /// The acknowledgement must carry a stream name and a non-zero
    /// sequence; when the options name an expected stream, an
    /// acknowledgement from any other stream is an error. Retrying is left
    /// to the caller.
    pub fn publish_with_options(
        &self,
        subject: &str,
        data: impl AsRef<[u8]>,
        options: &PublishOptions,
    ) -> io::Result<PublishAck> {
        let timeout = options.timeout.unwrap_or(self.options.request_timeout);
        let response = self
            .connection
            .request_timeout(subject, data.as_ref(), timeout)?;

        let res: ApiResponse<PublishAck> = serde_json::de::from_slice(&response.data)?;
        let ack = match res {
            ApiResponse::Ok(ack) => ack,
            ApiResponse::Err { error } => {
                log::debug!(
                    "jetstream publish request failed: {:?}",
                    std::str::from_utf8(&response.data)
                );
                return Err(io::Error::new(ErrorKind::Other, error));
            }
        };

        if ack.stream.is_empty() || ack.sequence == 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "invalid JetStream publish ack",
            ));
        }

        if let Some(expected) = options.stream.as_deref() {
            if expected != ack.stream {
                return Err(io::Error::new(
                    ErrorKind::Other,
                    format!(
                        "expected ack from stream {expected}, received from {}",
                        ack.stream
                    ),
                ));
            }
        }

        Ok(ack)
    }

    /// Create a push consumer subscription.
    ///
    /// Looks the stream up by `subject` and creates an ephemeral consumer
    /// delivering to a fresh inbox. Use [`JetStream::subscribe_with_options`]
    /// to create a durable consumer or to attach to an existing one.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
    /// let context = jetstream::new(nc)?;
    /// let subscription = context.subscribe("events")?;
    /// println!("received {:?}", subscription.next());
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self, subject: &str) -> io::Result<PushSubscription> {
        self.do_push_subscribe(subject, None, &SubscribeOptions::default())
    }

    /// Create a push consumer subscription with options.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use jetstream::SubscribeOptions;
    /// # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
    /// # let context = jetstream::new(nc)?;
    /// let subscription = context.subscribe_with_options(
    ///     "events",
    ///     &SubscribeOptions::builder().durable("worker").build()?,
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe_with_options(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> io::Result<PushSubscription> {
        self.do_push_subscribe(subject, None, options)
    }

    /// Create a push consumer subscription in a queue group. Messages are
    /// balanced across the members of the group.
    pub fn queue_subscribe(&self, subject: &str, queue: &str) -> io::Result<PushSubscription> {
        self.do_push_subscribe(subject, Some(queue), &SubscribeOptions::default())
    }

    /// Create a push consumer subscription in a queue group, with options.
    pub fn queue_subscribe_with_options(
        &self,
        subject: &str,
        queue: &str,
        options: &SubscribeOptions,
    ) -> io::Result<PushSubscription> {
        self.do_push_subscribe(subject, Some(queue), options)
    }

    /// Create a pull subscription, looking the stream up by `subject`.
    ///
    /// No messages flow until a batch is requested.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
    /// # let context = jetstream::new(nc)?;
    /// let subscription = context.pull_subscribe("work")?;
    /// subscription.pull(10)?;
    /// for message in subscription.fetch(10)? {
    ///     message.ack()?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn pull_subscribe(&self, subject: &str) -> io::Result<PullSubscription> {
        self.do_pull_subscribe(subject, &SubscribeOptions::default())
    }

    /// Create a pull subscription with options. When the options carry a
    /// pull batch size, one batch of that size is requested immediately.
    pub fn pull_subscribe_with_options(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> io::Result<PullSubscription> {
        self.do_pull_subscribe(subject, options)
    }

    fn do_push_subscribe(
        &self,
        subject: &str,
        queue: Option<&str>,
        options: &SubscribeOptions,
    ) -> io::Result<PushSubscription> {
        validate_subject(subject, "subject")?;
        if let Some(queue) = queue {
            validate_name(queue, "queue group")?;
        }

        if options.pull_batch_size > 0 {
            return Err(io::Error::new(
                ErrorKind::Other,
                "must use pull subscribe to bind to a pull based consumer",
            ));
        }

        let resolved = self.resolve_subscription(subject, queue, options, false)?;
        Ok(PushSubscription::new(resolved, self.clone()))
    }

    fn do_pull_subscribe(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> io::Result<PullSubscription> {
        validate_subject(subject, "subject")?;

        let config = &options.consumer_config;
        if config.deliver_subject.is_some() {
            return Err(io::Error::new(
                ErrorKind::Other,
                "pull subscription cannot bind to a push consumer",
            ));
        }
        if config.ack_policy == AckPolicy::None {
            return Err(io::Error::new(
                ErrorKind::Other,
                "pull subscription cannot have ack policy set to None",
            ));
        }

        let resolved = self.resolve_subscription(subject, None, options, true)?;
        let subscription = PullSubscription::new(resolved, self.clone());

        if options.pull_batch_size > 0 {
            subscription.pull(options.pull_batch_size)?;
        }

        Ok(subscription)
    }

    /// The orchestration shared by push and pull subscriptions: decide
    /// whether to attach to an existing consumer or create one, resolve the
    /// delivery subject, and wire up the local subscription.
    fn resolve_subscription(
        &self,
        subject: &str,
        queue: Option<&str>,
        options: &SubscribeOptions,
        is_pull: bool,
    ) -> io::Result<ResolvedSubscription> {
        let mut config = options.consumer_config.clone();
        let direct = self.options.direct || options.direct;
        let should_attach = (options.stream.is_some() && options.consumer.is_some())
            || config.deliver_subject.is_some();

        if should_attach && !direct {
            return Err(io::Error::new(
                ErrorKind::Other,
                "attaching to an existing consumer requires direct mode",
            ));
        }

        if should_attach {
            let deliver_subject = match config.deliver_subject.clone() {
                // An explicit deliver subject needs no lookup.
                Some(deliver_subject) => deliver_subject,
                None => {
                    // `should_attach` guarantees both names here.
                    let stream = options.stream.as_deref().unwrap();
                    let consumer = options.consumer.as_deref().unwrap();

                    let info = self.consumer_info(stream, consumer)?;
                    if !info.config.filter_subject.is_empty()
                        && info.config.filter_subject != subject
                    {
                        return Err(io::Error::new(
                            ErrorKind::InvalidInput,
                            format!(
                                "subject {subject} does not match the consumer filter subject {}",
                                info.config.filter_subject
                            ),
                        ));
                    }

                    info.config
                        .deliver_subject
                        .unwrap_or_else(|| self.connection.new_inbox())
                }
            };

            let (sid, messages) = self.connection.subscribe(&deliver_subject, queue)?;

            return Ok(ResolvedSubscription {
                sid,
                messages,
                deliver_subject,
                stream: options.stream.clone().unwrap_or_default(),
                consumer: options.consumer.clone().unwrap_or_default(),
                ack_policy: config.ack_policy,
                auto_ack: options.auto_ack,
                // Attached consumers belong to whoever created them.
                ownership: ConsumerOwnership::No,
            });
        }

        // Create path.
        let stream_name = self.stream_name_by_subject(subject)?;
        let deliver_subject = self.connection.new_inbox();
        if !is_pull {
            config.deliver_subject = Some(deliver_subject.clone());
        }
        config.filter_subject = subject.to_string();
        if config.max_ack_pending == 0 {
            config.max_ack_pending = self.connection.pending_message_limit();
        }

        // The local subscription must exist before the consumer so that no
        // server-delivered message can race ahead of a ready receiver.
        let (sid, messages) = self.connection.subscribe(&deliver_subject, queue)?;

        let info = match self.add_consumer(&stream_name, &config) {
            Ok(info) => info,
            Err(err) => {
                self.connection.unsubscribe(sid).ok();
                return Err(err);
            }
        };

        let ownership = if info.config.durable_name.is_some() {
            ConsumerOwnership::No
        } else {
            ConsumerOwnership::Yes
        };

        Ok(ResolvedSubscription {
            sid,
            messages,
            deliver_subject,
            stream: info.stream_name,
            consumer: info.name,
            ack_policy: info.config.ack_policy,
            auto_ack: options.auto_ack,
            ownership,
        })
    }

    /// Create a `JetStream` stream.
    pub fn add_stream<S>(&self, stream_config: S) -> io::Result<StreamInfo>
    where
        StreamConfig: From<S>,
    {
        let config: StreamConfig = stream_config.into();
        validate_name(&config.name, "stream name")?;
        let subject = format!("{}STREAM.CREATE.{}", self.prefix, config.name);
        let req = serde_json::ser::to_vec(&config)?;
        self.js_request(&subject, &req)
    }

    /// Update a `JetStream` stream.
    pub fn update_stream(&self, config: &StreamConfig) -> io::Result<StreamInfo> {
        validate_name(&config.name, "stream name")?;
        let subject = format!("{}STREAM.UPDATE.{}", self.prefix, config.name);
        let req = serde_json::ser::to_vec(config)?;
        self.js_request(&subject, &req)
    }

    /// List all `JetStream` stream names. If you also want stream
    /// information, use the `list_streams` method instead.
    pub fn stream_names(&self) -> PagedIterator<'_, String> {
        PagedIterator {
            subject: format!("{}STREAM.NAMES", self.prefix),
            manager: self,
            offset: 0,
            items: Default::default(),
            done: false,
        }
    }

    /// List all `JetStream` streams.
    pub fn list_streams(&self) -> PagedIterator<'_, StreamInfo> {
        PagedIterator {
            subject: format!("{}STREAM.LIST", self.prefix),
            manager: self,
            offset: 0,
            items: Default::default(),
            done: false,
        }
    }

    /// List `JetStream` consumers for a stream.
    pub fn list_consumers<S>(&self, stream: S) -> io::Result<PagedIterator<'_, ConsumerInfo>>
    where
        S: AsRef<str>,
    {
        let stream = stream.as_ref();
        if stream.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the stream name must not be empty",
            ));
        }
        let subject = format!("{}CONSUMER.LIST.{}", self.prefix, stream);

        Ok(PagedIterator {
            subject,
            manager: self,
            offset: 0,
            items: Default::default(),
            done: false,
        })
    }

    /// Query `JetStream` stream information.
    pub fn stream_info<S: AsRef<str>>(&self, stream: S) -> io::Result<StreamInfo> {
        let stream = stream.as_ref();
        if stream.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the stream name must not be empty",
            ));
        }
        let subject = format!("{}STREAM.INFO.{}", self.prefix, stream);
        self.js_request(&subject, b"")
    }

    /// Purge `JetStream` stream messages.
    pub fn purge_stream<S: AsRef<str>>(&self, stream: S) -> io::Result<PurgeResponse> {
        let stream = stream.as_ref();
        if stream.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the stream name must not be empty",
            ));
        }
        let subject = format!("{}STREAM.PURGE.{}", self.prefix, stream);
        self.js_request(&subject, b"")
    }

    /// Delete a message in a `JetStream` stream.
    pub fn delete_message<S: AsRef<str>>(
        &self,
        stream: S,
        sequence_number: u64,
    ) -> io::Result<bool> {
        let stream = stream.as_ref();
        if stream.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the stream name must not be empty",
            ));
        }

        let req = serde_json::ser::to_vec(&DeleteRequest {
            seq: sequence_number,
        })?;

        let subject = format!("{}STREAM.MSG.DELETE.{}", self.prefix, stream);

        self.js_request::<DeleteResponse>(&subject, &req)
            .map(|dr| dr.success)
    }

    /// Delete a `JetStream` stream.
    pub fn delete_stream<S: AsRef<str>>(&self, stream: S) -> io::Result<bool> {
        let stream = stream.as_ref();
        if stream.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the stream name must not be empty",
            ));
        }

        let subject = format!("{}STREAM.DELETE.{}", self.prefix, stream);
        self.js_request::<DeleteResponse>(&subject, b"")
            .map(|dr| dr.success)
    }

    /// Create a `JetStream` consumer.
    ///
    /// A configuration with a durable name is created through the durable
    /// endpoint and survives this client; an ephemeral configuration is
    /// created through the plain endpoint and lives as long as its
    /// subscription.
    pub fn add_consumer<S, C>(&self, stream: S, config: C) -> io::Result<ConsumerInfo>
    where
        S: AsRef<str>,
        ConsumerConfig: From<C>,
    {
        let config = ConsumerConfig::from(config);
        let stream = stream.as_ref();
        if stream.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the stream name must not be empty",
            ));
        }

        let subject = if let Some(ref durable_name) = config.durable_name {
            format!(
                "{}CONSUMER.DURABLE.CREATE.{}.{}",
                self.prefix, stream, durable_name
            )
        } else {
            format!("{}CONSUMER.CREATE.{}", self.prefix, stream)
        };

        let req = CreateConsumerRequest {
            stream_name: stream.into(),
            config,
        };

        let ser_req = serde_json::ser::to_vec(&req)?;
        self.js_request(&subject, &ser_req)
    }

    /// Delete a `JetStream` consumer.
    pub fn delete_consumer<S, C>(&self, stream: S, consumer: C) -> io::Result<bool>
    where
        S: AsRef<str>,
        C: AsRef<str>,
    {
        let stream = stream.as_ref();
        if stream.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the stream name must not be empty",
            ));
        }
        let consumer = consumer.as_ref();
        if consumer.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the consumer name must not be empty",
            ));
        }

        let subject = format!("{}CONSUMER.DELETE.{}.{}", self.prefix, stream, consumer);

        self.js_request::<DeleteResponse>(&subject, b"")
            .map(|dr| dr.success)
    }

    /// Query `JetStream` consumer information.
    pub fn consumer_info<S, C>(&self, stream: S, consumer: C) -> io::Result<ConsumerInfo>
    where
        S: AsRef<str>,
        C: AsRef<str>,
    {
        let stream = stream.as_ref();
        if stream.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "the stream name must not be empty",
            ));
        }
        let consumer = consumer.as_ref();
        let subject = format!("{}CONSUMER.INFO.{}.{}", self.prefix, stream, consumer);
        self.js_request(&subject, b"")
    }

    /// Query `JetStream` account information.
    pub fn account_info(&self) -> io::Result<AccountInfo> {
        self.js_request(&format!("{}INFO", self.prefix), b"")
    }

    /// Look up the one stream bound to `subject`. Zero matches and several
    /// matches are both failures.
    fn stream_name_by_subject(&self, subject: &str) -> io::Result<String> {
        let req = serde_json::ser::to_vec(&StreamNamesRequest {
            subject: subject.to_string(),
        })?;
        let request_subject = format!("{}STREAM.NAMES", self.prefix);
        let response: StreamNamesResponse = self.js_request(&request_subject, &req)?;

        let mut streams = response.streams.unwrap_or_default();
        match streams.len() {
            0 => Err(io::Error::new(
                ErrorKind::NotFound,
                "no stream matches the given subject",
            )),
            1 => Ok(streams.remove(0)),
            _ => Err(io::Error::new(
                ErrorKind::Other,
                "multiple streams match the given subject",
            )),
        }
    }

    fn js_request<Res>(&self, subject: &str, req: &[u8]) -> io::Result<Res>
    where
        Res: DeserializeOwned,
    {
        let res_msg = self
            .connection
            .request_timeout(subject, req, self.options.request_timeout)?;
        let res: ApiResponse<Res> = serde_json::de::from_slice(&res_msg.data)?;
        match res {
            ApiResponse::Ok(response) => Ok(response),
            ApiResponse::Err { error } => {
                log::debug!(
                    "jetstream api request to {} failed: {:?}",
                    subject,
                    std::str::from_utf8(&res_msg.data)
                );

                Err(api_error(error))
            }
        }
    }

    pub(crate) fn api_prefix(&self) -> &str {
        &self.prefix
    }
}

/// Wrap an API error into an `io::Error`, keeping the typed error
/// downcastable and surfacing missing streams and consumers as `NotFound`.
fn api_error(error: Error) -> io::Error {
    if error.error_code().is_not_found() {
        io::Error::new(ErrorKind::NotFound, error)
    } else {
        io::Error::new(ErrorKind::Other, error)
    }
}

/// Creates a new `JetStream` context using the given `Connection` and
/// default options.
pub fn new(connection: Connection) -> io::Result<JetStream> {
    JetStream::new(connection, JetStreamOptions::default())
}
