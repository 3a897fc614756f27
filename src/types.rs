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

use std::io::{self, ErrorKind};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rfc3339;

/// A UTC time.
pub type DateTime = time::OffsetDateTime;

/// The largest batch a single pull request may ask for.
pub(crate) const MAX_PULL_BATCH: usize = 256;

fn is_default<T: Default + Eq>(t: &T) -> bool {
    t == &T::default()
}

fn negative_one() -> i64 {
    -1
}

/// Stream and durable names are plain tokens: no whitespace and none of the
/// subject separators or wildcards.
pub(crate) fn validate_name(name: &str, what: &str) -> io::Result<()> {
    if name.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("the {what} must not be empty"),
        ));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("the {what} must not contain whitespace"),
        ));
    }
    if name.contains('.') || name.contains('*') || name.contains('>') {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("the {what} must not contain '.', '*' or '>'"),
        ));
    }
    Ok(())
}

/// Subjects may carry wildcards but never whitespace.
pub(crate) fn validate_subject(subject: &str, what: &str) -> io::Result<()> {
    if subject.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("the {what} must not be empty"),
        ));
    }
    if subject.chars().any(char::is_whitespace) {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("the {what} must not contain whitespace"),
        ));
    }
    Ok(())
}

#[derive(Serialize)]
pub(crate) struct DeleteRequest {
    pub seq: u64,
}

#[derive(Deserialize)]
pub(crate) struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct CreateConsumerRequest {
    pub stream_name: String,
    pub config: ConsumerConfig,
}

/// Indicates if ownership of a consumer is local or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConsumerOwnership {
    /// Ephemeral consumer created for a subscription, deleted with it.
    Yes,
    /// Durable or pre-existing consumer, lifetime is handled by the user.
    No,
}

/// Configuration for consumers. From a high level, the `durable_name` and
/// `deliver_subject` fields have a particularly strong influence on the
/// consumer's overall behavior.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Setting `deliver_subject` to `Some(...)` will cause this consumer
    /// to be "push-based": the server streams messages to that subject as
    /// they arrive. Setting it to `None` will cause this consumer to be
    /// "pull-based", and will require explicit requests for each batch of
    /// messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_subject: Option<String>,
    /// Setting `durable_name` to `Some(...)` will cause this consumer to
    /// be "durable". This may be a good choice for workloads that benefit
    /// from the `JetStream` server or cluster remembering the progress of
    /// consumers for fault tolerance purposes. If a consumer crashes, the
    /// `JetStream` server or cluster will remember which messages the
    /// consumer acknowledged.
    ///
    /// Setting `durable_name` to `None` will cause this consumer to be
    /// "ephemeral", removed by the server once no subscription uses it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durable_name: Option<String>,
    /// Allows for a variety of options that determine how this consumer
    /// will receive messages.
    #[serde(default)]
    pub deliver_policy: DeliverPolicy,
    /// Used in combination with `DeliverPolicy::ByStartSeq` to only select
    /// messages arriving after this sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_start_seq: Option<u64>,
    /// Used in combination with `DeliverPolicy::ByStartTime` to only select
    /// messages arriving after this time.
    #[serde(default, with = "rfc3339::option", skip_serializing_if = "is_default")]
    pub opt_start_time: Option<DateTime>,
    /// How messages should be acknowledged.
    #[serde(default)]
    pub ack_policy: AckPolicy,
    /// How long to allow messages to remain un-acknowledged before
    /// attempting redelivery.
    #[serde(default, with = "serde_nanos", skip_serializing_if = "is_default")]
    pub ack_wait: Duration,
    /// Maximum number of times a specific message will be delivered. Use
    /// this to avoid poison pill messages that repeatedly crash your
    /// consumer processes forever.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_deliver: i64,
    /// When consuming from a stream with many subjects, or wildcards, this
    /// selects only specific incoming subjects. Supports wildcards.
    #[serde(default, skip_serializing_if = "is_default")]
    pub filter_subject: String,
    /// Whether messages are sent as quickly as possible or at the rate of
    /// receipt.
    #[serde(default)]
    pub replay_policy: ReplayPolicy,
    /// The rate of message delivery in bits per second.
    #[serde(default, skip_serializing_if = "is_default")]
    pub rate_limit: u64,
    /// What percentage of acknowledgments should be sampled for
    /// observability, 0-100.
    #[serde(default, skip_serializing_if = "is_default")]
    pub sample_frequency: u8,
    /// The maximum number of waiting pull requests.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_waiting: i64,
    /// The maximum number of unacknowledged messages that may be in-flight
    /// before pausing sending additional messages to this consumer.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_ack_pending: i64,
}

impl ConsumerConfig {
    /// Start building a validated consumer configuration.
    pub fn builder() -> ConsumerConfigBuilder {
        ConsumerConfigBuilder::default()
    }
}

impl From<&ConsumerConfig> for ConsumerConfig {
    fn from(cc: &ConsumerConfig) -> ConsumerConfig {
        cc.clone()
    }
}

impl From<&str> for ConsumerConfig {
    fn from(s: &str) -> ConsumerConfig {
        ConsumerConfig {
            durable_name: Some(s.to_string()),
            ..Default::default()
        }
    }
}

/// Builds a validated [`ConsumerConfig`].
#[derive(Debug, Default, Clone)]
pub struct ConsumerConfigBuilder {
    config: ConsumerConfig,
}

impl ConsumerConfigBuilder {
    /// Set the durable name, committing the consumer to a named identity
    /// persisted by the server.
    pub fn durable(mut self, durable_name: impl Into<String>) -> Self {
        self.config.durable_name = Some(durable_name.into());
        self
    }

    /// Set the subject the server pushes messages to, making the consumer
    /// push-based.
    pub fn deliver_subject(mut self, deliver_subject: impl Into<String>) -> Self {
        self.config.deliver_subject = Some(deliver_subject.into());
        self
    }

    /// Select which message the consumer starts from.
    pub fn deliver_policy(mut self, deliver_policy: DeliverPolicy) -> Self {
        self.config.deliver_policy = deliver_policy;
        self
    }

    /// Start from this stream sequence, with `DeliverPolicy::ByStartSeq`.
    pub fn opt_start_seq(mut self, opt_start_seq: u64) -> Self {
        self.config.opt_start_seq = Some(opt_start_seq);
        self
    }

    /// Start from this time, with `DeliverPolicy::ByStartTime`.
    pub fn opt_start_time(mut self, opt_start_time: DateTime) -> Self {
        self.config.opt_start_time = Some(opt_start_time);
        self
    }

    /// Set the acknowledgement policy.
    pub fn ack_policy(mut self, ack_policy: AckPolicy) -> Self {
        self.config.ack_policy = ack_policy;
        self
    }

    /// Set the redelivery window for unacknowledged messages.
    pub fn ack_wait(mut self, ack_wait: Duration) -> Self {
        self.config.ack_wait = ack_wait;
        self
    }

    /// Set the maximum number of delivery attempts per message.
    pub fn max_deliver(mut self, max_deliver: i64) -> Self {
        self.config.max_deliver = max_deliver;
        self
    }

    /// Restrict the consumer to a subset of the stream's subjects.
    pub fn filter_subject(mut self, filter_subject: impl Into<String>) -> Self {
        self.config.filter_subject = filter_subject.into();
        self
    }

    /// Set the replay pacing.
    pub fn replay_policy(mut self, replay_policy: ReplayPolicy) -> Self {
        self.config.replay_policy = replay_policy;
        self
    }

    /// Set the delivery rate limit in bits per second.
    pub fn rate_limit(mut self, rate_limit: u64) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Set the acknowledgement sampling percentage.
    pub fn sample_frequency(mut self, sample_frequency: u8) -> Self {
        self.config.sample_frequency = sample_frequency;
        self
    }

    /// Set the maximum number of waiting pull requests.
    pub fn max_waiting(mut self, max_waiting: i64) -> Self {
        self.config.max_waiting = max_waiting;
        self
    }

    /// Set the in-flight unacknowledged message bound.
    pub fn max_ack_pending(mut self, max_ack_pending: i64) -> Self {
        self.config.max_ack_pending = max_ack_pending;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> io::Result<ConsumerConfig> {
        if let Some(durable_name) = &self.config.durable_name {
            validate_name(durable_name, "durable name")?;
        }
        if let Some(deliver_subject) = &self.config.deliver_subject {
            validate_subject(deliver_subject, "deliver subject")?;
        }
        if !self.config.filter_subject.is_empty() {
            validate_subject(&self.config.filter_subject, "filter subject")?;
        }
        Ok(self.config)
    }
}

/// `StreamConfig` determines the properties for a stream.
/// There are sensible defaults for most. If no subjects are given the name
/// will be used as the only subject.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// A name for the stream. Must not contain whitespace, `.`, `*` or `>`.
    pub name: String,
    /// Which NATS subjects to populate this stream with. Supports
    /// wildcards. Defaults to just the configured stream `name`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    /// How message retention is considered, `Limits` (default), `Interest`
    /// or `WorkQueue`.
    #[serde(default)]
    pub retention: RetentionPolicy,
    /// How many consumers can be defined for a given stream, -1 for
    /// unlimited.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_consumers: i32,
    /// How large the stream may become in total messages before the
    /// configured discard policy kicks in.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_msgs: i64,
    /// How large the stream may become in total bytes before the configured
    /// discard policy kicks in.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_bytes: i64,
    /// Maximum age of any message in the stream.
    #[serde(default, with = "serde_nanos", skip_serializing_if = "is_default")]
    pub max_age: Duration,
    /// The largest message that will be accepted by the stream.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_msg_size: i32,
    /// When a stream has reached its configured `max_bytes` or `max_msgs`,
    /// this policy kicks in. `DiscardPolicy::New` refuses new messages or
    /// `DiscardPolicy::Old` (default) deletes old messages to make space.
    #[serde(default)]
    pub discard: DiscardPolicy,
    /// The type of storage backend, `File` (default) and `Memory`.
    #[serde(default)]
    pub storage: StorageType,
    /// How many replicas to keep for each message in a clustered
    /// `JetStream`, maximum 5.
    #[serde(default, skip_serializing_if = "is_default")]
    pub num_replicas: usize,
    /// Disables acknowledging messages that are received by the stream.
    #[serde(default, skip_serializing_if = "is_default")]
    pub no_ack: bool,
    /// The window within which to track duplicate messages, in nanoseconds.
    #[serde(default, skip_serializing_if = "is_default")]
    pub duplicate_window: i64,
}

impl StreamConfig {
    /// Start building a validated stream configuration.
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::default()
    }
}

impl From<&StreamConfig> for StreamConfig {
    fn from(sc: &StreamConfig) -> StreamConfig {
        sc.clone()
    }
}

impl From<&str> for StreamConfig {
    fn from(s: &str) -> StreamConfig {
        StreamConfig {
            name: s.to_string(),
            ..Default::default()
        }
    }
}

/// Builds a validated [`StreamConfig`].
#[derive(Debug, Default, Clone)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    /// Set the stream name. Required.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Add a subject to populate the stream with.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.config.subjects.push(subject.into());
        self
    }

    /// Replace the set of subjects to populate the stream with.
    pub fn subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retention policy.
    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.config.retention = retention;
        self
    }

    /// Cap the number of consumers, -1 for unlimited.
    pub fn max_consumers(mut self, max_consumers: i32) -> Self {
        self.config.max_consumers = max_consumers;
        self
    }

    /// Cap the total message count.
    pub fn max_msgs(mut self, max_msgs: i64) -> Self {
        self.config.max_msgs = max_msgs;
        self
    }

    /// Cap the total stored bytes.
    pub fn max_bytes(mut self, max_bytes: i64) -> Self {
        self.config.max_bytes = max_bytes;
        self
    }

    /// Cap the age of stored messages.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = max_age;
        self
    }

    /// Cap the size of a single message.
    pub fn max_msg_size(mut self, max_msg_size: i32) -> Self {
        self.config.max_msg_size = max_msg_size;
        self
    }

    /// Set the discard policy applied once a limit is hit.
    pub fn discard(mut self, discard: DiscardPolicy) -> Self {
        self.config.discard = discard;
        self
    }

    /// Set the storage backend.
    pub fn storage(mut self, storage: StorageType) -> Self {
        self.config.storage = storage;
        self
    }

    /// Set the replication factor.
    pub fn num_replicas(mut self, num_replicas: usize) -> Self {
        self.config.num_replicas = num_replicas;
        self
    }

    /// Disable stream-level acknowledgements.
    pub fn no_ack(mut self, no_ack: bool) -> Self {
        self.config.no_ack = no_ack;
        self
    }

    /// Set the duplicate tracking window in nanoseconds.
    pub fn duplicate_window(mut self, duplicate_window: i64) -> Self {
        self.config.duplicate_window = duplicate_window;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> io::Result<StreamConfig> {
        validate_name(&self.config.name, "stream name")?;
        for subject in &self.config.subjects {
            validate_subject(subject, "stream subject")?;
        }
        Ok(self.config)
    }
}

/// Shows config and current state for this stream.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StreamInfo {
    /// The configuration associated with this stream.
    #[serde(default)]
    pub config: StreamConfig,
    /// The time that this stream was created.
    #[serde(default = "rfc3339::zero", with = "rfc3339")]
    pub created: DateTime,
    /// Various metrics associated with this stream.
    #[serde(default)]
    pub state: StreamState,
    /// Information about the stream's cluster.
    #[serde(default)]
    pub cluster: ClusterInfo,
}

/// Information about the given stream.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct StreamState {
    /// The number of messages contained in this stream.
    #[serde(default)]
    pub messages: u64,
    /// The number of bytes of all messages contained in this stream.
    #[serde(default)]
    pub bytes: u64,
    /// The lowest sequence number still present in this stream.
    #[serde(default)]
    pub first_seq: u64,
    /// The time associated with the oldest message still present in this
    /// stream.
    #[serde(default = "rfc3339::zero", with = "rfc3339")]
    pub first_ts: DateTime,
    /// The last sequence number assigned to a message in this stream.
    #[serde(default)]
    pub last_seq: u64,
    /// The time that the last message was received by this stream.
    #[serde(default = "rfc3339::zero", with = "rfc3339")]
    pub last_ts: DateTime,
    /// The number of consumers configured to consume this stream.
    #[serde(default)]
    pub consumer_count: usize,
}

impl Default for StreamState {
    fn default() -> StreamState {
        StreamState {
            messages: 0,
            bytes: 0,
            first_seq: 0,
            first_ts: rfc3339::ZERO_INSTANT,
            last_seq: 0,
            last_ts: rfc3339::ZERO_INSTANT,
            consumer_count: 0,
        }
    }
}

/// `DeliverPolicy` determines how the consumer should select the first
/// message to deliver.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeliverPolicy {
    /// All causes the consumer to receive the oldest messages still present
    /// in the system. This is the default.
    #[default]
    #[serde(rename = "all")]
    All = 0,
    /// Last will start the consumer with the last sequence received.
    #[serde(rename = "last")]
    Last = 1,
    /// New will only deliver new messages that are received by the
    /// `JetStream` server after the consumer is created.
    #[serde(rename = "new")]
    New = 2,
    /// `ByStartSeq` will look for a defined starting sequence to the
    /// consumer's configured `opt_start_seq` parameter.
    #[serde(rename = "by_start_sequence")]
    ByStartSeq = 3,
    /// `ByStartTime` will select the first message with a timestamp >= to
    /// the consumer's configured `opt_start_time` parameter.
    #[serde(rename = "by_start_time")]
    ByStartTime = 4,
}

/// Determines whether messages will be acknowledged individually, in
/// batches, or never.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckPolicy {
    /// All messages will be individually acknowledged. This is the default.
    #[default]
    #[serde(rename = "explicit")]
    Explicit = 2,
    /// No messages are acknowledged and the server never redelivers.
    #[serde(rename = "none")]
    None = 0,
    /// Acknowledges all messages with lower sequence numbers when a later
    /// message is acknowledged. Useful for "batching" acknowledgment.
    #[serde(rename = "all")]
    All = 1,
}

/// `ReplayPolicy` controls whether messages are sent to a consumer as
/// quickly as possible or at the rate that they were originally received
/// at.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplayPolicy {
    /// Sends all messages in a stream to the consumer as quickly as
    /// possible. This is the default.
    #[default]
    #[serde(rename = "instant")]
    Instant = 0,
    /// Sends messages to a consumer in a rate-limited fashion based on the
    /// rate of receipt.
    #[serde(rename = "original")]
    Original = 1,
}

/// `RetentionPolicy` determines how messages in a stream are retained.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RetentionPolicy {
    /// `Limits` (default) means that messages are retained until any given
    /// limit is reached. This could be one of messages, bytes, or age.
    #[default]
    #[serde(rename = "limits")]
    Limits = 0,
    /// `Interest` specifies that when all known consumers have acknowledged
    /// a message it can be removed.
    #[serde(rename = "interest")]
    Interest = 1,
    /// `WorkQueue` specifies that when the first worker or subscriber
    /// acknowledges the message it can be removed.
    #[serde(rename = "workqueue")]
    WorkQueue = 2,
}

/// `DiscardPolicy` determines how we proceed when limits of messages or
/// bytes are hit. The default, `Old` will remove older messages. `New` will
/// fail to store the new message.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DiscardPolicy {
    /// Will remove older messages when limits are hit.
    #[default]
    #[serde(rename = "old")]
    Old = 0,
    /// Will error on a message store call when limits are hit.
    #[serde(rename = "new")]
    New = 1,
}

/// Determines how messages are stored for retention.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageType {
    /// Stream data is kept in files. This is the default.
    #[default]
    #[serde(rename = "file")]
    File = 0,
    /// Stream data is kept only in memory.
    #[serde(rename = "memory")]
    Memory = 1,
}

/// Various limits imposed on a particular account. `-1` means unset.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct AccountLimits {
    /// Maximum memory for this account (-1 if no limit).
    #[serde(default = "negative_one")]
    pub max_memory: i64,
    /// Maximum storage for this account (-1 if no limit).
    #[serde(default = "negative_one")]
    pub max_storage: i64,
    /// Maximum streams for this account (-1 if no limit).
    #[serde(default = "negative_one")]
    pub max_streams: i64,
    /// Maximum consumers for this account (-1 if no limit).
    #[serde(default = "negative_one")]
    pub max_consumers: i64,
}

impl Default for AccountLimits {
    fn default() -> AccountLimits {
        AccountLimits {
            max_memory: -1,
            max_storage: -1,
            max_streams: -1,
            max_consumers: -1,
        }
    }
}

/// Contains info about the `JetStream` usage from the current account.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct AccountInfo {
    #[serde(default, rename = "type")]
    pub(crate) kind: String,
    /// How much memory is used.
    #[serde(default)]
    pub memory: i64,
    /// How much storage is used.
    #[serde(default)]
    pub storage: i64,
    /// How many streams exist.
    #[serde(default)]
    pub streams: i64,
    /// How many consumers exist.
    #[serde(default)]
    pub consumers: i64,
    /// Aggregated API statistics.
    #[serde(default)]
    pub api: ApiStats,
    /// Limits placed on the account.
    #[serde(default)]
    pub limits: AccountLimits,
}

/// Reports on API calls to `JetStream` for this account.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy)]
pub struct ApiStats {
    /// The total number of API requests.
    #[serde(default)]
    pub total: u64,
    /// The total number of API requests resulting in errors.
    #[serde(default)]
    pub errors: u64,
}

/// `PublishAck` is an acknowledgment received after successfully publishing
/// a message.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PublishAck {
    /// Name of stream the message was published to.
    #[serde(default)]
    pub stream: String,
    /// Sequence number the message was published in.
    #[serde(default, rename = "seq")]
    pub sequence: u64,
    /// Domain the message was published to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    /// True if the published message was determined to be a duplicate,
    /// false otherwise.
    #[serde(default, skip_serializing_if = "is_default")]
    pub duplicate: bool,
}

/// The kinds of response used for acknowledging a processed message.
#[derive(Debug, Clone, Copy)]
pub enum AckKind {
    /// Acknowledges a message was completely handled.
    Ack,
    /// Signals that the message will not be processed now and processing
    /// can move onto the next message. NAK'd messages will be retried.
    Nak,
    /// When sent before the `ack_wait` period indicates that work is
    /// ongoing and the period should be extended by another equal to
    /// `ack_wait`.
    Progress,
    /// Instructs the server to stop redelivery of a message without
    /// acknowledging it as successfully processed.
    Term,
}

impl AsRef<[u8]> for AckKind {
    fn as_ref(&self) -> &[u8] {
        use AckKind::*;
        match self {
            Ack => b"+ACK",
            Nak => b"-NAK",
            Progress => b"+WPI",
            Term => b"+TERM",
        }
    }
}

/// Information about a consumer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConsumerInfo {
    /// The stream being consumed.
    #[serde(default)]
    pub stream_name: String,
    /// The consumer's unique name.
    #[serde(default)]
    pub name: String,
    /// The time the consumer was created.
    #[serde(default = "rfc3339::zero", with = "rfc3339")]
    pub created: DateTime,
    /// The consumer's configuration.
    #[serde(default)]
    pub config: ConsumerConfig,
    /// Statistics for delivered messages.
    #[serde(default)]
    pub delivered: SequencePair,
    /// Statistics for acknowledged messages.
    #[serde(default)]
    pub ack_floor: SequencePair,
    /// The difference between delivered and acknowledged messages.
    #[serde(default)]
    pub num_ack_pending: usize,
    /// The number of messages re-sent after acknowledgment was not received
    /// within the configured time threshold.
    #[serde(default)]
    pub num_redelivered: usize,
    /// The number of waiting pull requests.
    #[serde(default)]
    pub num_waiting: usize,
    /// The number of pending messages.
    #[serde(default)]
    pub num_pending: u64,
    /// Information about the consumer's cluster.
    #[serde(default)]
    pub cluster: ClusterInfo,
}

/// Information about the stream's or consumer's associated `JetStream`
/// cluster.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    /// The cluster name.
    #[serde(default)]
    pub name: Option<String>,
    /// The server name of the RAFT leader.
    #[serde(default)]
    pub leader: Option<String>,
}

/// A pair of consumer and stream sequence positions.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SequencePair {
    /// How far along the consumer has progressed.
    #[serde(default)]
    pub consumer_seq: u64,
    /// The position in the stream itself.
    #[serde(default)]
    pub stream_seq: u64,
}

/// A single request for messages on a pull consumer.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// The number of messages that are being requested to be delivered.
    pub batch: usize,
    /// Optional absolute expiry for the request, in nanoseconds since the
    /// unix epoch. The server forgets the pending request once this instant
    /// passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<u64>,
    /// This optionally causes the server not to store this pending request
    /// at all, but when there are no messages to deliver will send an empty
    /// message with a status of 404, this way you can know when you reached
    /// the end of the stream.
    #[serde(default, skip_serializing_if = "is_default")]
    pub no_wait: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub(crate) struct StreamNamesRequest {
    #[serde(default, skip_serializing_if = "is_default")]
    pub subject: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub(crate) struct StreamNamesResponse {
    #[serde(default)]
    pub streams: Option<Vec<String>>,
}

/// The response generated by trying to purge a stream.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct PurgeResponse {
    /// Whether the purge request was successful.
    #[serde(default)]
    pub success: bool,
    /// The number of purged messages in a stream.
    #[serde(default)]
    pub purged: u64,
}

/// Options for subscribing, created through [`SubscribeOptions::builder`].
///
/// Providing both a stream and a consumer name, or a deliver subject on the
/// consumer configuration, marks the intent to attach to a pre-existing
/// consumer instead of creating one.
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    pub(crate) stream: Option<String>,
    pub(crate) consumer: Option<String>,
    pub(crate) consumer_config: ConsumerConfig,
    pub(crate) auto_ack: bool,
    pub(crate) pull_batch_size: usize,
    pub(crate) direct: bool,
}

impl Default for SubscribeOptions {
    fn default() -> SubscribeOptions {
        SubscribeOptions {
            stream: None,
            consumer: None,
            consumer_config: ConsumerConfig::default(),
            auto_ack: true,
            pull_batch_size: 0,
            direct: false,
        }
    }
}

impl SubscribeOptions {
    /// Creates a new set of default subscription options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a validated set of subscription options.
    pub fn builder() -> SubscribeOptionsBuilder {
        SubscribeOptionsBuilder::default()
    }

    /// The stream to attach to, if one was named.
    pub fn stream(&self) -> Option<&str> {
        self.stream.as_deref()
    }

    /// The consumer to attach to, if one was named.
    pub fn consumer(&self) -> Option<&str> {
        self.consumer.as_deref()
    }

    /// The configuration applied when the subscription creates its
    /// consumer.
    pub fn consumer_config(&self) -> &ConsumerConfig {
        &self.consumer_config
    }

    /// Whether handler-based delivery acknowledges messages after the
    /// handler returns successfully.
    pub fn auto_ack(&self) -> bool {
        self.auto_ack
    }

    /// The batch size primed on a pull subscription; zero means push mode.
    pub fn pull_batch_size(&self) -> usize {
        self.pull_batch_size
    }

    /// Whether direct mode was requested for this subscription.
    pub fn is_direct(&self) -> bool {
        self.direct
    }
}

/// Builds a validated [`SubscribeOptions`].
#[derive(Debug, Default, Clone)]
pub struct SubscribeOptionsBuilder {
    options: SubscribeOptions,
}

impl SubscribeOptionsBuilder {
    /// Attach to the named consumer on the named stream instead of creating
    /// a new consumer. Requires direct mode.
    pub fn attach(mut self, stream: impl Into<String>, consumer: impl Into<String>) -> Self {
        self.options.stream = Some(stream.into());
        self.options.consumer = Some(consumer.into());
        self
    }

    /// Set the stream and the configuration used when the subscription
    /// creates its consumer.
    pub fn configuration(mut self, stream: impl Into<String>, config: ConsumerConfig) -> Self {
        self.options.stream = Some(stream.into());
        self.options.consumer_config = config;
        self
    }

    /// Receive pushed messages directly on the given deliver subject,
    /// without looking the consumer up. Implies direct mode.
    pub fn push_direct(mut self, deliver_subject: impl Into<String>) -> Self {
        self.options.consumer_config.deliver_subject = Some(deliver_subject.into());
        self.options.direct = true;
        self
    }

    /// Set the durable name on the consumer configuration.
    pub fn durable(mut self, durable_name: impl Into<String>) -> Self {
        self.options.consumer_config.durable_name = Some(durable_name.into());
        self
    }

    /// Control whether handler-based delivery acknowledges messages after
    /// the handler returns successfully. Defaults to `true`.
    pub fn auto_ack(mut self, auto_ack: bool) -> Self {
        self.options.auto_ack = auto_ack;
        self
    }

    /// Request pull mode with the given batch size. Zero keeps the
    /// subscription in push mode.
    pub fn pull(mut self, batch_size: usize) -> Self {
        self.options.pull_batch_size = batch_size;
        self
    }

    /// Request direct mode for this subscription only.
    pub fn direct(mut self, direct: bool) -> Self {
        self.options.direct = direct;
        self
    }

    /// Validate and build the options.
    pub fn build(self) -> io::Result<SubscribeOptions> {
        if let Some(stream) = &self.options.stream {
            validate_name(stream, "stream name")?;
        }
        if let Some(consumer) = &self.options.consumer {
            validate_name(consumer, "consumer name")?;
        }
        if let Some(durable_name) = &self.options.consumer_config.durable_name {
            validate_name(durable_name, "durable name")?;
        }
        Ok(self.options)
    }
}

/// Options for publishing, created directly or through
/// [`PublishOptions::builder`].
#[derive(Debug, Default, Clone)]
pub struct PublishOptions {
    /// The stream the publish is expected to be acknowledged by. When set,
    /// an acknowledgement from any other stream fails the publish.
    pub stream: Option<String>,
    /// Duration to wait for the acknowledgement before timing out. Falls
    /// back to the context's request timeout.
    pub timeout: Option<Duration>,
}

impl PublishOptions {
    /// Start building a validated set of publish options.
    pub fn builder() -> PublishOptionsBuilder {
        PublishOptionsBuilder::default()
    }
}

/// Builds a validated [`PublishOptions`].
#[derive(Debug, Default, Clone)]
pub struct PublishOptionsBuilder {
    options: PublishOptions,
}

impl PublishOptionsBuilder {
    /// Expect the acknowledgement to come from the named stream.
    pub fn stream(mut self, stream: impl Into<String>) -> Self {
        self.options.stream = Some(stream.into());
        self
    }

    /// Wait this long for the acknowledgement.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Validate and build the options.
    pub fn build(self) -> io::Result<PublishOptions> {
        if let Some(stream) = &self.options.stream {
            validate_name(stream, "stream name")?;
        }
        Ok(self.options)
    }
}
