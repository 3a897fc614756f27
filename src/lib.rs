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

//! A `JetStream` client core for the NATS.io ecosystem.
//!
//! `JetStream` is the NATS persistence layer: named streams store messages
//! durably and server-side consumers cursor over them with configurable
//! delivery and acknowledgement policies. This crate turns any plain
//! publish/subscribe NATS transport into a durable, acknowledged,
//! stream-backed messaging client: it manages streams and consumers over
//! the request/reply control plane, publishes with acknowledgement
//! validation, and delivers messages in push mode (server streams to a
//! delivery subject) or pull mode (client requests explicit batches).
//!
//! The transport itself is pluggable. Anything that implements
//! [`Transport`] (request/reply, publish, plain subscriptions, inboxes)
//! can back a [`Connection`], and all `JetStream` logic lives above that
//! seam.
//!
//! # Examples
//!
//! Create a context and a stream:
//!
//! ```no_run
//! # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
//! let js = jetstream::new(nc)?;
//!
//! // add_stream converts a str into a default `StreamConfig`.
//! js.add_stream("events")?;
//! # Ok(())
//! # }
//! ```
//!
//! Create a stream with configuration:
//!
//! ```no_run
//! use jetstream::{StorageType, StreamConfig};
//!
//! # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
//! let js = jetstream::new(nc)?;
//!
//! js.add_stream(StreamConfig {
//!     name: "events".to_string(),
//!     max_bytes: 5 * 1024 * 1024 * 1024,
//!     storage: StorageType::Memory,
//!     ..Default::default()
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! Publish and validate the acknowledgement:
//!
//! ```no_run
//! # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
//! # let js = jetstream::new(nc)?;
//! let ack = js.publish("events.signup", "hello")?;
//! println!("stored as sequence {} of {}", ack.sequence, ack.stream);
//! # Ok(())
//! # }
//! ```
//!
//! Receive through a push consumer:
//!
//! ```no_run
//! # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
//! # let js = jetstream::new(nc)?;
//! let subscription = js.subscribe("events.signup")?;
//! if let Some(message) = subscription.next() {
//!     message.ack()?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Receive through a pull consumer, one explicit batch at a time:
//!
//! ```no_run
//! # fn demo(nc: jetstream::Connection) -> std::io::Result<()> {
//! # let js = jetstream::new(nc)?;
//! let subscription = js.pull_subscribe("jobs")?;
//! subscription.pull(10)?;
//! for message in subscription.fetch(10)? {
//!     message.ack()?;
//! }
//! # Ok(())
//! # }
//! ```

#![deny(
    future_incompatible,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_qualifications
)]
#![deny(
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::checked_conversions,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::get_unwrap,
    clippy::if_not_else,
    clippy::mem_forget,
    clippy::needless_continue,
    clippy::print_stdout,
    clippy::string_add,
    clippy::string_add_assign,
    clippy::unimplemented,
    clippy::wildcard_dependencies
)]
#![allow(clippy::module_name_repetitions)]

use std::time::Duration;

mod api;
mod connection;
mod context;
mod message;
mod options;
mod rfc3339;
mod types;

/// Pull subscriptions.
pub mod pull_subscription;

/// Push subscriptions.
pub mod push_subscription;

const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

pub use api::{Error, ErrorCode};
pub use connection::{Connection, Transport};
pub use context::{new, JetStream, PagedIterator};
pub use message::Message;
pub use options::{
    JetStreamOptions, JetStreamOptionsBuilder, DEFAULT_API_PREFIX, DEFAULT_REQUEST_TIMEOUT,
};
pub use pull_subscription::PullSubscription;
pub use push_subscription::{Handler, PushSubscription};
pub use types::{
    AccountInfo, AccountLimits, AckKind, AckPolicy, ApiStats, BatchOptions, ClusterInfo,
    ConsumerConfig, ConsumerConfigBuilder, ConsumerInfo, DateTime, DeliverPolicy, DiscardPolicy,
    PublishAck, PublishOptions, PublishOptionsBuilder, PurgeResponse, ReplayPolicy,
    RetentionPolicy, SequencePair, StorageType, StreamConfig, StreamConfigBuilder, StreamInfo,
    StreamState, SubscribeOptions, SubscribeOptionsBuilder,
};
