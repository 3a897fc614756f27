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
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use jetstream::{
    Connection, JetStream, JetStreamOptions, PublishOptions, SubscribeOptions,
};

mod common;
use common::{Event, MockTransport};

const ACCOUNT_INFO_OK: &[u8] = br#"{"type":"io.nats.jetstream.api.v1.account_info_response","memory":0,"storage":0,"streams":0,"consumers":0,"api":{"total":0,"errors":0},"limits":{"max_memory":-1,"max_storage":-1,"max_streams":-1,"max_consumers":-1}}"#;

fn setup_with_options(options: JetStreamOptions) -> (MockTransport, JetStream) {
    let mock = MockTransport::new();
    let nc = Connection::new(mock.clone());
    mock.bind(&nc);
    mock.respond_with("$JS.API.INFO", ACCOUNT_INFO_OK);
    let context = JetStream::new(nc, options).unwrap();
    (mock, context)
}

fn setup() -> (MockTransport, JetStream) {
    setup_with_options(JetStreamOptions::new())
}

fn echo_consumer_create(request: &[u8]) -> Option<Vec<u8>> {
    let request: serde_json::Value = serde_json::from_slice(request).ok()?;
    let config = request["config"].clone();
    let name = config["durable_name"]
        .as_str()
        .unwrap_or("ephemeral-7")
        .to_string();
    let response = serde_json::json!({
        "type": "io.nats.jetstream.api.v1.consumer_create_response",
        "stream_name": request["stream_name"],
        "name": name,
        "created": "2021-01-20T23:41:08.579594Z",
        "config": config,
        "delivered": {"consumer_seq": 0, "stream_seq": 0},
        "ack_floor": {"consumer_seq": 0, "stream_seq": 0},
        "num_ack_pending": 0,
        "num_redelivered": 0,
        "num_waiting": 0,
        "num_pending": 0
    });
    Some(serde_json::to_vec(&response).unwrap())
}

fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn context_probes_account_and_switches_request_style() {
    let (mock, _context) = setup();

    assert!(mock.is_old_request_style());
    assert_eq!(mock.requests()[0].subject, "$JS.API.INFO");
}

#[test]
fn context_creation_times_out_without_server() {
    let mock = MockTransport::new();
    let nc = Connection::new(mock.clone());
    mock.bind(&nc);

    let err = JetStream::new(nc, JetStreamOptions::new()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::TimedOut);
}

#[test]
fn context_creation_fails_when_jetstream_not_enabled() {
    let mock = MockTransport::new();
    let nc = Connection::new(mock.clone());
    mock.bind(&nc);
    mock.respond_with(
        "$JS.API.INFO",
        br#"{"error":{"code":503,"err_code":10076,"description":"JetStream not enabled"}}"#,
    );

    let err = JetStream::new(nc, JetStreamOptions::new()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);

    let err = err
        .into_inner()
        .expect("should be able to convert error into inner")
        .downcast::<jetstream::Error>()
        .expect("should be able to downcast into jetstream::Error");

    assert_eq!(err.error_code(), jetstream::ErrorCode::NotEnabled);
    assert!(err.is_not_enabled());
}

#[test]
fn custom_prefix_gets_trailing_dot_on_the_wire() {
    let mock = MockTransport::new();
    let nc = Connection::new(mock.clone());
    mock.bind(&nc);
    mock.respond_with("pre.INFO", ACCOUNT_INFO_OK);

    let options = JetStreamOptions::builder().prefix("pre").build().unwrap();
    assert_eq!(options.prefix(), "pre");

    JetStream::new(nc, options).unwrap();
    assert_eq!(mock.requests()[0].subject, "pre.INFO");
}

#[test]
fn publish_returns_validated_ack() {
    let (mock, context) = setup();
    mock.respond_with("events", br#"{"stream":"EVENTS","seq":5,"duplicate":true}"#);

    let ack = context.publish("events", b"hello").unwrap();
    assert_eq!(ack.stream, "EVENTS");
    assert_eq!(ack.sequence, 5);
    assert!(ack.duplicate);
}

#[test]
fn publish_rejects_malformed_acks() {
    let (mock, context) = setup();

    mock.respond_with("no-stream", br#"{"stream":"","seq":5}"#);
    let err = context.publish("no-stream", b"payload").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);

    mock.respond_with("no-seq", br#"{"stream":"EVENTS","seq":0}"#);
    let err = context.publish("no-seq", b"payload").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[test]
fn publish_rejects_ack_from_unexpected_stream() {
    let (mock, context) = setup();
    mock.respond_with("events", br#"{"stream":"EVENTS","seq":1}"#);

    let options = PublishOptions::builder().stream("ORDERS").build().unwrap();
    let err = context
        .publish_with_options("events", b"payload", &options)
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
    assert!(err.to_string().contains("ORDERS"));
    assert!(err.to_string().contains("EVENTS"));

    // The matching stream passes.
    let options = PublishOptions::builder().stream("EVENTS").build().unwrap();
    context
        .publish_with_options("events", b"payload", &options)
        .unwrap();
}

#[test]
fn publish_surfaces_api_errors() {
    let (mock, context) = setup();
    mock.respond_with(
        "events",
        br#"{"error":{"code":400,"err_code":10060,"description":"expected stream does not match"}}"#,
    );

    let err = context.publish("events", b"payload").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);

    let err = err
        .into_inner()
        .unwrap()
        .downcast::<jetstream::Error>()
        .unwrap();
    assert_eq!(err.error_code(), jetstream::ErrorCode::StreamNotMatch);
}

#[test]
fn publish_times_out_without_reply() {
    let (_mock, context) = setup();

    let err = context.publish("silent", b"payload").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::TimedOut);
}

#[test]
fn subscribe_creates_ephemeral_consumer() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["EVENTS"]}"#);
    mock.respond_with_fn("$JS.API.CONSUMER.CREATE.EVENTS", echo_consumer_create);

    let subscription = context.subscribe("events").unwrap();

    // The local subscription is wired up before the consumer exists, so no
    // delivery can race ahead of a ready receiver.
    let events = mock.events();
    let subscribe_position = events
        .iter()
        .position(|event| matches!(event, Event::Subscribe(subject) if subject.starts_with("_INBOX.")))
        .unwrap();
    let create_position = events
        .iter()
        .position(
            |event| matches!(event, Event::Request(subject) if subject.contains("CONSUMER.CREATE")),
        )
        .unwrap();
    assert!(subscribe_position < create_position);

    let create = mock
        .requests()
        .into_iter()
        .find(|frame| frame.subject == "$JS.API.CONSUMER.CREATE.EVENTS")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&create.payload).unwrap();
    assert_eq!(body["stream_name"], "EVENTS");
    assert_eq!(body["config"]["filter_subject"], "events");
    assert_eq!(body["config"]["deliver_subject"], subscription.deliver_subject());
    assert_eq!(body["config"]["max_ack_pending"], 65536);

    // Messages delivered to the inbox surface through the subscription and
    // acknowledge on their own reply subjects.
    let ack_reply = "$JS.ACK.EVENTS.ephemeral-7.1.1.1.0.0";
    mock.deliver(subscription.deliver_subject(), Some(ack_reply), b"first");

    let message = subscription
        .next_timeout(Duration::from_secs(1))
        .unwrap();
    assert_eq!(message.data, b"first");
    assert!(message.is_jetstream());
    message.ack().unwrap();

    let acks = mock.published();
    let ack = acks.iter().find(|frame| frame.subject == ack_reply).unwrap();
    assert_eq!(ack.payload, b"+ACK");
}

#[test]
fn subscribe_with_durable_uses_durable_endpoint() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["EVENTS"]}"#);
    mock.respond_with_fn(
        "$JS.API.CONSUMER.DURABLE.CREATE.EVENTS.worker",
        echo_consumer_create,
    );

    let options = SubscribeOptions::builder().durable("worker").build().unwrap();
    context.subscribe_with_options("events", &options).unwrap();

    assert!(mock
        .requests()
        .iter()
        .any(|frame| frame.subject == "$JS.API.CONSUMER.DURABLE.CREATE.EVENTS.worker"));
}

#[test]
fn consumer_create_failure_removes_local_subscription() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["EVENTS"]}"#);
    mock.respond_with(
        "$JS.API.CONSUMER.CREATE.EVENTS",
        br#"{"error":{"code":400,"err_code":10003,"description":"bad request"}}"#,
    );

    let err = context.subscribe("events").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);

    // The local subscription created for the delivery subject is gone.
    assert_eq!(mock.active_subscriptions(), 0);
}

#[test]
fn subscribe_fails_when_no_stream_matches() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":[]}"#);

    let err = context.subscribe("events").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);

    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["ONE","TWO"]}"#);
    let err = context.subscribe("events").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
}

#[test]
fn attach_requires_direct_mode() {
    let (_mock, context) = setup();

    let options = SubscribeOptions::builder()
        .attach("foo", "bar")
        .build()
        .unwrap();
    let err = context
        .subscribe_with_options("foo-subject", &options)
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
    assert!(err.to_string().contains("direct mode"));
}

#[test]
fn attach_uses_consumer_deliver_subject() {
    let options = JetStreamOptions::builder().direct(true).build().unwrap();
    let (mock, context) = setup_with_options(options);

    let info = serde_json::json!({
        "stream_name": "ORDERS",
        "name": "processor",
        "created": "2021-01-20T23:41:08.579594Z",
        "config": {
            "deliver_subject": "push.ORDERS.processor",
            "durable_name": "processor"
        },
        "delivered": {"consumer_seq": 0, "stream_seq": 0},
        "ack_floor": {"consumer_seq": 0, "stream_seq": 0},
        "num_ack_pending": 0,
        "num_redelivered": 0,
        "num_waiting": 0,
        "num_pending": 0
    });
    mock.respond_with(
        "$JS.API.CONSUMER.INFO.ORDERS.processor",
        serde_json::to_vec(&info).unwrap(),
    );

    let options = SubscribeOptions::builder()
        .attach("ORDERS", "processor")
        .build()
        .unwrap();
    let subscription = context.subscribe_with_options("orders", &options).unwrap();

    assert_eq!(subscription.deliver_subject(), "push.ORDERS.processor");

    // Attaching mutates nothing on the server: no lookup by subject, no
    // consumer creation.
    let requests = mock.requests();
    assert!(!requests.iter().any(|frame| frame.subject.contains("STREAM.NAMES")));
    assert!(!requests.iter().any(|frame| frame.subject.contains("CONSUMER.CREATE")));
    assert!(!requests
        .iter()
        .any(|frame| frame.subject.contains("CONSUMER.DURABLE.CREATE")));
}

#[test]
fn attach_rejects_filter_subject_mismatch() {
    let options = JetStreamOptions::builder().direct(true).build().unwrap();
    let (mock, context) = setup_with_options(options);

    let info = serde_json::json!({
        "stream_name": "ORDERS",
        "name": "processor",
        "created": "2021-01-20T23:41:08.579594Z",
        "config": {"filter_subject": "orders.eu"},
        "delivered": {"consumer_seq": 0, "stream_seq": 0},
        "ack_floor": {"consumer_seq": 0, "stream_seq": 0},
        "num_ack_pending": 0,
        "num_redelivered": 0,
        "num_waiting": 0,
        "num_pending": 0
    });
    mock.respond_with(
        "$JS.API.CONSUMER.INFO.ORDERS.processor",
        serde_json::to_vec(&info).unwrap(),
    );

    let options = SubscribeOptions::builder()
        .attach("ORDERS", "processor")
        .build()
        .unwrap();
    let err = context
        .subscribe_with_options("orders.us", &options)
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}

#[test]
fn push_direct_skips_all_lookups() {
    let (mock, context) = setup();

    let options = SubscribeOptions::builder()
        .push_direct("deliveries.direct")
        .build()
        .unwrap();
    let subscription = context.subscribe_with_options("events", &options).unwrap();

    assert_eq!(subscription.deliver_subject(), "deliveries.direct");
    // Only the account probe went over the wire.
    assert_eq!(mock.requests().len(), 1);
}

#[test]
fn push_subscribe_rejects_pull_options() {
    let (_mock, context) = setup();

    let options = SubscribeOptions::builder().pull(10).build().unwrap();
    let err = context
        .subscribe_with_options("events", &options)
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
    assert!(err.to_string().contains("pull subscribe"));
}

#[test]
fn handler_acks_only_successful_messages() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["EVENTS"]}"#);
    mock.respond_with_fn("$JS.API.CONSUMER.CREATE.EVENTS", echo_consumer_create);

    let subscription = context.subscribe("events").unwrap();
    let deliver_subject = subscription.deliver_subject().to_string();

    let (seen_sender, seen) = channel::unbounded();
    let _handler = subscription.with_handler(move |message| {
        seen_sender.send(message.data.clone()).unwrap();
        if message.data == b"bad" {
            Err(io::Error::new(io::ErrorKind::Other, "handler failure"))
        } else {
            Ok(())
        }
    });

    let good_reply = "$JS.ACK.EVENTS.ephemeral-7.1.1.1.0.0";
    let bad_reply = "$JS.ACK.EVENTS.ephemeral-7.1.2.2.0.0";
    mock.deliver(&deliver_subject, Some(good_reply), b"good");
    mock.deliver(&deliver_subject, Some(bad_reply), b"bad");

    assert_eq!(seen.recv_timeout(Duration::from_secs(1)).unwrap(), b"good");
    assert_eq!(seen.recv_timeout(Duration::from_secs(1)).unwrap(), b"bad");

    // The successful message gets its ack; the failed one is left for
    // redelivery.
    assert!(wait_for(
        || mock
            .published()
            .iter()
            .any(|frame| frame.subject == good_reply && frame.payload == b"+ACK"),
        Duration::from_secs(1),
    ));
    assert!(!mock
        .published()
        .iter()
        .any(|frame| frame.subject == bad_reply));
}

#[test]
fn pull_subscription_delivers_requested_batches() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["pull-stream"]}"#);
    mock.respond_with_fn(
        "$JS.API.CONSUMER.DURABLE.CREATE.pull-stream.pull-durable",
        echo_consumer_create,
    );

    let options = SubscribeOptions::builder()
        .durable("pull-durable")
        .build()
        .unwrap();
    let subscription = context
        .pull_subscribe_with_options("pull-subject", &options)
        .unwrap();

    for i in 0..4 {
        mock.stash_pull_message(format!("message-{i}"));
    }
    subscription.pull(10).unwrap();

    for i in 0..4 {
        let message = subscription.next_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(message.data, format!("message-{i}").into_bytes());
        assert!(message.is_jetstream());
    }

    let err = subscription
        .next_timeout(Duration::from_millis(100))
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::TimedOut);

    // A further batch picks up newly arrived messages.
    for i in 4..10 {
        mock.stash_pull_message(format!("message-{i}"));
    }
    subscription.pull(10).unwrap();

    for i in 4..10 {
        let message = subscription.next_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(message.data, format!("message-{i}").into_bytes());
    }

    let err = subscription
        .next_timeout(Duration::from_millis(100))
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::TimedOut);

    // Every pull went to the consumer's next-message subject with the
    // subscription's inbox as the reply.
    let pulls: Vec<_> = mock
        .published()
        .into_iter()
        .filter(|frame| {
            frame.subject == "$JS.API.CONSUMER.MSG.NEXT.pull-stream.pull-durable"
        })
        .collect();
    assert_eq!(pulls.len(), 2);
    for pull in pulls {
        assert_eq!(pull.reply.as_deref(), Some(subscription.deliver_subject()));
        let body: serde_json::Value = serde_json::from_slice(&pull.payload).unwrap();
        assert_eq!(body["batch"], 10);
    }
}

#[test]
fn pull_validates_batch_sizes() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["pull-stream"]}"#);
    mock.respond_with_fn(
        "$JS.API.CONSUMER.CREATE.pull-stream",
        echo_consumer_create,
    );

    let subscription = context.pull_subscribe("pull-subject").unwrap();

    let err = subscription.pull(0).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

    let err = subscription.pull(257).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

    subscription.pull(256).unwrap();
}

#[test]
fn pull_encodes_no_wait_and_expiry() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["pull-stream"]}"#);
    mock.respond_with_fn(
        "$JS.API.CONSUMER.DURABLE.CREATE.pull-stream.pull-durable",
        echo_consumer_create,
    );

    let options = SubscribeOptions::builder()
        .durable("pull-durable")
        .build()
        .unwrap();
    let subscription = context
        .pull_subscribe_with_options("pull-subject", &options)
        .unwrap();

    subscription.pull_no_wait(5).unwrap();
    let frame = mock.published().pop().unwrap();
    let body: serde_json::Value = serde_json::from_slice(&frame.payload).unwrap();
    assert_eq!(body["batch"], 5);
    assert_eq!(body["no_wait"], true);
    assert!(body.get("expires").is_none());

    subscription
        .pull_expires_in(3, Duration::from_secs(30))
        .unwrap();
    let frame = mock.published().pop().unwrap();
    let body: serde_json::Value = serde_json::from_slice(&frame.payload).unwrap();
    assert_eq!(body["batch"], 3);
    assert!(body.get("no_wait").is_none());
    // An absolute timestamp roughly thirty seconds out, in nanoseconds.
    let expires = body["expires"].as_u64().unwrap();
    assert!(expires > 1_600_000_000_000_000_000);
}

#[test]
fn pull_no_wait_marks_empty_backlog() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["pull-stream"]}"#);
    mock.respond_with_fn(
        "$JS.API.CONSUMER.CREATE.pull-stream",
        echo_consumer_create,
    );

    let subscription = context.pull_subscribe("pull-subject").unwrap();
    subscription.pull_no_wait(5).unwrap();

    // The 404 marker ends iteration instead of surfacing as a message.
    assert!(subscription.next().is_none());
}

#[test]
fn pull_after_unsubscribe_sends_nothing() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["pull-stream"]}"#);
    mock.respond_with_fn(
        "$JS.API.CONSUMER.DURABLE.CREATE.pull-stream.pull-durable",
        echo_consumer_create,
    );

    let options = SubscribeOptions::builder()
        .durable("pull-durable")
        .build()
        .unwrap();
    let subscription = context
        .pull_subscribe_with_options("pull-subject", &options)
        .unwrap();
    let clone = subscription.clone();

    subscription.unsubscribe().unwrap();

    let before = mock.published().len();
    let err = clone.pull(10).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
    assert_eq!(mock.published().len(), before);
}

#[test]
fn pull_subscribe_rejects_push_configuration() {
    let (_mock, context) = setup();

    let options = SubscribeOptions::builder()
        .push_direct("deliveries.direct")
        .build()
        .unwrap();
    let err = context
        .pull_subscribe_with_options("pull-subject", &options)
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
    assert!(err.to_string().contains("push consumer"));
}

#[test]
fn ephemeral_consumer_is_deleted_on_unsubscribe() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["EVENTS"]}"#);
    mock.respond_with_fn("$JS.API.CONSUMER.CREATE.EVENTS", echo_consumer_create);
    mock.respond_with(
        "$JS.API.CONSUMER.DELETE.EVENTS.ephemeral-7",
        br#"{"success":true}"#,
    );

    let subscription = context.subscribe("events").unwrap();
    let clone = subscription.clone();
    subscription.unsubscribe().unwrap();

    assert!(mock
        .requests()
        .iter()
        .any(|frame| frame.subject == "$JS.API.CONSUMER.DELETE.EVENTS.ephemeral-7"));

    // Tearing down is idempotent across clones and drops.
    drop(clone);
    assert_eq!(mock.unsubscribed_count(), 1);
}

#[test]
fn durable_consumer_survives_unsubscribe() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["pull-stream"]}"#);
    mock.respond_with_fn(
        "$JS.API.CONSUMER.DURABLE.CREATE.pull-stream.pull-durable",
        echo_consumer_create,
    );

    let options = SubscribeOptions::builder()
        .durable("pull-durable")
        .build()
        .unwrap();
    let subscription = context
        .pull_subscribe_with_options("pull-subject", &options)
        .unwrap();
    subscription.unsubscribe().unwrap();

    assert!(!mock
        .requests()
        .iter()
        .any(|frame| frame.subject.contains("CONSUMER.DELETE")));
}

#[test]
fn delete_stream_maps_missing_stream_to_not_found() {
    let (mock, context) = setup();
    mock.respond_with(
        "$JS.API.STREAM.DELETE.MISSING",
        br#"{"error":{"code":404,"err_code":10059,"description":"stream not found"}}"#,
    );

    let err = context.delete_stream("MISSING").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);

    mock.respond_with("$JS.API.STREAM.DELETE.EVENTS", br#"{"success":true}"#);
    assert!(context.delete_stream("EVENTS").unwrap());
}

#[test]
fn add_stream_validates_configuration_locally() {
    let (mock, context) = setup();

    let err = context.add_stream("bad.name").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

    let err = context.add_stream("").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

    // Nothing went over the wire beyond the probe.
    assert_eq!(mock.requests().len(), 1);
}

#[test]
fn list_consumers_pages_through_everything() {
    let (mock, context) = setup();

    let consumer = |name: &str| {
        serde_json::json!({
            "stream_name": "EVENTS",
            "name": name,
            "created": "2021-01-20T23:41:08.579594Z",
            "config": {},
            "delivered": {"consumer_seq": 0, "stream_seq": 0},
            "ack_floor": {"consumer_seq": 0, "stream_seq": 0},
            "num_ack_pending": 0,
            "num_redelivered": 0,
            "num_waiting": 0,
            "num_pending": 0
        })
    };

    mock.respond_with_fn("$JS.API.CONSUMER.LIST.EVENTS", move |payload| {
        let request: serde_json::Value = serde_json::from_slice(payload).ok()?;
        let offset = request["offset"].as_u64().unwrap_or(0);
        let page = match offset {
            0 => serde_json::json!({
                "type": "io.nats.jetstream.api.v1.consumer_list_response",
                "total": 3, "offset": 0, "limit": 2,
                "consumers": [consumer("one"), consumer("two")]
            }),
            2 => serde_json::json!({
                "type": "io.nats.jetstream.api.v1.consumer_list_response",
                "total": 3, "offset": 2, "limit": 2,
                "consumers": [consumer("three")]
            }),
            _ => serde_json::json!({
                "type": "io.nats.jetstream.api.v1.consumer_list_response",
                "total": 3, "offset": offset, "limit": 2,
                "consumers": []
            }),
        };
        Some(serde_json::to_vec(&page).unwrap())
    });

    let consumers = context
        .list_consumers("EVENTS")
        .unwrap()
        .collect::<io::Result<Vec<_>>>()
        .unwrap();

    let names: Vec<_> = consumers.iter().map(|info| info.name.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "three"]);
}

#[test]
fn fetch_with_handler_acks_by_policy() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["pull-stream"]}"#);
    mock.respond_with_fn(
        "$JS.API.CONSUMER.DURABLE.CREATE.pull-stream.pull-durable",
        echo_consumer_create,
    );

    let options = SubscribeOptions::builder()
        .durable("pull-durable")
        .build()
        .unwrap();
    let subscription = context
        .pull_subscribe_with_options("pull-subject", &options)
        .unwrap();

    for i in 0..3 {
        mock.stash_pull_message(format!("job-{i}"));
    }

    let mut received = Vec::new();
    subscription
        .fetch_with_handler(3, |message| {
            received.push(String::from_utf8(message.data.clone()).unwrap());
            Ok(())
        })
        .unwrap();

    assert_eq!(received, vec!["job-0", "job-1", "job-2"]);

    // Explicit ack policy (the default): one ack per message.
    let acks = mock
        .published()
        .into_iter()
        .filter(|frame| frame.subject.starts_with("$JS.ACK.") && frame.payload == b"+ACK")
        .count();
    assert_eq!(acks, 3);
}

#[test]
fn ack_modifiers_send_distinct_payloads() {
    let (mock, context) = setup();
    mock.respond_with("$JS.API.STREAM.NAMES", br#"{"streams":["EVENTS"]}"#);
    mock.respond_with_fn("$JS.API.CONSUMER.CREATE.EVENTS", echo_consumer_create);

    let subscription = context.subscribe("events").unwrap();

    for (index, _) in [1, 2, 3, 4].iter().enumerate() {
        let reply = format!("$JS.ACK.EVENTS.ephemeral-7.1.{index}.{index}.0.0");
        mock.deliver(subscription.deliver_subject(), Some(&reply), b"payload");
    }

    let first = subscription.next_timeout(Duration::from_secs(1)).unwrap();
    first.ack().unwrap();
    let second = subscription.next_timeout(Duration::from_secs(1)).unwrap();
    second.nak().unwrap();
    let third = subscription.next_timeout(Duration::from_secs(1)).unwrap();
    third.in_progress().unwrap();
    let fourth = subscription.next_timeout(Duration::from_secs(1)).unwrap();
    fourth.term().unwrap();

    let payloads: Vec<_> = mock
        .published()
        .into_iter()
        .filter(|frame| frame.subject.starts_with("$JS.ACK."))
        .map(|frame| frame.payload)
        .collect();
    assert_eq!(
        payloads,
        vec![
            b"+ACK".to_vec(),
            b"-NAK".to_vec(),
            b"+WPI".to_vec(),
            b"+TERM".to_vec()
        ]
    );
}
