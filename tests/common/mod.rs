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

//! An in-memory transport that scripts control-plane replies and records
//! every frame the client sends, so the `JetStream` core can be exercised
//! without a broker.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as channel;
use jetstream::{Connection, Message, Transport};
use parking_lot::Mutex;

type Responder = Box<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

/// A frame the client pushed into the transport.
#[derive(Clone, Debug)]
pub struct Frame {
    pub subject: String,
    pub reply: Option<String>,
    pub payload: Vec<u8>,
}

/// Everything the client did, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Request(String),
    Publish(String),
    Subscribe(String),
    Unsubscribe(u64),
}

struct Subscription {
    subject: String,
    sender: channel::Sender<Message>,
}

#[derive(Default)]
struct State {
    next_sid: AtomicU64,
    old_request_style: AtomicBool,
    connection: Mutex<Option<Connection>>,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
    responders: Mutex<HashMap<String, Responder>>,
    requests: Mutex<Vec<Frame>>,
    published: Mutex<Vec<Frame>>,
    events: Mutex<Vec<Event>>,
    // Stream contents served through CONSUMER.MSG.NEXT pull requests.
    pull_backlog: Mutex<VecDeque<Vec<u8>>>,
    pull_sequence: AtomicU64,
}

/// A scripted in-memory [`Transport`].
#[derive(Clone, Default)]
pub struct MockTransport(Arc<State>);

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    /// Remember the connection wrapping this transport, so delivered
    /// messages can respond on their reply subjects.
    pub fn bind(&self, connection: &Connection) {
        *self.0.connection.lock() = Some(connection.clone());
    }

    /// Script a fixed reply for requests on `subject`.
    pub fn respond_with(&self, subject: &str, body: impl AsRef<[u8]>) {
        let body = body.as_ref().to_vec();
        self.respond_with_fn(subject, move |_| Some(body.clone()));
    }

    /// Script a reply computed from the request payload. Returning `None`
    /// makes the request time out.
    pub fn respond_with_fn(
        &self,
        subject: &str,
        f: impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) {
        self.0
            .responders
            .lock()
            .insert(subject.to_string(), Box::new(f));
    }

    /// Queue a stream message to be handed out by the next pull request.
    pub fn stash_pull_message(&self, data: impl AsRef<[u8]>) {
        self.0.pull_backlog.lock().push_back(data.as_ref().to_vec());
    }

    /// Deliver a message to every subscription on exactly `subject`.
    pub fn deliver(&self, subject: &str, reply: Option<&str>, data: &[u8]) {
        self.deliver_with_status(subject, reply, data, None, None);
    }

    /// Deliver a status-marker message, the shape the server uses for
    /// `404 No Messages` and friends.
    pub fn deliver_with_status(
        &self,
        subject: &str,
        reply: Option<&str>,
        data: &[u8],
        status: Option<u16>,
        description: Option<&str>,
    ) {
        let message = self.bound_message(subject, reply, data, status, description);
        for subscription in self.0.subscriptions.lock().values() {
            if subscription.subject == subject {
                subscription.sender.send(message.clone()).ok();
            }
        }
    }

    pub fn requests(&self) -> Vec<Frame> {
        self.0.requests.lock().clone()
    }

    pub fn published(&self) -> Vec<Frame> {
        self.0.published.lock().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.events.lock().clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.0.subscriptions.lock().len()
    }

    pub fn unsubscribed_count(&self) -> usize {
        self.0
            .events
            .lock()
            .iter()
            .filter(|event| matches!(event, Event::Unsubscribe(_)))
            .count()
    }

    pub fn is_old_request_style(&self) -> bool {
        self.0.old_request_style.load(Ordering::SeqCst)
    }

    fn record(&self, event: Event) {
        self.0.events.lock().push(event);
    }

    fn bound_message(
        &self,
        subject: &str,
        reply: Option<&str>,
        data: &[u8],
        status: Option<u16>,
        description: Option<&str>,
    ) -> Message {
        Message {
            subject: subject.to_string(),
            reply: reply.map(String::from),
            data: data.to_vec(),
            status,
            description: description.map(String::from),
            connection: self.0.connection.lock().clone(),
        }
    }

    // Serve a pull request the way the server would: deliver up to `batch`
    // stashed messages to the reply inbox, each with a `$JS.ACK` reply of
    // its own, and a 404 marker when `no_wait` found the backlog empty.
    fn serve_pull_request(&self, subject: &str, inbox: &str, payload: &[u8]) {
        let request: serde_json::Value = serde_json::from_slice(payload).unwrap_or_default();
        let batch = request["batch"].as_u64().unwrap_or(1);
        let no_wait = request["no_wait"].as_bool().unwrap_or(false);

        let target = subject
            .rsplit("CONSUMER.MSG.NEXT.")
            .next()
            .unwrap_or("stream.consumer")
            .to_string();

        let mut delivered = 0;
        while delivered < batch {
            let next = self.0.pull_backlog.lock().pop_front();
            let Some(data) = next else { break };

            let sequence = self.0.pull_sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let ack_reply = format!("$JS.ACK.{target}.1.{sequence}.{sequence}.0.0");
            self.deliver(inbox, Some(&ack_reply), &data);
            delivered += 1;
        }

        if no_wait && delivered == 0 {
            self.deliver_with_status(inbox, None, b"", Some(404), Some("No Messages"));
        }
    }
}

impl Transport for MockTransport {
    fn request(&self, subject: &str, payload: &[u8], _timeout: Duration) -> io::Result<Message> {
        self.record(Event::Request(subject.to_string()));
        self.0.requests.lock().push(Frame {
            subject: subject.to_string(),
            reply: None,
            payload: payload.to_vec(),
        });

        let body = {
            let responders = self.0.responders.lock();
            responders.get(subject).and_then(|f| f(payload))
        };

        match body {
            Some(body) => Ok(self.bound_message(subject, None, &body, None, None)),
            None => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no response from the server",
            )),
        }
    }

    fn publish(&self, subject: &str, reply: Option<&str>, payload: &[u8]) -> io::Result<()> {
        self.record(Event::Publish(subject.to_string()));
        self.0.published.lock().push(Frame {
            subject: subject.to_string(),
            reply: reply.map(String::from),
            payload: payload.to_vec(),
        });

        if subject.contains("CONSUMER.MSG.NEXT.") {
            if let Some(inbox) = reply {
                self.serve_pull_request(subject, inbox, payload);
            }
        }

        Ok(())
    }

    fn subscribe(
        &self,
        subject: &str,
        _queue: Option<&str>,
    ) -> io::Result<(u64, channel::Receiver<Message>)> {
        self.record(Event::Subscribe(subject.to_string()));
        let sid = self.0.next_sid.fetch_add(1, Ordering::SeqCst) + 1;
        let (sender, receiver) = channel::unbounded();
        self.0.subscriptions.lock().insert(
            sid,
            Subscription {
                subject: subject.to_string(),
                sender,
            },
        );
        Ok((sid, receiver))
    }

    fn unsubscribe(&self, sid: u64) -> io::Result<()> {
        self.record(Event::Unsubscribe(sid));
        self.0.subscriptions.lock().remove(&sid);
        Ok(())
    }

    fn new_inbox(&self) -> String {
        format!("_INBOX.{}", nuid::next())
    }

    fn flush(&self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn lenient_flush_buffer(&self) {}

    fn set_old_request_style(&self, enabled: bool) {
        self.0.old_request_style.store(enabled, Ordering::SeqCst);
    }
}
