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

use std::{fmt, io};

use crate::connection::Connection;
use crate::types::AckKind;

pub(crate) const MESSAGE_NOT_BOUND: &str = "message not bound to a connection";

/// A message received on a subject.
#[derive(Clone)]
pub struct Message {
    /// The subject this message came from.
    pub subject: String,

    /// Optional reply subject that may be used for sending a response to
    /// this message. For messages delivered by a `JetStream` consumer this
    /// is the acknowledgement subject.
    pub reply: Option<String>,

    /// The message contents.
    pub data: Vec<u8>,

    /// Protocol status attached by the server to otherwise empty messages,
    /// such as `404` when a pull request found no messages or `408` when it
    /// expired. Set by the transport from the message headers.
    pub status: Option<u16>,

    /// Human readable companion to `status`.
    pub description: Option<String>,

    /// Connection for publishing on the reply subject.
    #[doc(hidden)]
    pub connection: Option<Connection>,
}

impl Message {
    /// Creates a new `Message` without binding it to a connection.
    ///
    /// Useful for constructing message values to pass around; the
    /// associated methods that publish on the reply subject require a
    /// connection injected by the transport and will error without one.
    pub fn new(subject: &str, reply: Option<&str>, data: impl AsRef<[u8]>) -> Message {
        Message {
            subject: subject.to_string(),
            reply: reply.map(String::from),
            data: data.as_ref().to_vec(),
            ..Default::default()
        }
    }

    /// Respond to a request message.
    pub fn respond(&self, msg: impl AsRef<[u8]>) -> io::Result<()> {
        let reply = self.reply.as_ref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no reply subject to reply to")
        })?;
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, MESSAGE_NOT_BOUND))?;
        connection.publish(reply.as_str(), msg.as_ref())
    }

    /// Acknowledge a `JetStream` message as completely handled.
    ///
    /// Under `AckPolicy::None` the server ignores the acknowledgement;
    /// under `AckPolicy::All` it also acknowledges every message with a
    /// lower sequence.
    pub fn ack(&self) -> io::Result<()> {
        self.respond(AckKind::Ack)
    }

    /// Acknowledge a `JetStream` message with the given [`AckKind`]. See
    /// its documentation for details of what each variant means.
    pub fn ack_kind(&self, ack_kind: AckKind) -> io::Result<()> {
        self.respond(ack_kind)
    }

    /// Signal that this message will not be processed now, requesting
    /// redelivery.
    pub fn nak(&self) -> io::Result<()> {
        self.respond(AckKind::Nak)
    }

    /// Signal that work on this message is ongoing, extending the
    /// acknowledgement window.
    pub fn in_progress(&self) -> io::Result<()> {
        self.respond(AckKind::Progress)
    }

    /// Instruct the server to stop redelivering this message without
    /// acknowledging it as successfully processed.
    pub fn term(&self) -> io::Result<()> {
        self.respond(AckKind::Term)
    }

    /// Whether this message was delivered through a `JetStream` consumer,
    /// recognizable by its acknowledgement reply subject.
    pub fn is_jetstream(&self) -> bool {
        self.reply
            .as_deref()
            .map_or(false, |reply| reply.starts_with("$JS."))
    }

    /// Determine if the message is a no responders response from the
    /// server.
    pub fn is_no_responders(&self) -> bool {
        self.data.is_empty() && self.status == Some(503)
    }

    // Determine if a message is `404 No Messages`.
    pub(crate) fn is_no_messages(&self) -> bool {
        self.status == Some(404)
    }

    // Determine if a message is `408 Request Timeout`.
    pub(crate) fn is_request_timeout(&self) -> bool {
        self.status == Some(408)
    }

    // Helper for detecting flow control messages.
    pub(crate) fn is_flow_control(&self) -> bool {
        if !self.data.is_empty() || self.status != Some(100) {
            return false;
        }

        matches!(
            self.description.as_deref(),
            Some("Flow Control") | Some("FlowControl Request")
        )
    }

    // Helper for detecting idle heartbeat messages.
    pub(crate) fn is_idle_heartbeat(&self) -> bool {
        self.data.is_empty()
            && self.status == Some(100)
            && self.description.as_deref() == Some("Idle Heartbeat")
    }
}

impl Default for Message {
    fn default() -> Message {
        Message {
            subject: String::new(),
            reply: None,
            data: Vec::new(),
            status: None,
            description: None,
            connection: None,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Message")
            .field("subject", &self.subject)
            .field("reply", &self.reply)
            .field("length", &self.data.len())
            .field("status", &self.status)
            .finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body = format!("[{} bytes]", self.data.len());
        if let Ok(str) = std::str::from_utf8(&self.data) {
            body = str.to_string();
        }
        if let Some(reply) = &self.reply {
            write!(
                f,
                "Message {{\n  subject: \"{}\",\n  reply: \"{}\",\n  data: \"{}\"\n}}",
                self.subject, reply, body
            )
        } else {
            write!(
                f,
                "Message {{\n  subject: \"{}\",\n  data: \"{}\"\n}}",
                self.subject, body
            )
        }
    }
}
