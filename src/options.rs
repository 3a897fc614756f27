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
    fmt::{self, Debug},
    io,
    time::Duration,
};

/// The default `JetStream` API prefix.
pub const DEFAULT_API_PREFIX: &str = "$JS.API.";

/// The default timeout applied to management and publish requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// `JetStream` options, created through [`JetStreamOptions::builder`].
///
/// Immutable once built.
#[derive(Clone)]
pub struct JetStreamOptions {
    pub(crate) prefix: String,
    pub(crate) request_timeout: Duration,
    pub(crate) direct: bool,
}

impl Debug for JetStreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_map()
            .entry(&"prefix", &self.prefix)
            .entry(&"request_timeout", &self.request_timeout)
            .entry(&"direct", &self.direct)
            .finish()
    }
}

impl Default for JetStreamOptions {
    fn default() -> JetStreamOptions {
        JetStreamOptions {
            prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            direct: false,
        }
    }
}

impl JetStreamOptions {
    /// `Options` for `JetStream` operations, with the default API prefix
    /// and request timeout.
    ///
    /// # Example
    ///
    /// ```
    /// let options = jetstream::JetStreamOptions::new();
    /// ```
    pub fn new() -> JetStreamOptions {
        JetStreamOptions::default()
    }

    /// Start building a custom set of options.
    ///
    /// # Example
    ///
    /// ```
    /// # use std::time::Duration;
    /// let options = jetstream::JetStreamOptions::builder()
    ///     .prefix("$JS.acme.API")
    ///     .request_timeout(Duration::from_secs(2))
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> JetStreamOptionsBuilder {
        JetStreamOptionsBuilder::default()
    }

    /// The configured API prefix, exactly as it was set. When composing
    /// request subjects a trailing `.` is appended if it is missing.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The timeout applied to management and publish requests.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Whether the context runs in direct mode, the precondition for
    /// attaching subscriptions to pre-existing consumers.
    pub fn is_direct_mode(&self) -> bool {
        self.direct
    }
}

/// Builds a validated [`JetStreamOptions`].
#[derive(Debug, Clone)]
pub struct JetStreamOptionsBuilder {
    prefix: String,
    request_timeout: Duration,
    direct: bool,
}

impl Default for JetStreamOptionsBuilder {
    fn default() -> JetStreamOptionsBuilder {
        JetStreamOptionsBuilder {
            prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            direct: false,
        }
    }
}

impl JetStreamOptionsBuilder {
    /// Set a custom `JetStream` API prefix, for accounts that export the
    /// API under another subject space.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the timeout applied to management and publish requests.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Enable direct mode, allowing subscriptions to attach to
    /// pre-existing consumers.
    pub fn direct(mut self, direct: bool) -> Self {
        self.direct = direct;
        self
    }

    /// Validate and build the options.
    ///
    /// The prefix must be non-empty and must not contain the `>` or `*`
    /// wildcards.
    pub fn build(self) -> io::Result<JetStreamOptions> {
        if self.prefix.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "the API prefix must not be empty",
            ));
        }
        if self.prefix.contains('>') || self.prefix.contains('*') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "the API prefix must not contain wildcards",
            ));
        }

        Ok(JetStreamOptions {
            prefix: self.prefix,
            request_timeout: self.request_timeout,
            direct: self.direct,
        })
    }
}
