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

//! The `JetStream` control-plane codec: request/reply bodies and the
//! error envelope shared by every management operation.

use std::{error, fmt};

use serde::{Deserialize, Serialize};

/// `ApiResponse` is a standard response from the `JetStream` JSON API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiResponse<T> {
    // Note:
    // Serde will try to match the data against each variant in order and the
    // first one that deserializes successfully is the one returned.
    //
    // Therefore the error case must come first, otherwise it can be ignored.
    Err { error: Error },
    Ok(T),
}

/// `Error` type returned from an API response when an error occurs.
///
/// Parsing is lenient: every field is optional so that replies from newer
/// brokers never fail to decode, and the server-side error code is kept raw
/// and mapped onto [`ErrorCode`] on demand.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Error {
    #[serde(default)]
    code: usize,
    #[serde(default)]
    err_code: u64,
    #[serde(default)]
    description: Option<String>,
}

impl Error {
    /// Returns the HTTP-like status code associated with this error.
    pub fn code(&self) -> usize {
        self.code
    }

    /// Returns the server side error code associated with this error.
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_u64(self.err_code)
    }

    /// Returns the description associated with this error, if the server
    /// sent one.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True when the error marks `JetStream` as unavailable for this
    /// account, either by the 503 status or by the dedicated error codes.
    pub fn is_not_enabled(&self) -> bool {
        self.code == 503
            || matches!(
                self.error_code(),
                ErrorCode::NotEnabled | ErrorCode::NotEnabledForAccount
            )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "{} (code {}, error code {})",
            self.description.as_deref().unwrap_or("unknown"),
            self.code,
            self.err_code,
        )
    }
}

impl error::Error for Error {}

/// `ErrorCode` which can be returned from a server in a response when an
/// error occurs.
///
/// Only the codes the client inspects are named; everything else is carried
/// through [`ErrorCode::Unknown`] so a newer broker cannot break parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Bad request
    BadRequest,
    /// Consumer name already in use
    ConsumerNameExist,
    /// Consumer not found
    ConsumerNotFound,
    /// Insufficient resources
    InsufficientResources,
    /// Maximum consumers limit reached
    MaximumConsumersLimit,
    /// No message found
    NoMessageFound,
    /// JetStream not enabled
    NotEnabled,
    /// JetStream not enabled for account
    NotEnabledForAccount,
    /// Stream name already in use
    StreamNameExist,
    /// Stream not found
    StreamNotFound,
    /// Expected stream does not match
    StreamNotMatch,
    /// Wrong last sequence
    StreamWrongLastSequence,
    /// Any other code, kept verbatim
    Unknown(u64),
}

impl ErrorCode {
    pub(crate) fn from_u64(code: u64) -> ErrorCode {
        match code {
            10003 => ErrorCode::BadRequest,
            10013 => ErrorCode::ConsumerNameExist,
            10014 => ErrorCode::ConsumerNotFound,
            10023 => ErrorCode::InsufficientResources,
            10026 => ErrorCode::MaximumConsumersLimit,
            10037 => ErrorCode::NoMessageFound,
            10076 => ErrorCode::NotEnabled,
            10039 => ErrorCode::NotEnabledForAccount,
            10058 => ErrorCode::StreamNameExist,
            10059 => ErrorCode::StreamNotFound,
            10060 => ErrorCode::StreamNotMatch,
            10071 => ErrorCode::StreamWrongLastSequence,
            other => ErrorCode::Unknown(other),
        }
    }

    /// True for the codes raised by operations on missing streams and
    /// consumers.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorCode::StreamNotFound | ErrorCode::ConsumerNotFound | ErrorCode::NoMessageFound
        )
    }
}
