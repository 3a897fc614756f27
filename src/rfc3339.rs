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

//! Lenient RFC 3339 (de)serialization for server timestamps.
//!
//! Brokers of different vintages disagree about fractional seconds and
//! offsets, and some emit values `time` refuses to parse at all. Timestamps
//! are informational here, so an unparseable value maps to the zero instant
//! instead of failing the whole API response.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;
use time::OffsetDateTime;

/// 0001-01-01T00:00:00Z, the uninitialized timestamp the server uses.
pub(crate) const ZERO_INSTANT: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

pub(crate) fn zero() -> OffsetDateTime {
    ZERO_INSTANT
}

pub(crate) fn parse(s: &str) -> OffsetDateTime {
    OffsetDateTime::parse(s, &Rfc3339).unwrap_or(ZERO_INSTANT)
}

pub(crate) fn serialize<S>(date_time: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date_time
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(parse(&s))
}

pub(crate) mod option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    pub(crate) fn serialize<S>(
        date_time: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if let Some(date_time) = date_time {
            let s = date_time
                .format(&Rfc3339)
                .map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&s)
        } else {
            serializer.serialize_none()
        }
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let maybe = Option::<String>::deserialize(deserializer)?;
        Ok(maybe.map(|s| super::parse(&s)))
    }
}
