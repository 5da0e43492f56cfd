// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time protocol records, carried inside a PEX payload (`clientType = 1`).

use crate::codec::{CodecError, CodecResult, Cursor, CursorMut, Decode, Encode};

/// Offset from Unix epoch seconds to XNS time (seconds since 1901-01-01,
/// clamped to this protocol's defined earliest representable instant).
/// `xns_time = unix_epoch_seconds + XNS_TIME_OFFSET`.
pub const XNS_TIME_OFFSET: i64 = 2_114_294_400;

#[must_use]
pub fn unix_to_xns_time(unix_epoch_seconds: i64) -> u32 {
    (unix_epoch_seconds + XNS_TIME_OFFSET) as u32
}

#[must_use]
pub fn xns_to_unix_time(xns_time: u32) -> i64 {
    i64::from(xns_time) - XNS_TIME_OFFSET
}

/// Protocol version; only `CURRENT` is understood.
pub const VERSION_CURRENT: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeType {
    Request,
    Response,
}

impl TimeType {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            TimeType::Request => 1,
            TimeType::Response => 2,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(TimeType::Request),
            2 => Some(TimeType::Response),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    West,
    East,
}

impl Direction {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            Direction::West => 0,
            Direction::East => 1,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Direction::West),
            1 => Some(Direction::East),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    Unknown,
    Milliseconds,
}

impl Tolerance {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            Tolerance::Unknown => 0,
            Tolerance::Milliseconds => 1,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Tolerance::Unknown),
            1 => Some(Tolerance::Milliseconds),
            _ => None,
        }
    }
}

/// The body of a `Response`-typed Time record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeResponse {
    pub time: u32,
    pub offset_direction: Direction,
    pub offset_hours: u16,
    pub offset_minutes: u16,
    pub dst_start: u16,
    pub dst_end: u16,
    pub tolerance: Tolerance,
    pub tolerance_value: u32,
}

impl<'a> Decode<'a> for TimeResponse {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let time = cursor.read_u32()?;
        let raw_direction = cursor.read_u16()?;
        let offset_direction = Direction::from_u16(raw_direction)
            .ok_or(CodecError::BadValue { field: "time.offset_direction", value: raw_direction as u32 })?;
        let offset_hours = cursor.read_u16()?;
        let offset_minutes = cursor.read_u16()?;
        let dst_start = cursor.read_u16()?;
        let dst_end = cursor.read_u16()?;
        let raw_tolerance = cursor.read_u16()?;
        let tolerance = Tolerance::from_u16(raw_tolerance)
            .ok_or(CodecError::BadValue { field: "time.tolerance", value: raw_tolerance as u32 })?;
        let tolerance_value = cursor.read_u32()?;
        Ok(TimeResponse {
            time,
            offset_direction,
            offset_hours,
            offset_minutes,
            dst_start,
            dst_end,
            tolerance,
            tolerance_value,
        })
    }
}

impl Encode for TimeResponse {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u32(self.time)?;
        cursor.write_u16(self.offset_direction.to_u16())?;
        cursor.write_u16(self.offset_hours)?;
        cursor.write_u16(self.offset_minutes)?;
        cursor.write_u16(self.dst_start)?;
        cursor.write_u16(self.dst_end)?;
        cursor.write_u16(self.tolerance.to_u16())?;
        cursor.write_u32(self.tolerance_value)
    }
}

/// Outer Time record: `version, type, body`. `body` is absent for a
/// `Request` (the requester carries no payload beyond the type tag) and
/// present for a `Response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub version: u16,
    pub time_type: TimeType,
    pub response: Option<TimeResponse>,
}

impl Time {
    #[must_use]
    pub fn request() -> Self {
        Time { version: VERSION_CURRENT, time_type: TimeType::Request, response: None }
    }

    #[must_use]
    pub fn response(response: TimeResponse) -> Self {
        Time { version: VERSION_CURRENT, time_type: TimeType::Response, response: Some(response) }
    }
}

impl<'a> Decode<'a> for Time {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let version = cursor.read_u16()?;
        let raw_type = cursor.read_u16()?;
        let time_type = TimeType::from_u16(raw_type)
            .ok_or(CodecError::BadValue { field: "time.type", value: raw_type as u32 })?;
        let response = match time_type {
            TimeType::Request => None,
            TimeType::Response => Some(TimeResponse::decode(cursor)?),
        };
        Ok(Time { version, time_type, response })
    }
}

impl Encode for Time {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.version)?;
        cursor.write_u16(self.time_type.to_u16())?;
        if let Some(response) = &self.response {
            response.encode(cursor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_conversion_matches_worked_example() {
        assert_eq!(unix_to_xns_time(1_700_000_000), 3_814_294_400);
        assert_eq!(xns_to_unix_time(3_814_294_400), 1_700_000_000);
    }

    #[test]
    fn response_roundtrip() {
        let response = TimeResponse {
            time: unix_to_xns_time(1_700_000_000),
            offset_direction: Direction::West,
            offset_hours: 8,
            offset_minutes: 0,
            dst_start: 0,
            dst_end: 0,
            tolerance: Tolerance::Unknown,
            tolerance_value: 0,
        };
        let time = Time::response(response);

        let mut buf = [0u8; 32];
        let mut w = CursorMut::new(&mut buf);
        time.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = Time::decode(&mut r).unwrap();
        assert_eq!(decoded, time);
        assert_eq!(decoded.response.unwrap().time, 3_814_294_400);
    }

    #[test]
    fn request_has_no_body() {
        let time = Time::request();
        let mut buf = [0u8; 4];
        let mut w = CursorMut::new(&mut buf);
        time.encode(&mut w).unwrap();
        assert_eq!(w.position(), 4);
    }
}
