// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use bytes::BytesMut;
use common::report::{PositionFix, Report, SkyView};
use serde::Deserialize;
use std::io;
use tokio_util::codec::Decoder;
use tracing::debug;

/// Longest report line that is accepted, longer lines are dropped.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// The gpsd message envelope, dispatched on the `class` member.
#[derive(Deserialize)]
#[serde(tag = "class")]
enum Message {
    #[serde(rename = "TPV")]
    Tpv(PositionFix),
    #[serde(rename = "SKY")]
    Sky(SkyView),
    #[serde(other)]
    Unknown,
}

/// Splits the gpsd byte stream into newline delimited JSON reports.
///
/// Bytes after the last newline stay in the read buffer until the rest of their
/// line arrived, so a report is decoded exactly once no matter how the stream is
/// fragmented. Lines that are not valid JSON, that have no known `class`, or that
/// exceed [`MAX_LINE_LENGTH`] are dropped. Malformed input never produces an error.
#[derive(Debug)]
pub struct ReportCodec {
    /// Index into the buffer up to which no newline was found yet.
    next_index: usize,
    /// Set while the remainder of an over-long line is skipped.
    is_discarding: bool,
    max_length: usize,
}

impl ReportCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        ReportCodec {
            next_index: 0,
            is_discarding: false,
            max_length,
        }
    }
}

impl Default for ReportCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ReportCodec {
    type Item = Report;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Report>, io::Error> {
        loop {
            let Some(offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') else {
                if buf.len() > self.max_length {
                    debug!("Dropping gpsd line longer than {} bytes", self.max_length);
                    buf.clear();
                    self.next_index = 0;
                    self.is_discarding = true;
                } else {
                    self.next_index = buf.len();
                }
                return Ok(None);
            };
            let line = buf.split_to(self.next_index + offset + 1);
            self.next_index = 0;
            if self.is_discarding {
                self.is_discarding = false;
                continue;
            }
            if line.len() > self.max_length + 1 {
                debug!("Dropping gpsd line longer than {} bytes", self.max_length);
                continue;
            }
            if let Some(report) = parse_line(&line) {
                return Ok(Some(report));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Report>, io::Error> {
        if let Some(report) = self.decode(buf)? {
            return Ok(Some(report));
        }
        if !buf.is_empty() {
            debug!("Dropping {} bytes of an incomplete gpsd line", buf.len());
            buf.clear();
        }
        self.next_index = 0;
        self.is_discarding = false;
        Ok(None)
    }
}

/// Parses one line, returns `None` for anything that is not a known report.
fn parse_line(line: &[u8]) -> Option<Report> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<Message>(text) {
        Ok(Message::Tpv(fix)) => Some(Report::PositionFix(fix)),
        Ok(Message::Sky(sky)) => Some(Report::SkyView(sky)),
        Ok(Message::Unknown) => None,
        Err(e) => {
            debug!("Discarding malformed gpsd line. Error: {e}");
            None
        }
    }
}
