// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Minimal incremental server-sent-events parser shared by the drivers.
//!
//! Network chunks arrive at arbitrary boundaries; the parser buffers until a
//! blank line terminates an event and then yields the joined `data:` payload.
//! Event names and comments are ignored; both wire formats we speak put
//! everything the client needs in the data payload.

#[derive(Default)]
pub(crate) struct SseParser {
    buf: String,
}

impl SseParser {
    /// Feed a network chunk; returns the `data` payloads of all events
    /// completed by it, in order.
    pub(crate) fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buf.push_str(chunk);
        let mut out = Vec::new();
        // An event ends at a blank line.  Handle both \n\n and \r\n\r\n.
        loop {
            let Some((boundary, sep_len)) = find_event_boundary(&self.buf) else {
                break;
            };
            let event: String = self.buf.drain(..boundary + sep_len).collect();
            let data: Vec<&str> = event
                .lines()
                .filter_map(|l| l.strip_prefix("data:").map(|d| d.strip_prefix(' ').unwrap_or(d)))
                .collect();
            if !data.is_empty() {
                out.push(data.join("\n"));
            }
        }
        out
    }
}

fn find_event_boundary(buf: &str) -> Option<(usize, usize)> {
    let lf = buf.find("\n\n").map(|i| (i, 2));
    let crlf = buf.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 < b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
