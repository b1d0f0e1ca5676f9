//! Incremental parser for `text/event-stream` bodies.
//!
//! Network chunks do not line up with event boundaries. The parser
//! keeps undelimited bytes buffered until the rest of the line arrives,
//! which also keeps multi-byte UTF-8 sequences intact since `\n` never
//! occurs inside one.

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the body and return every event it
    /// completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = strip_cr(&self.buffer[start..end]);
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        events
    }

    /// Signal end of input. A trailing line without a newline and any
    /// event still waiting for its blank line are flushed.
    pub fn finish(&mut self) -> Option<Event> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(strip_cr(&rest)).into_owned();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<Event> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment, used for keep-alives
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // `id` and `retry` have no meaning for completion streams
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<Event> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(Event {
            event: self.event.take(),
            data,
        })
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.data.as_str()).collect()
    }

    #[test]
    fn test_parses_complete_events() {
        let mut parser = EventStreamParser::new();
        let events = parser.push(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(data(&events), vec!["{\"a\":1}", "[DONE]"]);
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_buffers_event_split_across_chunks() {
        let mut parser = EventStreamParser::new();
        assert!(parser.push(b"data: {\"choices\":[{\"de").is_empty());
        assert!(parser.push(b"lta\":{\"content\":\"Hi\"}}]}\n").is_empty());
        let events = parser.push(b"\ndata: [DO");
        assert_eq!(data(&events), vec![r#"{"choices":[{"delta":{"content":"Hi"}}]}"#]);
        let events = parser.push(b"NE]\n\n");
        assert_eq!(data(&events), vec!["[DONE]"]);
    }

    #[test]
    fn test_every_split_point_gives_same_events() {
        let body = "data: {\"x\":\"h\u{e9}llo \u{1f600}\"}\r\n\r\n: keep-alive\n\ndata: [DONE]\n\n";
        let mut whole = EventStreamParser::new();
        let expected = whole.push(body.as_bytes());
        assert_eq!(expected.len(), 2);

        for split in 0..=body.len() {
            let (a, b) = body.as_bytes().split_at(split);
            let mut parser = EventStreamParser::new();
            let mut events = parser.push(a);
            events.extend(parser.push(b));
            assert_eq!(events, expected, "split at byte {}", split);
        }
    }

    #[test]
    fn test_joins_multiline_data() {
        let mut parser = EventStreamParser::new();
        let events = parser.push(b"data: first\ndata: second\n\n");
        assert_eq!(data(&events), vec!["first\nsecond"]);
    }

    #[test]
    fn test_event_name_and_ignored_fields() {
        let mut parser = EventStreamParser::new();
        let events = parser.push(b"event: error\nid: 7\nretry: 100\ndata:boom\n\n");
        assert_eq!(
            events,
            vec![Event {
                event: Some("error".to_string()),
                data: "boom".to_string(),
            }]
        );
    }

    #[test]
    fn test_skips_comments_and_empty_events() {
        let mut parser = EventStreamParser::new();
        let events = parser.push(b": keep-alive\n\n\n\nevent: ping\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut parser = EventStreamParser::new();
        assert!(parser.push(b"data: partial").is_empty());
        assert_eq!(parser.finish().map(|e| e.data), Some("partial".to_string()));
        assert_eq!(parser.finish(), None);
    }
}
