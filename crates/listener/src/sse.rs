//! Minimal server-sent events decoder, enough for the listen endpoint.

use bytes::{Buf, BytesMut};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseMessage {
	pub event: String,
	pub data: String,
	pub id: Option<String>,
}

/// Incremental decoder, chunks may split lines (and UTF-8 sequences) anywhere
#[derive(Debug, Default)]
pub struct SseDecoder {
	pending: BytesMut,
	event: Option<String>,
	data: Vec<String>,
	id: Option<String>,
}

impl SseDecoder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Feeds a chunk in, returning every message it completed
	pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
		self.pending.extend_from_slice(chunk);

		let mut messages = vec![];

		while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
			let line = self.pending.split_to(end);
			self.pending.advance(1);

			let line = String::from_utf8_lossy(&line);
			let line = line.strip_suffix('\r').unwrap_or(&line);

			if let Some(message) = self.process_line(line) {
				messages.push(message);
			}
		}

		messages
	}

	fn process_line(&mut self, line: &str) -> Option<SseMessage> {
		if line.is_empty() {
			return self.dispatch();
		}

		if line.starts_with(':') {
			// Comment, the server uses these as keep-alives
			return None;
		}

		let (field, value) = match line.split_once(':') {
			Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
			None => (line, ""),
		};

		match field {
			"event" => self.event = Some(value.to_string()),
			"data" => self.data.push(value.to_string()),
			"id" => self.id = Some(value.to_string()),
			_ => {}
		}

		None
	}

	fn dispatch(&mut self) -> Option<SseMessage> {
		let event = self.event.take();
		let id = self.id.take();

		if self.data.is_empty() && event.is_none() {
			return None;
		}

		let data = self.data.join("\n");
		self.data.clear();

		Some(SseMessage {
			event: event.unwrap_or_else(|| "message".to_string()),
			data,
			id,
		})
	}
}
