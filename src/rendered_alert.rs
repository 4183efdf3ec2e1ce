//! Content of a composed chat message. Every message has an html body for
//! the styled rendering and a plain text body for clients without html.

use matrix_sdk::ruma::events::room::message::RoomMessageEventContent;
use thiserror::Error;

/// size limit of [RenderedAlertContent] in bytes
pub const MAX_MESSAGE_CONTENT_LEN: usize = 40000;

/// Error occuring when creating [RenderedAlertContent]
#[derive(Error, Debug, Clone)]
pub enum MessageContentError<T: Sized> {
	/// the size limit specified by [MAX_MESSAGE_CONTENT_LEN] was exceeded
	#[error("maximum message size exceeded")]
	MaxSizeExceeded(T),
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RenderedAlertContent {
	/// html message content
	html: String,
	/// plaintext message content
	plain: String,
}

impl RenderedAlertContent {
	/// Tries constructing a new [RenderedAlertContent] from message content.
	/// Returns [Result::Err] carrying a truncated plain text message if the
	/// resulting [RenderedAlertContent] would be too big.
	///
	/// # Arguments
	///
	/// * `html` - the formatted message content
	///
	/// * `plain` - the unformatted message content
	pub fn new(html: String, plain: String) -> Result<Self, MessageContentError<Self>> {
		if html.len() + plain.len() > MAX_MESSAGE_CONTENT_LEN {
			return Err(MessageContentError::MaxSizeExceeded(Self::truncated(plain)));
		}

		Ok(Self { html, plain })
	}

	/// Like [RenderedAlertContent::new] but accepts the truncated content
	/// instead of failing.
	pub fn new_lossy(html: String, plain: String) -> Self {
		match Self::new(html, plain) {
			Ok(content) | Err(MessageContentError::MaxSizeExceeded(content)) => content,
		}
	}

	/// truncate message if it exceed MAX_MESSAGE_CONTENT_LEN
	/// we only allow to specify a plain text message because it's hard to
	/// truncate html messages without breaking stuff
	///
	/// The html body is the escaped plain text, so the cut is sized by the
	/// escaped length of every char and never splits an entity.
	pub fn truncated(mut plain: String) -> Self {
		let mut html = String::new();
		let mut end = 0;
		let mut buf = [0; 4];

		for (idx, c) in plain.char_indices() {
			let escaped = tera::escape_html(c.encode_utf8(&mut buf));
			let next = idx + c.len_utf8();
			if next + html.len() + escaped.len() > MAX_MESSAGE_CONTENT_LEN {
				break;
			}
			html.push_str(&escaped);
			end = next;
		}
		plain.truncate(end);

		Self { html, plain }
	}

	pub fn html(&self) -> &str {
		&self.html
	}

	pub fn plain(&self) -> &str {
		&self.plain
	}

	/// the combined length in bytes of html and plain text message
	pub fn len(&self) -> usize {
		self.html.len() + self.plain.len()
	}

	pub fn is_empty(&self) -> bool {
		self.html.is_empty() && self.plain.is_empty()
	}
}

impl From<&RenderedAlertContent> for RoomMessageEventContent {
	fn from(msg: &RenderedAlertContent) -> Self {
		RoomMessageEventContent::text_html(msg.plain.clone(), msg.html.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_small_content() {
		let content = RenderedAlertContent::new("<b>a</b>".to_owned(), "a".to_owned()).unwrap();

		assert_eq!(content.html(), "<b>a</b>");
		assert_eq!(content.plain(), "a");
		assert_eq!(content.len(), 9);
	}

	#[test]
	fn oversized_content_is_truncated_to_plain_text() {
		let plain = "é".repeat(MAX_MESSAGE_CONTENT_LEN);
		let html = format!("<code>{plain}</code>");

		let content = match RenderedAlertContent::new(html, plain) {
			Err(MessageContentError::MaxSizeExceeded(content)) => content,
			Ok(_) => panic!("content should exceed the size limit"),
		};

		assert!(content.plain().len() <= MAX_MESSAGE_CONTENT_LEN / 2);
		assert!(content.plain().chars().all(|c| c == 'é'));
		assert_eq!(content.html(), content.plain());
		assert!(content.len() <= MAX_MESSAGE_CONTENT_LEN);
	}

	#[test]
	fn escaping_counts_against_the_size_limit() {
		let plain = r#"{"a":"<b>&"}"#.repeat(8000);
		let html = format!("<code>{}</code>", tera::escape_html(&plain));

		let content = RenderedAlertContent::new_lossy(html, plain.clone());

		assert!(content.len() <= MAX_MESSAGE_CONTENT_LEN, "{}", content.len());
		assert!(plain.starts_with(content.plain()));
		assert_eq!(content.html(), tera::escape_html(content.plain()));
		assert!(content.len() > MAX_MESSAGE_CONTENT_LEN - 8);
	}

	#[test]
	fn truncated_plain_text_is_escaped_for_html() {
		let content = RenderedAlertContent::truncated("<pool>".to_owned());
		assert_eq!(content.html(), "&lt;pool&gt;");
	}

	#[test]
	fn lossy_construction_never_fails() {
		let content = RenderedAlertContent::new_lossy("x".repeat(MAX_MESSAGE_CONTENT_LEN), "y".to_owned());
		assert_eq!(content.plain(), "y");
	}
}
