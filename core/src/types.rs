use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
	File,
	Directory,
}

/// One item of a remote directory listing. `absolute_path` is unique per server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
	pub name: String,
	#[serde(rename = "type")]
	pub kind: EntryKind,
	#[serde(rename = "size")]
	pub size_bytes: i64,
	#[serde(rename = "modified", with = "chrono::serde::ts_milliseconds")]
	pub modified_at: DateTime<Utc>,
	#[serde(default)]
	pub extension: Option<String>,
	pub absolute_path: String,
}

impl DirectoryEntry {
	pub fn is_directory(&self) -> bool {
		self.kind == EntryKind::Directory
	}

	pub fn is_viewable(&self) -> bool {
		!self.is_directory() && self.extension.as_deref().is_some_and(is_viewable)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
	pub path: String,
	pub items: Vec<DirectoryEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
	pub width: u32,
	pub height: u32,
}

/// Server-side rendition of a file, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileContent {
	Text {
		content: String,
		#[serde(default)]
		language: Option<String>,
	},
	Markdown {
		content: String,
	},
	Image {
		#[serde(rename = "mimeType")]
		mime_type: String,
		#[serde(default)]
		dimensions: Option<ImageDimensions>,
	},
	Binary {
		#[serde(default, rename = "mimeType")]
		mime_type: Option<String>,
	},
}

impl FileContent {
	/// Text body of text and markdown content.
	pub fn body(&self) -> Option<&str> {
		match self {
			FileContent::Text { content, .. } | FileContent::Markdown { content } => Some(content),
			_ => None,
		}
	}

	pub fn mime_type(&self) -> Option<&str> {
		match self {
			FileContent::Image { mime_type, .. } => Some(mime_type),
			FileContent::Binary { mime_type } => mime_type.as_deref(),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
	pub name: String,
	#[serde(rename = "type")]
	pub type_label: String,
	#[serde(rename = "size")]
	pub size_bytes: i64,
	#[serde(rename = "modified", with = "chrono::serde::ts_milliseconds")]
	pub modified_at: DateTime<Utc>,
	#[serde(
		default,
		rename = "created",
		with = "chrono::serde::ts_milliseconds_option"
	)]
	pub created_at: Option<DateTime<Utc>>,
	pub absolute_path: String,
}

const VIEWABLE_EXTENSIONS: &[&str] = &[
	// text
	"txt", "log", "csv", "md", "markdown",
	// code
	"swift", "ts", "tsx", "js", "jsx", "py", "rb", "go", "rs", "java", "kt", "c", "cpp", "h",
	"hpp", "cs", "php", "sh", "bash", "zsh",
	// markup and config
	"html", "htm", "xml", "json", "yaml", "yml", "toml", "plist", "css", "scss", "less", "sql",
	// images
	"jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico", "heic",
];

/// Whether the server can render files with this extension through `/api/view`.
pub fn is_viewable(extension: &str) -> bool {
	let ext = extension.to_ascii_lowercase();
	VIEWABLE_EXTENSIONS.contains(&ext.as_str())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn decodes_listing_with_millisecond_timestamps() {
		let listing: DirectoryListing = serde_json::from_value(json!({
			"path": "/",
			"items": [
				{"name": "notes.txt", "type": "file", "size": 120, "modified": 1_700_000_000_000i64,
				 "extension": "txt", "absolutePath": "/notes.txt"},
				{"name": "docs", "type": "directory", "size": 0, "modified": 0,
				 "extension": null, "absolutePath": "/docs"}
			]
		}))
		.unwrap();
		assert_eq!(listing.items.len(), 2);
		let notes = &listing.items[0];
		assert_eq!(notes.kind, EntryKind::File);
		assert_eq!(notes.size_bytes, 120);
		assert_eq!(notes.modified_at.timestamp_millis(), 1_700_000_000_000);
		assert!(notes.is_viewable());
		assert!(listing.items[1].is_directory());
		assert!(!listing.items[1].is_viewable());
	}

	#[test]
	fn decodes_tagged_content() {
		let text: FileContent =
			serde_json::from_value(json!({"type": "text", "content": "hi", "language": null})).unwrap();
		assert_eq!(text.body(), Some("hi"));

		let image: FileContent = serde_json::from_value(json!({
			"type": "image", "content": null, "mimeType": "image/png",
			"dimensions": {"width": 640, "height": 480}
		}))
		.unwrap();
		assert_eq!(
			image,
			FileContent::Image {
				mime_type: "image/png".into(),
				dimensions: Some(ImageDimensions { width: 640, height: 480 }),
			}
		);
		assert_eq!(image.body(), None);

		let binary: FileContent = serde_json::from_value(json!({"type": "binary"})).unwrap();
		assert_eq!(binary.mime_type(), None);
	}

	#[test]
	fn rejects_unknown_content_type() {
		let result = serde_json::from_value::<FileContent>(json!({"type": "video"}));
		assert!(result.is_err());
	}

	#[test]
	fn decodes_metadata_without_created() {
		let meta: FileMetadata = serde_json::from_value(json!({
			"name": "a.rs", "type": "Rust source", "size": 12, "modified": 1000,
			"absolutePath": "/a.rs"
		}))
		.unwrap();
		assert_eq!(meta.type_label, "Rust source");
		assert!(meta.created_at.is_none());
	}

	#[test]
	fn viewability_is_case_insensitive() {
		assert!(is_viewable("PNG"));
		assert!(is_viewable("rs"));
		assert!(!is_viewable("zip"));
	}
}
