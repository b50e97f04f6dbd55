//! POSIX path helpers for remote paths. Remote paths are always rooted at `/`.

pub const ROOT: &str = "/";

/// Prefixes `/` when the path is relative.
pub fn rooted(path: &str) -> String {
	if path.starts_with('/') {
		path.to_string()
	} else {
		format!("/{path}")
	}
}

/// Parent of `path` with the last segment removed. The parent of `/` is `/`.
pub fn parent(path: &str) -> String {
	let trimmed = path.trim_end_matches('/');
	match trimmed.rfind('/') {
		Some(0) | None => ROOT.to_string(),
		Some(idx) => trimmed[..idx].to_string(),
	}
}

pub fn can_go_up(path: &str) -> bool {
	!path.trim_end_matches('/').is_empty()
}

pub fn join(dir: &str, name: &str) -> String {
	if dir.ends_with('/') {
		format!("{dir}{name}")
	} else {
		format!("{dir}/{name}")
	}
}

/// Last segment of `path`, `None` at the root.
pub fn last_component(path: &str) -> Option<&str> {
	path.trim_end_matches('/')
		.rsplit('/')
		.next()
		.filter(|segment| !segment.is_empty())
}
