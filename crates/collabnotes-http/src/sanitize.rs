//! HTML sanitization for the `htmlContent` field (§6.1): scripts, event
//! handler attributes, and `javascript:` URLs are stripped on every
//! write so a sanitized value is the only thing ever echoed back on
//! read. `ammonia`'s default tag/attribute/URL-scheme allowlist already
//! excludes all three, so no custom `Builder` configuration is needed.

pub fn sanitize_html(raw: &str) -> Box<str> {
	ammonia::clean(raw).into()
}


// vim: ts=4
