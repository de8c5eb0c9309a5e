//! MIME type detection for manifest file entries (spec §4.G `mimeType?`).
//! A static extension table rather than a content-sniffing crate: the
//! field is explicitly optional in the spec, and nothing else in this
//! workspace's dependency stack needed sniffing.

pub fn guess_mime_type(path: &str) -> Option<&'static str> {
    let extension = path.rsplit('.').next()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "wasm" => "application/wasm",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "map" => "application/json",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_common_bundle_extensions() {
        assert_eq!(guess_mime_type("app.js"), Some("application/javascript"));
        assert_eq!(guess_mime_type("style.css"), Some("text/css"));
        assert_eq!(guess_mime_type("index.html"), Some("text/html"));
    }

    #[test]
    fn returns_none_for_unknown_or_missing_extension() {
        assert_eq!(guess_mime_type("README"), None);
        assert_eq!(guess_mime_type("data.xyz"), None);
    }
}
