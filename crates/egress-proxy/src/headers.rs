//! Header filtering, kept as a pure function so it can be unit-tested
//! without standing up a listener (spec §4.D "Header filtering is a pure
//! function").

use http::{HeaderMap, HeaderName};

/// Headers stripped before a request is replayed to the upstream target.
/// `proxy-connection`/`proxy-authorization` are proxy-control headers the
/// spec explicitly names; the rest are the standard IANA hop-by-hop set
/// that has no business surviving a proxy hop.
const HOP_BY_HOP: &[&str] = &[
    "proxy-connection",
    "proxy-authorization",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailers",
    "upgrade",
];

pub fn filter_hop_by_hop_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if HOP_BY_HOP.iter().any(|h| name.as_str().eq_ignore_ascii_case(h)) {
            continue;
        }
        filtered.append(HeaderName::from(name), value.clone());
    }
    filtered
}
