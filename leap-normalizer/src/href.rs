//! Helpers for LEAP self-references (`href`).
//!
//! A LEAP href is an absolute resource path such as `/zone/622/status`.
//! Splitting it on `/` yields an empty segment at index 0 (before the leading
//! slash), the resource type at index 1 and the resource id at index 2.

/// Extract the device id from an href.
///
/// `segment_index` counts resource segments the way the gateway's status
/// rules do: the id of `/zone/622/status` sits at segment index 1, which is
/// split position `segment_index + 1` once the leading empty segment is
/// accounted for.
///
/// Returns `None` when the href is too short or the segment is empty.
pub fn device_id_from_href(href: &str, segment_index: usize) -> Option<String> {
    href.trim()
        .split('/')
        .nth(segment_index + 1)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
