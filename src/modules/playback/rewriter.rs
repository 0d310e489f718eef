use crate::common::layout::{VARIANT_MANIFEST, variant_reference};
use crate::modules::transcode::profile::is_allowed;

/// Normalizes every variant reference in a master manifest to
/// `<label>/index.m3u8`.
///
/// A reference line is an allowed rendition label followed by one or more
/// `/` or `\` separators and `index.m3u8`. All other lines, including tags and
/// unknown labels, pass through untouched, as do the original line endings.
pub fn rewrite_master(manifest: &str) -> String {
    let mut out = String::with_capacity(manifest.len());
    for line in manifest.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        match normalize_reference(body) {
            Some(rewritten) => out.push_str(&rewritten),
            None => out.push_str(body),
        }
        out.push_str(ending);
    }
    out
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn normalize_reference(line: &str) -> Option<String> {
    let sep = line.find(['/', '\\'])?;
    let (label, rest) = line.split_at(sep);
    if !is_allowed(label) {
        return None;
    }
    let file = rest.trim_start_matches(['/', '\\']);
    if file != VARIANT_MANIFEST {
        return None;
    }
    Some(variant_reference(label))
}
