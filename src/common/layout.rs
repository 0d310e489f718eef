//! Deterministic object keys shared by the transcoder and the playback path.
//!
//! Re-running a job for the same upload writes to exactly these keys, which is
//! what makes redelivered jobs safe.

pub const MASTER_MANIFEST: &str = "master.m3u8";
pub const VARIANT_MANIFEST: &str = "index.m3u8";

/// `hls/<userId>/<uploadId>`
pub fn hls_prefix(user_id: &str, upload_id: &str) -> String {
    format!("hls/{}/{}", user_id, upload_id)
}

/// `hls/<userId>/<uploadId>/master.m3u8`
pub fn master_manifest_path(user_id: &str, upload_id: &str) -> String {
    format!("{}/{}", hls_prefix(user_id, upload_id), MASTER_MANIFEST)
}

/// `thumbnails/<userId>/<uploadId>.jpg`
pub fn thumbnail_path(user_id: &str, upload_id: &str) -> String {
    format!("thumbnails/{}/{}.jpg", user_id, upload_id)
}

/// `<label>/index.m3u8`, relative to the master manifest.
pub fn variant_reference(label: &str) -> String {
    format!("{}/{}", label, VARIANT_MANIFEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_storage_contract() {
        assert_eq!(hls_prefix("u1", "abc123"), "hls/u1/abc123");
        assert_eq!(master_manifest_path("u1", "abc123"), "hls/u1/abc123/master.m3u8");
        assert_eq!(thumbnail_path("u1", "abc123"), "thumbnails/u1/abc123.jpg");
        assert_eq!(variant_reference("720p"), "720p/index.m3u8");
    }
}
