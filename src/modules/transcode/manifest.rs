use std::fmt::Write;

use super::profile::{bandwidth_for, resolution_for};
use crate::common::layout::variant_reference;

/// Builds the master playlist for `ladder`.
///
/// Entries appear in ladder order, not sorted by bandwidth. Labels missing
/// from the rendition table get `BANDWIDTH=0` and an empty resolution.
///
/// ```text
/// #EXTM3U
/// #EXT-X-STREAM-INF:BANDWIDTH=2928000,RESOLUTION=1280x720
/// 720p/index.m3u8
/// ```
pub fn build_master(ladder: &[String]) -> String {
    let mut playlist = String::with_capacity(32 + ladder.len() * 64);
    playlist.push_str("#EXTM3U\n");

    for label in ladder {
        // Writing to a String cannot fail.
        let _ = writeln!(
            playlist,
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
            bandwidth_for(label),
            resolution_for(label)
        );
        playlist.push_str(&variant_reference(label));
        playlist.push('\n');
    }

    playlist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn entries_follow_ladder_order() {
        let master = build_master(&labels(&["360p", "1080p", "720p"]));
        let refs: Vec<&str> = master.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(refs, vec!["360p/index.m3u8", "1080p/index.m3u8", "720p/index.m3u8"]);
    }

    #[test]
    fn scenario_two_rung_ladder() {
        let master = build_master(&labels(&["720p", "360p"]));
        assert_eq!(
            master,
            "#EXTM3U\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2928000,RESOLUTION=1280x720\n\
             720p/index.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=864000,RESOLUTION=640x360\n\
             360p/index.m3u8\n"
        );
    }

    #[test]
    fn every_stream_inf_is_followed_by_its_reference() {
        let ladder = labels(&["1080p", "480p"]);
        let master = build_master(&ladder);
        let lines: Vec<&str> = master.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        for (i, label) in ladder.iter().enumerate() {
            assert!(lines[1 + i * 2].starts_with("#EXT-X-STREAM-INF:"));
            assert_eq!(lines[2 + i * 2], format!("{}/index.m3u8", label));
        }
    }

    #[test]
    fn unknown_label_gets_zero_bandwidth() {
        let master = build_master(&labels(&["4k"]));
        assert!(master.contains("#EXT-X-STREAM-INF:BANDWIDTH=0,RESOLUTION=\n4k/index.m3u8\n"));
    }
}
