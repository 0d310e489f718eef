/// Encoding targets for one rung of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenditionSpec {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

pub const RENDITIONS: [RenditionSpec; 4] = [
    RenditionSpec {
        label: "1080p",
        width: 1920,
        height: 1080,
        video_bitrate_kbps: 5000,
        audio_bitrate_kbps: 192,
    },
    RenditionSpec {
        label: "720p",
        width: 1280,
        height: 720,
        video_bitrate_kbps: 2800,
        audio_bitrate_kbps: 128,
    },
    RenditionSpec {
        label: "480p",
        width: 854,
        height: 480,
        video_bitrate_kbps: 1400,
        audio_bitrate_kbps: 96,
    },
    RenditionSpec {
        label: "360p",
        width: 640,
        height: 360,
        video_bitrate_kbps: 800,
        audio_bitrate_kbps: 64,
    },
];

/// Ladder used when an upload does not request specific resolutions.
pub const DEFAULT_LADDER: [&str; 4] = ["1080p", "720p", "480p", "360p"];

impl RenditionSpec {
    pub fn lookup(label: &str) -> Option<&'static RenditionSpec> {
        RENDITIONS.iter().find(|spec| spec.label == label)
    }

    /// Bits per second advertised in the master manifest (video + audio).
    pub fn bandwidth(&self) -> u64 {
        (u64::from(self.video_bitrate_kbps) + u64::from(self.audio_bitrate_kbps)) * 1000
    }

    /// `WIDTHxHEIGHT`
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Whether `label` names a rendition the playback path will serve.
pub fn is_allowed(label: &str) -> bool {
    RenditionSpec::lookup(label).is_some()
}

/// Bandwidth for a label, 0 when the label is not in the table.
pub fn bandwidth_for(label: &str) -> u64 {
    RenditionSpec::lookup(label).map(RenditionSpec::bandwidth).unwrap_or(0)
}

/// Resolution for a label, empty when the label is not in the table.
pub fn resolution_for(label: &str) -> String {
    RenditionSpec::lookup(label)
        .map(RenditionSpec::resolution)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_is_video_plus_audio() {
        assert_eq!(bandwidth_for("1080p"), 5_192_000);
        assert_eq!(bandwidth_for("720p"), 2_928_000);
        assert_eq!(bandwidth_for("480p"), 1_496_000);
        assert_eq!(bandwidth_for("360p"), 864_000);
    }

    #[test]
    fn unknown_labels_are_tolerated() {
        assert_eq!(bandwidth_for("4k"), 0);
        assert_eq!(resolution_for("4k"), "");
        assert!(!is_allowed("4k"));
        assert_eq!(resolution_for("480p"), "854x480");
    }

    #[test]
    fn default_ladder_is_fully_defined() {
        assert!(DEFAULT_LADDER.iter().all(|label| is_allowed(label)));
    }
}
