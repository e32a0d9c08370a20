//! ffmpeg argument sets for each stage of the fallback chain

use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::core::config::encode::{CRF, TARGET_HEIGHT, TARGET_WIDTH};

/// One encoder configuration. Stages are tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodeProfile {
    /// 480p H.264/AAC carrying every video, audio and subtitle stream
    Primary,
    /// Primary without subtitle streams
    NoSubtitles,
    /// Lowest-effort preset, fixed stereo 48 kHz audio, large muxing queue
    Compat,
}

impl EncodeProfile {
    pub const CHAIN: [EncodeProfile; 3] = [EncodeProfile::Primary, EncodeProfile::NoSubtitles, EncodeProfile::Compat];

    pub fn label(self) -> &'static str {
        match self {
            EncodeProfile::Primary => "primary",
            EncodeProfile::NoSubtitles => "no-subtitles",
            EncodeProfile::Compat => "compat",
        }
    }

    /// Full ffmpeg argument list (without the binary) for `input` -> `output`.
    ///
    /// `-map` is used so every stream of a kind is carried, in source order,
    /// instead of ffmpeg's default of one stream per kind.
    pub fn args(self, input: &Path, output: &Path) -> Vec<OsString> {
        let scale = format!("scale={}:{}", TARGET_WIDTH, TARGET_HEIGHT);
        let crf = CRF.to_string();

        let mut args: Vec<OsString> = Vec::with_capacity(32);
        extend(&mut args, &["-hide_banner", "-y", "-i"]);
        args.push(input.as_os_str().to_owned());

        extend(&mut args, &["-map", "0:v", "-map", "0:a?"]);
        if self == EncodeProfile::Primary {
            extend(&mut args, &["-map", "0:s?"]);
        }

        let preset = match self {
            EncodeProfile::Compat => "veryfast",
            _ => "fast",
        };
        extend(&mut args, &["-vf", &scale, "-c:v", "libx264", "-preset", preset, "-crf", &crf]);
        extend(&mut args, &["-c:a", "aac"]);

        match self {
            EncodeProfile::Primary => extend(&mut args, &["-c:s", "mov_text"]),
            EncodeProfile::NoSubtitles => extend(&mut args, &["-sn"]),
            EncodeProfile::Compat => extend(
                &mut args,
                &["-ac", "2", "-ar", "48000", "-sn", "-max_muxing_queue_size", "9999"],
            ),
        }

        args.push(output.as_os_str().to_owned());
        args
    }
}

fn extend(args: &mut Vec<OsString>, values: &[&str]) {
    args.extend(values.iter().map(OsString::from));
}

impl fmt::Display for EncodeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_of(profile: EncodeProfile) -> Vec<String> {
        profile
            .args(&PathBuf::from("in/clip.mkv"), &PathBuf::from("out/clip_encoded.mp4"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_primary_maps_every_stream_kind() {
        let args = args_of(EncodeProfile::Primary);
        assert_eq!(&args[..4], &["-hide_banner", "-y", "-i", "in/clip.mkv"]);
        assert_eq!(args.last().map(String::as_str), Some("out/clip_encoded.mp4"));
        assert!(has_pair(&args, "-map", "0:v"));
        assert!(has_pair(&args, "-map", "0:a?"));
        assert!(has_pair(&args, "-map", "0:s?"));
        assert!(has_pair(&args, "-c:s", "mov_text"));
        assert!(has_pair(&args, "-vf", "scale=854:480"));
        assert!(has_pair(&args, "-crf", "30"));
        assert!(has_pair(&args, "-c:a", "aac"));
    }

    #[test]
    fn test_no_subtitles_drops_subtitle_mapping() {
        let args = args_of(EncodeProfile::NoSubtitles);
        assert!(!has_pair(&args, "-map", "0:s?"));
        assert!(!args.iter().any(|a| a == "mov_text"));
        assert!(args.iter().any(|a| a == "-sn"));
        assert!(has_pair(&args, "-preset", "fast"));
    }

    #[test]
    fn test_compat_forces_audio_layout_and_muxing_queue() {
        let args = args_of(EncodeProfile::Compat);
        assert!(has_pair(&args, "-preset", "veryfast"));
        assert!(has_pair(&args, "-ac", "2"));
        assert!(has_pair(&args, "-ar", "48000"));
        assert!(has_pair(&args, "-max_muxing_queue_size", "9999"));
        assert!(!has_pair(&args, "-map", "0:s?"));
    }

    #[test]
    fn test_chain_order() {
        assert_eq!(
            EncodeProfile::CHAIN.map(EncodeProfile::label),
            ["primary", "no-subtitles", "compat"]
        );
    }
}
