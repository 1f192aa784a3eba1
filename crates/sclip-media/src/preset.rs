//! Encoder preset sanitization.
//!
//! A preset is a free-form flag string supplied by a caller or taken from the
//! [`PresetCatalog`]. Before it reaches the argument vector it is tokenized,
//! its video/audio filter chains are pulled out so they can be merged into
//! the compiled filter graph, and everything else is matched against known
//! output options by base name (`-c:v` is `c`, `-filter:v:0` is `filter`).
//! Options the executor owns, options that read files, and unknown options
//! are dropped together with their value.

use sclip_models::EncodingConfig;
use tracing::{debug, warn};

use crate::error::SanitizeError;
use crate::filters::check_opaque_filter;

/// Output options that take exactly one value.
const VALUE_OPTIONS: &[&str] = &[
    "c", "codec", "vcodec", "acodec", "preset", "tune", "profile", "level", "crf", "cq", "qp",
    "q", "qscale", "qmin", "qmax", "b", "maxrate", "minrate", "bufsize", "rc", "g",
    "keyint_min", "sc_threshold", "bf", "refs", "pix_fmt", "r", "fps_mode", "vsync", "aspect",
    "threads", "ar", "ac", "sample_fmt", "aq", "movflags", "metadata", "tag", "color_primaries",
    "color_trc", "colorspace", "color_range", "x264-params", "x265-params", "x264opts",
    "max_muxing_queue_size",
];
/// Output options that never take a value.
const SWITCH_OPTIONS: &[&str] = &[
    "an", "vn", "sn", "dn", "y", "n", "shortest", "nostdin", "hide_banner", "stats", "nostats",
    "bitexact",
];
/// Options the executor supplies itself or that name extra files.
const BANNED_OPTIONS: &[&str] = &[
    "i", "map", "progress", "filter_complex", "lavfi", "filter_complex_script",
    "filter_script", "attach", "dump_attachment", "report", "vstats_file", "passlogfile",
    "f", "ss", "t", "to", "fs",
];

/// What an option name means to the sanitizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionClass {
    VideoFilter,
    AudioFilter,
    Value,
    Switch,
    Banned,
    Unknown,
}

impl OptionClass {
    fn of(flag: &str) -> Self {
        // `-/opt file` reads the value of `opt` from a file.
        let Some(name) = flag.strip_prefix('-').filter(|n| !n.starts_with('/')) else {
            return Self::Banned;
        };
        let (base, stream) = match name.split_once(':') {
            Some((base, stream)) => (base, Some(stream)),
            None => (name, None),
        };
        match (base, stream) {
            ("vf", None) => Self::VideoFilter,
            ("af", None) => Self::AudioFilter,
            ("filter", Some(s)) if s == "v" || s.starts_with("v:") => Self::VideoFilter,
            ("filter", Some(s)) if s == "a" || s.starts_with("a:") => Self::AudioFilter,
            ("vf" | "af" | "filter", _) => Self::Banned,
            _ if BANNED_OPTIONS.contains(&base) => Self::Banned,
            _ if VALUE_OPTIONS.contains(&base) => Self::Value,
            _ if SWITCH_OPTIONS.contains(&base) => Self::Switch,
            _ => Self::Unknown,
        }
    }

    /// Whether a following non-flag token belongs to this option.
    fn takes_value(self) -> bool {
        !matches!(self, Self::Switch)
    }
}

/// A preset split into safe output flags and extracted filter chains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedPreset {
    /// Output flags, in original order with their values
    pub flags: Vec<String>,
    /// Extracted `-vf` chain (last occurrence wins)
    pub video_filter: Option<String>,
    /// Extracted `-af` chain (last occurrence wins)
    pub audio_filter: Option<String>,
}

/// Sanitize a preset string.
pub fn sanitize(preset: &str) -> Result<SanitizedPreset, SanitizeError> {
    let tokens = tokenize(preset)?;
    let mut out = SanitizedPreset::default();

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        i += 1;

        if !is_flag(token) {
            warn!(token = %token, "Dropping bare preset token");
            continue;
        }

        // `-flag=value` form
        let (name, inline) = match token.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (token.as_str(), None),
        };
        let class = OptionClass::of(name);

        let value = match inline {
            Some(v) => Some(v),
            None if class.takes_value() && i < tokens.len() && !is_flag(&tokens[i]) => {
                i += 1;
                Some(tokens[i - 1].clone())
            }
            None => None,
        };

        match class {
            OptionClass::VideoFilter => out.video_filter = checked_filter("-vf", value)?,
            OptionClass::AudioFilter => out.audio_filter = checked_filter("-af", value)?,
            OptionClass::Value => {
                // A value option with nothing after it would swallow the
                // executor's next argument.
                if let Some(value) = value {
                    out.flags.push(name.to_string());
                    out.flags.push(value);
                } else {
                    warn!(flag = name, "Dropping preset flag without a value");
                }
            }
            OptionClass::Switch if value.is_none() => out.flags.push(name.to_string()),
            OptionClass::Switch => warn!(flag = name, "Dropping switch given a value"),
            OptionClass::Banned => {
                warn!(flag = name, "Stripping executor-owned flag from preset")
            }
            OptionClass::Unknown => warn!(flag = name, "Dropping unknown preset flag"),
        }
    }

    debug!(
        flags = out.flags.len(),
        video_filter = out.video_filter.is_some(),
        audio_filter = out.audio_filter.is_some(),
        "Sanitized preset"
    );
    Ok(out)
}

/// A flag is `-` followed by a letter or `/`; `-1` and `-0.5` are values.
fn is_flag(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '/')
}

fn checked_filter(
    flag: &'static str,
    value: Option<String>,
) -> Result<Option<String>, SanitizeError> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    check_opaque_filter(&value).map_err(|found| SanitizeError::UnsafeFilter { flag, found })?;
    Ok(Some(value))
}

/// Split a preset into words like a POSIX shell, without expansion.
///
/// Single quotes are literal, double quotes allow `\"` and `\\`, a backslash
/// outside quotes escapes the next character. Space, tab and newline separate
/// words; any other control character is rejected.
pub fn tokenize(input: &str) -> Result<Vec<String>, SanitizeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c.is_control() && !matches!(c, '\t' | '\n' | '\r') {
            return Err(SanitizeError::ControlCharacter(c as u32));
        }
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                if in_word {
                    tokens.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) if c.is_control() => {
                            return Err(SanitizeError::ControlCharacter(c as u32))
                        }
                        Some(c) => current.push(c),
                        None => return Err(SanitizeError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(e @ ('"' | '\\' | '$' | '`')) => current.push(e),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err(SanitizeError::UnterminatedQuote('"')),
                        },
                        Some(c) if c.is_control() => {
                            return Err(SanitizeError::ControlCharacter(c as u32))
                        }
                        Some(c) => current.push(c),
                        None => return Err(SanitizeError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(c) if c.is_control() => {
                        return Err(SanitizeError::ControlCharacter(c as u32))
                    }
                    Some(c) => current.push(c),
                    None => return Err(SanitizeError::DanglingEscape),
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Named encoder presets.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    entries: Vec<(String, EncodingConfig)>,
    default: EncodingConfig,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self {
            entries: vec![
                ("story-high".to_string(), EncodingConfig::story_high()),
                ("story-balanced".to_string(), EncodingConfig::default()),
                ("story-fast".to_string(), EncodingConfig::story_fast()),
            ],
            default: EncodingConfig::default(),
        }
    }
}

impl PresetCatalog {
    /// Add or replace a named entry.
    pub fn with_entry(mut self, name: impl Into<String>, config: EncodingConfig) -> Self {
        let name = name.into();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, config));
        self
    }

    pub fn get(&self, name: &str) -> Option<&EncodingConfig> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, config)| config)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Preset string for a job: a catalog entry by name, the free-form string
    /// as given, or the default encoding when absent.
    pub fn resolve(&self, preset: Option<&str>) -> String {
        match preset.map(str::trim).filter(|p| !p.is_empty()) {
            None => self.default.to_preset_string(),
            Some(p) => match self.get(p) {
                Some(config) => config.to_preset_string(),
                None => p.to_string(),
            },
        }
    }

    /// Resolve and sanitize in one step.
    pub fn sanitize(&self, preset: Option<&str>) -> Result<SanitizedPreset, SanitizeError> {
        sanitize(&self.resolve(preset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strips_input_and_map() {
        let out = sanitize("-i bad.mp4 -map 0 -vf scale=10:10 -crf 23").unwrap();
        assert_eq!(out.flags, strs(&["-crf", "23"]));
        assert_eq!(out.video_filter.as_deref(), Some("scale=10:10"));
        assert_eq!(out.audio_filter, None);
    }

    #[test]
    fn test_preserves_order_of_remaining_pairs() {
        let out = sanitize(
            "-c:v libx264 -i x.mp4 -preset fast -progress pipe:2 -crf 20 -map 0:v out.mp4 \
             -movflags +faststart",
        )
        .unwrap();
        assert_eq!(
            out.flags,
            strs(&["-c:v", "libx264", "-preset", "fast", "-crf", "20", "-movflags", "+faststart"])
        );
    }

    #[test]
    fn test_equals_form_and_last_wins() {
        let out = sanitize("-vf=hflip -filter:a volume=2 -vf eq=gamma=1.2 -af=loudnorm").unwrap();
        assert_eq!(out.video_filter.as_deref(), Some("eq=gamma=1.2"));
        assert_eq!(out.audio_filter.as_deref(), Some("loudnorm"));
        assert!(out.flags.is_empty());
    }

    #[test]
    fn test_quoted_values() {
        let out = sanitize(r#"-metadata "title=My Story" -vf 'scale=720:-2, hflip'"#).unwrap();
        assert_eq!(out.flags, strs(&["-metadata", "title=My Story"]));
        assert_eq!(out.video_filter.as_deref(), Some("scale=720:-2, hflip"));
    }

    #[test]
    fn test_bare_tokens_dropped() {
        let out = sanitize("/tmp/evil.mp4 -an /tmp/other.mp4 -b:v 2M").unwrap();
        assert_eq!(out.flags, strs(&["-an", "-b:v", "2M"]));
    }

    #[test]
    fn test_negative_numbers_are_values() {
        let out = sanitize("-bf -1 -threads 2").unwrap();
        assert_eq!(out.flags, strs(&["-bf", "-1", "-threads", "2"]));
    }

    #[test]
    fn test_filter_graph_flags_stripped() {
        let out = sanitize("-filter_complex [0:v]null[v] -lavfi=nullsrc -crf 30").unwrap();
        assert_eq!(out.flags, strs(&["-crf", "30"]));
    }

    #[test]
    fn test_path_after_unlisted_switch_dropped() {
        let out = sanitize("-bitexact /tmp/evil.mp4 -crf 23").unwrap();
        assert_eq!(out.flags, strs(&["-bitexact", "-crf", "23"]));

        let out = sanitize(
            "-benchmark /tmp/a.mp4 -xerror /tmp/b.mp4 -accurate_seek c.mp4 -start_at_zero d.mp4 \
             -ignore_unknown e.mp4 -re rtmp://host/live -debug_ts f.mp4 -crf 23",
        )
        .unwrap();
        assert_eq!(out.flags, strs(&["-crf", "23"]));
    }

    #[test]
    fn test_file_reading_variants_stripped() {
        for preset in [
            "-filter_complex_script /etc/passwd",
            "-filter_script graph.txt",
            "-filter_script:v graph.txt",
            "-filter_script:a graph.txt",
            "-/vf graph.txt",
            "-/filter_complex graph.txt",
            "-/af=graph.txt",
            "-attach font.ttf",
            "-filter hflip",
            "-filter:0 hflip",
            "-vf:0 hflip",
            "-i:v other.mp4",
            "-map:0 0:v",
        ] {
            let out = sanitize(&format!("{} -crf 23", preset)).unwrap();
            assert_eq!(out.flags, strs(&["-crf", "23"]), "{}", preset);
            assert_eq!(out.video_filter, None, "{}", preset);
            assert_eq!(out.audio_filter, None, "{}", preset);
        }
    }

    #[test]
    fn test_stream_specifier_filters_extracted() {
        let out = sanitize("-filter:v:0 hflip -filter:a:0 volume=2 -c:v:0 libx264").unwrap();
        assert_eq!(out.video_filter.as_deref(), Some("hflip"));
        assert_eq!(out.audio_filter.as_deref(), Some("volume=2"));
        assert_eq!(out.flags, strs(&["-c:v:0", "libx264"]));
    }

    #[test]
    fn test_value_option_needs_a_value() {
        let out = sanitize("-an -crf").unwrap();
        assert_eq!(out.flags, strs(&["-an"]));

        let out = sanitize("-crf=20 -an=1").unwrap();
        assert_eq!(out.flags, strs(&["-crf", "20"]));
    }

    #[test]
    fn test_unsafe_filters_rejected() {
        assert!(matches!(
            sanitize("-vf 'null[x];[x]null'"),
            Err(SanitizeError::UnsafeFilter { flag: "-vf", .. })
        ));
        assert!(matches!(
            sanitize("-af=anull;movie=x"),
            Err(SanitizeError::UnsafeFilter { flag: "-af", .. })
        ));
    }

    #[test]
    fn test_tokenizer_errors() {
        assert_eq!(
            tokenize("-crf '23"),
            Err(SanitizeError::UnterminatedQuote('\''))
        );
        assert_eq!(
            tokenize("-crf \"23"),
            Err(SanitizeError::UnterminatedQuote('"'))
        );
        assert_eq!(tokenize("-crf 23\\"), Err(SanitizeError::DanglingEscape));
        assert_eq!(
            tokenize("-crf\u{0}23"),
            Err(SanitizeError::ControlCharacter(0))
        );
    }

    #[test]
    fn test_tokenizer_escapes() {
        assert_eq!(
            tokenize("a\\ b \"c \\\"d\\\"\" '' e\n\tf").unwrap(),
            strs(&["a b", "c \"d\"", "", "e", "f"])
        );
    }

    #[test]
    fn test_catalog_resolution() {
        let catalog = PresetCatalog::default();
        assert_eq!(
            catalog.names().collect::<Vec<_>>(),
            vec!["story-high", "story-balanced", "story-fast"]
        );

        let high = catalog.sanitize(Some("story-high")).unwrap();
        assert!(high.flags.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));

        let default = catalog.sanitize(None).unwrap();
        assert_eq!(default.flags, EncodingConfig::default().to_ffmpeg_args());

        let free = catalog.sanitize(Some("-crf 30 -i x")).unwrap();
        assert_eq!(free.flags, strs(&["-crf", "30"]));
    }
}
