//! Audio/subtitle track selection.
//!
//! Picks which tracks of one type are carried into the rendition, in priority
//! order (Swedish, then English, then the original-language track), and which
//! output position is flagged as the default track.

use serde::{Deserialize, Serialize};

/// One audio or subtitle track of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// 0-based position among streams of the same type.
    pub index: usize,
    /// Normalized language code.
    pub language: Option<String>,
    /// Source `default` disposition.
    #[serde(default)]
    pub default: bool,
    /// Source `original` disposition.
    #[serde(default)]
    pub original: bool,
}

/// Stream type, as spelled in encoder stream specifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Subtitle,
}

impl StreamKind {
    pub fn specifier(&self) -> &'static str {
        match self {
            StreamKind::Audio => "a",
            StreamKind::Subtitle => "s",
        }
    }
}

/// Tracks to map into the output, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSelection {
    pub streams: Vec<StreamDescriptor>,
    /// Output position carrying the `default` disposition.
    pub default_position: Option<usize>,
}

impl StreamSelection {
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// `-map 0:<kind>:<index>` pairs, one per selected track.
    pub fn map_args(&self, kind: StreamKind) -> Vec<String> {
        self.streams
            .iter()
            .flat_map(|s| {
                [
                    "-map".to_string(),
                    format!("0:{}:{}", kind.specifier(), s.index),
                ]
            })
            .collect()
    }

    /// `-disposition:<kind>:<pos>` pairs: `default` for the default position,
    /// `0` (cleared) for every other position.
    pub fn disposition_args(&self, kind: StreamKind) -> Vec<String> {
        (0..self.streams.len())
            .flat_map(|position| {
                let value = if self.default_position == Some(position) {
                    "default"
                } else {
                    "0"
                };
                [
                    format!("-disposition:{}:{}", kind.specifier(), position),
                    value.to_string(),
                ]
            })
            .collect()
    }
}

/// Collapses `sv`/`swe` to `swe` and `en`/`eng` to `eng`; other codes are lower-cased.
pub fn normalize_language(language: Option<&str>) -> Option<String> {
    let code = language?.trim().to_lowercase();
    match code.as_str() {
        "" => None,
        "sv" | "swe" => Some("swe".to_string()),
        "en" | "eng" => Some("eng".to_string()),
        _ => Some(code),
    }
}

/// Selects tracks from `streams` (one type, input order).
///
/// Candidates are all `swe` tracks, then all `eng` tracks, then one original
/// pick (`original` flag, else `default` flag, else the first track), deduplicated
/// by source index keeping the first occurrence. The first selected `swe` track
/// is the default; without one, position 0 is.
pub fn select_streams(streams: &[StreamDescriptor]) -> StreamSelection {
    let is_lang = |s: &StreamDescriptor, code: &str| s.language.as_deref() == Some(code);

    let swedish = streams.iter().filter(|s| is_lang(s, "swe"));
    let english = streams.iter().filter(|s| is_lang(s, "eng"));
    let original = streams
        .iter()
        .find(|s| s.original)
        .or_else(|| streams.iter().find(|s| s.default))
        .or_else(|| streams.first());

    let mut selected: Vec<StreamDescriptor> = Vec::new();
    for candidate in swedish.chain(english).chain(original) {
        if selected.iter().any(|s| s.index == candidate.index) {
            continue;
        }
        selected.push(candidate.clone());
    }

    let default_position = selected
        .iter()
        .position(|s| is_lang(s, "swe"))
        .or(if selected.is_empty() { None } else { Some(0) });

    StreamSelection {
        streams: selected,
        default_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn track(index: usize, language: Option<&str>) -> StreamDescriptor {
        StreamDescriptor {
            index,
            language: normalize_language(language),
            default: false,
            original: false,
        }
    }

    fn indices(selection: &StreamSelection) -> Vec<usize> {
        selection.streams.iter().map(|s| s.index).collect()
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(Some("sv")).as_deref(), Some("swe"));
        assert_eq!(normalize_language(Some("SWE")).as_deref(), Some("swe"));
        assert_eq!(normalize_language(Some("en")).as_deref(), Some("eng"));
        assert_eq!(normalize_language(Some("Eng")).as_deref(), Some("eng"));
        assert_eq!(normalize_language(Some("JPN")).as_deref(), Some("jpn"));
        assert_eq!(normalize_language(Some("")), None);
        assert_eq!(normalize_language(None), None);
    }

    #[test]
    fn test_swedish_first_then_english() {
        let streams = vec![
            track(0, Some("eng")),
            track(1, Some("swe")),
            track(2, Some("eng")),
        ];

        let selection = select_streams(&streams);

        // The original pick falls back to track 0, already selected as English.
        assert_eq!(indices(&selection), vec![1, 0, 2]);
        assert_eq!(selection.default_position, Some(0));
    }

    #[test]
    fn test_original_flag_wins_over_default_flag() {
        let mut streams = vec![
            track(0, Some("jpn")),
            track(1, Some("fra")),
            track(2, Some("deu")),
        ];
        streams[0].default = true;
        streams[2].original = true;

        let selection = select_streams(&streams);

        assert_eq!(indices(&selection), vec![2]);
        assert_eq!(selection.default_position, Some(0));
    }

    #[test]
    fn test_default_flag_then_first_stream() {
        let mut streams = vec![track(0, Some("jpn")), track(1, None)];
        streams[1].default = true;
        assert_eq!(indices(&select_streams(&streams)), vec![1]);

        let streams = vec![track(0, Some("jpn")), track(1, None)];
        assert_eq!(indices(&select_streams(&streams)), vec![0]);
    }

    #[test]
    fn test_english_and_original_without_swedish() {
        let mut streams = vec![track(0, Some("eng")), track(1, Some("jpn"))];
        streams[1].original = true;

        let selection = select_streams(&streams);

        assert_eq!(indices(&selection), vec![0, 1]);
        assert_eq!(selection.default_position, Some(0));
    }

    #[test]
    fn test_swedish_default_position_after_other_candidates() {
        // Swedish always sorts first, so its position is 0 whenever present.
        let streams = vec![track(0, Some("eng")), track(1, Some("sv"))];
        let selection = select_streams(&streams);
        assert_eq!(selection.default_position, Some(0));
        assert_eq!(selection.streams[0].index, 1);
    }

    #[test]
    fn test_empty_input() {
        let selection = select_streams(&[]);
        assert!(selection.is_empty());
        assert_eq!(selection.default_position, None);
        assert!(selection.disposition_args(StreamKind::Audio).is_empty());
        assert!(selection.map_args(StreamKind::Subtitle).is_empty());
    }

    #[test]
    fn test_map_and_disposition_args() {
        let streams = vec![
            track(0, Some("eng")),
            track(1, Some("swe")),
            track(2, Some("eng")),
        ];
        let selection = select_streams(&streams);

        assert_eq!(
            selection.map_args(StreamKind::Audio),
            vec!["-map", "0:a:1", "-map", "0:a:0", "-map", "0:a:2"]
        );
        assert_eq!(
            selection.disposition_args(StreamKind::Subtitle),
            vec![
                "-disposition:s:0",
                "default",
                "-disposition:s:1",
                "0",
                "-disposition:s:2",
                "0"
            ]
        );
    }

    fn stream_list_strategy() -> impl Strategy<Value = Vec<StreamDescriptor>> {
        prop::collection::vec(
            (
                prop::option::of(prop_oneof![
                    Just("sv"),
                    Just("swe"),
                    Just("en"),
                    Just("eng"),
                    Just("jpn"),
                    Just("fra"),
                ]),
                proptest::bool::ANY,
                proptest::bool::ANY,
            ),
            0..8,
        )
        .prop_map(|tracks| {
            tracks
                .into_iter()
                .enumerate()
                .map(|(index, (language, default, original))| StreamDescriptor {
                    index,
                    language: normalize_language(language),
                    default,
                    original,
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        // Selection depends only on the input list, so repeated runs agree.
        #[test]
        fn prop_selection_is_deterministic(streams in stream_list_strategy()) {
            let first = select_streams(&streams);
            let second = select_streams(&streams.clone());
            prop_assert_eq!(first, second);
        }

        // Exactly one `default` disposition per non-empty selection, none otherwise.
        #[test]
        fn prop_single_default_disposition(streams in stream_list_strategy()) {
            let selection = select_streams(&streams);
            let args = selection.disposition_args(StreamKind::Audio);
            let defaults = args.iter().filter(|a| a.as_str() == "default").count();

            if selection.is_empty() {
                prop_assert_eq!(defaults, 0);
                prop_assert!(streams.is_empty());
            } else {
                prop_assert_eq!(defaults, 1);
                prop_assert_eq!(args.len(), selection.streams.len() * 2);
            }
        }

        // Every source track is mapped at most once, and every swe/eng track is kept.
        #[test]
        fn prop_no_duplicate_sources(streams in stream_list_strategy()) {
            let selection = select_streams(&streams);
            let mut seen = indices(&selection);
            let total = seen.len();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), total);

            for s in &streams {
                if matches!(s.language.as_deref(), Some("swe") | Some("eng")) {
                    prop_assert!(selection.streams.iter().any(|c| c.index == s.index));
                }
            }
        }
    }
}
