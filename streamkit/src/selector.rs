//! Stream selection: maps a catalog and an optional requested resolution to what should be fetched.
//!
//! Selection is a cascade of rules evaluated top-down, the first rule that produces a result wins:
//!
//! 1. a progressive stream at exactly the requested resolution,
//! 2. a video-only stream at exactly the requested resolution, paired with the best audio-only stream,
//! 3. the highest-resolution progressive stream,
//! 4. the highest-resolution video-only stream, paired with the best audio-only stream.
//!
//! Rules 1 and 2 only apply when a resolution is requested. Every rule filters on the
//! [canonical container](CANONICAL_CONTAINER). Ties are broken by catalog order, first wins.

use crate::model::{CANONICAL_CONTAINER, Resolution, StreamDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What should be fetched for a video.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionResult {
    /// A single stream carrying both tracks; it is the final file.
    Progressive(StreamDescriptor),
    /// Two single-track streams that must be muxed.
    AdaptivePair {
        /// The video-only stream.
        video: StreamDescriptor,
        /// The audio-only stream.
        audio: StreamDescriptor,
    },
    /// No viable combination exists.
    Unavailable(String),
}

/// The cascade rule that produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeStep {
    /// Progressive stream at the requested resolution.
    ExactProgressive,
    /// Video-only stream at the requested resolution plus best audio.
    ExactAdaptive,
    /// Highest-resolution progressive stream.
    BestProgressive,
    /// Highest-resolution video-only stream plus best audio.
    BestAdaptive,
    /// Nothing matched.
    Exhausted,
}

impl CascadeStep {
    /// Whether the step honors an explicit resolution request.
    pub fn is_exact(&self) -> bool {
        matches!(self, CascadeStep::ExactProgressive | CascadeStep::ExactAdaptive)
    }
}

/// Reported when a requested resolution could not be honored and a best-available
/// stream was selected instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    /// The resolution that was asked for.
    pub requested: Resolution,
    /// The resolution that was selected, if the selected stream declares one.
    pub selected: Option<String>,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selected {
            Some(selected) => write!(f, "{} not available, using {}", self.requested, selected),
            None => write!(f, "{} not available", self.requested),
        }
    }
}

/// The outcome of running the cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// What should be fetched.
    pub result: SelectionResult,
    /// The rule that decided.
    pub step: CascadeStep,
    /// Set when a requested resolution was substituted.
    pub degraded: Option<Degradation>,
}

type Rule = fn(&[StreamDescriptor], Option<Resolution>) -> Option<SelectionResult>;

/// The cascade, in priority order.
const CASCADE: [(CascadeStep, Rule); 4] = [
    (CascadeStep::ExactProgressive, exact_progressive),
    (CascadeStep::ExactAdaptive, exact_adaptive),
    (CascadeStep::BestProgressive, best_progressive),
    (CascadeStep::BestAdaptive, best_adaptive),
];

/// Selects the stream(s) to fetch for the given catalog.
pub fn select(catalog: &[StreamDescriptor], requested: Option<Resolution>) -> Selection {
    for (step, rule) in CASCADE {
        let Some(result) = rule(catalog, requested) else {
            log::debug!("Selection step {:?} found nothing", step);
            continue;
        };

        let degraded = requested
            .filter(|_| !step.is_exact())
            .map(|requested| Degradation {
                requested,
                selected: selected_resolution(&result),
            });

        return Selection {
            result,
            step,
            degraded,
        };
    }

    let reason = if catalog.is_empty() {
        "the catalog has no streams".to_string()
    } else {
        format!(
            "no {} progressive stream and no {} video/audio pair",
            CANONICAL_CONTAINER, CANONICAL_CONTAINER
        )
    };

    Selection {
        result: SelectionResult::Unavailable(reason),
        step: CascadeStep::Exhausted,
        degraded: None,
    }
}

fn exact_progressive(
    catalog: &[StreamDescriptor],
    requested: Option<Resolution>,
) -> Option<SelectionResult> {
    let requested = requested?;

    canonical(catalog)
        .find(|s| s.is_progressive && s.has_resolution(&requested))
        .cloned()
        .map(SelectionResult::Progressive)
}

fn exact_adaptive(
    catalog: &[StreamDescriptor],
    requested: Option<Resolution>,
) -> Option<SelectionResult> {
    let requested = requested?;

    let video = canonical(catalog).find(|s| s.is_video_only() && s.has_resolution(&requested));
    let audio = best_audio(catalog);

    match (video, audio) {
        (Some(video), Some(audio)) => Some(SelectionResult::AdaptivePair {
            video: video.clone(),
            audio: audio.clone(),
        }),
        (Some(_), None) => {
            log::debug!("Video-only {} found but no audio-only stream", requested);
            None
        }
        _ => None,
    }
}

fn best_progressive(
    catalog: &[StreamDescriptor],
    _requested: Option<Resolution>,
) -> Option<SelectionResult> {
    first_max_by_key(canonical(catalog).filter(|s| s.is_progressive), |s| s.height() as f64)
        .cloned()
        .map(SelectionResult::Progressive)
}

fn best_adaptive(
    catalog: &[StreamDescriptor],
    _requested: Option<Resolution>,
) -> Option<SelectionResult> {
    let video = first_max_by_key(canonical(catalog).filter(|s| s.is_video_only()), |s| {
        s.height() as f64
    })?;
    let audio = best_audio(catalog)?;

    Some(SelectionResult::AdaptivePair {
        video: video.clone(),
        audio: audio.clone(),
    })
}

fn canonical(catalog: &[StreamDescriptor]) -> impl Iterator<Item = &StreamDescriptor> {
    catalog.iter().filter(|s| s.is_container(CANONICAL_CONTAINER))
}

fn best_audio(catalog: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    first_max_by_key(canonical(catalog).filter(|s| s.is_audio_only()), |s| {
        s.bitrate_kbps()
    })
}

/// Like `Iterator::max_by_key`, but keeps the first of equal maxima.
fn first_max_by_key<'a, I, F>(iter: I, key: F) -> Option<&'a StreamDescriptor>
where
    I: Iterator<Item = &'a StreamDescriptor>,
    F: Fn(&StreamDescriptor) -> f64,
{
    let mut best: Option<(&StreamDescriptor, f64)> = None;

    for stream in iter {
        let value = key(stream);
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((stream, value)),
        }
    }

    best.map(|(stream, _)| stream)
}

fn selected_resolution(result: &SelectionResult) -> Option<String> {
    match result {
        SelectionResult::Progressive(stream) => stream.resolution.clone(),
        SelectionResult::AdaptivePair { video, .. } => video.resolution.clone(),
        SelectionResult::Unavailable(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progressive(id: &str, resolution: &str) -> StreamDescriptor {
        StreamDescriptor {
            id: id.to_string(),
            is_progressive: true,
            has_video: true,
            has_audio: true,
            extension: "mp4".to_string(),
            resolution: Some(resolution.to_string()),
            bitrate: Some("96kbps".to_string()),
            size_bytes: 1_000,
            url: format!("https://example.invalid/{id}"),
        }
    }

    fn video(id: &str, resolution: &str) -> StreamDescriptor {
        StreamDescriptor {
            is_progressive: false,
            has_audio: false,
            bitrate: None,
            ..progressive(id, resolution)
        }
    }

    fn audio(id: &str, bitrate: &str) -> StreamDescriptor {
        StreamDescriptor {
            id: id.to_string(),
            is_progressive: false,
            has_video: false,
            has_audio: true,
            extension: "mp4".to_string(),
            resolution: None,
            bitrate: Some(bitrate.to_string()),
            size_bytes: 500,
            url: format!("https://example.invalid/{id}"),
        }
    }

    fn webm(mut stream: StreamDescriptor) -> StreamDescriptor {
        stream.extension = "webm".to_string();
        stream
    }

    const P1080: Option<Resolution> = Some(Resolution(1080));

    #[test]
    fn test_exact_progressive_wins_over_adaptive() {
        let catalog = vec![
            video("v1080", "1080p"),
            audio("a128", "128kbps"),
            progressive("p1080", "1080p"),
            progressive("p720", "720p"),
        ];

        let selection = select(&catalog, P1080);
        assert_eq!(selection.step, CascadeStep::ExactProgressive);
        assert_eq!(selection.result, SelectionResult::Progressive(catalog[2].clone()));
        assert!(selection.degraded.is_none());
    }

    #[test]
    fn test_exact_adaptive_uses_highest_bitrate_audio() {
        let catalog = vec![
            progressive("p720", "720p"),
            video("v1080", "1080p"),
            audio("a48", "48kbps"),
            audio("a160", "160kbps"),
            audio("a128", "128kbps"),
        ];

        let selection = select(&catalog, P1080);
        assert_eq!(selection.step, CascadeStep::ExactAdaptive);
        assert_eq!(
            selection.result,
            SelectionResult::AdaptivePair {
                video: catalog[1].clone(),
                audio: catalog[3].clone(),
            }
        );
    }

    #[test]
    fn test_missing_audio_falls_through_to_best_progressive() {
        let catalog = vec![video("v1080", "1080p"), progressive("p480", "480p")];

        let selection = select(&catalog, P1080);
        assert_eq!(selection.step, CascadeStep::BestProgressive);
        assert_eq!(selection.result, SelectionResult::Progressive(catalog[1].clone()));
        assert_eq!(
            selection.degraded,
            Some(Degradation {
                requested: Resolution(1080),
                selected: Some("480p".to_string()),
            })
        );
    }

    #[test]
    fn test_degraded_resolution_is_reported() {
        let catalog = vec![progressive("p360", "360p"), progressive("p720", "720p")];

        let selection = select(&catalog, P1080);
        assert_eq!(selection.step, CascadeStep::BestProgressive);
        assert_eq!(selection.result, SelectionResult::Progressive(catalog[1].clone()));
        let degraded = selection.degraded.unwrap();
        assert_eq!(degraded.to_string(), "1080p not available, using 720p");
    }

    #[test]
    fn test_no_request_is_not_degraded() {
        let catalog = vec![progressive("p720", "720p")];

        let selection = select(&catalog, None);
        assert_eq!(selection.step, CascadeStep::BestProgressive);
        assert!(selection.degraded.is_none());
    }

    #[test]
    fn test_best_adaptive_when_no_progressive() {
        let catalog = vec![
            video("v720", "720p"),
            video("v2160", "2160p"),
            video("v1440", "1440p"),
            audio("a128", "128kbps"),
        ];

        let selection = select(&catalog, None);
        assert_eq!(selection.step, CascadeStep::BestAdaptive);
        assert_eq!(
            selection.result,
            SelectionResult::AdaptivePair {
                video: catalog[1].clone(),
                audio: catalog[3].clone(),
            }
        );
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let catalog = vec![
            progressive("first", "720p"),
            progressive("second", "720p"),
            audio("a-first", "128kbps"),
            audio("a-second", "128kbps"),
        ];

        let selection = select(&catalog, None);
        assert_eq!(selection.result, SelectionResult::Progressive(catalog[0].clone()));
        assert_eq!(best_audio(&catalog).map(|s| s.id.as_str()), Some("a-first"));
    }

    #[test]
    fn test_non_canonical_containers_are_ignored() {
        let catalog = vec![
            webm(progressive("p1080", "1080p")),
            webm(video("v1080", "1080p")),
            audio("a128", "128kbps"),
        ];

        let selection = select(&catalog, P1080);
        assert_eq!(selection.step, CascadeStep::Exhausted);
        assert!(matches!(selection.result, SelectionResult::Unavailable(_)));
    }

    #[test]
    fn test_empty_catalog_is_unavailable() {
        for requested in [None, P1080] {
            let selection = select(&[], requested);
            assert!(matches!(selection.result, SelectionResult::Unavailable(_)));
            assert!(selection.degraded.is_none());
        }
    }

    #[test]
    fn test_video_without_audio_is_unavailable() {
        let catalog = vec![video("v1080", "1080p"), video("v720", "720p")];

        let selection = select(&catalog, P1080);
        assert!(matches!(selection.result, SelectionResult::Unavailable(_)));
    }
}
