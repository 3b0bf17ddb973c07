//! Speaker-attributed transcript reconstruction.
//!
//! The transcription service returns a JSON document with word-level items,
//! speaker segments that reference items by start time, and a flat transcript
//! string. [`reconstruct`] walks the items in order and inserts a marker line
//! whenever the speaker changes:
//!
//! ```text
//! [spk_0]: Hello, how are you?
//! [spk_1]: Fine, thanks.
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// Whether an item is a spoken word or punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Pronunciation,
    Punctuation,
}

/// One recognized word or punctuation mark.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptItem {
    /// Canonical start time, absent on punctuation.
    pub start_time: Option<String>,
    pub content: String,
    pub kind: ItemKind,
}

impl TranscriptItem {
    pub fn word(start_time: &str, content: &str) -> Self {
        Self {
            start_time: Some(canonical_time(start_time)),
            content: content.to_string(),
            kind: ItemKind::Pronunciation,
        }
    }

    pub fn punctuation(content: &str) -> Self {
        Self {
            start_time: None,
            content: content.to_string(),
            kind: ItemKind::Punctuation,
        }
    }
}

/// Items attributed to one speaker.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerSegment {
    pub speaker_label: String,
    pub item_start_times: Vec<String>,
}

impl SpeakerSegment {
    pub fn new(speaker_label: &str, item_start_times: &[&str]) -> Self {
        Self {
            speaker_label: speaker_label.to_string(),
            item_start_times: item_start_times.iter().map(|t| canonical_time(t)).collect(),
        }
    }
}

/// Normalize a start time so `"1.50"`, `"1.5"` and `1.5` compare equal.
fn canonical_time(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(value) => value.to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

/// Rebuild a transcript with a marker line at every speaker change.
///
/// Start times map to the speaker of the last segment that lists them.
/// Punctuation attaches to the preceding fragment and never changes the
/// speaker. A word whose start time no segment lists has no speaker: it is
/// appended without a marker, and the next labeled word starts a new marker.
/// Without segments the words are simply joined.
pub fn reconstruct(items: &[TranscriptItem], segments: &[SpeakerSegment]) -> String {
    let mut speakers: HashMap<&str, &str> = HashMap::new();
    for segment in segments {
        for start_time in &segment.item_start_times {
            speakers.insert(start_time.as_str(), segment.speaker_label.as_str());
        }
    }

    let mut text = String::new();
    let mut current_speaker: Option<&str> = None;

    for item in items {
        match item.kind {
            ItemKind::Punctuation => text.push_str(&item.content),
            ItemKind::Pronunciation => {
                let speaker = item
                    .start_time
                    .as_deref()
                    .and_then(|start_time| speakers.get(start_time).copied());

                match speaker {
                    Some(label) if speaker != current_speaker => {
                        text.push_str("\n[");
                        text.push_str(label);
                        text.push_str("]: ");
                    }
                    _ if !text.is_empty() => text.push(' '),
                    _ => {}
                }
                current_speaker = speaker;
                text.push_str(&item.content);
            }
        }
    }

    text.trim().to_string()
}

/// Raw transcription result document.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptDocument {
    #[serde(default, rename = "jobName")]
    pub job_name: Option<String>,
    pub results: TranscriptResults,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptResults {
    #[serde(default)]
    pub transcripts: Vec<FlatTranscript>,
    #[serde(default)]
    pub items: Vec<RawItem>,
    #[serde(default)]
    pub speaker_labels: Option<SpeakerLabels>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlatTranscript {
    pub transcript: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    #[serde(default, deserialize_with = "time_value")]
    pub start_time: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Alternative {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeakerLabels {
    #[serde(default)]
    pub segments: Vec<RawSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    pub speaker_label: String,
    #[serde(default)]
    pub items: Vec<RawSegmentItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSegmentItem {
    #[serde(default, deserialize_with = "time_value")]
    pub start_time: Option<String>,
}

/// Start times arrive as decimal strings, occasionally as numbers.
fn time_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimeValue {
        Text(String),
        Number(f64),
    }

    Ok(match Option::<TimeValue>::deserialize(deserializer)? {
        Some(TimeValue::Text(text)) => Some(canonical_time(&text)),
        Some(TimeValue::Number(number)) => Some(number.to_string()),
        None => None,
    })
}

impl TranscriptDocument {
    pub fn items(&self) -> Vec<TranscriptItem> {
        self.results
            .items
            .iter()
            .map(|item| TranscriptItem {
                start_time: item.start_time.clone(),
                content: item
                    .alternatives
                    .first()
                    .map(|alternative| alternative.content.clone())
                    .unwrap_or_default(),
                kind: item.kind,
            })
            .collect()
    }

    pub fn segments(&self) -> Vec<SpeakerSegment> {
        self.results
            .speaker_labels
            .as_ref()
            .map(|labels| {
                labels
                    .segments
                    .iter()
                    .map(|segment| SpeakerSegment {
                        speaker_label: segment.speaker_label.clone(),
                        item_start_times: segment
                            .items
                            .iter()
                            .filter_map(|item| item.start_time.clone())
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The service's flat transcript text, if it sent any.
    pub fn flat_text(&self) -> Option<String> {
        if self.results.transcripts.is_empty() {
            return None;
        }
        Some(
            self.results
                .transcripts
                .iter()
                .map(|flat| flat.transcript.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Speaker-attributed text when speaker segments exist, otherwise the
    /// flat transcript (or the joined items when that is missing too).
    pub fn render(&self) -> String {
        let segments = self.segments();
        if segments.is_empty() {
            if let Some(flat) = self.flat_text() {
                return flat.trim().to_string();
            }
        }
        reconstruct(&self.items(), &segments)
    }
}
