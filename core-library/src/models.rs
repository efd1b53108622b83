//! Domain models handed between plugins, the playback engine and hosts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::duration::duration_ms;
use crate::error::{LibraryError, Result};

// =============================================================================
// Catalog Models
// =============================================================================

/// Artist credit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artist {
    /// Provider-scoped identifier
    pub id: String,
    /// Display name
    pub name: String,
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Validate artist data
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Artist name cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Playable track as returned by a provider plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Provider-scoped identifier
    pub id: String,
    /// Track title
    pub title: String,
    /// Credited artists, in display order
    #[serde(default)]
    pub artists: Vec<Artist>,
    /// Album title, if known
    #[serde(default)]
    pub album: Option<String>,
    /// Track length
    #[serde(with = "duration_ms", default)]
    pub duration: Duration,
    /// Artwork URL
    #[serde(default)]
    pub artwork: Option<String>,
    /// Source (provider) the track comes from, e.g. `spotify`
    pub source: String,
    /// Track position on its album
    #[serde(default)]
    pub track_number: Option<u32>,
    /// Disc number for multi-disc albums
    #[serde(default)]
    pub disc_number: Option<u32>,
    /// Free-form provider metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: Vec::new(),
            album: None,
            duration: Duration::ZERO,
            artwork: None,
            source: source.into(),
            track_number: None,
            disc_number: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_artist(mut self, artist: Artist) -> Self {
        self.artists.push(artist);
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_track_number(mut self, number: u32) -> Self {
        self.track_number = Some(number);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Comma-separated artist names.
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Validate track data
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }

        if self.source.trim().is_empty() {
            return Err("Track source cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Album with its track listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Provider-scoped identifier
    pub id: String,
    /// Album title
    pub title: String,
    /// Album artists
    #[serde(default)]
    pub artists: Vec<Artist>,
    /// Artwork URL
    #[serde(default)]
    pub artwork: Option<String>,
    /// Release date
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    /// Source (provider) the album comes from
    pub source: String,
    /// Track listing
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: Vec::new(),
            artwork: None,
            release_date: None,
            source: source.into(),
            tracks: Vec::new(),
        }
    }

    /// Sum of all track durations.
    pub fn total_duration(&self) -> Duration {
        self.tracks.iter().map(|t| t.duration).sum()
    }

    /// Sort tracks by track number, ascending.
    ///
    /// Disc numbers are ignored. The sort is stable: tracks sharing a number,
    /// or missing one, keep their relative order. Tracks without a number
    /// sort last.
    pub fn sort_tracks(&mut self) {
        self.tracks.sort_by_key(|t| t.track_number.unwrap_or(u32::MAX));
    }
}

// =============================================================================
// Queue
// =============================================================================

/// Repeat behaviour at track end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    /// Next mode in the `off -> one -> all -> off` cycle.
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of one queue slot. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub track: Track,
    pub is_active: bool,
    pub position: usize,
}

impl QueueItem {
    /// Build the view for a whole queue.
    pub fn from_queue(queue: &[Track], current_index: Option<usize>) -> Vec<QueueItem> {
        queue
            .iter()
            .enumerate()
            .map(|(position, track)| QueueItem {
                track: track.clone(),
                is_active: current_index == Some(position),
                position,
            })
            .collect()
    }
}

// =============================================================================
// Lyrics
// =============================================================================

/// One timed lyric line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    #[serde(with = "duration_ms")]
    pub time: Duration,
    pub text: String,
}

/// Track lyrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyrics {
    /// Track this lyrics belongs to
    pub track_id: String,
    /// Source of lyrics (lrclib, musixmatch, ...)
    pub source: String,
    /// Whether `lines` carries timing
    pub synced: bool,
    /// Raw lyrics body (plain text or LRC)
    pub body: String,
    /// Timed lines, sorted by time. Empty for plain lyrics.
    #[serde(default)]
    pub lines: Vec<LyricLine>,
    /// Language code (ISO 639-1)
    #[serde(default)]
    pub language: Option<String>,
}

impl Lyrics {
    /// Unsynced lyrics.
    pub fn plain(
        track_id: impl Into<String>,
        source: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            source: source.into(),
            synced: false,
            body: body.into(),
            lines: Vec::new(),
            language: None,
        }
    }

    /// Parse an LRC body.
    ///
    /// A line may carry several `[mm:ss.xx]` stamps. Tag lines such as
    /// `[ar:...]` are skipped. At least one timed line is required.
    pub fn from_lrc(
        track_id: impl Into<String>,
        source: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self> {
        let body = body.into();
        let mut lines = Vec::new();

        for raw in body.lines() {
            let mut rest = raw.trim();
            let mut stamps = Vec::new();

            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(end) = stripped.find(']') else {
                    break;
                };
                match parse_lrc_timestamp(&stripped[..end]) {
                    Some(time) => stamps.push(time),
                    None => break,
                }
                rest = &stripped[end + 1..];
            }

            let text = rest.trim();
            for time in stamps {
                lines.push(LyricLine {
                    time,
                    text: text.to_string(),
                });
            }
        }

        if lines.is_empty() {
            return Err(LibraryError::InvalidLyrics(
                "no timed lines in LRC body".to_string(),
            ));
        }

        lines.sort_by_key(|l| l.time);

        Ok(Self {
            track_id: track_id.into(),
            source: source.into(),
            synced: true,
            body,
            lines,
            language: None,
        })
    }

    /// Line being sung at `position`, i.e. the last line starting at or
    /// before it.
    pub fn line_at(&self, position: Duration) -> Option<&LyricLine> {
        let idx = self.lines.partition_point(|l| l.time <= position);
        idx.checked_sub(1).and_then(|i| self.lines.get(i))
    }

    /// Validate lyrics data
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.body.trim().is_empty() {
            return Err("Lyrics body cannot be empty".to_string());
        }

        if self.synced && self.lines.is_empty() {
            return Err("Synced lyrics must carry timed lines".to_string());
        }

        Ok(())
    }

    /// Check if the body looks like LRC
    pub fn is_lrc_format(&self) -> bool {
        self.body.contains('[') && self.body.contains(']')
    }
}

/// `mm:ss`, `mm:ss.x`, `mm:ss.xx` or `mm:ss.xxx`.
fn parse_lrc_timestamp(stamp: &str) -> Option<Duration> {
    let (minutes, rest) = stamp.split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;

    let (seconds, fraction) = match rest.split_once(['.', ':']) {
        Some((s, f)) => (s, f),
        None => (rest, ""),
    };
    let seconds: u64 = seconds.trim().parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    let millis = if fraction.is_empty() {
        0
    } else {
        if fraction.len() > 3 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let padded = format!("{:0<3}", fraction);
        padded.parse::<u64>().ok()?
    };

    Some(Duration::from_millis((minutes * 60 + seconds) * 1000 + millis))
}

// =============================================================================
// Tests
// =============================================================================
