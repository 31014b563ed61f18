//! JSON serialization types for sequences

use super::event::{Event, EventKind, MetaKind, Sequence};
use serde::Serialize;

/// Top-level JSON structure for a sequence
#[derive(Debug, Clone, Serialize)]
pub struct SequenceJson<'a> {
    /// Sequence name
    #[serde(skip_serializing_if = "is_empty")]
    pub name: &'a str,
    /// Ticks per quarter note
    pub time_division: u16,
    /// First tempo of the sequence in BPM, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    /// Tracks in file order
    pub tracks: Vec<TrackJson<'a>>,
}

/// JSON representation of a track
#[derive(Debug, Clone, Serialize)]
pub struct TrackJson<'a> {
    pub channel: u8,
    /// Number of note-on events
    pub notes: usize,
    /// Tick of the last event
    pub length: u64,
    pub events: &'a [Event],
}

impl<'a> SequenceJson<'a> {
    /// Create a SequenceJson view of a sequence
    pub fn new(sequence: &'a Sequence) -> Self {
        let tracks = sequence
            .tracks
            .iter()
            .map(|track| TrackJson {
                channel: track.channel,
                notes: track
                    .events
                    .iter()
                    .filter(|ev| matches!(ev.kind, EventKind::NoteOn { .. }))
                    .count(),
                length: track.end_tick(),
                events: &track.events,
            })
            .collect();

        Self {
            name: &sequence.name,
            time_division: sequence.time_division,
            bpm: first_tempo(sequence).map(micros_to_bpm),
            tracks,
        }
    }
}

fn is_empty(s: &&str) -> bool {
    s.is_empty()
}

fn first_tempo(sequence: &Sequence) -> Option<u32> {
    sequence
        .tracks
        .iter()
        .flat_map(|track| track.events.iter())
        .filter_map(|ev| match &ev.kind {
            EventKind::Meta {
                kind: MetaKind::Tempo,
                data,
            } if data.len() == 3 => Some((
                ev.tick,
                u32::from_be_bytes([0, data[0], data[1], data[2]]),
            )),
            _ => None,
        })
        .min_by_key(|(tick, _)| *tick)
        .map(|(_, micros)| micros)
}

/// Convert microseconds per beat to beats per minute
fn micros_to_bpm(micros: u32) -> f64 {
    if micros == 0 {
        return 0.0;
    }
    60_000_000.0 / f64::from(micros)
}
