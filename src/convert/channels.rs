//! Output channel assignment

use crate::midi::event::{Track, DRUM_CHANNEL, DRUM_PROGRAM};

/// Assign output channels to decoded tracks
///
/// Drum tracks go to the percussion channel. Every other track takes the
/// next melodic channel, which only advances past tracks that play notes
/// and never lands on the percussion channel. Nothing stops the counter
/// from passing 15 when there are many melodic tracks; the status byte
/// keeps only the low nibble.
pub fn assign_channels(tracks: &mut [Track]) {
    let mut next: u8 = 0;

    for track in tracks.iter_mut() {
        if track.contains_program(DRUM_PROGRAM) {
            track.set_channel(DRUM_CHANNEL);
            continue;
        }

        track.set_channel(next);
        if track.contains_notes() {
            next = next.wrapping_add(1);
        }
        if next == DRUM_CHANNEL {
            next += 1;
        }
    }
}
