const NOTE_NAMES: [&str; 12] = [
    "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "b",
];

/// Converts a note name such as `c4`, `F#2` or `Bb-1` into a MIDI note number.
///
/// Octave 4 holds middle C, so `c4` is 60 and `c-1` is 0. Returns `None` for
/// anything that isn't a note letter followed by an optional `#`/`b` and an
/// octave number, and for notes that fall outside of the MIDI range.
pub fn note_to_midi(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let semitone: i16 = match chars.next()?.to_ascii_lowercase() {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };

    if octave.is_empty() || !octave.trim_start_matches('-').chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let octave: i16 = octave.parse().ok()?;
    if octave < -1 {
        return None;
    }

    let midi_note = 12 + semitone + accidental + octave * 12;
    u8::try_from(midi_note).ok().filter(|note| *note <= 127)
}

/// Renders a MIDI note number as a note name, using sharps.
pub fn midi_to_note(note: u8) -> String {
    let octave = note as i16 / 12 - 1;
    format!("{}{}", NOTE_NAMES[note as usize % 12], octave)
}

/// Parses an SFZ key value, which may be a plain number or a note name.
pub(crate) fn parse_key(value: &str) -> Option<u8> {
    match value.parse::<i16>() {
        Ok(number) => u8::try_from(number).ok().filter(|note| *note <= 127),
        Err(_) => note_to_midi(value),
    }
}
