use crate::{bank::Zone, pitch::PitchAssignment};

/// Splits the keyboard into one zone per assigned note.
///
/// Zones come out in ascending note order. The unmapped notes between two
/// neighbours are shared between them, the lower zone taking the smaller half
/// when the gap is odd. The first zone has no `lokey` and the last zone has no
/// `hikey`, so together they cover every key.
pub fn partition(assignment: &PitchAssignment) -> Vec<Zone> {
    let mut zones: Vec<Zone> = Vec::with_capacity(assignment.len());

    for (note, sample) in assignment.iter() {
        let mut zone = Zone::new(sample, note);

        if let Some(prev) = zones.last_mut() {
            let gap = note - prev.pitch_keycenter - 1;
            let lower = gap / 2;
            let upper = gap - lower;
            prev.hikey = Some(prev.pitch_keycenter + lower);
            zone.lokey = Some(note - upper);
        }

        zones.push(zone);
    }

    zones
}
