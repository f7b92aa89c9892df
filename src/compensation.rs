use crate::camera_motion::CameraMovement;
use crate::error::Error;
use crate::track::TrackTable;

/// Sets `position_adjusted = position - cumulative camera displacement` for every
/// record of every class.
pub fn adjust_positions(table: &mut TrackTable, movement: &CameraMovement) -> Result<(), Error> {
    if table.len() != movement.len() {
        return Err(Error::FrameCountError {
            tracks: table.len(),
            movement: movement.len(),
        });
    }

    let offsets = movement.cumulative();

    for (_, frame, records) in table.iter_mut() {
        let offset = offsets[frame];

        for record in records.values_mut() {
            record.position_adjusted = Some(record.position - offset);
        }
    }

    Ok(())
}
