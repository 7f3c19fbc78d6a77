//! Seat layout generation and allocation.

use uuid::Uuid;

use crate::models::{EventSeat, SeatStatus};

pub const MAX_ROWS: i32 = 200;
pub const MAX_SEATS_PER_ROW: i32 = 200;

/// Spreadsheet-style row labels: `A..Z`, then `AA, AB, ..`.
pub fn row_label(index: i32) -> String {
    let mut n = index + 1;
    let mut label = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatSpec {
    pub row_index: i32,
    pub row_label: String,
    pub seat_number: i32,
    pub label: String,
}

/// Every seat of a `rows x seats_per_row` block, row by row, numbered from 1.
pub fn layout(rows: i32, seats_per_row: i32) -> Vec<SeatSpec> {
    let mut seats = Vec::with_capacity((rows.max(0) * seats_per_row.max(0)) as usize);
    for row_index in 0..rows {
        let row = row_label(row_index);
        for seat_number in 1..=seats_per_row {
            seats.push(SeatSpec {
                row_index,
                label: format!("{}{}", row, seat_number),
                row_label: row.clone(),
                seat_number,
            });
        }
    }
    seats
}

pub fn validate_dimensions(rows: i32, seats_per_row: i32) -> Result<(), String> {
    if !(1..=MAX_ROWS).contains(&rows) {
        return Err(format!("rows must be between 1 and {}", MAX_ROWS));
    }
    if !(1..=MAX_SEATS_PER_ROW).contains(&seats_per_row) {
        return Err(format!(
            "seats_per_row must be between 1 and {}",
            MAX_SEATS_PER_ROW
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The requested seat is not part of the section.
    UnknownSeat(Uuid),
    SeatTaken(String),
    SoldOut,
}

/// Chooses seats for `requests`, one per attendee. `Some(id)` asks for a
/// specific seat; `None` takes the first free seat in row/number order.
/// Explicit requests are honoured before automatic picks so an automatic pick
/// never steals a seat somebody asked for.
pub fn allocate(seats: &[EventSeat], requests: &[Option<Uuid>]) -> Result<Vec<Uuid>, AllocationError> {
    let mut ordered: Vec<&EventSeat> = seats.iter().collect();
    ordered.sort_by_key(|seat| (seat.row_index, seat.seat_number));

    let mut taken: Vec<Uuid> = Vec::with_capacity(requests.len());
    let mut result: Vec<Option<Uuid>> = vec![None; requests.len()];

    for (slot, request) in requests.iter().enumerate() {
        let Some(wanted) = request else { continue };
        let seat = ordered
            .iter()
            .find(|seat| seat.id == *wanted)
            .ok_or(AllocationError::UnknownSeat(*wanted))?;
        if seat.status != SeatStatus::Available || taken.contains(&seat.id) {
            return Err(AllocationError::SeatTaken(seat.label.clone()));
        }
        taken.push(seat.id);
        result[slot] = Some(seat.id);
    }

    for slot in result.iter_mut().filter(|slot| slot.is_none()) {
        let seat = ordered
            .iter()
            .find(|seat| seat.status == SeatStatus::Available && !taken.contains(&seat.id))
            .ok_or(AllocationError::SoldOut)?;
        taken.push(seat.id);
        *slot = Some(seat.id);
    }

    Ok(result.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(rows: i32, per_row: i32) -> Vec<EventSeat> {
        let section_id = Uuid::new_v4();
        layout(rows, per_row)
            .into_iter()
            .map(|spec| EventSeat {
                id: Uuid::new_v4(),
                section_id,
                row_index: spec.row_index,
                row_label: spec.row_label,
                seat_number: spec.seat_number,
                label: spec.label,
                status: SeatStatus::Available,
            })
            .collect()
    }

    #[test]
    fn test_row_labels() {
        assert_eq!(row_label(0), "A");
        assert_eq!(row_label(25), "Z");
        assert_eq!(row_label(26), "AA");
        assert_eq!(row_label(27), "AB");
        assert_eq!(row_label(51), "AZ");
        assert_eq!(row_label(52), "BA");
        assert_eq!(row_label(701), "ZZ");
        assert_eq!(row_label(702), "AAA");
    }

    #[test]
    fn test_layout() {
        let specs = layout(2, 3);
        let labels: Vec<&str> = specs.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["A1", "A2", "A3", "B1", "B2", "B3"]);
    }

    #[test]
    fn test_dimension_limits() {
        assert!(validate_dimensions(10, 20).is_ok());
        assert!(validate_dimensions(0, 20).is_err());
        assert!(validate_dimensions(10, MAX_SEATS_PER_ROW + 1).is_err());
    }

    #[test]
    fn test_auto_allocation_takes_first_free_seats() {
        let mut all = seats(2, 2);
        all[0].status = SeatStatus::Booked;
        let picked = allocate(&all, &[None, None]).unwrap();
        assert_eq!(picked, vec![all[1].id, all[2].id]);
    }

    #[test]
    fn test_requested_seat_is_not_stolen_by_auto_pick() {
        let all = seats(1, 3);
        // Attendee 1 wants any seat, attendee 2 wants A1.
        let picked = allocate(&all, &[None, Some(all[0].id)]).unwrap();
        assert_eq!(picked, vec![all[1].id, all[0].id]);
    }

    #[test]
    fn test_taken_seat_rejected() {
        let mut all = seats(1, 2);
        all[1].status = SeatStatus::Reserved;
        let err = allocate(&all, &[Some(all[1].id)]).unwrap_err();
        assert_eq!(err, AllocationError::SeatTaken("A2".to_string()));

        let err = allocate(&all, &[Some(all[0].id), Some(all[0].id)]).unwrap_err();
        assert_eq!(err, AllocationError::SeatTaken("A1".to_string()));
    }

    #[test]
    fn test_unknown_seat_and_sold_out() {
        let all = seats(1, 1);
        let stranger = Uuid::new_v4();
        assert_eq!(
            allocate(&all, &[Some(stranger)]).unwrap_err(),
            AllocationError::UnknownSeat(stranger)
        );
        assert_eq!(allocate(&all, &[None, None]).unwrap_err(), AllocationError::SoldOut);
    }
}
