//! Working-day arithmetic against the Portuguese national-holiday calendar.
//!
//! Used by rule B to check the 20-working-day publication deadline of
//! article 8(j) of Portaria 318-B/2023.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Fixed national holidays as (month, day). Movable feasts (Carnaval, Páscoa,
/// Corpo de Deus) are not observed by the deadline rule.
const NATIONAL_HOLIDAYS: [(u32, u32); 10] = [
    (1, 1),   // Ano Novo
    (4, 25),  // Dia da Liberdade
    (5, 1),   // Dia do Trabalhador
    (6, 10),  // Dia de Portugal
    (8, 15),  // Assunção de Nossa Senhora
    (10, 5),  // Implantação da República
    (11, 1),  // Todos os Santos
    (12, 1),  // Restauração da Independência
    (12, 8),  // Imaculada Conceição
    (12, 25), // Natal
];

fn is_national_holiday(date: NaiveDate) -> bool {
    NATIONAL_HOLIDAYS.contains(&(date.month(), date.day()))
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Counts working days strictly after `start` through `end` inclusive,
/// skipping weekends and national holidays. The start day itself is never
/// counted. Returns `None` when `end` precedes `start`.
pub fn working_days_between(start: NaiveDate, end: NaiveDate) -> Option<u32> {
    if end < start {
        return None;
    }

    let mut current = start.checked_add_days(Days::new(1))?;
    let mut working_days = 0;
    while current <= end {
        if !is_weekend(current) && !is_national_holiday(current) {
            working_days += 1;
        }
        current = current.checked_add_days(Days::new(1))?;
    }
    Some(working_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_same_day_counts_zero() {
        assert_eq!(working_days_between(date(2024, 1, 1), date(2024, 1, 1)), Some(0));
    }

    #[test]
    fn test_end_before_start_is_none() {
        assert_eq!(working_days_between(date(2024, 1, 10), date(2024, 1, 9)), None);
    }

    #[test]
    fn test_week_from_new_year() {
        // 2024-01-01 is a Monday and a holiday, but the start day is excluded
        // anyway. Counted days: Tue 2, Wed 3, Thu 4, Fri 5, Mon 8; Sat 6 and
        // Sun 7 are skipped.
        assert_eq!(working_days_between(date(2024, 1, 1), date(2024, 1, 8)), Some(5));
    }

    #[test]
    fn test_holiday_inside_span_is_skipped() {
        // 2024-04-25 (Dia da Liberdade) falls on a Thursday.
        assert_eq!(working_days_between(date(2024, 4, 24), date(2024, 4, 26)), Some(1));
    }

    #[test]
    fn test_plain_working_week() {
        // Mon 2024-03-04 through Fri 2024-03-08, start excluded.
        assert_eq!(working_days_between(date(2024, 3, 4), date(2024, 3, 8)), Some(4));
    }

    #[test]
    fn test_christmas_week() {
        // 2024-12-23 (Mon) to 2024-12-27 (Fri): Tue 24 counts, Wed 25 is
        // Natal, Thu 26 and Fri 27 count.
        assert_eq!(working_days_between(date(2024, 12, 23), date(2024, 12, 27)), Some(3));
    }
}
