use chrono::{DateTime, Local};

/// Source of "now" for timestamps and the time/date replies.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Formats instants for display using `chrono` format strings.
#[derive(Debug, Clone)]
pub struct TimeFormat {
    time: String,
    date: String,
}

impl TimeFormat {
    pub fn new(time: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            date: date.into(),
        }
    }

    pub fn time(&self, at: &DateTime<Local>) -> String {
        at.format(&self.time).to_string()
    }

    pub fn date(&self, at: &DateTime<Local>) -> String {
        at.format(&self.date).to_string()
    }
}

impl Default for TimeFormat {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_TIME_FORMAT,
            crate::config::DEFAULT_DATE_FORMAT,
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn default_format_is_hours_and_minutes() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 59).unwrap();
        let format = TimeFormat::default();
        assert_eq!(format.time(&at), "07:05");
        assert_eq!(format.date(&at), "3/9/2024");
    }

    #[test]
    fn fixed_clock_never_moves() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        let clock = FixedClock(at);
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), at);
    }
}
