use super::error::HitError;

/// A single detector hit as read from the text data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub timestamp: i64,
    pub detector_id: usize,
    pub energy: f64,
}

impl Hit {
    pub fn new(timestamp: i64, detector_id: usize, energy: f64) -> Self {
        Self {
            timestamp,
            detector_id,
            energy,
        }
    }

    /// Parse a whitespace separated `timestamp detector_id energy` record.
    ///
    /// The detector id is bounds checked against the number of configured channels.
    pub fn parse(record: &str, n_channels: usize) -> Result<Self, HitError> {
        let fields: Vec<&str> = record.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(HitError::FieldCount(fields.len()));
        }

        let timestamp: i64 = fields[0].parse()?;
        let detector_id: usize = fields[1]
            .parse()
            .map_err(|_| HitError::BadDetectorID(fields[1].to_string()))?;
        let energy: f64 = fields[2].parse()?;

        if detector_id >= n_channels {
            return Err(HitError::DetectorOutOfRange(detector_id, n_channels));
        }

        Ok(Self::new(timestamp, detector_id, energy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let hit = Hit::parse("123456789 12 2077.25", 47).unwrap();
        assert_eq!(hit, Hit::new(123456789, 12, 2077.25));

        let hit = Hit::parse("  -5\t0   1e3 ", 47).unwrap();
        assert_eq!(hit, Hit::new(-5, 0, 1000.0));
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            Hit::parse("12 3", 47),
            Err(HitError::FieldCount(2))
        ));
        assert!(matches!(
            Hit::parse("12 3 4 5", 47),
            Err(HitError::FieldCount(4))
        ));
        assert!(matches!(
            Hit::parse("12.5 3 400", 47),
            Err(HitError::BadTimestamp(_))
        ));
        assert!(matches!(
            Hit::parse("12 -3 400", 47),
            Err(HitError::BadDetectorID(_))
        ));
        assert!(matches!(
            Hit::parse("12 3 abc", 47),
            Err(HitError::BadEnergy(_))
        ));
        assert!(matches!(
            Hit::parse("12 47 400", 47),
            Err(HitError::DetectorOutOfRange(47, 47))
        ));
    }
}
