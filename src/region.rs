/// Master list of region codes events are drawn from.
pub const MASTER_REGIONS: &[&str] = &[
    "AF", "AX", "AL", "DZ", "AS", "AD", "AO", "AI", "AQ", "AG", "AR", "AM",
    "AW", "AC", "AU", "AT", "AZ", "BS", "BH", "BB", "BD", "BY", "BE", "BZ",
    "BJ", "BM", "BT", "BW", "BO", "BA", "BV", "BR", "IO", "BN", "BG", "BF",
    "BI", "KH", "CM", "CA", "CV", "KY", "CF", "TD", "CL", "CN", "CX", "CC",
    "CO", "KM", "CG", "CD", "CK", "CR", "CI", "HR", "CU", "CY", "CZ", "CS",
    "DK", "DJ", "DM", "DO", "TP", "EC", "EG", "SV", "GQ", "ER", "EE", "ET",
    "EU", "FK", "FO", "FJ", "FI", "FR", "FX", "GF", "PF", "TF", "MK", "GA",
    "GM", "GE", "DE", "GH", "GI", "GB", "GR", "GL", "GD", "GP", "GU", "GT",
    "GG", "GN", "GW", "GY", "HT", "HM", "HN", "HK", "HU", "IS", "IN", "ID",
    "IR", "IQ", "IE", "IL", "IM", "IT", "JE", "JM", "JP", "JO", "KZ", "KE",
    "KI", "KP", "KR", "KW", "KG", "LA", "LV", "LB", "LI", "LR", "LY", "LS",
    "LT", "LU", "MO", "MG", "MW", "MY", "MV", "ML", "MT", "MH", "MQ", "MR",
    "MU", "YT", "MX", "FM", "MC", "MD", "MN", "ME", "MS", "MA", "MZ", "MM",
    "NA", "NR", "NP", "NL", "AN", "NT", "NC", "NZ", "NI", "NE", "NG", "NU",
    "NF", "MP", "NO", "OM", "PK", "PW", "PS", "PA", "PG", "PY", "PE", "PH",
    "PN", "PL", "PT", "PR", "QA", "RE", "RO", "RU", "RW", "GS", "KN", "LC",
    "VC", "WS", "SM", "ST", "SA", "SN", "RS", "YU", "SC", "SL", "SG", "SI",
    "SK", "SB", "SO", "ZA", "ES", "LK", "SH", "PM", "SD", "SR", "SJ", "SZ",
    "SE", "CH", "SY", "TW", "TJ", "TZ", "TH", "TG", "TK", "TO", "TT", "TN",
    "TR", "TM", "TC", "TV", "UG", "UA", "AE", "UK", "US", "UM", "UY", "SU",
    "UZ", "VU", "VA", "VE", "VN", "VG", "VI", "WF", "EH", "YE", "ZM", "ZR",
    "ZW",
];

#[derive(Debug, thiserror::Error)]
pub enum RegionPoolError {
    #[error("region fraction must be a finite value in [-1, 1], got {0}")]
    InvalidFraction(f64),
    #[error("region fraction {0} selects an empty region pool")]
    Empty(f64),
}

/// Read-only subset of [`MASTER_REGIONS`] used for event generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPool {
    regions: Vec<&'static str>,
}

impl RegionPool {
    /// Select `round(|fraction| * MASTER_REGIONS.len())` codes, from the head
    /// of the master list when `fraction > 0` and from the tail otherwise.
    pub fn from_fraction(fraction: f64) -> Result<Self, RegionPoolError> {
        Self::select(MASTER_REGIONS, fraction)
    }

    fn select(master: &[&'static str], fraction: f64) -> Result<Self, RegionPoolError> {
        if !fraction.is_finite() || !(-1.0..=1.0).contains(&fraction) {
            return Err(RegionPoolError::InvalidFraction(fraction));
        }
        let size = ((fraction.abs() * master.len() as f64).round() as usize).min(master.len());
        if size == 0 {
            return Err(RegionPoolError::Empty(fraction));
        }

        let regions = if fraction > 0.0 {
            master[..size].to_vec()
        } else {
            master[master.len() - size..].to_vec()
        };
        Ok(Self { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Always false for a constructed pool.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Region at `cursor`, wrapping modulo the pool size.
    pub fn get(&self, cursor: usize) -> &'static str {
        self.regions[cursor % self.regions.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.regions.iter().copied()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.regions.iter().any(|r| *r == region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_list_codes_are_two_letters() {
        assert_eq!(MASTER_REGIONS.len(), 253);
        assert!(
            MASTER_REGIONS
                .iter()
                .all(|c| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_uppercase()))
        );
    }

    #[test]
    fn test_full_fraction_keeps_master_order() {
        let head = RegionPool::from_fraction(1.0).unwrap();
        let tail = RegionPool::from_fraction(-1.0).unwrap();
        assert_eq!(head.iter().collect::<Vec<_>>(), MASTER_REGIONS);
        assert_eq!(tail.iter().collect::<Vec<_>>(), MASTER_REGIONS);
    }

    #[test]
    fn test_half_fraction_selects_head_or_tail() {
        let expected = (0.5 * MASTER_REGIONS.len() as f64).round() as usize;

        let head = RegionPool::from_fraction(0.5).unwrap();
        assert_eq!(head.len(), expected);
        assert_eq!(head.iter().collect::<Vec<_>>(), &MASTER_REGIONS[..expected]);

        let tail = RegionPool::from_fraction(-0.5).unwrap();
        assert_eq!(tail.len(), expected);
        assert_eq!(
            tail.iter().collect::<Vec<_>>(),
            &MASTER_REGIONS[MASTER_REGIONS.len() - expected..]
        );
    }

    #[test]
    fn test_tenth_fraction_size_is_rounded() {
        let pool = RegionPool::from_fraction(0.1).unwrap();
        assert_eq!(pool.len(), 25);
        assert_eq!(pool.get(0), "AF");
        assert_eq!(pool.get(25), "AF");
        assert!(pool.contains("AM"));
        assert!(!pool.contains("ZW"));
    }

    #[test]
    fn test_invalid_or_empty_fraction_is_rejected() {
        assert!(matches!(
            RegionPool::from_fraction(0.0),
            Err(RegionPoolError::Empty(_))
        ));
        assert!(matches!(
            RegionPool::from_fraction(0.001),
            Err(RegionPoolError::Empty(_))
        ));
        assert!(matches!(
            RegionPool::from_fraction(1.5),
            Err(RegionPoolError::InvalidFraction(_))
        ));
        assert!(matches!(
            RegionPool::from_fraction(f64::NAN),
            Err(RegionPoolError::InvalidFraction(_))
        ));
    }
}
