//! Sites and MRF reference numbers.
//!
//! Every request number carries its site prefix and year:
//! `LAR-MTCE-001-2025`, `SAR-001-2025`, `PHC-001-2025`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteCode {
    /// Land Area
    Lar,
    /// Swamp Area
    Sar,
    /// PHC POD
    Phc,
}

impl SiteCode {
    pub const ALL: [SiteCode; 3] = [SiteCode::Lar, SiteCode::Sar, SiteCode::Phc];

    /// Derives the site from free-text area input. Unknown areas fall back to LAR.
    pub fn from_area(area: &str) -> Self {
        let upper = area.to_uppercase();
        if upper.contains("SWAMP") || upper.trim() == "SAR" {
            SiteCode::Sar
        } else if upper.contains("PHC") {
            SiteCode::Phc
        } else {
            SiteCode::Lar
        }
    }

    /// Parses a location filter (`LAR`, `Land Area`, `PHC POD`, ...).
    /// Anything else is treated as an asset name by the caller.
    pub fn from_filter(location: &str) -> Option<Self> {
        match location.trim().to_uppercase().as_str() {
            "LAR" | "LAND AREA" | "LAND" => Some(SiteCode::Lar),
            "SAR" | "SWAMP AREA" | "SWAMP" => Some(SiteCode::Sar),
            "PHC" | "PHC POD" => Some(SiteCode::Phc),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SiteCode::Lar => "LAR",
            SiteCode::Sar => "SAR",
            SiteCode::Phc => "PHC",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SiteCode::Lar => "Land Area",
            SiteCode::Sar => "Swamp Area",
            SiteCode::Phc => "PHC POD",
        }
    }

    /// Asset locations offered for the site in the request form.
    pub fn locations(&self) -> &'static [&'static str] {
        match self {
            SiteCode::Lar => &["OBOB", "KWALE", "IRRI", "OSHIE", "EBOCHA", "IDU", "AKRI"],
            SiteCode::Sar => &["OGBOINBIRI", "BRASS", "OBAMA", "CLOUGH CREEK", "BRASS TERMINAL"],
            SiteCode::Phc => &["IDU", "PHC", "AKRI", "EBOCHA", "SAMABIRI", "TEBIDABA", "OGBOINBIRI"],
        }
    }

    /// Prefix every reference number of this site starts with.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            SiteCode::Lar => "LAR-MTCE-",
            SiteCode::Sar => "SAR-",
            SiteCode::Phc => "PHC-",
        }
    }

    /// SQL `LIKE` pattern matching all numbers of this site (any year).
    pub fn like_pattern(&self) -> String {
        format!("{}-%", self.code())
    }

    pub fn format_reference(&self, sequence: u32, year: i32) -> String {
        format!("{}{:03}-{}", self.reference_prefix(), sequence, year)
    }

    /// Sequence part of a reference number of this site and year.
    pub fn parse_sequence(&self, mrf_number: &str, year: i32) -> Option<u32> {
        let suffix = format!("-{}", year);
        let middle = mrf_number
            .trim()
            .strip_prefix(self.reference_prefix())?
            .strip_suffix(suffix.as_str())?;

        if middle.is_empty() || !middle.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        middle.parse().ok()
    }

    /// Site a reference number belongs to, judged by its prefix.
    pub fn of_reference(mrf_number: &str) -> Option<Self> {
        let upper = mrf_number.trim().to_uppercase();
        SiteCode::ALL
            .into_iter()
            .find(|site| upper.starts_with(&format!("{}-", site.code())))
    }

    /// Next number after the highest sequence already used for the site and year.
    /// Sequences compare numerically, so `LAR-MTCE-1000-2025` follows `...-999-...`.
    ///
    /// `None` when the highest sequence is already `u32::MAX`.
    pub fn next_reference<'a, I>(&self, year: i32, existing: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let last = existing
            .into_iter()
            .filter_map(|number| self.parse_sequence(number, year))
            .max()
            .unwrap_or(0);

        last.checked_add(1)
            .map(|sequence| self.format_reference(sequence, year))
    }
}

impl std::fmt::Display for SiteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_from_area() {
        assert_eq!(SiteCode::from_area("Land Area"), SiteCode::Lar);
        assert_eq!(SiteCode::from_area("swamp area"), SiteCode::Sar);
        assert_eq!(SiteCode::from_area("PHC POD"), SiteCode::Phc);
        assert_eq!(SiteCode::from_area(""), SiteCode::Lar);
        assert_eq!(SiteCode::from_area("Offshore"), SiteCode::Lar);
    }

    #[test]
    fn test_reference_formats() {
        assert_eq!(SiteCode::Lar.format_reference(1, 2025), "LAR-MTCE-001-2025");
        assert_eq!(SiteCode::Sar.format_reference(42, 2025), "SAR-042-2025");
        assert_eq!(SiteCode::Phc.format_reference(1234, 2024), "PHC-1234-2024");
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(SiteCode::Lar.parse_sequence("LAR-MTCE-017-2025", 2025), Some(17));
        assert_eq!(SiteCode::Lar.parse_sequence("LAR-MTCE-017-2024", 2025), None);
        assert_eq!(SiteCode::Sar.parse_sequence("SAR-MTCE-017-2025", 2025), None);
        assert_eq!(SiteCode::Phc.parse_sequence("PHC-A1-2025", 2025), None);
    }

    #[test]
    fn test_next_reference_is_numeric_max_plus_one() {
        let existing = ["SAR-009-2025", "SAR-010-2025", "SAR-099-2024", "PHC-500-2025"];
        assert_eq!(SiteCode::Sar.next_reference(2025, existing).as_deref(), Some("SAR-011-2025"));
        assert_eq!(SiteCode::Phc.next_reference(2026, existing).as_deref(), Some("PHC-001-2026"));

        let wide = ["LAR-MTCE-999-2025", "LAR-MTCE-1000-2025"];
        assert_eq!(
            SiteCode::Lar.next_reference(2025, wide).as_deref(),
            Some("LAR-MTCE-1001-2025")
        );
    }

    #[test]
    fn test_next_reference_exhausted_sequence() {
        let highest = format!("SAR-{}-2025", u32::MAX);
        assert_eq!(SiteCode::Sar.next_reference(2025, [highest.as_str()]), None);

        let below = format!("SAR-{}-2025", u32::MAX - 1);
        assert_eq!(
            SiteCode::Sar.next_reference(2025, [below.as_str()]),
            Some(highest.clone())
        );
        // Other years keep their own sequence.
        assert_eq!(
            SiteCode::Sar.next_reference(2026, [highest.as_str()]).as_deref(),
            Some("SAR-001-2026")
        );
    }

    #[test]
    fn test_filters_and_ownership() {
        assert_eq!(SiteCode::from_filter("Land Area"), Some(SiteCode::Lar));
        assert_eq!(SiteCode::from_filter("phc pod"), Some(SiteCode::Phc));
        assert_eq!(SiteCode::from_filter("OBOB"), None);
        assert_eq!(SiteCode::of_reference("sar-003-2025"), Some(SiteCode::Sar));
        assert_eq!(SiteCode::of_reference("MRF-1"), None);
        assert_eq!(SiteCode::Lar.like_pattern(), "LAR-%");
    }
}
