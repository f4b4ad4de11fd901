use serde::{Deserialize, Serialize};

/// Standard 12-lead order
pub const STANDARD_LEADS: [&str; 12] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
];

/// Names for `count` leads: the standard order first, then `Lead13`, `Lead14`, ...
pub fn lead_names(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match STANDARD_LEADS.get(i) {
            Some(name) => name.to_string(),
            None => format!("Lead{}", i + 1),
        })
        .collect()
}

/// Vertical band of the normalized strip assigned to one lead
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadBox {
    /// Top edge in normalized-image rows
    pub offset: f64,
    pub height: f64,
    /// Electrical zero, relative to `offset`
    pub zero_point: f64,
}

impl LeadBox {
    pub fn bottom(&self) -> f64 {
        self.offset + self.height
    }

    /// Whether an absolute image row falls inside the band
    pub fn contains_row(&self, row: f64) -> bool {
        row >= self.offset && row < self.bottom()
    }
}

/// One extracted trace sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadPoint {
    pub x: usize,
    /// Row relative to the band's offset
    pub y: f64,
    /// Darkness score at (x, y)
    pub d: f64,
    /// Operator pin; extraction never overwrites a modified point
    pub modified: bool,
}

/// Patient sex as recorded in the export filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    pub fn parse(text: &str) -> Option<Sex> {
        match text.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Some(Sex::Male),
            "F" | "FEMALE" => Some(Sex::Female),
            "U" | "" | "UNKNOWN" => Some(Sex::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sex::Male => write!(f, "M"),
            Sex::Female => write!(f, "F"),
            Sex::Unknown => write!(f, "U"),
        }
    }
}

/// Metadata that only feeds the export filename
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatientInfo {
    pub source_id: String,
    pub sex: Sex,
    /// QT interval in milliseconds
    pub qt_ms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_names_standard_then_numbered() {
        let names = lead_names(14);
        assert_eq!(names[0], "I");
        assert_eq!(names[3], "aVR");
        assert_eq!(names[11], "V6");
        assert_eq!(names[12], "Lead13");
        assert_eq!(lead_names(3), vec!["I", "II", "III"]);
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!(Sex::parse("m"), Some(Sex::Male));
        assert_eq!(Sex::parse(" Female "), Some(Sex::Female));
        assert_eq!(Sex::parse(""), Some(Sex::Unknown));
        assert_eq!(Sex::parse("x"), None);
    }

    #[test]
    fn test_box_contains_row() {
        let b = LeadBox {
            offset: 10.0,
            height: 5.0,
            zero_point: 2.5,
        };
        assert!(b.contains_row(10.0));
        assert!(b.contains_row(14.9));
        assert!(!b.contains_row(15.0));
    }
}
