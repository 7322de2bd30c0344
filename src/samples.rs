// Hardcoded sample data

use crate::error::StoreError;
use crate::tea::{TeaColor, TeaProfile};

/// Caffeine given to every sample tea
pub const SAMPLE_CAFFEINE_MG: f64 = 34.0;

/// Sample tea names, one per color, in color-code order
pub const TEA_NAMES: [(TeaColor, &str); 7] = [
    (TeaColor::Green, "Matcha"),
    (TeaColor::Black, "Earl Grey"),
    (TeaColor::White, "White Peony"),
    (TeaColor::Red, "Blood Orange"),
    (TeaColor::Blend, "Joker Tea"),
    (TeaColor::Chai, "Masala Chai"),
    (TeaColor::Oolong, "Peach Oolong"),
];

pub fn sample_profiles() -> Result<Vec<TeaProfile>, StoreError> {
    TEA_NAMES
        .iter()
        .map(|(color, name)| TeaProfile::with_caffeine(*color, name, SAMPLE_CAFFEINE_MG))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sample_profiles() {
        let profiles = sample_profiles().unwrap();
        assert_eq!(profiles.len(), 7);

        let names: HashSet<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), 7);

        for (profile, color) in profiles.iter().zip(TeaColor::ALL) {
            assert_eq!(profile.color, color);
            assert_eq!(profile.caffeine_mg(), SAMPLE_CAFFEINE_MG);
        }
    }
}
