use serde::Serialize;

use crate::data::model::PriceRange;

/// Share of one price range in a label column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassShare {
    pub class: PriceRange,
    pub count: usize,
    pub percent: f64,
}

/// Count and percentage of each price range, in code order (zero counts included).
pub fn class_distribution(labels: &[PriceRange]) -> Vec<ClassShare> {
    let total = labels.len();
    PriceRange::ALL
        .iter()
        .map(|&class| {
            let count = labels.iter().filter(|&&l| l == class).count();
            let percent = if total == 0 {
                0.0
            } else {
                100.0 * count as f64 / total as f64
            };
            ClassShare { class, count, percent }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution() {
        use PriceRange::*;
        let shares = class_distribution(&[Cheap, Cheap, Pricey, Medium]);
        assert_eq!(shares.len(), 4);
        assert_eq!(shares[0].count, 2);
        assert_eq!(shares[0].percent, 50.0);
        assert_eq!(shares[2].count, 0);
        assert_eq!(shares[3].percent, 25.0);
    }

    #[test]
    fn test_empty_labels() {
        assert!(class_distribution(&[]).iter().all(|s| s.percent == 0.0));
    }
}
