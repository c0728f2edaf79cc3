//! Dashboard summary calculations

use serde::{Deserialize, Serialize};

/// Share of recent farm activity per category, in whole percentages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDistribution {
    pub ventas: u32,
    pub cosechas: u32,
    pub otros: u32,
}

impl ActivityDistribution {
    pub fn total(&self) -> u32 {
        self.ventas + self.cosechas + self.otros
    }

    /// Chart entries in display order
    pub fn entries(&self) -> [(&'static str, u32); 3] {
        [("Ventas", self.ventas), ("Cosechas", self.cosechas), ("Otros", self.otros)]
    }
}

/// Split counts into percentages summing to exactly 100 using largest
/// remainder rounding. All zero when every count is zero.
pub fn percentage_split(counts: &[u64]) -> Vec<u32> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let mut shares: Vec<u32> = Vec::with_capacity(counts.len());
    let mut remainders: Vec<(usize, u64)> = Vec::with_capacity(counts.len());
    for (i, &c) in counts.iter().enumerate() {
        let scaled = c * 100;
        shares.push((scaled / total) as u32);
        remainders.push((i, scaled % total));
    }

    let assigned: u32 = shares.iter().sum();
    let mut missing = 100 - assigned;
    // Largest remainder first, earlier category wins ties
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (i, _) in remainders {
        if missing == 0 {
            break;
        }
        shares[i] += 1;
        missing -= 1;
    }
    shares
}

/// Distribution of the last 30 days; `otros` covers activities and
/// inventory movements
pub fn activity_distribution(ventas: u64, cosechas: u64, actividades: u64, movimientos: u64) -> ActivityDistribution {
    let split = percentage_split(&[ventas, cosechas, actividades + movimientos]);
    ActivityDistribution {
        ventas: split[0],
        cosechas: split[1],
        otros: split[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thirds_sum_to_100() {
        let d = activity_distribution(1, 1, 1, 0);
        assert_eq!(d.total(), 100);
        assert_eq!(d.ventas, 34);
        assert_eq!(d.cosechas, 33);
    }

    #[test]
    fn test_no_activity() {
        assert_eq!(activity_distribution(0, 0, 0, 0), ActivityDistribution::default());
    }

    #[test]
    fn test_exact_split() {
        let d = activity_distribution(2, 1, 1, 0);
        assert_eq!((d.ventas, d.cosechas, d.otros), (50, 25, 25));
    }

    #[test]
    fn test_others_include_movements() {
        let d = activity_distribution(0, 0, 1, 3);
        assert_eq!(d.otros, 100);
    }
}
