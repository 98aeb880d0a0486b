use serde::Serialize;
use std::fmt;

/// Share of candidates inside crowds above which the frame is alarming.
pub const HIGH_DENSITY_RATIO: f64 = 0.7;
/// A single crowd this large raises the alert level.
pub const LARGE_CLUSTER_SIZE: usize = 5;
/// This many simultaneous crowds adds an informational note.
pub const MANY_CLUSTERS: usize = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Normal,
    High,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Advisory annotation attached to a crowd summary.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AlertAssessment {
    pub level: AlertLevel,
    pub notes: Vec<String>,
}

/// Grade a frame from its candidate count and the sizes of its clusters.
pub fn assess_crowd(candidate_count: usize, cluster_sizes: &[usize]) -> AlertAssessment {
    let mut assessment = AlertAssessment::default();
    let crowded: usize = cluster_sizes.iter().sum();

    if candidate_count > 0 {
        let ratio = crowded as f64 / candidate_count as f64;
        if ratio > HIGH_DENSITY_RATIO {
            assessment.level = AlertLevel::High;
            assessment.notes.push(format!(
                "high density: {:.1}% of vehicles are in crowds",
                ratio * 100.0
            ));
        }
    }

    if let Some(&largest) = cluster_sizes.iter().max() {
        if largest >= LARGE_CLUSTER_SIZE {
            assessment.level = AlertLevel::High;
            assessment
                .notes
                .push(format!("large crowd: {} vehicles in one cluster", largest));
        }
    }

    if cluster_sizes.len() >= MANY_CLUSTERS {
        assessment.notes.push(format!(
            "multiple crowds: {} clusters active",
            cluster_sizes.len()
        ));
    }

    assessment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_frame_is_normal() {
        let a = assess_crowd(10, &[3]);
        assert_eq!(a.level, AlertLevel::Normal);
        assert!(a.notes.is_empty());
        assert_eq!(assess_crowd(0, &[]), AlertAssessment::default());
    }

    #[test]
    fn density_above_ratio_is_high() {
        assert_eq!(assess_crowd(4, &[3]).level, AlertLevel::Normal);
        let a = assess_crowd(4, &[4]);
        assert_eq!(a.level, AlertLevel::High);
        assert!(a.notes[0].contains("100.0%"));
        // exactly 70% does not trip
        assert_eq!(assess_crowd(10, &[4, 3]).level, AlertLevel::Normal);
    }

    #[test]
    fn large_cluster_is_high() {
        let a = assess_crowd(20, &[5]);
        assert_eq!(a.level, AlertLevel::High);
        assert!(a.notes.iter().any(|n| n.contains("large crowd")));
    }

    #[test]
    fn many_clusters_only_adds_note() {
        let a = assess_crowd(30, &[3, 3, 3]);
        assert_eq!(a.level, AlertLevel::Normal);
        assert_eq!(a.notes, vec!["multiple crowds: 3 clusters active"]);
    }
}
