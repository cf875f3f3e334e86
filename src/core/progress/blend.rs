// ─── Weighted progress blending ───
// overall = Σ weight × stage percent, rounded.

/// One phase of a job and how much of the overall bar it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: &'static str,
    pub weight: f64,
    pub reported_percent: f64,
}

impl Stage {
    pub fn new(name: &'static str, weight: f64) -> Self {
        Self {
            name,
            weight,
            reported_percent: 0.0,
        }
    }
}

/// Blend stage percentages into a single 0–100 value.
pub fn overall(stages: &[Stage]) -> u8 {
    let blended: f64 = stages
        .iter()
        .map(|stage| stage.weight * stage.reported_percent.clamp(0.0, 100.0))
        .sum();
    blended.round().clamp(0.0, 100.0) as u8
}

/// Tracks the stages of a running job.
///
/// Reporting on stage `i` saturates every earlier stage, and the returned value
/// never drops below the highest one handed out so far.
#[derive(Debug, Clone)]
pub struct ProgressBlender {
    stages: Vec<Stage>,
    high_water: u8,
}

impl ProgressBlender {
    pub fn new(plan: &[(&'static str, f64)]) -> Self {
        debug_assert!(
            (plan.iter().map(|(_, w)| w).sum::<f64>() - 1.0).abs() < 1e-9,
            "stage weights must sum to 1.0"
        );
        Self {
            stages: plan.iter().map(|(name, w)| Stage::new(*name, *w)).collect(),
            high_water: 0,
        }
    }

    pub fn report(&mut self, index: usize, percent: f64) -> u8 {
        if let Some(stage) = self.stages.get_mut(index) {
            stage.reported_percent = percent.clamp(0.0, 100.0);
        }
        for earlier in self.stages.iter_mut().take(index) {
            earlier.reported_percent = 100.0;
        }

        self.high_water = overall(&self.stages).max(self.high_water);
        self.high_water
    }

    pub fn stage_name(&self, index: usize) -> Option<&'static str> {
        self.stages.get(index).map(|stage| stage.name)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: [(&str, f64); 2] = [("copy", 0.3), ("compress", 0.7)];

    #[test]
    fn overall_is_weighted_sum() {
        let stages = vec![
            Stage {
                name: "copy",
                weight: 0.3,
                reported_percent: 100.0,
            },
            Stage {
                name: "compress",
                weight: 0.7,
                reported_percent: 50.0,
            },
        ];
        assert_eq!(overall(&stages), 65);
    }

    #[test]
    fn overall_clamps_out_of_range_stage_values() {
        let stages = vec![Stage {
            name: "extract",
            weight: 1.0,
            reported_percent: 180.0,
        }];
        assert_eq!(overall(&stages), 100);
    }

    #[test]
    fn copy_then_compress_never_regresses() {
        let mut blender = ProgressBlender::new(&EXPORT);
        let mut seen = vec![blender.report(0, 0.0)];
        for completed in 1..=3 {
            seen.push(blender.report(0, completed as f64 / 3.0 * 100.0));
        }
        for percent in [0.0, 12.0, 11.0, 57.0, 100.0] {
            seen.push(blender.report(1, percent));
        }

        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen[3], 30);
        assert_eq!(*seen.last().unwrap(), 100);
    }

    #[test]
    fn later_stage_saturates_earlier_ones() {
        let mut blender = ProgressBlender::new(&EXPORT);
        blender.report(0, 10.0);
        assert_eq!(blender.report(1, 0.0), 30);
        assert_eq!(blender.stages()[0].reported_percent, 100.0);
        assert_eq!(blender.stage_name(1), Some("compress"));
    }
}
