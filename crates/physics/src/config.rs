use glam::Vec3;

/// Rule for combining a material coefficient of two touching bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineRule {
    Minimum,
    Maximum,
    #[default]
    Average,
}

impl CombineRule {
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            CombineRule::Minimum => a.min(b),
            CombineRule::Maximum => a.max(b),
            CombineRule::Average => (a + b) * 0.5,
        }
    }
}

/// Tunables for the contact solver and frame orchestration
#[derive(Debug, Clone, Copy)]
pub struct PhysicsConfig {
    /// Upper bound on solver passes per body per tick
    pub solver_iterations: u32,
    /// Maximum displacement magnitude a body may take in one tick
    pub max_step: f32,
    /// Exponential air-drag coefficient applied to velocity each tick
    pub air_drag: f32,
    /// Rebound speed below which bounce is absorbed into the contact
    pub min_bounce_speed: f32,
    /// Displacement magnitude under which a body is considered at rest
    pub sleep_epsilon: f32,
    /// Ticks a disturbed body stays awake after its last disturbance
    pub awake_frames: u32,
    /// Outward padding applied to awake-box registrations
    pub awake_box_padding: f32,
    /// Frames a collision couple may wait unrefreshed before it is dropped
    pub couple_stale_frames: u32,
    /// Per-axis slack absorbing floating-point boundary error in sweeps
    pub contact_epsilon: f32,
    /// Outward epsilon for trigger overlap queries, so triggers fire one
    /// frame before the hard solver would
    pub trigger_epsilon: f32,
    /// Sweep ratios closer to 1 than this snap to exactly 1
    pub ratio_snap: f32,
    /// Position delta under which a tick reports `Stayed`
    pub move_epsilon: f32,
    /// How two bodies' friction coefficients merge at a contact
    pub friction_combine: CombineRule,
    /// How two bodies' bounciness coefficients merge at a contact
    pub bounce_combine: CombineRule,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            solver_iterations: 8,
            max_step: 10.0,
            air_drag: 0.05,
            min_bounce_speed: 0.5,
            sleep_epsilon: 1e-4,
            awake_frames: 10,
            awake_box_padding: 0.25,
            couple_stale_frames: 4,
            contact_epsilon: 1e-3,
            trigger_epsilon: 0.01,
            ratio_snap: 1e-4,
            move_epsilon: 1e-5,
            friction_combine: CombineRule::Average,
            bounce_combine: CombineRule::Average,
        }
    }
}

impl PhysicsConfig {
    /// Contact epsilon replicated on all three axes
    pub(crate) fn contact_eps_vec(&self) -> Vec3 {
        Vec3::splat(self.contact_epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_rules() {
        assert_eq!(CombineRule::Minimum.apply(0.2, 0.8), 0.2);
        assert_eq!(CombineRule::Maximum.apply(0.2, 0.8), 0.8);
        assert_eq!(CombineRule::Average.apply(0.2, 0.8), 0.5);
    }

    #[test]
    fn test_default_config_is_sane() {
        let config = PhysicsConfig::default();
        assert!(config.solver_iterations > 0);
        assert!(config.max_step > 0.0);
        assert!(config.couple_stale_frames > 0);
        assert!(config.trigger_epsilon > config.ratio_snap);
    }
}
