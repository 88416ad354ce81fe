use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

/// RandMode controls generator behaviour: predictable for testing,
/// uniform for gameplay.
pub enum RandMode {
    Predictable,
    RandomUniform,
}

pub struct VmRand {
    rng: Box<dyn RngCore>,
    rand_mode: RandMode,
}

impl VmRand {
    pub fn new(rm: RandMode) -> VmRand {
        VmRand {
            rng: Box::new(rand::thread_rng()),
            rand_mode: rm,
        }
    }

    pub fn new_uniform() -> VmRand {
        VmRand::new(RandMode::RandomUniform)
    }

    pub fn new_predictable(seed: u64) -> VmRand {
        VmRand {
            rng: Box::new(StdRng::seed_from_u64(seed)),
            rand_mode: RandMode::Predictable,
        }
    }

    /// bounded generates a value in [0, max] inclusive.
    ///
    /// Inclusivity matters: timer jitter uses the result directly, while
    /// the stack-random opcode adjusts by one at its own call site. Keep
    /// the off-by-one handling with the callers.
    pub fn bounded(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.rng.gen_range(0..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_is_inclusive() {
        let mut rng = VmRand::new_predictable(1234);
        let mut seen_max = false;
        for _ in 0..200 {
            let v = rng.bounded(3);
            assert!(v <= 3);
            if v == 3 {
                seen_max = true;
            }
        }
        assert!(seen_max, "inclusive upper bound never produced");
    }

    #[test]
    fn test_bounded_zero() {
        let mut rng = VmRand::new_predictable(1);
        assert_eq!(rng.bounded(0), 0);
    }
}
