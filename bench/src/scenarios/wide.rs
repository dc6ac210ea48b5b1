//! Layers of unordered systems with random data access.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_schedule::ecs::{
    ComponentId, FunctionSystem, IntoNodeConfigs, Schedule, SystemSet, World,
    schedule::ScheduleBuildError,
};

use crate::scenarios::Scenario;

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Layer(usize);

/// `layers` chained sets of `width` unordered systems each. Every system reads or writes a few
/// of `components` component ids, picked with a fixed seed.
#[derive(Debug, Clone, Copy)]
pub struct WideScenario {
    pub layers: usize,
    pub width: usize,
    pub components: usize,
    pub seed: u64,
}

impl WideScenario {
    pub fn new(layers: usize, width: usize) -> Self {
        Self {
            layers,
            width,
            components: 32,
            seed: 42,
        }
    }
}

impl Scenario for WideScenario {
    fn name(&self) -> &'static str {
        "wide"
    }

    fn description(&self) -> &'static str {
        "chained layers of unordered systems with random component access"
    }

    fn system_count(&self) -> usize {
        self.layers * self.width
    }

    fn populate(&self, schedule: &mut Schedule) -> Result<(), ScheduleBuildError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        for layer in 0..self.layers {
            if layer > 0 {
                schedule.configure_sets(Layer(layer).after(Layer(layer - 1)))?;
            }
            for column in 0..self.width {
                let reads = (0..3)
                    .map(|_| ComponentId::from(rng.gen_range(0..self.components)))
                    .collect::<Vec<_>>();
                let write = rng
                    .gen_bool(0.5)
                    .then(|| ComponentId::from(rng.gen_range(0..self.components)));
                let system = FunctionSystem::parallel(
                    format!("layer_{layer}_system_{column}"),
                    |_: &World| {},
                )
                .with_access(move |access| {
                    for id in reads {
                        access.add_unfiltered_component_read(id);
                    }
                    if let Some(id) = write {
                        access.add_unfiltered_component_write(id);
                    }
                });
                schedule.add_systems(system.in_set(Layer(layer)))?;
            }
        }
        Ok(())
    }
}
