use cucumber::given;

use crate::cucumber::{world::PharmacySystem, PharmacyWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut PharmacyWorld) {
    let system = PharmacySystem::new().await;
    world.system = Some(system);
}
