//! Headless demonstration of the tessera entity store.
//!
//! Spawns a handful of moving entities, runs a movement processor for a
//! fixed number of frames, and dispatches a named event per frame.

use anyhow::Result;
use rand::Rng;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tessera_ecs::{Entity, Processor, Schedule, World};
use tessera_events::EventBus;

#[derive(Debug)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug)]
struct Velocity {
    dx: f32,
    dy: f32,
}

struct Movement;

impl Processor for Movement {
    fn process(&mut self, world: &mut World) {
        // snapshot the velocities first, then write positions
        let moves: Vec<(Entity, (f32, f32))> = world
            .get_components::<(Position, Velocity)>()
            .into_iter()
            .map(|(entity, (_, velocity))| (entity, (velocity.dx, velocity.dy)))
            .collect();
        for (entity, (dx, dy)) in moves {
            if let Ok(position) = world.component_for_entity_mut::<Position>(entity) {
                position.x += dx;
                position.y += dy;
            }
        }
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut world = World::new();
    let mut rng = rand::thread_rng();
    for _ in 0..5 {
        world.spawn_with((
            Position {
                x: rng.gen_range(0.0..100.0),
                y: rng.gen_range(0.0..100.0),
            },
            Velocity {
                dx: rng.gen_range(-1.0..1.0),
                dy: rng.gen_range(-1.0..1.0),
            },
        ));
    }

    let mut schedule = Schedule::new();
    schedule.add_processor(Movement, 0);

    let mut events = EventBus::new();
    events.on::<u64>("frame", |frame| info!(frame, "frame complete"));

    for frame in 0u64..10 {
        schedule.run(&mut world);
        events.dispatch("frame", &frame);
    }

    for (entity, position) in world.get_component::<Position>() {
        info!(%entity, x = position.x, y = position.y, "final position");
    }

    Ok(())
}
