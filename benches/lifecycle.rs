use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slash_ecs::World;

#[derive(Debug, Clone, Copy)]
struct Position(u32);

#[derive(Debug, Clone, Copy)]
struct Velocity(u32);

fn populated_world(count: u32) -> World {
    let mut world = World::new();
    for i in 0..count {
        let entity = world.create_entity().unwrap();
        world.add_component(entity, Position(i)).unwrap();
        if i % 2 == 0 {
            world.add_component(entity, Velocity(i)).unwrap();
        }
    }
    world.drain_events();
    world
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("Entity lifecycle");

    group.bench_function("create + attach 10k", |b| {
        b.iter(|| black_box(populated_world(10_000)));
    });

    group.bench_function("mark + flush 10k", |b| {
        b.iter_batched(
            || populated_world(10_000),
            |mut world| {
                for entity in world.all_entities() {
                    world.mark_for_removal(entity).unwrap();
                }
                black_box(world.flush_removals());
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.bench_function("deactivate + activate 10k", |b| {
        b.iter_batched(
            || populated_world(10_000),
            |mut world| {
                let entities = world.all_entities();
                for &entity in &entities {
                    world.deactivate(entity).unwrap();
                }
                for &entity in &entities {
                    world.activate(entity).unwrap();
                }
                black_box(world.count());
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.bench_function("iterate Position", |b| {
        let world = populated_world(10_000);
        b.iter(|| {
            let mut sum = 0u64;
            for (_, position) in world.iter_components::<Position>() {
                sum += position.0 as u64;
            }
            black_box(sum);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_lifecycle);
criterion_main!(benches);
