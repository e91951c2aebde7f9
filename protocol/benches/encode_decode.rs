use criterion::{black_box, criterion_group, criterion_main, Criterion};
use protocol::{
    decode_message, encode_message, EntityDelta, EntityKind, EntitySnapshot, EntityState,
    Message, NetworkId, Vec2,
};
use wire::Limits;

fn spawn_message() -> Message {
    Message::Spawn(EntitySnapshot {
        id: NetworkId::new(1234).unwrap(),
        kind: EntityKind::from("enemy"),
        owner: None,
        state: EntityState::at(Vec2::new(640.0, 320.0)).with_velocity(Vec2::new(-10.0, 0.0)),
    })
}

fn delta_message() -> Message {
    let old = EntityState::at(Vec2::new(640.0, 320.0)).with_velocity(Vec2::new(-10.0, 0.0));
    let new = EntityState::at(Vec2::new(639.8, 320.0)).with_velocity(Vec2::new(-10.0, 0.0));
    Message::Delta(EntityDelta::between(NetworkId::new(1234).unwrap(), &old, &new).unwrap())
}

fn bench_messages(c: &mut Criterion) {
    let limits = Limits::default();
    for (name, message) in [("spawn", spawn_message()), ("delta", delta_message())] {
        let bytes = encode_message(&message, &limits).unwrap();
        c.bench_function(&format!("encode_{name}"), |b| {
            b.iter(|| encode_message(black_box(&message), &limits).unwrap());
        });
        c.bench_function(&format!("decode_{name}"), |b| {
            b.iter(|| decode_message(black_box(&bytes), &limits).unwrap());
        });
    }
}

criterion_group!(benches, bench_messages);
criterion_main!(benches);
