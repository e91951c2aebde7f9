//! Game rules shared by the server and client roles.

use std::collections::BTreeSet;

use bevy_ecs::prelude::{Component, Entity, World};
use protocol::{EntityKind, EntityState, NetworkId, Vec2};
use replication::{Factories, InputSink, NetworkEntity, Position, SpawnRequest, Velocity};

pub const PLAYER1: &str = "player1";
pub const PLAYER2: &str = "player2";
pub const BULLET: &str = "bullet";
pub const ENEMY: &str = "enemy";

pub const MOVE_UP: &str = "MoveUp";
pub const MOVE_DOWN: &str = "MoveDown";
pub const MOVE_LEFT: &str = "MoveLeft";
pub const MOVE_RIGHT: &str = "MoveRight";
pub const SHOOT: &str = "Shoot";
pub const ACTIONS: [&str; 5] = [MOVE_UP, MOVE_DOWN, MOVE_LEFT, MOVE_RIGHT, SHOOT];

pub const WORLD_SIZE: Vec2 = Vec2::new(800.0, 600.0);
pub const MOVE_SPEED: f32 = 300.0;
pub const BULLET_VELOCITY: Vec2 = Vec2::new(500.0, 0.0);
pub const ENEMY_VELOCITY: Vec2 = Vec2::new(-10.0, 0.0);
pub const PLAYER1_START: Vec2 = Vec2::new(150.0, 150.0);
pub const PLAYER2_START: Vec2 = Vec2::new(150.0, 250.0);

/// Enemies appear at a random point inside this rectangle.
pub const ENEMY_AREA_ORIGIN: Vec2 = Vec2::new(600.0, 0.0);
pub const ENEMY_AREA_SIZE: Vec2 = Vec2::new(100.0, 500.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Blue,
    Green,
    White,
    Red,
}

/// What a renderer would draw. Positions are the top-left corner.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub size: Vec2,
    pub color: Color,
}

impl Sprite {
    const fn new(width: f32, height: f32, color: Color) -> Self {
        Self {
            size: Vec2::new(width, height),
            color,
        }
    }
}

fn player1(world: &mut World, _state: &EntityState) -> Entity {
    world.spawn(Sprite::new(40.0, 40.0, Color::Blue)).id()
}

fn player2(world: &mut World, _state: &EntityState) -> Entity {
    world.spawn(Sprite::new(40.0, 40.0, Color::Green)).id()
}

fn bullet(world: &mut World, _state: &EntityState) -> Entity {
    world.spawn(Sprite::new(10.0, 2.0, Color::White)).id()
}

fn enemy(world: &mut World, _state: &EntityState) -> Entity {
    world.spawn(Sprite::new(20.0, 20.0, Color::Red)).id()
}

#[must_use]
pub fn factories() -> Factories {
    Factories::new()
        .with(PLAYER1, player1)
        .with(PLAYER2, player2)
        .with(BULLET, bullet)
        .with(ENEMY, enemy)
}

/// Handshake hash over the demo's kinds and actions.
#[must_use]
pub fn protocol_hash() -> u64 {
    let factories = factories();
    protocol::protocol_hash(factories.kinds().map(EntityKind::as_str), ACTIONS)
}

/// Moves every entity by its velocity. Players stay inside the world.
pub fn advance(world: &mut World, dt: f32) {
    let mut moving = world.query::<(&mut Position, &Velocity, Option<&NetworkEntity>, &Sprite)>();
    for (mut position, velocity, network, sprite) in moving.iter_mut(world) {
        if velocity.0.is_zero() {
            continue;
        }
        let mut next = position.0 + velocity.0 * dt;
        if network.is_some_and(|n| is_player(&n.kind)) {
            next.x = next.x.clamp(0.0, WORLD_SIZE.x - sprite.size.x);
            next.y = next.y.clamp(0.0, WORLD_SIZE.y - sprite.size.y);
        }
        position.0 = next;
    }
}

fn is_player(kind: &EntityKind) -> bool {
    matches!(kind.as_str(), PLAYER1 | PLAYER2)
}

/// Bullets and enemies that have left the world.
#[must_use]
pub fn offscreen(world: &mut World) -> Vec<NetworkId> {
    let mut query = world.query::<(&NetworkEntity, &Position, &Sprite)>();
    let mut gone: Vec<NetworkId> = query
        .iter(world)
        .filter(|(network, _, _)| !is_player(&network.kind))
        .filter(|(_, position, sprite)| !overlaps(position.0, sprite.size, Vec2::ZERO, WORLD_SIZE))
        .map(|(network, _, _)| network.id)
        .collect();
    gone.sort();
    gone
}

/// Bullet/enemy pairs that touch. Each entity appears at most once.
#[must_use]
pub fn collisions(world: &mut World) -> Vec<NetworkId> {
    let mut query = world.query::<(&NetworkEntity, &Position, &Sprite)>();
    let mut bullets = Vec::new();
    let mut enemies = Vec::new();
    for (network, position, sprite) in query.iter(world) {
        match network.kind.as_str() {
            BULLET => bullets.push((network.id, position.0, sprite.size)),
            ENEMY => enemies.push((network.id, position.0, sprite.size)),
            _ => {}
        }
    }
    bullets.sort_by_key(|(id, _, _)| *id);
    enemies.sort_by_key(|(id, _, _)| *id);

    let mut hit = Vec::new();
    let mut used = vec![false; enemies.len()];
    for (bullet_id, bullet_pos, bullet_size) in bullets {
        let target = enemies.iter().enumerate().find(|(index, (_, pos, size))| {
            !used[*index] && overlaps(bullet_pos, bullet_size, *pos, *size)
        });
        if let Some((index, (enemy_id, _, _))) = target {
            used[index] = true;
            hit.push(bullet_id);
            hit.push(*enemy_id);
        }
    }
    hit
}

fn overlaps(a_pos: Vec2, a_size: Vec2, b_pos: Vec2, b_size: Vec2) -> bool {
    a_pos.x < b_pos.x + b_size.x
        && b_pos.x < a_pos.x + a_size.x
        && a_pos.y < b_pos.y + b_size.y
        && b_pos.y < a_pos.y + a_size.y
}

/// Applies inputs to the player an input source controls.
///
/// Move actions are tracked per target and velocity is recomputed from
/// every move still held, so opposite keys cancel instead of clobbering.
#[derive(Debug, Default)]
pub struct DemoSink {
    moving: BTreeSet<(NetworkId, String)>,
}

impl DemoSink {
    /// Drops the held moves of a target that no longer exists.
    pub fn forget(&mut self, target: NetworkId) {
        self.moving.retain(|(id, _)| *id != target);
    }

    fn steer(&self, world: &mut World, entity: Entity, target: NetworkId) {
        let held = |action: &str| {
            f32::from(u8::from(
                self.moving.contains(&(target, action.to_owned())),
            ))
        };
        let direction = Vec2::new(
            held(MOVE_RIGHT) - held(MOVE_LEFT),
            held(MOVE_DOWN) - held(MOVE_UP),
        );
        if let Some(mut velocity) = world.get_mut::<Velocity>(entity) {
            velocity.0 = direction * MOVE_SPEED;
        }
    }
}

fn is_move(action: &str) -> bool {
    matches!(action, MOVE_UP | MOVE_DOWN | MOVE_LEFT | MOVE_RIGHT)
}

impl InputSink for DemoSink {
    fn action_begin(
        &mut self,
        world: &mut World,
        entity: Entity,
        target: NetworkId,
        action: &str,
    ) -> Vec<SpawnRequest> {
        if action == SHOOT {
            let Some(position) = world.get::<Position>(entity).map(|p| p.0) else {
                return Vec::new();
            };
            let size = world
                .get::<Sprite>(entity)
                .map_or(Vec2::ZERO, |sprite| sprite.size);
            let muzzle = position + Vec2::new(size.x, size.y / 2.0 - 1.0);
            return vec![SpawnRequest {
                kind: EntityKind::from(BULLET),
                state: EntityState::at(muzzle).with_velocity(BULLET_VELOCITY),
                owner: Some(target),
            }];
        }
        if is_move(action) {
            self.moving.insert((target, action.to_owned()));
            self.steer(world, entity, target);
        }
        Vec::new()
    }

    fn action_end(&mut self, world: &mut World, entity: Entity, target: NetworkId, action: &str) {
        if is_move(action) && self.moving.remove(&(target, action.to_owned())) {
            self.steer(world, entity, target);
        }
    }
}

/// Small deterministic generator for enemy placement.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }

    /// Uniform value in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Random point inside the rectangle at `origin` with `size`.
    pub fn point_in(&mut self, origin: Vec2, size: Vec2) -> Vec2 {
        Vec2::new(origin.x + self.unit() * size.x, origin.y + self.unit() * size.y)
    }
}
