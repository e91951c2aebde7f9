//! Authoritative side of the demo.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bevy_ecs::prelude::World;
use log::{debug, info, warn};
use protocol::{EntityKind, EntityState, InputEdge, Message, NetworkId};
use replication::{
    spawn, state, ConnectionId, EntityRegistry, Factories, InputReceiver, InputSink, Role,
    SessionConfig, SessionEvent, SessionManager, SpawnRequest,
};
use transport::{Link, Listener};

use crate::capture::Capture;
use crate::command::{self, Command};
use crate::config::DemoConfig;
use crate::game::{self, DemoSink, Rng};

/// The two players created for a connection. The host steers `first`,
/// the connection steers `second`.
#[derive(Debug, Clone, Copy)]
struct Players {
    first: NetworkId,
    second: NetworkId,
}

/// Server world plus everything needed to replicate it.
pub struct ServerGame {
    session: SessionManager,
    world: World,
    registry: EntityRegistry,
    factories: Factories,
    inputs: InputReceiver,
    sink: DemoSink,
    players: BTreeMap<ConnectionId, Players>,
    /// Actions the host is holding on every `player1`.
    host_held: BTreeSet<String>,
    rng: Rng,
    enemy_interval: f32,
    enemy_timer: f32,
}

impl ServerGame {
    #[must_use]
    pub fn new(config: &DemoConfig) -> Self {
        let session_config = SessionConfig::new(game::protocol_hash()).with_limits(config.limits());
        let mut session = SessionManager::new(session_config);
        session.on_connected(|connection| info!("{connection}: client connected"));
        session.on_disconnected(|connection| info!("{connection}: client disconnected"));
        Self {
            session,
            world: World::new(),
            registry: EntityRegistry::new(),
            factories: game::factories(),
            inputs: InputReceiver::new(game::ACTIONS),
            sink: DemoSink::default(),
            players: BTreeMap::new(),
            host_held: BTreeSet::new(),
            rng: Rng::new(config.seed),
            enemy_interval: config.enemy_interval,
            enemy_timer: 0.0,
        }
    }

    pub fn add_link(&mut self, link: Box<dyn Link>) -> ConnectionId {
        let connection = self.session.add_link(link, Role::Server);
        debug!("{connection}: accepted");
        connection
    }

    #[cfg(test)]
    pub const fn world(&self) -> &World {
        &self.world
    }

    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Player controlled by `connection`.
    #[cfg(test)]
    pub fn controlled(&self, connection: ConnectionId) -> Option<NetworkId> {
        self.inputs.target(connection)
    }

    /// Runs one fixed step of `dt` seconds.
    ///
    /// Joins are handled before inputs and leaves after them, so input a
    /// client sent just before disconnecting still takes effect.
    pub fn tick(&mut self, dt: f32) {
        let inbound = self.session.poll();
        let mut left = Vec::new();
        for event in self.session.drain_events() {
            match event {
                SessionEvent::Connected(connection) => self.join(connection),
                SessionEvent::Disconnected(connection) => left.push(connection),
            }
        }

        let mut requests = Vec::new();
        for item in inbound {
            if let Message::Input(event) = &item.message {
                requests.extend(self.inputs.on_input(
                    &mut self.world,
                    &self.registry,
                    &mut self.sink,
                    item.connection,
                    event,
                ));
            }
        }
        for connection in left {
            self.leave(connection);
        }
        for request in requests {
            self.spawn_request(request);
        }

        self.enemy_timer += dt;
        while self.enemy_timer >= self.enemy_interval {
            self.enemy_timer -= self.enemy_interval;
            if self.session.open_connections().is_empty() {
                continue;
            }
            let at = self
                .rng
                .point_in(game::ENEMY_AREA_ORIGIN, game::ENEMY_AREA_SIZE);
            self.spawn_request(SpawnRequest {
                kind: EntityKind::from(game::ENEMY),
                state: EntityState::at(at).with_velocity(game::ENEMY_VELOCITY),
                owner: None,
            });
        }

        game::advance(&mut self.world, dt);
        let mut gone = game::offscreen(&mut self.world);
        gone.extend(game::collisions(&mut self.world));
        for id in gone {
            spawn::despawn(&mut self.session, &mut self.world, &mut self.registry, id);
        }

        state::tick(&mut self.session, &self.world, &self.registry);
    }

    /// Applies a console command to every `player1`. Returns `false` for
    /// [`Command::Quit`].
    pub fn host_command(&mut self, command: &Command) -> bool {
        match command {
            Command::Begin(action) => self.host_edge(action, InputEdge::Begin),
            Command::End(action) => self.host_edge(action, InputEdge::End),
            Command::Press(action) => {
                self.host_edge(action, InputEdge::Begin);
                self.host_edge(action, InputEdge::End);
            }
            Command::Quit => return false,
        }
        true
    }

    fn host_edge(&mut self, action: &str, edge: InputEdge) {
        if !game::ACTIONS.contains(&action) {
            debug!("host: unknown action `{action}`");
            return;
        }
        let changed = match edge {
            InputEdge::Begin => self.host_held.insert(action.to_owned()),
            InputEdge::End => self.host_held.remove(action),
        };
        if !changed {
            return;
        }
        let targets: Vec<NetworkId> = self.players.values().map(|players| players.first).collect();
        for target in targets {
            self.host_apply(target, action, edge);
        }
    }

    fn host_apply(&mut self, target: NetworkId, action: &str, edge: InputEdge) {
        let Some(entity) = self.registry.entity(target) else {
            return;
        };
        match edge {
            InputEdge::Begin => {
                let requests = self.sink.action_begin(&mut self.world, entity, target, action);
                for request in requests {
                    self.spawn_request(request);
                }
            }
            InputEdge::End => self.sink.action_end(&mut self.world, entity, target, action),
        }
    }

    /// Closes every connection. The next tick reports them disconnected.
    pub fn shutdown(&mut self) {
        self.session.close_all();
    }

    fn join(&mut self, connection: ConnectionId) {
        match spawn::spawn_existing(&mut self.session, connection, &self.world, &self.registry) {
            Ok(sent) => debug!("{connection}: sent {sent} existing entities"),
            Err(err) => warn!("{connection}: catch-up failed: {err}"),
        }
        let first = self.spawn_request(SpawnRequest {
            kind: EntityKind::from(game::PLAYER1),
            state: EntityState::at(game::PLAYER1_START),
            owner: None,
        });
        let second = self.spawn_request(SpawnRequest {
            kind: EntityKind::from(game::PLAYER2),
            state: EntityState::at(game::PLAYER2_START),
            owner: None,
        });
        let (Some(first), Some(second)) = (first, second) else {
            return;
        };
        self.inputs.bind(connection, second);
        self.players.insert(connection, Players { first, second });
        info!("{connection}: controls {second}, host controls {first}");

        let held: Vec<String> = self
            .host_held
            .iter()
            .filter(|action| action.as_str() != game::SHOOT)
            .cloned()
            .collect();
        for action in held {
            self.host_apply(first, &action, InputEdge::Begin);
        }
    }

    fn leave(&mut self, connection: ConnectionId) {
        self.inputs.release_connection(
            &mut self.world,
            &self.registry,
            &mut self.sink,
            connection,
        );
        if let Some(players) = self.players.remove(&connection) {
            for id in [players.first, players.second] {
                self.sink.forget(id);
                spawn::despawn(&mut self.session, &mut self.world, &mut self.registry, id);
            }
        }
    }

    fn spawn_request(&mut self, request: SpawnRequest) -> Option<NetworkId> {
        let SpawnRequest { kind, state, owner } = request;
        let entity = match self.factories.build(&mut self.world, &kind, &state) {
            Ok(entity) => entity,
            Err(err) => {
                warn!("spawn of {kind} dropped: {err}");
                return None;
            }
        };
        let registered = spawn::register(&mut self.world, &mut self.registry, entity, kind.clone(), owner)
            .and_then(|_| {
                spawn::spawn_all(&mut self.session, &mut self.world, &mut self.registry, entity, &kind)
            });
        match registered {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("spawn of {kind} dropped: {err}");
                self.world.despawn(entity);
                None
            }
        }
    }
}

/// Binds the port and runs the server loop until `quit` is typed.
pub fn run(config: &DemoConfig, capture: Option<&Capture>) -> Result<()> {
    let listener = Listener::bind(("0.0.0.0", config.port), config.limits())
        .with_context(|| format!("bind port {}", config.port))?;
    let acceptor = listener.spawn_acceptor().context("start acceptor")?;
    info!("listening on {}", acceptor.local_addr());

    let mut game = ServerGame::new(config);
    let commands = command::spawn_stdin_reader();
    let dt = config.tick_seconds();
    let step = Duration::from_secs_f32(dt);
    let report_every = Duration::from_secs_f32(config.report_interval);
    let mut last_report = Instant::now();
    let mut next = Instant::now();
    loop {
        while let Some(link) = acceptor.try_accept() {
            let link: Box<dyn Link> = Box::new(link);
            game.add_link(match capture {
                Some(capture) => capture.wrap(link),
                None => link,
            });
        }
        if !commands.try_iter().all(|command| game.host_command(&command)) {
            info!("shutting down");
            game.shutdown();
            game.tick(dt);
            return Ok(());
        }
        game.tick(dt);
        if last_report.elapsed() >= report_every {
            info!(
                "{} clients, {} entities",
                game.session().open_connections().len(),
                game.registry().len()
            );
            last_report = Instant::now();
        }

        next += step;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replication::{read_state, NetworkEntity};
    use transport::MemoryLink;
    use wire::Limits;

    const DT: f32 = 1.0 / 60.0;

    fn config() -> DemoConfig {
        DemoConfig {
            max_frame_bytes: Limits::for_testing().max_frame_bytes,
            ..DemoConfig::default()
        }
    }

    /// Server plus a raw client session that answers the handshake.
    fn connected() -> (ServerGame, SessionManager, ConnectionId) {
        let mut server = ServerGame::new(&config());
        let (a, b) = MemoryLink::pair(config().limits());
        server.add_link(Box::new(a));
        let mut client = SessionManager::new(
            SessionConfig::new(game::protocol_hash()).with_limits(config().limits()),
        );
        let connection = client.add_link(Box::new(b), Role::Client);
        for _ in 0..2 {
            server.tick(DT);
            client.poll();
        }
        (server, client, connection)
    }

    fn count(server: &ServerGame, kind: &str) -> usize {
        server
            .registry()
            .iter()
            .filter(|(_, _, k)| k.as_str() == kind)
            .count()
    }

    #[test]
    fn connection_gets_two_players() {
        let (server, _client, _) = connected();
        assert_eq!(count(&server, game::PLAYER1), 1);
        assert_eq!(count(&server, game::PLAYER2), 1);

        let connection = server.session().open_connections()[0];
        let controlled = server.controlled(connection).unwrap();
        assert_eq!(
            server.registry().kind(controlled).map(EntityKind::as_str),
            Some(game::PLAYER2)
        );
    }

    #[test]
    fn enemies_spawn_every_interval() {
        let (mut server, _client, _) = connected();
        let before = count(&server, game::ENEMY);
        server.tick(1.0);
        assert_eq!(count(&server, game::ENEMY), before + 1);

        let (id, entity, _) = server
            .registry()
            .iter()
            .find(|(_, _, k)| k.as_str() == game::ENEMY)
            .unwrap();
        let state = read_state(server.world(), entity).unwrap();
        assert_eq!(state.velocity, game::ENEMY_VELOCITY);
        assert!(server.registry().contains(id));
    }

    #[test]
    fn shot_creates_owned_bullet() {
        let (mut server, mut client, connection) = connected();
        let shooter = server.controlled(server.session().open_connections()[0]).unwrap();
        client
            .send(connection, &Message::Input(protocol::InputEvent::begin(game::SHOOT)))
            .unwrap();
        server.tick(DT);

        let (_, bullet, _) = server
            .registry()
            .iter()
            .find(|(_, _, k)| k.as_str() == game::BULLET)
            .unwrap();
        let network = server.world().get::<NetworkEntity>(bullet).unwrap();
        assert_eq!(network.owner, Some(shooter));
    }

    #[test]
    fn bullets_leave_the_world() {
        let (mut server, mut client, connection) = connected();
        client
            .send(connection, &Message::Input(protocol::InputEvent::begin(game::SHOOT)))
            .unwrap();
        server.tick(DT);
        assert_eq!(count(&server, game::BULLET), 1);

        // 500 units/s from x=190 clears the 800 wide world within two seconds.
        for _ in 0..120 {
            server.tick(DT);
        }
        assert_eq!(count(&server, game::BULLET), 0);
    }

    fn player1(server: &ServerGame) -> (NetworkId, bevy_ecs::entity::Entity) {
        let (id, entity, _) = server
            .registry()
            .iter()
            .find(|(_, _, k)| k.as_str() == game::PLAYER1)
            .unwrap();
        (id, entity)
    }

    #[test]
    fn host_moves_player1_and_client_sees_it() {
        let (mut server, mut client, _) = connected();
        let (first, entity) = player1(&server);

        assert!(server.host_command(&Command::Begin(game::MOVE_UP.to_owned())));
        server.tick(DT);
        let state = read_state(server.world(), entity).unwrap();
        assert_eq!(state.velocity.y, -game::MOVE_SPEED);

        let saw_velocity = client.poll().into_iter().any(|item| match item.message {
            Message::Delta(delta) => {
                delta.id == first
                    && delta
                        .changes()
                        .any(|change| change == (protocol::Field::VelocityY, -game::MOVE_SPEED))
            }
            _ => false,
        });
        assert!(saw_velocity);

        assert!(server.host_command(&Command::End(game::MOVE_UP.to_owned())));
        server.tick(DT);
        let state = read_state(server.world(), entity).unwrap();
        assert_eq!(state.velocity.y, 0.0);
    }

    #[test]
    fn host_input_leaves_player2_alone() {
        let (mut server, _client, _) = connected();
        let connection = server.session().open_connections()[0];
        let second = server.controlled(connection).unwrap();
        let entity = server.registry().entity(second).unwrap();

        server.host_command(&Command::Begin(game::MOVE_RIGHT.to_owned()));
        server.host_command(&Command::Press("Teleport".to_owned()));
        server.tick(DT);
        let state = read_state(server.world(), entity).unwrap();
        assert_eq!(state.velocity.x, 0.0);
    }

    #[test]
    fn late_player1_picks_up_held_host_moves() {
        let mut server = ServerGame::new(&config());
        server.host_command(&Command::Begin(game::MOVE_RIGHT.to_owned()));

        let (a, b) = MemoryLink::pair(config().limits());
        server.add_link(Box::new(a));
        let mut client = SessionManager::new(
            SessionConfig::new(game::protocol_hash()).with_limits(config().limits()),
        );
        client.add_link(Box::new(b), Role::Client);
        for _ in 0..2 {
            server.tick(DT);
            client.poll();
        }

        let (_, entity) = player1(&server);
        let state = read_state(server.world(), entity).unwrap();
        assert_eq!(state.velocity.x, game::MOVE_SPEED);
    }

    #[test]
    fn quit_is_reported_to_the_loop() {
        let (mut server, _client, _) = connected();
        assert!(!server.host_command(&Command::Quit));
        server.shutdown();
        server.tick(DT);
        assert!(server.session().open_connections().is_empty());
        assert_eq!(count(&server, game::PLAYER1), 0);
    }

    #[test]
    fn no_enemies_without_clients() {
        let mut server = ServerGame::new(&config());
        server.tick(1.0);
        server.tick(1.0);
        assert_eq!(count(&server, game::ENEMY), 0);
        assert_eq!(server.registry().len(), 0);
    }

    #[test]
    fn shot_sent_before_close_still_fires() {
        let (mut server, mut client, connection) = connected();
        client
            .send(connection, &Message::Input(protocol::InputEvent::begin(game::SHOOT)))
            .unwrap();
        client.close(connection);
        server.tick(DT);

        assert_eq!(count(&server, game::BULLET), 1);
        assert_eq!(count(&server, game::PLAYER1), 0);
        assert_eq!(count(&server, game::PLAYER2), 0);
    }

    #[test]
    fn disconnect_removes_players() {
        let (mut server, mut client, connection) = connected();
        client.close(connection);
        server.tick(DT);
        server.tick(DT);

        assert_eq!(count(&server, game::PLAYER1), 0);
        assert_eq!(count(&server, game::PLAYER2), 0);
        assert!(server.session().open_connections().is_empty());
    }
}
