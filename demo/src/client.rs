//! Mirroring side of the demo.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use bevy_ecs::prelude::World;
use log::{debug, info, warn};
use replication::{
    apply_inbound, read_state, spawn, ConnectionId, ConnectionState, EntityRegistry, Factories,
    InputSender, Role, SessionConfig, SessionManager,
};
use transport::Link;

use crate::capture::Capture;
use crate::command::{self, Command};
use crate::config::DemoConfig;
use crate::game::{self, Sprite};

/// Client world mirrored from one server connection.
pub struct ClientGame {
    session: SessionManager,
    connection: ConnectionId,
    world: World,
    registry: EntityRegistry,
    factories: Factories,
    input: InputSender,
}

impl ClientGame {
    pub fn new(link: Box<dyn Link>, config: &DemoConfig) -> Self {
        let session_config = SessionConfig::new(game::protocol_hash()).with_limits(config.limits());
        let mut session = SessionManager::new(session_config);
        session.on_connected(|connection| info!("{connection}: joined server"));
        session.on_disconnected(|connection| info!("{connection}: left server"));
        let connection = session.add_link(link, Role::Client);
        Self {
            session,
            connection,
            world: World::new(),
            registry: EntityRegistry::new(),
            factories: game::factories(),
            input: InputSender::new(connection, game::ACTIONS),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub const fn world(&self) -> &World {
        &self.world
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.session.state(self.connection)
    }

    /// Drains the connection and applies world traffic. Returns `false` once
    /// the connection has closed, after clearing every mirror.
    pub fn tick(&mut self) -> bool {
        let inbound = self.session.poll();
        apply_inbound(&mut self.world, &mut self.registry, &self.factories, &inbound);
        if self.state() == ConnectionState::Closed {
            let cleared = spawn::clear_mirrors(&mut self.world, &mut self.registry);
            debug!("cleared {cleared} mirrors");
            return false;
        }
        true
    }

    /// Forwards a command. Returns `false` for [`Command::Quit`].
    pub fn command(&mut self, command: &Command) -> bool {
        let sent = match command {
            Command::Begin(action) => self.input.begin(&mut self.session, action),
            Command::End(action) => self.input.end(&mut self.session, action),
            Command::Press(action) => self.input.press(&mut self.session, action),
            Command::Quit => {
                self.session.close(self.connection);
                return false;
            }
        };
        match sent {
            Ok(true) => {}
            Ok(false) => debug!("{command:?} ignored"),
            Err(err) => warn!("{command:?} not sent: {err}"),
        }
        true
    }

    /// One log line per mirrored entity.
    pub fn report(&self) {
        info!("{} mirrored entities", self.registry.len());
        for (id, entity, kind) in self.registry.iter() {
            let Some(state) = read_state(&self.world, entity) else {
                continue;
            };
            let color = self
                .world
                .get::<Sprite>(entity)
                .map_or_else(|| "?".to_owned(), |sprite| format!("{:?}", sprite.color));
            info!(
                "  {id} {kind} {color} at ({:.1}, {:.1}) moving ({:.1}, {:.1})",
                state.position.x, state.position.y, state.velocity.x, state.velocity.y
            );
        }
    }
}

/// Connects and runs the client loop until the connection closes.
pub fn run(config: &DemoConfig, capture: Option<&Capture>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let link: Box<dyn Link> = Box::new(
        transport::connect(&addr, config.limits()).with_context(|| format!("connect to {addr}"))?,
    );
    let link = match capture {
        Some(capture) => capture.wrap(link),
        None => link,
    };
    info!("connected to {addr}; type +Action, -Action, Shoot or quit");

    let mut game = ClientGame::new(link, config);
    let commands = command::spawn_stdin_reader();
    let step = Duration::from_secs_f32(config.tick_seconds());
    let report_every = Duration::from_secs_f32(config.report_interval);
    let mut last_report = Instant::now();
    let mut joined = false;
    loop {
        for command in commands.try_iter() {
            game.command(&command);
        }
        if !game.tick() {
            break;
        }
        joined |= game.state() == ConnectionState::Open;
        if last_report.elapsed() >= report_every {
            game.report();
            last_report = Instant::now();
        }
        std::thread::sleep(step);
    }

    if !joined {
        bail!("{addr} closed the connection during the handshake");
    }
    info!("disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerGame;
    use transport::MemoryLink;
    use wire::Limits;

    const DT: f32 = 1.0 / 60.0;

    fn config() -> DemoConfig {
        DemoConfig {
            max_frame_bytes: Limits::for_testing().max_frame_bytes,
            ..DemoConfig::default()
        }
    }

    fn pair() -> (ServerGame, ClientGame) {
        let mut server = ServerGame::new(&config());
        let (a, b) = MemoryLink::pair(config().limits());
        server.add_link(Box::new(a));
        let client = ClientGame::new(Box::new(b), &config());
        (server, client)
    }

    fn settle(server: &mut ServerGame, client: &mut ClientGame) {
        for _ in 0..3 {
            server.tick(DT);
            client.tick();
        }
    }

    #[test]
    fn client_mirrors_players() {
        let (mut server, mut client) = pair();
        settle(&mut server, &mut client);

        assert_eq!(client.state(), ConnectionState::Open);
        let player1 = client
            .registry()
            .iter()
            .find(|(_, _, kind)| kind.as_str() == game::PLAYER1)
            .map(|(_, entity, _)| entity)
            .unwrap();
        assert_eq!(
            read_state(client.world(), player1).map(|s| s.position),
            Some(game::PLAYER1_START)
        );
    }

    #[test]
    fn held_move_shows_up_in_mirror() {
        let (mut server, mut client) = pair();
        settle(&mut server, &mut client);

        assert!(client.command(&Command::Begin(game::MOVE_UP.into())));
        settle(&mut server, &mut client);
        let (_, player2, _) = client
            .registry()
            .iter()
            .find(|(_, _, kind)| kind.as_str() == game::PLAYER2)
            .unwrap();
        let state = read_state(client.world(), player2).unwrap();
        assert_eq!(state.velocity.y, -game::MOVE_SPEED);
        assert!(state.position.y < game::PLAYER2_START.y);

        client.command(&Command::End(game::MOVE_UP.into()));
        settle(&mut server, &mut client);
        assert_eq!(read_state(client.world(), player2).unwrap().velocity.y, 0.0);
    }

    #[test]
    fn quit_clears_mirrors() {
        let (mut server, mut client) = pair();
        settle(&mut server, &mut client);
        assert!(!client.registry().is_empty());

        assert!(!client.command(&Command::Quit));
        assert!(!client.tick());
        assert!(client.registry().is_empty());
    }

    #[test]
    fn server_shutdown_ends_client() {
        let (mut server, mut client) = pair();
        settle(&mut server, &mut client);

        server.shutdown();
        assert!(!client.tick());
        assert_eq!(client.state(), ConnectionState::Closed);
    }
}
