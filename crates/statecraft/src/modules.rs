//! Demo Modules
//!
//! Host capabilities exposed to graphs run by the CLI: a tiny player world,
//! comparison helpers and console output.

use std::sync::LazyLock;

use parking_lot::Mutex;
use tracing::info;

use statecraft_runtime::{MethodRegistry, RegistryError, module};

const MAX_HEALTH: i32 = 100;

/// Mutable state behind the `Player` module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct World {
    pub health: i32,
}

impl Default for World {
    fn default() -> Self {
        Self { health: MAX_HEALTH }
    }
}

static WORLD: LazyLock<Mutex<World>> = LazyLock::new(|| Mutex::new(World::default()));

/// Snapshot of the demo world
pub fn world() -> World {
    *WORLD.lock()
}

/// Restore the demo world to full health
pub fn reset_world() {
    *WORLD.lock() = World::default();
}

pub struct Player;

#[module(name = "Player")]
impl Player {
    /// True while the player has health left.
    #[method(name = "Player/is alive")]
    fn is_alive() -> bool {
        WORLD.lock().health > 0
    }

    #[method(name = "Player/health")]
    fn health() -> i32 {
        WORLD.lock().health
    }

    /// Lose `amount` health, never dropping below zero.
    #[method(name = "Player/damage")]
    fn damage(amount: i32) {
        let mut world = WORLD.lock();
        world.health = world.health.saturating_sub(amount).max(0);
        info!(health = world.health, "Player damaged");
    }

    /// Regain `amount` health, capped at the maximum.
    #[method(name = "Player/heal")]
    fn heal(amount: i32) {
        let mut world = WORLD.lock();
        world.health = world.health.saturating_add(amount).min(MAX_HEALTH);
        info!(health = world.health, "Player healed");
    }
}

pub struct Logic;

#[module(name = "Logic")]
impl Logic {
    #[method(name = "Logic/always")]
    fn always() -> bool {
        true
    }

    #[method(name = "Logic/not")]
    fn not(value: bool) -> bool {
        !value
    }

    #[method(name = "Logic/less than")]
    fn less_than(a: f64, b: f64) -> bool {
        a < b
    }

    #[method(name = "Logic/greater than")]
    fn greater_than(a: f64, b: f64) -> bool {
        a > b
    }
}

pub struct Console;

#[module(name = "Console")]
impl Console {
    /// Print a line to the log.
    #[method(name = "Console/print")]
    fn print(text: String) {
        info!(target: "statecraft::console", "{}", text);
    }
}

/// Registry containing every demo module
pub fn registry() -> Result<MethodRegistry, RegistryError> {
    MethodRegistry::builder()
        .module::<Player>()
        .module::<Logic>()
        .module::<Console>()
        .discover()
}
