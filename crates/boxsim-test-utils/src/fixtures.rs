//! Configuration fixtures.

use std::time::Duration;

use boxsim_core::config::BoxConfig;
use boxsim_protocol::Timeouts;

/// A six-joint arm, a ball and a cube, end-position sensing and common
/// velocity motors, both uniformized.
pub const fn sample_toml() -> &'static str {
    r#"
steps = 720
seed = 7

[arm]
lengths = [50.0, 50.0, 50.0, 50.0, 50.0, 50.0]
limit = 2.0
max_speed = 2.0
base_pos = [400.0, 80.0]

[[toys]]
name = "ball1"
shape = "ball"
pos = [550.0, 350.0]
size = 40.0
friction = 1.0
restitution = 0.7
density = 1.0

[[toys]]
name = "cube1"
shape = "cube"
pos = [250.0, 350.0]
size = 30.0
friction = 1.0
restitution = 0.2
density = 2.0

[sprimitive]
name = "endpos"
object_name = "ball1"
uniformize = true

[mprimitive]
name = "commonvel"
uniformize = true
"#
}

/// [`sample_toml`] parsed and validated.
///
/// # Panics
///
/// Panics if the fixture stops parsing.
pub fn sample_config() -> BoxConfig {
    BoxConfig::from_toml_str(sample_toml()).expect("sample config fixture must parse")
}

/// Timeouts suited to an in-process fake: no start-up grace and short
/// deadlines so failure tests finish quickly.
pub const fn fast_timeouts() -> Timeouts {
    Timeouts {
        grace: Duration::ZERO,
        connect: Duration::from_millis(500),
        control: Duration::from_secs(2),
        step: Duration::from_millis(500),
    }
}
