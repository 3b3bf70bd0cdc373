//! JSON Design
//!
//! Loads the state tree from a JSON document and binds its function names
//! to Rust closures.
//!
//! Key concepts:
//! - string shortcuts and arrays of handler objects in JSON
//! - guards with `if` and `else`
//! - parallel states (children without `initial`)
//! - history with `.previous`, returning to the loud level after unmuting
//!
//! Run with: cargo run --example json_design

use serde_json::{json, Value};
use statecraft::design::Design;
use statecraft::designer::Designer;

const PLAYER: &str = r#"{
    "id": "player",
    "states": {
        "playback": {
            "initial": "stopped",
            "states": {
                "stopped": { "on": { "PLAY": { "to": "playing" } } },
                "playing": {
                    "on": {
                        "PAUSE": { "to": "paused" },
                        "STOP": [{ "do": "rewind", "to": "stopped" }]
                    }
                },
                "paused": { "on": { "PLAY": { "to": "playing" } } }
            }
        },
        "volume": {
            "initial": "audible",
            "states": {
                "audible": {
                    "initial": "normal",
                    "on": { "MUTE": { "to": "muted" } },
                    "states": {
                        "normal": {
                            "on": {
                                "LOUDER": {
                                    "if": "belowMax",
                                    "do": "raise",
                                    "else": { "to": "loud" }
                                }
                            }
                        },
                        "loud": { "on": { "QUIETER": { "do": "lower", "to": "normal" } } }
                    }
                },
                "muted": { "on": { "UNMUTE": { "to": "audible.previous" } } }
            }
        }
    }
}"#;

#[derive(Clone, Debug)]
struct Player {
    position: u32,
    level: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== JSON Design ===\n");

    let design = Design::from_json(Player { position: 42, level: 7 }, PLAYER)?
        .action("rewind", |player, _, _| player.position = 0)
        .action("raise", |player, _, _| player.level += 1)
        .action("lower", |player, _, _| player.level -= 1)
        .condition("belowMax", |player, _, _| player.level < 10)
        .value("level", |player| json!(player.level));

    let mut player = Designer::new(design)?;
    println!("start: {:?}", player.update().active);

    for event in ["PLAY", "LOUDER", "LOUDER", "LOUDER", "LOUDER", "MUTE", "UNMUTE", "STOP"] {
        let update = player.send(event, Value::Null)?;
        println!("{event:>7}: {:?} level={}", &update.active[1..], update.values["level"]);
    }

    println!("\nposition after STOP: {}", player.data().position);
    Ok(())
}
