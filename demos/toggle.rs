//! Toggle
//!
//! The smallest useful machine: two states, one event, one counter.
//!
//! Key concepts:
//! - handler objects with an action and a transition
//! - subscribers notified once per change
//! - `can` probing guards without side effects
//!
//! Run with: cargo run --example toggle

use serde_json::{json, Value};
use statecraft::design::{Design, HandlerDef, StateDef};
use statecraft::designer::Designer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Toggle ===\n");

    let design = Design::new(
        0_u32,
        StateDef::new()
            .initial("inactive")
            .state(
                "inactive",
                StateDef::new().on(
                    "TOGGLE",
                    HandlerDef::new().unless("worn_out").do_("increment").to("active"),
                ),
            )
            .state("active", StateDef::new().on("TOGGLE", HandlerDef::new().to("inactive"))),
    )
    .id("toggle")
    .action("increment", |count, _, _| *count += 1)
    .condition("worn_out", |count, _, _| *count >= 3)
    .value("label", |count| json!(format!("toggled {count} times")));

    let mut toggle = Designer::new(design)?;
    toggle.on_update(|update| {
        println!("  active: {:?}", &update.active[1..]);
        println!("  {}", update.values["label"]);
    });

    for _ in 0..8 {
        if !toggle.can("TOGGLE", &Value::Null) {
            println!("\nTOGGLE is no longer possible");
            break;
        }
        println!("\nTOGGLE");
        toggle.send("TOGGLE", Value::Null)?;
    }

    let state = toggle.when_in([("inactive", "off"), ("active", "on")]).unwrap_or("?");
    println!("\nFinal state: {state}, count: {}", toggle.data());
    Ok(())
}
