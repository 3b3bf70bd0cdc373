//! Traffic Light
//!
//! A cyclic machine driven by delays instead of events.
//!
//! Key concepts:
//! - `wait` inside `onEnter` to leave a state after a while
//! - an interval repeater on the root that outlives every light
//! - the virtual clock, moved explicitly with `advance`
//!
//! Run with: cargo run --example traffic_light

use serde_json::Value;
use statecraft::design::{Design, HandlerDef, StateDef};
use statecraft::designer::Designer;
use std::time::Duration;

#[derive(Clone, Debug, Default)]
struct Light {
    seconds: u32,
    cycles: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Traffic Light ===\n");

    let design = Design::new(
        Light::default(),
        StateDef::new()
            .initial("red")
            .repeat_every(1.0, HandlerDef::new().secretly_do("tick"))
            .on("EMERGENCY", HandlerDef::new().to("flashing"))
            .state("red", StateDef::new().on_enter(HandlerDef::new().wait(4.0).to("green")))
            .state("green", StateDef::new().on_enter(HandlerDef::new().wait(3.0).to("yellow")))
            .state(
                "yellow",
                StateDef::new().on_enter(HandlerDef::new().wait(1.0).do_("cycle").to("red")),
            )
            .state(
                "flashing",
                StateDef::new().on("RESUME", HandlerDef::new().to("red")),
            ),
    )
    .id("light")
    .action("tick", |light, _, _| light.seconds += 1)
    .action("cycle", |light, _, _| light.cycles += 1);

    let mut light = Designer::new(design)?;
    light.on_update(|update| println!("  -> {}", update.active.last().map_or("", String::as_str)));

    for _ in 0..12 {
        light.advance(Duration::from_secs(1))?;
        let color = light
            .when_in([("red", "RED"), ("yellow", "YELLOW"), ("green", "GREEN")])
            .unwrap_or("-");
        println!("t={:>2}s {color}", light.data().seconds);
    }

    println!("\nEMERGENCY");
    light.send("EMERGENCY", Value::Null)?;
    light.advance(Duration::from_secs(10))?;
    println!("still flashing: {}", light.is_in(["flashing"]));

    light.send("RESUME", Value::Null)?;
    println!("\nCompleted cycles: {}", light.data().cycles);
    for record in light.transitions().records() {
        println!("  {} (entered {:?})", record.target, record.entered);
    }
    Ok(())
}
