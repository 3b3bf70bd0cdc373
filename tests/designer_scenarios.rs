//! End-to-end scenarios driving machines through their public API.

use serde_json::{json, Value};
use statecraft::design::{AsyncDef, CompileError, Design, HandlerDef, LinkDef, StateDef};
use statecraft::designer::{Designer, DesignerConfig, DesignerError, Mode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn toggle_design() -> Design<u32> {
    Design::new(
        0,
        StateDef::new()
            .initial("inactive")
            .state(
                "inactive",
                StateDef::new().on("TOGGLE", HandlerDef::new().do_("increment").to("active")),
            )
            .state("active", StateDef::new().on("TOGGLE", HandlerDef::new().to("inactive"))),
    )
    .id("toggle")
    .action("increment", |count, _, _| *count += 1)
}

#[test]
fn toggle_counts_activations() {
    let mut toggle = Designer::new(toggle_design()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    toggle.on_update(move |update| {
        sink.lock().unwrap().push((*update.data, update.active.clone()));
    });

    assert!(toggle.is_in(["inactive"]));

    toggle.send("TOGGLE", Value::Null).unwrap();
    assert!(toggle.is_in(["active"]));
    assert_eq!(*toggle.data(), 1);

    toggle.send("TOGGLE", Value::Null).unwrap();
    assert!(toggle.is_in(["inactive"]));
    assert_eq!(*toggle.data(), 1);

    toggle.send("TOGGLE", Value::Null).unwrap();
    assert_eq!(*toggle.data(), 2);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], (1, vec!["toggle".to_string(), "toggle.active".to_string()]));
    assert_eq!(seen[2].0, 2);
}

#[test]
fn can_checks_guards_without_side_effects() {
    let design = Design::new(
        3_i32,
        StateDef::new().on(
            "SPEND",
            HandlerDef::new().if_("hasCredit").do_("spend"),
        ),
    )
    .condition("hasCredit", |credit, payload, _| {
        *credit >= payload.as_i64().unwrap_or(1) as i32
    })
    .action("spend", |credit, payload, _| *credit -= payload.as_i64().unwrap_or(1) as i32);
    let mut wallet = Designer::new(design).unwrap();

    assert!(wallet.can("SPEND", &json!(3)));
    assert!(!wallet.can("SPEND", &json!(4)));
    assert!(!wallet.can("REFUND", &Value::Null));
    assert_eq!(*wallet.data(), 3);

    wallet.send("SPEND", json!(2)).unwrap();
    assert_eq!(*wallet.data(), 1);
    assert!(!wallet.can("SPEND", &json!(2)));
}

#[test]
fn can_ignores_catch_all_handlers() {
    let design = Design::new(0_u8, StateDef::new().on_event("noop")).action("noop", |_, _, _| {});
    let machine = Designer::new(design).unwrap();

    assert!(!machine.can("ANYTHING", &Value::Null));
}

#[test]
fn on_event_sees_every_event() {
    let design = Design::new(Vec::<String>::new(), StateDef::new().on_event("log"))
        .action("log", |log, payload, _| log.push(payload.to_string()));
    let mut machine = Designer::new(design).unwrap();

    machine.send("A", json!(1)).unwrap();
    machine.send("B", json!("two")).unwrap();

    assert_eq!(*machine.data(), vec!["1", "\"two\""]);
}

#[test]
fn follow_up_events_run_after_the_current_one() {
    let design = Design::new(
        Vec::<&'static str>::new(),
        StateDef::new()
            .on("PING", HandlerDef::new().do_("ping").send("PONG"))
            .on("PONG", HandlerDef::new().do_("pong")),
    )
    .action("ping", |log, _, _| log.push("ping"))
    .action("pong", |log, _, _| log.push("pong"));
    let mut machine = Designer::new(design).unwrap();

    machine.send("PING", Value::Null).unwrap();

    assert_eq!(*machine.data(), vec!["ping", "pong"]);
}

#[test]
fn can_follows_the_active_states() {
    let design = Design::new(
        false,
        StateDef::new()
            .initial("locked")
            .state("locked", StateDef::new().on("UNLOCK", HandlerDef::new().to("unlocked")))
            .state("unlocked", StateDef::new().on("OPEN", HandlerDef::new().do_("open"))),
    )
    .action("open", |open, _, _| *open = true);
    let mut door = Designer::new(design).unwrap();

    assert!(!door.can("OPEN", &Value::Null));
    assert!(door.can("UNLOCK", &Value::Null));

    door.send("UNLOCK", Value::Null).unwrap();

    assert!(door.can("OPEN", &Value::Null));
    assert!(!door.can("UNLOCK", &Value::Null));
    assert!(!*door.data());
}

#[test]
fn nested_waits_hold_back_the_outer_chain() {
    let design = Design::new(
        Vec::<&'static str>::new(),
        StateDef::new().on(
            "GO",
            vec![
                LinkDef::from(HandlerDef::new().then(HandlerDef::new().wait(1.0).do_("inner"))),
                LinkDef::from("outer"),
            ],
        ),
    )
    .action("inner", |log, _, _| log.push("inner"))
    .action("outer", |log, _, _| log.push("outer"));
    let mut machine = Designer::new(design).unwrap();

    machine.send("GO", Value::Null).unwrap();
    assert!(machine.data().is_empty());

    machine.advance(secs(1)).unwrap();
    assert_eq!(*machine.data(), vec!["inner", "outer"]);
}

fn delayed_design() -> Design<u32> {
    Design::new(
        0,
        StateDef::new()
            .initial("waiting")
            .state(
                "waiting",
                StateDef::new()
                    .on_enter(HandlerDef::new().wait(5.0).do_("fire"))
                    .on("LEAVE", HandlerDef::new().to("elsewhere")),
            )
            .state("elsewhere", StateDef::new().on("BACK", HandlerDef::new().to("waiting"))),
    )
    .action("fire", |fired, _, _| *fired += 1)
}

fn count_updates<D: Clone + 'static>(machine: &mut Designer<D>) -> Arc<Mutex<usize>> {
    let updates = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&updates);
    machine.on_update(move |_| *counter.lock().unwrap() += 1);
    updates
}

#[test]
fn wait_resumes_after_its_delay() {
    let mut machine = Designer::new(delayed_design()).unwrap();

    machine.advance(secs(4)).unwrap();
    assert_eq!(*machine.data(), 0);

    machine.advance(secs(1)).unwrap();
    assert_eq!(*machine.data(), 1);
}

#[test]
fn leaving_a_state_cancels_its_waits() {
    let mut machine = Designer::new(delayed_design()).unwrap();

    machine.advance(secs(2)).unwrap();
    machine.send("LEAVE", Value::Null).unwrap();
    machine.advance(secs(10)).unwrap();

    assert_eq!(*machine.data(), 0);
    assert!(machine.is_in(["elsewhere"]));
}

#[test]
fn cancelled_waits_never_notify() {
    let mut machine = Designer::new(delayed_design()).unwrap();
    let updates = count_updates(&mut machine);

    machine.advance(secs(2)).unwrap();
    machine.send("LEAVE", Value::Null).unwrap();
    assert_eq!(*updates.lock().unwrap(), 1);

    machine.advance(secs(10)).unwrap();
    assert_eq!(*updates.lock().unwrap(), 1);
    assert_eq!(*machine.data(), 0);
}

#[test]
fn reentering_a_state_restarts_its_waits() {
    let mut machine = Designer::new(delayed_design()).unwrap();
    let updates = count_updates(&mut machine);

    machine.advance(secs(2)).unwrap();
    machine.send("LEAVE", Value::Null).unwrap();
    machine.send("BACK", Value::Null).unwrap();
    assert_eq!(*updates.lock().unwrap(), 2);

    // the first wait would have fired at 5s
    machine.advance(secs(3)).unwrap();
    assert_eq!(*machine.data(), 0);
    assert_eq!(*updates.lock().unwrap(), 2);

    machine.advance(secs(2)).unwrap();
    assert_eq!(*machine.data(), 1);
    assert_eq!(*updates.lock().unwrap(), 3);
}

fn editor_design() -> Design<()> {
    Design::new(
        (),
        StateDef::new()
            .initial("editor")
            .state(
                "editor",
                StateDef::new()
                    .initial("text")
                    .on("HELP", HandlerDef::new().to("help"))
                    .state("text", StateDef::new().on("NEXT", HandlerDef::new().to("image")))
                    .state(
                        "image",
                        StateDef::new()
                            .initial("crop")
                            .state("crop", StateDef::new().on("NEXT", HandlerDef::new().to("resize")))
                            .state("resize", StateDef::new()),
                    ),
            )
            .state(
                "help",
                StateDef::new()
                    .on("BACK", HandlerDef::new().to("editor.previous"))
                    .on("BACK_FULLY", HandlerDef::new().to("editor.restore"))
                    .on("RESTART", HandlerDef::new().to("editor")),
            ),
    )
    .id("app")
}

fn deep_in_editor() -> Designer<()> {
    let mut app = Designer::new(editor_design()).unwrap();
    for event in ["NEXT", "NEXT", "HELP"] {
        app.send(event, Value::Null).unwrap();
    }
    assert!(app.is_in(["help"]));
    app
}

#[test]
fn previous_restores_one_level() {
    let mut app = deep_in_editor();
    app.send("BACK", Value::Null).unwrap();

    assert!(app.is_in(["editor.image.crop"]));
}

#[test]
fn restore_restores_the_whole_subtree() {
    let mut app = deep_in_editor();
    app.send("BACK_FULLY", Value::Null).unwrap();

    assert!(app.is_in(["editor.image.resize"]));
}

#[test]
fn plain_target_enters_through_initial() {
    let mut app = deep_in_editor();
    app.send("RESTART", Value::Null).unwrap();

    assert!(app.is_in(["editor.text"]));
    assert!(!app.is_in_any(["image", "help"]));
}

#[test]
fn parallel_regions_move_independently() {
    let region = |event: &str, target: &str, back: &str| {
        StateDef::new()
            .initial("off")
            .state("off", StateDef::new().on(event, HandlerDef::new().to(target)))
            .state("on", StateDef::new().on(event, HandlerDef::new().to(back)))
    };
    let design = Design::new(
        (),
        StateDef::new()
            .state("bold", region("BOLD", "bold.on", "bold.off"))
            .state("italic", region("ITALIC", "italic.on", "italic.off")),
    )
    .id("format");
    let mut format = Designer::new(design).unwrap();

    assert!(format.is_in(["bold.off", "italic.off"]));

    format.send("BOLD", Value::Null).unwrap();
    assert!(format.is_in(["bold.on", "italic.off"]));

    format.send("ITALIC", Value::Null).unwrap();
    assert!(format.is_in(["bold.on", "italic.on"]));

    let labels = format.when_in_all([("bold.on", "b"), ("italic.on", "i"), ("bold.off", "-")]);
    assert_eq!(labels, vec!["b", "i"]);
}

#[test]
fn repeaters_stop_when_their_state_exits() {
    let design = Design::new(
        0_u32,
        StateDef::new()
            .initial("running")
            .state(
                "running",
                StateDef::new()
                    .repeat_every(1.0, HandlerDef::new().secretly_do("tick"))
                    .on("STOP", HandlerDef::new().to("stopped")),
            )
            .state("stopped", StateDef::new()),
    )
    .action("tick", |ticks, _, _| *ticks += 1);
    let mut machine = Designer::new(design).unwrap();

    machine.advance(secs(3)).unwrap();
    assert_eq!(*machine.data(), 3);

    machine.send("STOP", Value::Null).unwrap();
    machine.advance(secs(5)).unwrap();
    assert_eq!(*machine.data(), 3);
}

#[test]
fn stopped_repeaters_never_notify() {
    let design = Design::new(
        0_u32,
        StateDef::new()
            .initial("running")
            .state(
                "running",
                StateDef::new()
                    .repeat_every(1.0, HandlerDef::new().do_("tick"))
                    .on("STOP", HandlerDef::new().to("stopped")),
            )
            .state("stopped", StateDef::new()),
    )
    .action("tick", |ticks, _, _| *ticks += 1);
    let mut machine = Designer::new(design).unwrap();
    let updates = count_updates(&mut machine);

    machine.advance(secs(2)).unwrap();
    assert_eq!(*updates.lock().unwrap(), 2);

    machine.send("STOP", Value::Null).unwrap();
    machine.advance(secs(5)).unwrap();
    assert_eq!(*updates.lock().unwrap(), 3);
    assert_eq!(*machine.data(), 2);
}

fn frame_design() -> Design<u32> {
    Design::new(
        0,
        StateDef::new()
            .state("left", StateDef::new().repeat(HandlerDef::new().do_("tick")))
            .state("right", StateDef::new().repeat(HandlerDef::new().do_("tick"))),
    )
    .action("tick", |ticks, _, _| *ticks += 1)
}

fn frame_config() -> DesignerConfig {
    DesignerConfig::default().with_frame_interval(Duration::from_millis(10))
}

#[test]
fn frame_repeaters_notify_once_per_tick() {
    let mut machine = Designer::with_config(frame_design(), frame_config()).unwrap();
    let notifications = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&notifications);
    machine.on_update(move |_| *counter.lock().unwrap() += 1);

    machine.advance(Duration::from_millis(50)).unwrap();

    assert_eq!(*machine.data(), 10);
    assert_eq!(*notifications.lock().unwrap(), 5);
}

#[test]
fn last_unsubscribe_stops_repeaters() {
    let mut machine = Designer::with_config(frame_design(), frame_config()).unwrap();
    let first = machine.on_update(|_| {});
    let second = machine.on_update(|_| {});

    assert!(machine.unsubscribe(first));
    machine.advance(Duration::from_millis(10)).unwrap();
    assert_eq!(*machine.data(), 2);

    assert!(machine.unsubscribe(second));
    assert!(!machine.unsubscribe(second));
    machine.advance(Duration::from_millis(100)).unwrap();
    assert_eq!(*machine.data(), 2);
}

type Reply = oneshot::Sender<Result<Value, Value>>;

fn loader() -> (Design<Option<String>>, Reply) {
    let (tx, rx) = oneshot::channel::<Result<Value, Value>>();
    let receiver = Arc::new(Mutex::new(Some(rx)));
    let design = Design::new(
        None,
        StateDef::new()
            .initial("loading")
            .state(
                "loading",
                StateDef::new()
                    .awaits(
                        AsyncDef::new("load", HandlerDef::new().do_("store").to("ready"))
                            .on_reject(HandlerDef::new().do_("store").to("failed")),
                    )
                    .on("CANCEL", HandlerDef::new().to("ready")),
            )
            .state("ready", StateDef::new())
            .state("failed", StateDef::new()),
    )
    .action("store", |loaded, _, result| {
        *loaded = result.as_str().map(str::to_string);
    })
    .async_op("load", move |_, _, _| {
        let rx = receiver.lock().unwrap().take();
        async move {
            match rx {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(json!("sender dropped"))),
                None => Err(json!("already loading")),
            }
        }
    });
    (design, tx)
}

#[test]
fn async_resolution_runs_on_resolve() {
    let (design, reply) = loader();
    let mut machine = Designer::new(design).unwrap();

    machine.poll_async().unwrap();
    assert!(machine.is_in(["loading"]));
    assert_eq!(machine.pending_async(), 1);

    reply.send(Ok(json!("payload"))).unwrap();
    machine.poll_async().unwrap();

    assert!(machine.is_in(["ready"]));
    assert_eq!(machine.data().as_deref(), Some("payload"));
    assert_eq!(machine.pending_async(), 0);
}

#[test]
fn async_rejection_runs_on_reject() {
    let (design, reply) = loader();
    let mut machine = Designer::new(design).unwrap();

    reply.send(Err(json!("offline"))).unwrap();
    machine.advance(Duration::ZERO).unwrap();

    assert!(machine.is_in(["failed"]));
    assert_eq!(machine.data().as_deref(), Some("offline"));
}

#[test]
fn leaving_a_state_drops_its_async_result() {
    let (design, reply) = loader();
    let mut machine = Designer::new(design).unwrap();

    machine.send("CANCEL", Value::Null).unwrap();
    assert_eq!(machine.pending_async(), 0);

    assert!(reply.send(Ok(json!("late"))).is_err());
    machine.poll_async().unwrap();
    assert_eq!(*machine.data(), None);
}

fn ping_pong() -> Design<()> {
    Design::new(
        (),
        StateDef::new()
            .initial("idle")
            .state("idle", StateDef::new().on("GO", HandlerDef::new().to("ping")))
            .state("ping", StateDef::new().on_enter(HandlerDef::new().to("pong")))
            .state("pong", StateDef::new().on_enter(HandlerDef::new().to("ping"))),
    )
}

#[test]
fn transition_loops_fail_in_development() {
    let config = DesignerConfig::default()
        .with_mode(Mode::Development)
        .with_max_transitions(10);
    let mut machine = Designer::with_config(ping_pong(), config).unwrap();

    let error = machine.send("GO", Value::Null).unwrap_err();

    assert!(error.is_structural());
    assert!(matches!(error, DesignerError::TransitionLoop { limit: 10, .. }));
}

#[test]
fn transition_loops_are_cut_in_production() {
    let config = DesignerConfig::default()
        .with_mode(Mode::Production)
        .with_max_transitions(10);
    let mut machine = Designer::with_config(ping_pong(), config).unwrap();

    machine.send("GO", Value::Null).unwrap();

    assert!(machine.is_in_any(["ping", "pong"]));
    assert_eq!(machine.transitions().len(), 10);
}

fn echo() -> Design<u32> {
    Design::new(
        0,
        StateDef::new().on("PING", HandlerDef::new().secretly_do("count").send("PING")),
    )
    .action("count", |count, _, _| *count += 1)
}

#[test]
fn event_loops_fail_in_development() {
    let config = DesignerConfig::default()
        .with_mode(Mode::Development)
        .with_max_transitions(10);
    let mut machine = Designer::with_config(echo(), config).unwrap();

    let error = machine.send("PING", Value::Null).unwrap_err();

    assert!(matches!(
        error,
        DesignerError::TransitionLoop { limit: 10, ref event } if event == "PING"
    ));
    assert_eq!(*machine.data(), 10);
}

#[test]
fn event_loops_are_cut_in_production() {
    let config = DesignerConfig::default()
        .with_mode(Mode::Production)
        .with_max_transitions(10);
    let mut machine = Designer::with_config(echo(), config).unwrap();

    machine.send("PING", Value::Null).unwrap();
    assert_eq!(*machine.data(), 10);

    // the loop left nothing queued behind
    machine.send("PING", Value::Null).unwrap();
    assert_eq!(*machine.data(), 20);
}

fn lost_design() -> Design<()> {
    Design::new(
        (),
        StateDef::new()
            .initial("here")
            .state("here", StateDef::new().on("JUMP", HandlerDef::new().to("nowhere"))),
    )
}

#[test]
fn unknown_targets_fail_in_development() {
    let config = DesignerConfig::default().with_mode(Mode::Development);
    let mut machine = Designer::with_config(lost_design(), config).unwrap();

    let error = machine.send("JUMP", Value::Null).unwrap_err();

    assert!(matches!(error, DesignerError::UnknownTarget(ref target) if target == "nowhere"));
    assert!(machine.is_in(["here"]));
}

#[test]
fn unknown_targets_are_ignored_in_production() {
    let config = DesignerConfig::default().with_mode(Mode::Production);
    let mut machine = Designer::with_config(lost_design(), config).unwrap();

    machine.send("JUMP", Value::Null).unwrap();

    assert!(machine.is_in(["here"]));
}

#[test]
fn compile_errors_are_reported_together() {
    let design: Design<()> = Design::new(
        (),
        StateDef::new()
            .initial("missing")
            .state("a", StateDef::new().on("GO", HandlerDef::new().if_("nope").do_("nothing"))),
    );

    let errors = match Designer::new(design) {
        Err(DesignerError::Compile(errors)) => errors,
        Err(other) => panic!("expected compile errors, got {other}"),
        Ok(_) => panic!("expected compile errors"),
    };

    assert_eq!(errors.len(), 3);
    assert!(errors
        .errors()
        .iter()
        .any(|error| matches!(error, CompileError::UnknownInitial { name, .. } if name == "missing")));
}

#[test]
fn json_designs_run_like_built_ones() {
    let json = r#"{
        "id": "door",
        "initial": "closed",
        "states": {
            "closed": {
                "on": {
                    "OPEN": [
                        { "if": "isLocked", "send": "DENIED" },
                        { "unless": "isLocked", "do": "countOpen", "to": "opened" }
                    ],
                    "DENIED": "countDenied",
                    "LOCK": { "secretlyDo": "lock" }
                }
            },
            "opened": { "on": { "CLOSE": { "to": "closed" } } }
        }
    }"#;

    #[derive(Clone, Default)]
    struct Door {
        locked: bool,
        opened: u32,
        denied: u32,
    }

    let design = Design::from_json(Door::default(), json)
        .unwrap()
        .condition("isLocked", |door, _, _| door.locked)
        .action("countOpen", |door, _, _| door.opened += 1)
        .action("countDenied", |door, _, _| door.denied += 1)
        .action("lock", |door, _, _| door.locked = true)
        .value("opened", |door| json!(door.opened));
    let mut door = Designer::new(design).unwrap();

    door.send("OPEN", Value::Null).unwrap();
    door.send("CLOSE", Value::Null).unwrap();
    assert_eq!(door.update().values["opened"], json!(1));

    door.send("LOCK", Value::Null).unwrap();
    door.send("OPEN", Value::Null).unwrap();

    assert!(door.is_in(["door.closed"]));
    assert_eq!(door.data().denied, 1);
    assert_eq!(door.data().opened, 1);
}
