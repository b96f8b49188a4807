//! Tests for the reconciliation engine

use super::*;
use crate::cat::decode;

fn make_engine() -> SyncEngine {
    SyncEngine::new(&ParametersConfig::default())
}

/// Feed a device chunk through the engine, collecting the writes in order
fn feed(engine: &mut SyncEngine, chunk: &str) -> Vec<String> {
    decode(chunk)
        .iter()
        .filter_map(|f| engine.handle_fragment(f))
        .map(|c| c.to_wire())
        .collect()
}

fn wire(commands: Vec<CatCommand>) -> Vec<String> {
    commands.iter().map(|c| c.to_wire()).collect()
}

fn step(param: ParamId, direction: Direction) -> Intent {
    Intent::Step { param, direction }
}

#[test]
fn test_frequency_step_end_to_end() {
    let mut engine = make_engine();

    // Device pushes its state first
    assert!(feed(&mut engine, "FA00014200000;").is_empty());

    let out = engine.handle_intent(step(ParamId::Frequency, Direction::Down));
    assert_eq!(wire(out), vec!["FA;"]);
    assert_eq!(engine.phase(ParamId::Frequency), ParamPhase::AwaitingRead);

    let writes = feed(&mut engine, "FA00014200000;");
    assert_eq!(writes, vec!["FA00014199000;"]);
    assert_eq!(engine.phase(ParamId::Frequency), ParamPhase::Idle);
    assert_eq!(engine.registry().get(ParamId::Frequency).current(), 14_199_000);
}

#[test]
fn test_delta_applies_to_fresh_value_not_cache() {
    let mut engine = make_engine();
    feed(&mut engine, "ZZIS03000;");

    engine.handle_intent(step(ParamId::IfShift, Direction::Up));

    // Someone else moved the knob meanwhile
    let writes = feed(&mut engine, "ZZIS05000;");
    assert_eq!(writes, vec!["ZZIS05100;"]);
}

#[test]
fn test_second_intent_overwrites_pending_delta() {
    let mut engine = make_engine();
    feed(&mut engine, "ZZIS03000;");

    engine.handle_intent(step(ParamId::IfShift, Direction::Up));
    engine.handle_intent(step(ParamId::IfShift, Direction::Down));

    let writes = feed(&mut engine, "ZZIS03000;");
    assert_eq!(writes, vec!["ZZIS02900;"]);
}

#[test]
fn test_stray_reply_only_updates_cache() {
    let mut engine = make_engine();
    let writes = feed(&mut engine, "ZZLA077;");
    assert!(writes.is_empty());
    assert_eq!(engine.registry().get(ParamId::Level).current(), 77);
}

#[test]
fn test_write_emitted_once_per_intent() {
    let mut engine = make_engine();
    engine.handle_intent(step(ParamId::Level, Direction::Up));

    assert_eq!(feed(&mut engine, "ZZLA050;"), vec!["ZZLA055;"]);
    // Echo of our own write must not trigger another one
    assert!(feed(&mut engine, "ZZLA055;").is_empty());
}

#[test]
fn test_clamp_at_upper_bound_still_writes() {
    let mut engine = make_engine();
    engine.handle_intent(step(ParamId::IfShift, Direction::Up));

    let writes = feed(&mut engine, "ZZIS10000;");
    assert_eq!(writes, vec!["ZZIS10000;"]);
}

#[test]
fn test_clamp_at_lower_bound() {
    let mut engine = make_engine();
    engine.handle_intent(step(ParamId::Level, Direction::Down));

    assert_eq!(feed(&mut engine, "ZZLA003;"), vec!["ZZLA000;"]);
}

#[test]
fn test_malformed_fragment_keeps_delta_pending() {
    let mut engine = make_engine();
    engine.handle_intent(step(ParamId::Level, Direction::Up));

    assert!(feed(&mut engine, "ZZLAx1;").is_empty());
    assert_eq!(engine.phase(ParamId::Level), ParamPhase::AwaitingRead);
    assert_eq!(engine.registry().get(ParamId::Level).current(), 50);

    assert_eq!(feed(&mut engine, "ZZLA060;"), vec!["ZZLA065;"]);
}

#[test]
fn test_unknown_and_error_fragments_ignored() {
    let mut engine = make_engine();
    assert!(feed(&mut engine, "?;ZZMA1;IF00014200000;").is_empty());
}

#[test]
fn test_concatenated_chunk_resolves_each_parameter() {
    let mut engine = make_engine();
    engine.handle_intent(step(ParamId::Frequency, Direction::Up));
    engine.handle_intent(step(ParamId::Level, Direction::Down));

    let writes = feed(&mut engine, "FA00007074000;ZZIS02500;ZZLA040;");
    assert_eq!(writes, vec!["FA00007075000;", "ZZLA035;"]);
    assert_eq!(engine.registry().get(ParamId::IfShift).current(), 2500);
}

#[test]
fn test_reset_bypasses_read_request() {
    let mut engine = make_engine();
    feed(&mut engine, "ZZIS07000;");

    let out = engine.handle_intent(Intent::Reset { param: ParamId::IfShift });
    assert_eq!(wire(out), vec!["ZZIS03000;"]);
    assert_eq!(engine.registry().get(ParamId::IfShift).current(), 3000);
    assert_eq!(engine.phase(ParamId::IfShift), ParamPhase::Idle);
}

#[test]
fn test_reset_keeps_pending_step() {
    let mut engine = make_engine();
    feed(&mut engine, "ZZIS07000;");
    engine.handle_intent(step(ParamId::IfShift, Direction::Up));

    let out = engine.handle_intent(Intent::Reset { param: ParamId::IfShift });
    assert_eq!(wire(out), vec!["ZZIS03000;"]);
    assert_eq!(engine.phase(ParamId::IfShift), ParamPhase::AwaitingRead);

    // The reply to the earlier read-request still carries the step
    assert_eq!(feed(&mut engine, "ZZIS03000;"), vec!["ZZIS03100;"]);
    assert_eq!(engine.phase(ParamId::IfShift), ParamPhase::Idle);
}

#[test]
fn test_frequency_step_toggle() {
    let mut engine = make_engine();
    assert_eq!(engine.frequency_step(), 1000);

    assert!(engine.handle_intent(Intent::ToggleFrequencyStep).is_empty());
    assert_eq!(engine.frequency_step(), 100);

    engine.handle_intent(step(ParamId::Frequency, Direction::Up));
    assert_eq!(feed(&mut engine, "FA00014200000;"), vec!["FA00014200100;"]);

    engine.handle_intent(Intent::ToggleFrequencyStep);
    assert_eq!(engine.frequency_step(), 1000);
}

#[test]
fn test_toggles_and_fire_and_forget() {
    let mut engine = make_engine();

    assert_eq!(wire(engine.handle_intent(Intent::ToggleMute)), vec!["ZZMA1;"]);
    assert_eq!(wire(engine.handle_intent(Intent::ToggleMute)), vec!["ZZMA0;"]);
    assert_eq!(wire(engine.handle_intent(Intent::TogglePtt)), vec!["TX;"]);
    assert!(engine.is_transmitting());
    assert_eq!(wire(engine.handle_intent(Intent::TogglePtt)), vec!["RX;"]);
    assert_eq!(wire(engine.handle_intent(Intent::BandUp)), vec!["BU;"]);
    assert_eq!(wire(engine.handle_intent(Intent::BandDown)), vec!["BD;"]);
}

#[test]
fn test_resync_keeps_pending_deltas() {
    let mut engine = make_engine();
    engine.handle_intent(step(ParamId::IfShift, Direction::Down));

    // Connection dropped before the reply; reconnect replays all reads
    assert_eq!(wire(engine.resync_requests()), vec!["FA;", "ZZIS;", "ZZLA;"]);
    assert_eq!(engine.phase(ParamId::IfShift), ParamPhase::AwaitingRead);

    let writes = feed(&mut engine, "FA00014200000;ZZIS04000;ZZLA050;");
    assert_eq!(writes, vec!["ZZIS03900;"]);
}

#[test]
fn test_parameters_reconcile_independently() {
    let mut engine = make_engine();
    engine.handle_intent(step(ParamId::IfShift, Direction::Up));
    engine.handle_intent(step(ParamId::Level, Direction::Up));

    assert_eq!(feed(&mut engine, "ZZLA010;"), vec!["ZZLA015;"]);
    assert_eq!(engine.phase(ParamId::IfShift), ParamPhase::AwaitingRead);
    assert_eq!(feed(&mut engine, "ZZIS00100;"), vec!["ZZIS00200;"]);
}
