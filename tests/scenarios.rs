//! End-to-end behaviour of the manager, devices and effects over the virtual subsystem.

use stickfx::backends::virtual_input::{VirtualHub, VirtualJoystick};
use stickfx::effect_file::{self, EffectKind, FileEffect};
use stickfx::{
    Axis, Device, DeviceManager, ForceFeedbackEffect, InputConfig, InputError, WindowHandle,
};
use std::path::PathBuf;

const WINDOW: WindowHandle = WindowHandle(0x10);

fn write_effects(dir: &tempfile::TempDir, effects: &[FileEffect]) -> PathBuf {
    let path = dir.path().join("effects.toml");
    std::fs::write(&path, effect_file::to_string(effects).unwrap()).unwrap();
    path
}

fn three_effects() -> Vec<FileEffect> {
    vec![
        FileEffect::new("engine", EffectKind::Sine, 3_000),
        FileEffect::new("kerb", EffectKind::Square, 6_000),
        FileEffect::new("crash", EffectKind::Constant, 10_000),
    ]
}

fn ff_manager(hub: &VirtualHub) -> DeviceManager {
    hub.add_joystick(VirtualJoystick::gamepad("Wheel").with_force_feedback());
    let mut mgr = DeviceManager::new();
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();
    mgr
}

#[test]
fn joystick_only_system() {
    let hub = VirtualHub::new();
    let pad = hub.add_joystick(VirtualJoystick::gamepad("Only Pad"));
    let mut mgr = DeviceManager::new();
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();

    assert!(mgr.keyboard().is_none());
    assert!(mgr.joystick().is_some());

    hub.set_button(pad, 2, true);
    mgr.update().unwrap();
    let state = mgr.state();
    assert!(state.button(2));
    assert_eq!(state.keys.pressed().count(), 0);
}

#[test]
fn keyboard_only_system() {
    let hub = VirtualHub::new();
    let kb = hub.add_keyboard("Only Keys");
    let mut mgr = DeviceManager::new();
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();

    assert!(mgr.joystick().is_none());
    hub.set_key(kb, 0x20, true);
    mgr.update().unwrap();
    assert!(mgr.state().keys.is_pressed(0x20));
    assert_eq!(mgr.state().x, 0);
}

#[test]
fn three_effect_file_plays_and_stops_all() {
    let hub = VirtualHub::new();
    let mgr = ff_manager(&hub);
    let dir = tempfile::tempdir().unwrap();
    let path = write_effects(&dir, &three_effects());

    let joystick = mgr.joystick().unwrap();
    let mut fx = ForceFeedbackEffect::from_file(joystick, &path).unwrap();
    assert_eq!(fx.len(), 3);
    assert_eq!(fx.names().collect::<Vec<_>>(), ["engine", "kerb", "crash"]);

    fx.play().unwrap();
    assert_eq!(hub.effect_starts(), 3);
    assert_eq!(hub.playing_effects(), 3);
    assert_eq!(fx.playing(), 3);

    fx.stop().unwrap();
    assert_eq!(hub.effect_stops(), 3);
    assert_eq!(hub.playing_effects(), 0);

    drop(fx);
    assert_eq!(hub.live_effects(), 0);
}

#[test]
fn effect_file_errors_leave_nothing_behind() {
    let hub = VirtualHub::new();
    let mgr = ff_manager(&hub);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[[effect]]\nname = \"x\"\nkind = \"warp\"\nmagnitude = 1\n").unwrap();

    let joystick = mgr.joystick().unwrap();
    let err = ForceFeedbackEffect::from_file(joystick, &path).unwrap_err();
    assert!(matches!(err, InputError::EffectFile { .. }), "{err}");

    let missing = ForceFeedbackEffect::from_file(joystick, dir.path().join("none.toml"));
    assert!(missing.is_err());
    assert_eq!(hub.live_effects(), 0);
}

#[test]
fn effects_need_a_force_feedback_joystick() {
    let hub = VirtualHub::new();
    hub.add_joystick(VirtualJoystick::gamepad("Plain Pad"));
    let mut mgr = DeviceManager::new();
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write_effects(&dir, &three_effects());

    let err = ForceFeedbackEffect::from_file(mgr.joystick().unwrap(), &path).unwrap_err();
    assert!(matches!(err, InputError::ForceFeedbackUnsupported(_)));
}

#[test]
fn gain_bounds() {
    let hub = VirtualHub::new();
    let mgr = ff_manager(&hub);
    let dir = tempfile::tempdir().unwrap();
    let path = write_effects(&dir, &three_effects());
    let mut fx = ForceFeedbackEffect::from_file(mgr.joystick().unwrap(), &path).unwrap();

    fx.set_gain(0).unwrap();
    assert_eq!(fx.gain(), Some(0));
    fx.set_gain(10_000).unwrap();
    assert_eq!(fx.gain(), Some(10_000));
    assert!(hub.effect_gains().iter().all(|(_, g)| *g == 10_000));

    assert!(matches!(fx.set_gain(10_001), Err(InputError::GainOutOfRange(10_001))));
    assert_eq!(fx.gain(), Some(10_000));
    assert!(hub.effect_gains().iter().all(|(_, g)| *g == 10_000));
}

#[test]
fn accepted_gain_applies_to_later_effects() {
    let hub = VirtualHub::new();
    let mgr = ff_manager(&hub);
    let joystick = mgr.joystick().unwrap();
    let mut fx = ForceFeedbackEffect::new(joystick);

    fx.set_gain(2_500).unwrap();
    fx.add_file_effect(joystick, &FileEffect::new("late", EffectKind::Rumble, 8_000))
        .unwrap();
    assert_eq!(hub.effect_gains(), vec![("late".to_string(), 2_500)]);
}

#[test]
fn calibrated_axis_reads_its_maximum() {
    let hub = VirtualHub::new();
    let stick = hub.add_joystick(VirtualJoystick::flight_stick("Stick"));
    let mut mgr = DeviceManager::new();
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();

    mgr.joystick_mut().unwrap().set_range(Axis::X, -1000, 1000).unwrap();
    hub.set_axis(stick, Axis::X, VirtualJoystick::PHYSICAL_MAX);
    hub.set_axis(stick, Axis::Slider0, VirtualJoystick::PHYSICAL_MIN);
    mgr.update().unwrap();

    let state = mgr.state();
    assert_eq!(state.x, 1000);
    assert_eq!(state.sliders[0], -1000);
}

#[test]
fn matching_physical_span_passes_values_through() {
    let hub = VirtualHub::new();
    let stick = hub.add_joystick(
        VirtualJoystick::new("Calibrated")
            .with_axes(&[Axis::X])
            .with_physical_range(-1000, 1000),
    );
    let mut mgr = DeviceManager::new();
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();

    for raw in [-1000, -1, 0, 250, 1000] {
        hub.set_axis(stick, Axis::X, raw);
        mgr.update().unwrap();
        assert_eq!(mgr.state().x, raw);
    }
}

#[test]
fn custom_config_range_applies_to_every_axis() {
    let hub = VirtualHub::new();
    let pad = hub.add_joystick(VirtualJoystick::gamepad("Pad"));
    let config = InputConfig::from_toml_str("axis_range = { min = 0, max = 100 }").unwrap();
    let mut mgr = DeviceManager::with_config(config);
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();

    hub.set_axis(pad, Axis::Rx, VirtualJoystick::PHYSICAL_MAX);
    hub.set_axis(pad, Axis::Ry, VirtualJoystick::PHYSICAL_MIN);
    mgr.update().unwrap();
    assert_eq!(mgr.state().rx, 100);
    assert_eq!(mgr.state().ry, 0);
}

#[test]
fn finalize_is_always_safe() {
    // Never initialized.
    let mut mgr = DeviceManager::new();
    mgr.finalize();

    // Failed initialize.
    let empty = VirtualHub::new();
    assert!(matches!(
        mgr.initialize_with(Box::new(empty.backend()), WINDOW),
        Err(InputError::NoDevices)
    ));
    mgr.finalize();
    assert_eq!(empty.live_backends(), 0);

    // Successful initialize, finalized twice.
    let hub = VirtualHub::new();
    hub.add_joystick(VirtualJoystick::gamepad("Pad"));
    hub.add_keyboard("Keys");
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();
    mgr.finalize();
    mgr.finalize();
    assert!(!mgr.is_initialized());
    assert_eq!(hub.total_open_handles(), 0);
    assert_eq!(hub.live_backends(), 0);
    assert!(matches!(mgr.update(), Err(InputError::NotInitialized)));
}

#[test]
fn effects_outlive_finalize_without_leaking() {
    let hub = VirtualHub::new();
    let mut mgr = ff_manager(&hub);
    let dir = tempfile::tempdir().unwrap();
    let path = write_effects(&dir, &three_effects());
    let mut fx = ForceFeedbackEffect::from_file(mgr.joystick().unwrap(), &path).unwrap();
    fx.play().unwrap();

    mgr.finalize();
    drop(fx);
    assert_eq!(hub.live_effects(), 0);
    assert_eq!(hub.total_open_handles(), 0);
}

#[test]
fn transient_poll_failure_recovers() {
    let hub = VirtualHub::new();
    let pad = hub.add_joystick(VirtualJoystick::gamepad("Pad"));
    let mut mgr = DeviceManager::new();
    mgr.initialize_with(Box::new(hub.backend()), WINDOW).unwrap();

    hub.set_pov(pad, Some(9_000));
    mgr.update().unwrap();
    assert_eq!(mgr.state().pov_direction(), Some(2));

    hub.fail_next_poll(pad, 0x8007_001E);
    hub.set_pov(pad, None);
    assert!(matches!(mgr.update(), Err(InputError::Native { .. })));
    assert_eq!(mgr.state().pov_direction(), Some(2));

    mgr.update().unwrap();
    assert_eq!(mgr.state().pov_direction(), None);
    assert_eq!(mgr.joystick().unwrap().id(), mgr.joystick().unwrap().instance().id);
}
