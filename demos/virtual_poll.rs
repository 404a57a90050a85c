//! Poll a virtual gamepad and keyboard through a `DeviceManager`, then play a
//! small effect file on the gamepad.
//!
//! Run with `RUST_LOG=stickfx=debug cargo run --example virtual_poll` for the
//! library's own logging.

use stickfx::backends::virtual_input::{VirtualHub, VirtualJoystick};
use stickfx::effect_file::{self, EffectKind, FileEffect};
use stickfx::{Axis, DeviceManager, ForceFeedbackEffect, WindowHandle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let hub = VirtualHub::new();
    let pad = hub.add_joystick(VirtualJoystick::gamepad("Demo Pad").with_force_feedback());
    let keys = hub.add_keyboard("Demo Keyboard");

    let mut input = DeviceManager::new();
    input.initialize_with(Box::new(hub.backend()), WindowHandle(1))?;

    // Sweep the left stick across and tap a few inputs.
    for frame in 0..5 {
        let raw = frame * (VirtualJoystick::PHYSICAL_MAX / 4);
        hub.set_axis(pad, Axis::X, raw);
        hub.set_button(pad, frame as usize, true);
        hub.set_pov(pad, Some(frame as u32 * 9_000 % 36_000));
        hub.set_key(keys, 0x1E + frame as u8, true);

        input.update()?;
        let state = input.state();
        println!(
            "frame {frame}: x={:>5} buttons={:?} pov={:?} keys={:?}",
            state.axis(Axis::X),
            (0..10).filter(|b| state.button(*b)).collect::<Vec<_>>(),
            state.pov_direction(),
            state.keys.pressed().collect::<Vec<_>>(),
        );
    }

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("demo.fx.toml");
    std::fs::write(
        &path,
        effect_file::to_string(&[
            FileEffect::new("engine", EffectKind::Sine, 4_000),
            FileEffect::new("kick", EffectKind::Constant, 9_000).with_duration(Duration::from_millis(120)),
            FileEffect::new("road", EffectKind::Rumble, 2_500),
        ])?,
    )?;

    let Some(joystick) = input.joystick() else {
        return Err("no joystick".into());
    };
    let mut effects = ForceFeedbackEffect::from_file(joystick, &path)?;
    effects.set_gain(7_500)?;
    effects.play()?;
    println!(
        "playing {} of {} effects: {:?}",
        effects.playing(),
        effects.len(),
        effects.names().collect::<Vec<_>>()
    );
    effects.stop()?;

    drop(effects);
    input.finalize();
    println!("handles still open: {}", hub.total_open_handles());
    Ok(())
}
