use std::f32::consts::PI;

use glam::Vec3;
use particle_tree_core::{
    camera_at, AppConfig, AudioConfig, AudioEnvelope, AudioLocator, LifecycleState, PcmProvider,
    RasterBackend, RenderGraph, Result, SceneRuntime,
};

fn light_config() -> AppConfig {
    let mut config = AppConfig::default();
    for layer in &mut config.tree.layers {
        layer.count = layer.count.min(400);
    }
    config.starfield.count = 100;
    config
}

fn pulsing_envelope(_: &AudioLocator) -> Result<AudioEnvelope> {
    let values = (0..930 * 32)
        .map(|i| {
            let frame = i / 32;
            let bin = i % 32;
            ((frame * 7 + bin * 3) % 11) as f32 / 20.0
        })
        .collect();
    AudioEnvelope::new(60.0, 32, values)
}

fn ready_runtime() -> SceneRuntime<RenderGraph> {
    let mut runtime = SceneRuntime::init(light_config(), RenderGraph::new()).unwrap();
    runtime
        .begin_audio(pulsing_envelope, AudioLocator::new("jingle.mp3"))
        .unwrap();
    runtime.ready().unwrap();
    runtime
}

fn ground_bits(runtime: &SceneRuntime<RenderGraph>) -> Vec<[u32; 3]> {
    let buffers = runtime.backend().buffers();
    let ground = buffers
        .live_entries()
        .find(|entry| entry.kind == particle_tree_core::ParticleKind::Ground)
        .unwrap();
    ground
        .positions
        .iter()
        .map(|p| p.to_array().map(f32::to_bits))
        .collect()
}

#[test]
fn backward_seek_reproduces_the_frame() {
    let mut runtime = ready_runtime();

    let first = runtime.update(100).unwrap();
    let captured = ground_bits(&runtime);

    runtime.update(50).unwrap();
    assert_ne!(ground_bits(&runtime), captured);

    let again = runtime.update(100).unwrap();
    assert_eq!(ground_bits(&runtime), captured);
    assert_eq!(first, again);
    assert_eq!(runtime.backend().draws(), &[100, 50, 100]);
}

#[test]
fn out_of_order_sequences_agree_with_a_linear_pass() {
    let mut linear = ready_runtime();
    let mut shuffled = ready_runtime();

    let forward: Vec<_> = (0..40).map(|f| linear.update(f).unwrap()).collect();
    for frame in [39_u32, 3, 17, 0, 25, 25, 8, 31] {
        assert_eq!(shuffled.update(frame).unwrap(), forward[frame as usize]);
    }
}

#[test]
fn camera_hits_both_ends_of_the_path() {
    let mut runtime = ready_runtime();
    assert_eq!(
        runtime.update(0).unwrap().camera.position,
        Vec3::new(30.0, 14.0, 0.0)
    );

    let end = camera_at(930, 930, &AppConfig::default().camera);
    let expected = Vec3::new(20.0 * (0.4 * PI).cos(), 4.0, 20.0 * (0.4 * PI).sin());
    assert!(end.position.abs_diff_eq(expected, 1e-4));
}

#[test]
fn ground_material_tracks_the_amplitude() {
    let mut runtime = ready_runtime();
    for frame in [1_u32, 2, 10, 600] {
        let state = runtime.update(frame).unwrap();
        let amplitude = state.audio_amplitude as f32;
        assert_eq!(state.ground_material.size, 0.12 + amplitude * 0.18);
        assert_eq!(state.ground_material.opacity, 0.6 + amplitude * 0.4);
        assert_eq!(state.pulse_scale, 1.0 + state.audio_amplitude * 0.4);
    }
}

#[test]
fn full_lifecycle_with_the_rasterizer() {
    let mut config = light_config();
    config.clock.total_frames = 6;
    let audio = AudioConfig {
        sample_rate: 8_000,
        block_size: 256,
        ..AudioConfig::default()
    };
    let samples: Vec<f32> = (0..8_000)
        .map(|i| 0.8 * (2.0 * PI * 440.0 * i as f32 / 8_000.0).sin())
        .collect();

    let backend = RasterBackend::new(96, 54, 1.0, config.render.background).unwrap();
    let mut runtime = SceneRuntime::init(config, backend).unwrap();
    runtime
        .begin_audio(PcmProvider::new(samples, audio, 60), AudioLocator::new("tone"))
        .unwrap();
    runtime.ready().unwrap();

    for frame in runtime.scene().clock().frames() {
        let state = runtime.update(frame).unwrap();
        assert!(state.audio_amplitude > 0.0);
    }
    assert_eq!(runtime.backend().frames_drawn(), 6);

    runtime.dispose();
    assert_eq!(runtime.state(), LifecycleState::Disposed);
    assert_eq!(runtime.backend().buffers().live_count(), 0);
    runtime.dispose();
}
