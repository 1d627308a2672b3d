use std::fs;
use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sparkline_core::state::FieldInfo;
use sparkline_core::synthetic::SyntheticMatch;
use sparkline_core::{ControllerState, Host, HostConfig, PluginCatalog};

fn plugin_dir(name: &str, manifests: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sparkline-bench-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create bench plugin dir");
    for (file, contents) in manifests {
        fs::write(dir.join(file), contents).expect("write manifest");
    }
    dir
}

fn host(dir: PathBuf) -> Host {
    let mut host = Host::new(HostConfig::with_plugin_dir(dir), PluginCatalog::with_builtins());
    host.load().expect("load plugins");
    host
}

fn bench_tick_builtins(c: &mut Criterion) {
    let dir = plugin_dir(
        "builtins",
        &[
            (
                "a_tracker.json",
                r#"{"kind": "ball_tracker", "settings": {"smoothing_window": 4, "report_interval_ms": 60000}}"#,
            ),
            ("b_deadzone.json", r#"{"kind": "input_deadzone"}"#),
        ],
    );
    let mut host = host(dir.clone());
    let mut game = SyntheticMatch::new(7, 3).with_duration(1.0e6);
    let field = FieldInfo::standard();
    // Skip the opening kickoff
    for _ in 0..400 {
        game.step();
    }

    c.bench_function("tick_builtins", |b| {
        b.iter(|| {
            let command = game.command();
            let packet = game.step();
            black_box(host.tick(packet, Some(&field), &[command]))
        })
    });

    host.shutdown();
    let _ = fs::remove_dir_all(dir);
}

fn bench_tick_many_trackers(c: &mut Criterion) {
    let manifests: Vec<(String, String)> = (0..16)
        .map(|i| {
            (
                format!("tracker_{i:02}.json"),
                r#"{"kind": "ball_tracker", "settings": {"report_interval_ms": 60000}}"#.to_string(),
            )
        })
        .collect();
    let refs: Vec<(&str, &str)> = manifests
        .iter()
        .map(|(f, m)| (f.as_str(), m.as_str()))
        .collect();
    let dir = plugin_dir("many", &refs);
    let mut host = host(dir.clone());
    let mut game = SyntheticMatch::new(11, 3).with_duration(1.0e6);

    c.bench_function("tick_16_trackers", |b| {
        b.iter(|| {
            let packet = game.step();
            black_box(host.tick(packet, None, &[ControllerState::default()]))
        })
    });

    host.shutdown();
    let _ = fs::remove_dir_all(dir);
}

criterion_group!(benches, bench_tick_builtins, bench_tick_many_trackers);
criterion_main!(benches);
