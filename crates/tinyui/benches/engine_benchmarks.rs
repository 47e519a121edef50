//! Engine benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;
use tinyui::{Color, DefaultFetcher, Engine, EngineOptions, HeadlessGl, TextStyle, TextSystem};

const MARKUP: &str = "[b]Score[/b]: [color=#ffcc00]1200[/color] \
    [size=32][i]combo[/i][/size] [u]x4[/u] [opacity=0.5]faded[/opacity] \
    [outline=red]outlined[/outline] [background=blue]boxed[/background]";

fn bench_bbcode(c: &mut Criterion) {
    let mut group = c.benchmark_group("bbcode");
    group.bench_function("parse", |b| b.iter(|| black_box(text::parse_bbcode(black_box(MARKUP)))));

    let system = TextSystem::monospace();
    let style = TextStyle { bbcode_enabled: true, ..TextStyle::default() };
    group.bench_function("layout", |b| b.iter(|| black_box(system.layout(black_box(MARKUP), &style))));

    let wrapped = TextStyle { max_width: Some(200.0), word_wrap: true, ..style.clone() };
    group.bench_function("layout_wrapped", |b| b.iter(|| black_box(system.layout(black_box(MARKUP), &wrapped))));
    group.finish();
}

fn headless_engine(nodes: usize) -> Engine<HeadlessGl> {
    let gl = Rc::new(HeadlessGl::new(1280, 720));
    let mut engine = Engine::with_text_system(
        gl,
        EngineOptions::default(),
        Rc::new(DefaultFetcher::new()),
        Rc::new(TextSystem::monospace()),
    )
    .expect("engine");
    let root = engine.root();
    for i in 0..nodes {
        let group = engine.create_container("group");
        let node = engine.scene_mut().get_mut(group).expect("group");
        node.set_position((i % 40) as f32 * 32.0, (i / 40) as f32 * 32.0).set_alpha(0.9);
        engine.scene_mut().add_child(root, group).expect("add group");

        let shape = engine.create_graphics("shape");
        engine
            .scene_mut()
            .graphics_mut(shape)
            .expect("graphics")
            .fill_rect(0.0, 0.0, 24.0, 24.0, Color::WHITE)
            .fill_circle(12.0, 12.0, 8.0, Color::BLACK);
        engine.scene_mut().add_child(group, shape).expect("add shape");
    }
    engine
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for nodes in [100, 1000] {
        let mut engine = headless_engine(nodes);
        group.bench_with_input(BenchmarkId::new("tree", nodes), &nodes, |b, _| {
            b.iter(|| {
                let stats = engine.render().expect("render");
                engine.gl().take_draw_calls();
                black_box(stats)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bbcode, bench_render);
criterion_main!(benches);
