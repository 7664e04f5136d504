use criterion::{black_box, criterion_group, criterion_main, Criterion};

use domsnap::{synthesize, BoundingRect, ComputedStyle, FontRepository, SnapshotConfig, StyleNode, StyleProperty};

// A grid of shadowed cards, each holding a line of text.
fn card_grid(rows: usize, cols: usize) -> StyleNode {
    let mut cards = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let (x, y) = (c as f32 * 60.0, r as f32 * 40.0);
            let style = ComputedStyle::new()
                .with(StyleProperty::BackgroundColor, "rgb(240, 240, 240)")
                .with(StyleProperty::BorderRadius, "4px")
                .with(StyleProperty::BoxShadow, "0px 1px 3px rgba(0, 0, 0, 0.2)")
                .with(StyleProperty::FontSize, "12px");
            let text = StyleNode::text(format!("card {} {}", r, c), BoundingRect::new(x + 4.0, y + 4.0, 48.0, 14.0));
            cards.push(
                StyleNode::element("DIV", style, BoundingRect::new(x, y, 56.0, 36.0)).with_children(vec![text]),
            );
        }
    }
    let bounds = BoundingRect::new(0.0, 0.0, cols as f32 * 60.0, rows as f32 * 40.0);
    StyleNode::element("DIV", ComputedStyle::new(), bounds).with_children(cards)
}

// A single chain of nested boxes.
fn deep_chain(depth: usize) -> StyleNode {
    let style = ComputedStyle::new().with(StyleProperty::BackgroundColor, "rgba(0, 0, 255, 0.1)");
    let mut node = StyleNode::text("leaf", BoundingRect::new(0.0, 0.0, 20.0, 10.0));
    for _ in 0..depth {
        node = StyleNode::element("DIV", style.clone(), BoundingRect::new(0.0, 0.0, 100.0, 100.0))
            .with_children(vec![node]);
    }
    node
}

fn bench_synthesize(c: &mut Criterion) {
    let fonts = FontRepository::default();
    let config = SnapshotConfig::default();

    let grid = card_grid(20, 20);
    c.bench_function("synthesize_card_grid", |b| {
        b.iter(|| synthesize(black_box(&grid), &fonts, &config))
    });

    let chain = deep_chain(2_000);
    c.bench_function("synthesize_deep_chain", |b| {
        b.iter(|| synthesize(black_box(&chain), &fonts, &config))
    });
}

fn bench_serialize(c: &mut Criterion) {
    let doc = synthesize(&card_grid(20, 20), &FontRepository::default(), &SnapshotConfig::default());
    c.bench_function("to_svg_card_grid", |b| b.iter(|| black_box(&doc).to_svg()));
}

criterion_group!(benches, bench_synthesize, bench_serialize);
criterion_main!(benches);
