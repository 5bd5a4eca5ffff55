use criterion::{criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};

use turtledown_core::{FetchRequest, TileSpec, DEFAULT_TILE_SIZE};
use turtledown_render::{SpriteSheet, TurtleView, ViewConfig};

fn sheet(checker: bool) -> SpriteSheet {
    let size = DEFAULT_TILE_SIZE;
    let image = RgbaImage::from_fn(size, size, |x, y| {
        let dark = checker && ((x / 40) + (y / 40)) % 2 == 0;
        if dark {
            Rgba([20, 20, 20, 255])
        } else {
            Rgba([230, 230, 230, 255])
        }
    });
    SpriteSheet::new(SpriteSheet::build_strip(&image).unwrap()).unwrap()
}

/// A view whose every fetch is answered with the same two sheets.
fn loaded_view() -> TurtleView {
    let mut view = TurtleView::new(ViewConfig::default()).unwrap();
    let root = sheet(true);
    let plain = sheet(false);
    let spec = TileSpec {
        black: vec!["turtles".into()],
        white: vec!["sky".into()],
    };
    loop {
        let requests = view.drain_requests();
        if requests.is_empty() {
            break;
        }
        for request in requests {
            match request {
                FetchRequest::Image { path } => {
                    let image = if path.contains("turtles") { root.clone() } else { plain.clone() };
                    view.image_loaded(&path, Ok(image));
                }
                FetchRequest::Spec { id, .. } => view.spec_loaded(&id, Ok(spec.clone())),
            }
        }
    }
    view
}

fn bench_root_frame(c: &mut Criterion) {
    let mut view = loaded_view();
    c.bench_function("root_frame_600", |b| {
        b.iter(|| view.render().unwrap());
    });
}

fn bench_pixel_frame(c: &mut Criterion) {
    let mut view = loaded_view();
    let centre = DEFAULT_TILE_SIZE as f64 / 2.0;
    view.zoom_at(centre, centre, 40.0);
    c.bench_function("pixel_frame_600_scale40", |b| {
        b.iter(|| view.render().unwrap());
    });
}

fn bench_sprite_scaling(c: &mut Criterion) {
    let sheet = sheet(true);
    c.bench_function("sprite_scaled_42", |b| {
        b.iter(|| sheet.scaled(42));
    });
}

criterion_group!(
    benches,
    bench_root_frame,
    bench_pixel_frame,
    bench_sprite_scaling
);
criterion_main!(benches);
