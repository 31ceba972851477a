#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use boardtrace_base::euclid::{point2, point3, size2, vec2, vec3};
use boardtrace_base::math::Rgb;
use boardtrace_render::camera::Projection;
use boardtrace_render::object::{Cylinder, LayerItem, Triangle3};
use boardtrace_render::shapes::{FilledCircle, Polygon4, Ring, RoundSegment};
use boardtrace_render::{Camera, Light, Material, RenderOptions, Raytracer, Scene};

/// A 60×40 board with a grid of pads, vias, tracks between them, and a boxy component.
fn board_scene() -> Arc<Scene> {
    let mut builder = Scene::builder();
    let body = builder.add_material(Material::default());
    let mut metal = Material::default();
    metal.specular = Rgb::from_luminance(0.5);
    metal.shininess = 32.0;
    metal.reflection = 0.3;
    let copper = builder.add_material(metal);

    builder.add_object(
        LayerItem::new(Polygon4::rectangle(point2(0., 0.), point2(60., 40.)), 0.0, 1.6),
        body,
        Rgb::new(0.1, 0.35, 0.1),
    );
    for i in 0..12 {
        for j in 0..8 {
            let center = point2(2.5 + 5.0 * i as f32, 2.5 + 5.0 * j as f32);
            builder.add_object(
                LayerItem::new(Ring::new(center, 0.4, 0.9), 1.6, 1.64),
                copper,
                Rgb::new(0.8, 0.6, 0.3),
            );
            builder.add_object(Cylinder::new(center, 0.4, 0.0, 1.6), copper, Rgb::ONE);
            if i < 11 {
                builder.add_object(
                    LayerItem::new(
                        RoundSegment::new(center, center + vec2(5.0, 0.0), 0.3),
                        1.6,
                        1.64,
                    ),
                    copper,
                    Rgb::new(0.8, 0.6, 0.3),
                );
            }
        }
    }
    builder.add_object(
        LayerItem::new(FilledCircle::new(point2(30., 20.), 3.0), 1.64, 4.0),
        body,
        Rgb::from_luminance(0.2),
    );
    for triangle in [
        [point3(40., 10., 1.64), point3(50., 10., 1.64), point3(45., 15., 5.0)],
        [point3(50., 10., 1.64), point3(50., 20., 1.64), point3(45., 15., 5.0)],
    ] {
        builder.add_object(Triangle3::new(triangle), body, Rgb::from_luminance(0.1));
    }
    builder.add_light(Light::point(point3(30., 20., 60.), Rgb::from_luminance(0.6)));
    Arc::new(builder.build().unwrap())
}

fn camera() -> Camera {
    let mut camera = Camera::new(Projection::Perspective { fov_y: 0.8 }, size2(160, 120));
    camera.look_at(point3(30., -20., 50.), point3(30., 20., 0.), vec3(0., 0., 1.));
    camera
}

pub fn raytrace_bench(c: &mut Criterion) {
    let scene = board_scene();

    let mut group = c.benchmark_group(if cfg!(feature = "auto-threads") {
        "threaded"
    } else {
        "serial"
    });
    group.sample_size(20);

    group.bench_function("fast", |b| {
        let mut options = RenderOptions::default();
        options.antialiasing = false;
        options.post_processing = false;
        let mut raytracer = Raytracer::new(scene.clone(), camera(), options);
        b.iter_with_large_drop(|| raytracer.render_to_completion().unwrap());
    });

    group.bench_function("full", |b| {
        let mut raytracer = Raytracer::new(scene.clone(), camera(), RenderOptions::default());
        b.iter_with_large_drop(|| raytracer.render_to_completion().unwrap());
    });

    group.bench_function("preview", |b| {
        let mut raytracer = Raytracer::new(scene.clone(), camera(), RenderOptions::default());
        let mut output = vec![[0; 4]; raytracer.buffer_size().area() as usize];
        b.iter(|| raytracer.render_preview(&mut output).unwrap());
    });

    group.finish();
}

criterion_group!(benches, raytrace_bench);
criterion_main!(benches);
