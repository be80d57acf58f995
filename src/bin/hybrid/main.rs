//! hybrid-cli - Build BVHs over procedural scenes and simulate the frame loop.

use std::env;

use anyhow::{bail, Context};
use glam::Vec3;
use hybrid_raytracer::bvh::{
    build_gpu_data, BvhBuilder, FlatBvh, Primitive, Sphere, SplitAxis, Triangle,
};
use hybrid_raytracer::frame::headless::{HeadlessBackend, HeadlessEvent, HeadlessWindow};
use hybrid_raytracer::frame::{
    Backend, Extent2d, FrameInfo, FrameOrchestrator, FrameOutcome, FramePasses, Window,
};
use hybrid_raytracer::RenderConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }

    let _trace_guard = init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "b" | "build" => cmd_build(&filtered_args[1..]),
        "s" | "simulate" => cmd_simulate(&filtered_args[1..]),
        "c" | "config" => cmd_config(&filtered_args[1..]),
        "version" | "--version" => {
            println!(
                "hybrid-cli {} ({})",
                env!("CARGO_PKG_VERSION"),
                env!("HYBRID_BUILD_DATE")
            );
            Ok(())
        }
        "h" | "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Console logging filtered by `RUST_LOG` or the verbosity flags; a Chrome
/// trace is written to `trace.json` when `HYBRID_TRACE=1`.
fn init_tracing(level: &str) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    if env::var("HYBRID_TRACE").ok().as_deref() == Some("1") {
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(chrome_layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return None;
        }
        return Some(guard);
    }

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
    None
}

fn print_help() {
    println!("hybrid-cli - BVH builder and frame loop simulator");
    println!();
    println!("USAGE:");
    println!("    hybrid-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    b, build     [--count N] [--seed S] [--axis random|longest] [--spheres]");
    println!("                 Build a BVH over a procedural scene and print stats");
    println!("    s, simulate  [--frames N] [--resize-at K]");
    println!("                 Run the frame loop on the headless backend");
    println!("    c, config    [--save]");
    println!("                 Print the effective configuration as JSON");
    println!("    version      Show version and build date");
    println!("    h, help      Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG         Log filter, overrides -v/-q");
    println!("    HYBRID_TRACE=1   Write a Chrome trace to trace.json");
}

/// Value following `flag`, parsed.
fn flag_value<T: std::str::FromStr>(args: &[&str], flag: &str) -> anyhow::Result<Option<T>> {
    let Some(pos) = args.iter().position(|&a| a == flag) else {
        return Ok(None);
    };
    let raw = args
        .get(pos + 1)
        .with_context(|| format!("missing value for {}", flag))?;
    match raw.parse() {
        Ok(v) => Ok(Some(v)),
        Err(_) => bail!("invalid value for {}: {}", flag, raw),
    }
}

fn cmd_build(args: &[&str]) -> anyhow::Result<()> {
    let mut config = RenderConfig::load();
    let count: usize = flag_value(args, "--count")?.unwrap_or(64);
    let seed: u64 = flag_value(args, "--seed")?.unwrap_or(1);
    if let Some(axis) = flag_value::<String>(args, "--axis")? {
        config.split_axis = match axis.as_str() {
            "random" => SplitAxis::Random,
            "longest" => SplitAxis::LongestExtent,
            other => bail!("unknown axis policy: {}", other),
        };
    }
    config.split_seed = Some(seed);

    let mut rng = StdRng::seed_from_u64(seed);
    if args.contains(&"--spheres") {
        let spheres = random_spheres(&mut rng, count);
        report_build(&spheres, &config)
    } else {
        let triangles = random_triangles(&mut rng, count);
        report_build(&triangles, &config)
    }
}

fn report_build<P: Primitive>(primitives: &[P], config: &RenderConfig) -> anyhow::Result<()> {
    let start = std::time::Instant::now();
    let bvh: FlatBvh = BvhBuilder::build_with_config(primitives, config)?;
    let elapsed = start.elapsed();
    bvh.validate(primitives.len())?;

    let data = build_gpu_data(&bvh, primitives, &config.limits())?;
    let stats = bvh.stats();

    println!("Primitives:  {}", primitives.len());
    println!("Split axis:  {:?}", config.split_axis);
    println!(
        "Nodes:       {} ({} leaves, {} internal)",
        stats.node_count, stats.leaf_count, stats.internal_count
    );
    println!("Max depth:   {}", stats.max_depth);
    if let Some(root) = bvh.root() {
        println!("Root bounds: {:?}", root.bounds());
    }
    println!(
        "GPU payload: {} node bytes, {} primitive bytes",
        data.nodes.byte_size(),
        data.primitives.byte_size()
    );
    println!("Build time:  {:.3} ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

fn random_spheres(rng: &mut StdRng, count: usize) -> Vec<Sphere> {
    (0..count)
        .map(|_| {
            let center = Vec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(0.0..5.0),
                rng.gen_range(-10.0..10.0),
            );
            Sphere::new(center, rng.gen_range(0.1..1.0), rng.gen_range(0..3))
        })
        .collect()
}

fn random_triangles(rng: &mut StdRng, count: usize) -> Vec<Triangle> {
    (0..count)
        .map(|_| {
            let origin = Vec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            );
            let mut corner = || {
                origin
                    + Vec3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    )
            };
            let (p1, p2) = (corner(), corner());
            Triangle::new(origin, p1, p2)
        })
        .collect()
}

/// Passes that only open and close their command targets.
struct EmptyPasses;

impl<B: Backend> FramePasses<B> for EmptyPasses {
    fn record_compute(
        &mut self,
        _: &mut B,
        _: B::CommandBuffer,
        frame: &FrameInfo,
    ) -> hybrid_raytracer::Result<()> {
        tracing::trace!(seed = frame.random_seed, "compute pass");
        Ok(())
    }

    fn record_graphics(
        &mut self,
        _: &mut B,
        _: B::CommandBuffer,
        frame: &FrameInfo,
    ) -> hybrid_raytracer::Result<()> {
        tracing::trace!(image = frame.image_index, "graphics pass");
        Ok(())
    }
}

fn cmd_simulate(args: &[&str]) -> anyhow::Result<()> {
    let config = RenderConfig::load();
    let frames: usize = flag_value(args, "--frames")?.unwrap_or(10);
    let resize_at: Option<usize> = flag_value(args, "--resize-at")?;

    let backend = HeadlessBackend::new();
    let log = backend.log();
    let pool = backend.descriptor_pool();
    let window = HeadlessWindow::new(config.extent());

    let mut orchestrator = FrameOrchestrator::new(backend, window, &config)?;
    orchestrator.set_descriptor_pool(Box::new(pool));

    let mut slots = Vec::with_capacity(frames);
    let mut recreated = 0;
    for frame in 0..frames {
        if resize_at == Some(frame) {
            let extent = orchestrator.window().extent();
            orchestrator
                .window_mut()
                .resize(Extent2d::new(extent.width / 2, extent.height / 2));
        }
        slots.push(orchestrator.current_slot());
        if orchestrator.render_frame(&mut EmptyPasses)? == FrameOutcome::SurfaceRecreated {
            recreated += 1;
        }
    }

    let submissions = log
        .lock()
        .iter()
        .filter(|e| matches!(e, HeadlessEvent::Submit { .. }))
        .count();

    println!("Frames:         {}", frames);
    println!("Frames in flight: {}", orchestrator.frames_in_flight());
    println!("Slot sequence:  {:?}", slots);
    println!("Submissions:    {}", submissions);
    println!("Surface epoch:  {} ({} recreations)", orchestrator.epoch(), recreated);
    println!("Random seed:    {}", orchestrator.random_seed());
    Ok(())
}

fn cmd_config(args: &[&str]) -> anyhow::Result<()> {
    let config = RenderConfig::load();
    if let Some(path) = RenderConfig::path() {
        tracing::debug!("config path: {}", path.display());
    }
    if args.contains(&"--save") {
        config.save();
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
