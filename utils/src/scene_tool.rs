extern crate lbvh_broadphase as lbvh;
extern crate lbvh_data;

extern crate cgmath;
extern crate rand;
extern crate rand_chacha;

#[macro_use]
extern crate clap;

#[macro_use]
extern crate log;

use cgmath::{Point3, Vector3};
use lbvh::{Aabb, BuildOptions, BvhBuilder, KeyEncoding, QueryParams, SortStrategy};
use lbvh_data::Scene;

use rand::prelude::*;

use std::error::Error;
use std::time::{Duration, Instant};

type CmdResult = Result<(), Box<dyn Error>>;

trait Command {
    fn name() -> &'static str;
    fn init() -> clap::App<'static, 'static>;
    fn exec(args: &clap::ArgMatches) -> CmdResult;
}

struct GenScene {}
impl Command for GenScene {
    fn name() -> &'static str { "gen_scene" }
    fn init() -> clap::App<'static, 'static> {
        use clap::Arg;
        clap::SubCommand::with_name(Self::name())
            .about("generate a scene of boxes with random headings on the XZ plane")
            .arg(Arg::with_name("seed")
                .long("seed")
                .value_name("NUMBER")
                .help("initial state for the random number generator"))
            .arg(Arg::with_name("count")
                .short("n")
                .long("count")
                .value_name("NUMBER")
                .required(true)
                .help("number of objects in the scene"))
            .arg(Arg::with_name("size_range")
                .short("s")
                .long("size_range")
                .value_names(&["MIN", "MAX"])
                .required(true)
                .help("size range for objects"))
            .arg(Arg::with_name("bounds")
                .short("b")
                .long("bounds")
                .value_names(&["X0", "Y0", "Z0", "X1", "Y1", "Z1"])
                .required(true)
                .help("region objects are placed in"))
            .arg(Arg::with_name("out_path")
                .short("o")
                .long("out")
                .value_name("PATH")
                .required(true)
                .help("where to write output"))
    }

    fn exec(args: &clap::ArgMatches) -> CmdResult {
        let n = value_t!(args, "count", usize)?;
        let size_range = values_t!(args, "size_range", f32)?;
        let region = values_t!(args, "bounds", f32)?;
        let region = Aabb::new(
            Point3::new(region[0], region[1], region[2]),
            Point3::new(region[3], region[4], region[5]));

        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(
            value_t!(args, "seed", u64).unwrap_or(0));

        let mut scene = Scene{
            object_bounds: Vec::with_capacity(n),
            headings: Vec::with_capacity(n)
        };
        for _ in 0..n {
            let size = Vector3::new(0f32, 0f32, 0f32)
                .map(|_| rng.gen_range(size_range[0], size_range[1]));

            let mut min = Point3::new(0f32, 0f32, 0f32);
            for i in 0..3 {
                let limit = region.max[i] - size[i];
                min[i] = if limit > region.min[i] {
                    rng.gen_range(region.min[i], limit)
                } else {
                    region.min[i]
                };
            }

            let angle = rng.gen_range(0f32, 2f32 * std::f32::consts::PI);
            scene.object_bounds.push(Aabb::new(min, min + size));
            scene.headings.push(Vector3::new(angle.cos(), 0f32, angle.sin()));
        }

        let out_path = args.value_of("out_path").ok_or("no output path specified")?;
        scene.save(out_path)?;
        info!("wrote {} objects to {}", n, out_path);
        Ok(())
    }
}

struct ShowScene {}
impl Command for ShowScene {
    fn name() -> &'static str { "show_scene" }
    fn init() -> clap::App<'static, 'static> {
        use clap::Arg;
        clap::SubCommand::with_name(Self::name())
            .about("print the objects of a scene")
            .arg(Arg::with_name("in_path")
                .short("i")
                .long("in")
                .value_name("PATH")
                .required(true)
                .help("path to a scene generated with gen_scene"))
    }

    fn exec(args: &clap::ArgMatches) -> CmdResult {
        let in_path = args.value_of("in_path").ok_or("no input path specified")?;
        let scene = Scene::load(in_path)?;

        println!("objects: {}", scene.len());
        for (id, (bounds, heading)) in scene.object_bounds.iter().zip(scene.headings.iter()).enumerate() {
            println!("\tid: {:5}, bounds: <{:6.3}, {:6.3}, {:6.3}> <{:6.3}, {:6.3}, {:6.3}>, heading: <{:6.3}, {:6.3}, {:6.3}>",
                id,
                bounds.min.x,
                bounds.min.y,
                bounds.min.z,
                bounds.max.x,
                bounds.max.y,
                bounds.max.z,
                heading.x,
                heading.y,
                heading.z);
        }
        Ok(())
    }
}

struct RunFrames {}
impl RunFrames {
    fn options(args: &clap::ArgMatches) -> BuildOptions {
        let encoding = match args.value_of("encoding") {
            Some("spatial") => KeyEncoding::Spatial,
            _ => KeyEncoding::Planar
        };
        let strategy = match args.value_of("sort") {
            Some("radix") => SortStrategy::Radix,
            _ => SortStrategy::Bitonic
        };
        BuildOptions::new()
            .with_encoding(encoding)
            .with_sort_strategy(strategy)
            .with_validation(false)
    }
}

impl Command for RunFrames {
    fn name() -> &'static str { "run_frames" }
    fn init() -> clap::App<'static, 'static> {
        use clap::Arg;
        clap::SubCommand::with_name(Self::name())
            .about("move every object along its heading, rebuilding and sensing each frame")
            .arg(Arg::with_name("in_path")
                .short("i")
                .long("in")
                .value_name("PATH")
                .required(true)
                .help("path to a scene generated with gen_scene"))
            .arg(Arg::with_name("frames")
                .short("f")
                .long("frames")
                .value_name("NUMBER")
                .default_value("60")
                .help("number of frames to simulate"))
            .arg(Arg::with_name("speed")
                .long("speed")
                .value_name("UNITS")
                .default_value("1")
                .help("distance each object moves per frame"))
            .arg(Arg::with_name("encoding")
                .long("encoding")
                .possible_values(&["planar", "spatial"])
                .default_value("planar"))
            .arg(Arg::with_name("sort")
                .long("sort")
                .possible_values(&["bitonic", "radix"])
                .default_value("bitonic"))
    }

    fn exec(args: &clap::ArgMatches) -> CmdResult {
        let in_path = args.value_of("in_path").ok_or("no input path specified")?;
        let frames = value_t!(args, "frames", usize)?;
        let speed = value_t!(args, "speed", f32)?;

        let mut scene = Scene::load(in_path)?;
        let capacity = std::cmp::max(1, scene.len());
        let mut builder = BvhBuilder::with_options(capacity, Self::options(args))?;
        let params = QueryParams::default();

        let mut build_time = Duration::default();
        let mut query_time = Duration::default();
        for frame in 0..frames {
            for (bounds, &heading) in scene.object_bounds.iter_mut().zip(scene.headings.iter()) {
                let offset = heading * speed;
                *bounds = Aabb::new(bounds.min + offset, bounds.max + offset);
            }

            let start = Instant::now();
            let nodes = builder.build(&scene.object_bounds)?;
            let built = Instant::now();
            let object_bounds = &scene.object_bounds;
            let headings = &scene.headings;
            let hits = lbvh::par_query_all(nodes, &params, |id| {
                (object_bounds[id as usize].center(), headings[id as usize])
            });
            let done = Instant::now();

            build_time += built - start;
            query_time += done - built;

            debug!("frame {}: {} nodes, {} front hits, {} side hits, build {:?}, query {:?}",
                frame,
                nodes.len(),
                hits.iter().filter(|hit| hit.has_front()).count(),
                hits.iter().filter(|hit| hit.has_side()).count(),
                built - start,
                done - built);
        }

        if frames > 0 {
            info!("{} objects, {} frames: mean build {:?}, mean query {:?}",
                scene.len(),
                frames,
                build_time / frames as u32,
                query_time / frames as u32);
        }
        builder.dispose();
        Ok(())
    }
}

macro_rules! app_cmds {
    (app $app: expr; $(cmd $cmd: ident)*) => {
        {
            let mut app = $app as clap::App;
            $(
                app = app.subcommand(<$cmd as Command>::init());
            )*
            let matches = app.get_matches();
            let mut result: CmdResult = Ok(());
            $(
                if let Some(matches) = matches.subcommand_matches(<$cmd as Command>::name()) {
                    result = <$cmd as Command>::exec(matches);
                }
            )*
            result
        }
    };
}

fn main() {
    env_logger::init();

    let result = app_cmds!{
        app clap::App::new("scene_tool")
            .version("0.1.0");
        cmd GenScene
        cmd ShowScene
        cmd RunFrames
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}
